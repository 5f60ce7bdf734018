use clap::Args;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct ChallengeArgs {
    #[arg(help = "Caller fingerprint the challenge is bound to")]
    pub fingerprint: String,
}

/// Fetch a prompt for `fingerprint`, returning its text
pub async fn fetch_prompt(client: &ApiClient, fingerprint: &str, output_format: &OutputFormat) -> anyhow::Result<String> {
    let reply = client
        .post("/public/erasure/challenge", &json!({ "fingerprint": fingerprint }), false)
        .await?;
    if !reply.is_success() {
        fail_reply(output_format, &reply)?;
    }
    Ok(reply.data()["prompt"].as_str().unwrap_or_default().to_string())
}

pub async fn handle(args: ChallengeArgs, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let prompt = fetch_prompt(client, &args.fingerprint, &output_format).await?;
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "prompt": prompt }))?),
        OutputFormat::Text => println!("{}", prompt),
    }
    Ok(())
}
