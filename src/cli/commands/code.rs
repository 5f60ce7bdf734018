use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum CodeCommands {
    #[command(about = "Issue a single-use verification code for an account")]
    Issue {
        #[arg(help = "Account UUID")]
        account: String,
    },
}

pub async fn handle(cmd: CodeCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CodeCommands::Issue { account } => {
            let reply = client
                .post("/api/erasure/codes", &json!({ "target_id": account }), true)
                .await?;
            if !reply.is_success() {
                return fail_reply(&output_format, &reply);
            }

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reply.data())?),
                OutputFormat::Text => {
                    println!("Code:    {}", reply.data()["code"].as_str().unwrap_or(""));
                    println!("Expires: {}", reply.data()["expires_at"].as_str().unwrap_or(""));
                }
            }
            Ok(())
        }
    }
}
