use anyhow::anyhow;
use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum RequestCommands {
    #[command(about = "Show an erasure request and its step results")]
    Show {
        #[arg(help = "Request UUID")]
        id: String,
    },

    #[command(about = "Re-run an interrupted or partially failed request")]
    Resume {
        #[arg(help = "Request UUID")]
        id: String,
    },
}

pub async fn handle(cmd: RequestCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let (reply, resumed) = match cmd {
        RequestCommands::Show { id } => (client.get(&format!("/api/erasure/requests/{}", id), true).await?, false),
        RequestCommands::Resume { id } => (
            client
                .post(&format!("/api/erasure/requests/{}/resume", id), &json!({}), true)
                .await?,
            true,
        ),
    };

    let partial = reply.body.get("partial").and_then(|p| p.as_bool()).unwrap_or(false);
    if !reply.is_success() && !partial {
        return fail_reply(&output_format, &reply);
    }

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reply.data())?),
        OutputFormat::Text => print_request(reply.data()),
    }

    if resumed && partial {
        return Err(anyhow!("request still has failed steps"));
    }
    Ok(())
}
