pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::cli::client::ApiClient;

#[derive(Parser)]
#[command(name = "erasure")]
#[command(about = "Erasure CLI - verify and run tenant and session data erasure")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "ERASURE_SERVER",
        default_value = "http://localhost:3000",
        help = "Erasure API base URL"
    )]
    pub server: String,

    #[arg(long, global = true, env = "ERASURE_TOKEN", help = "Operator JWT for /api routes")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint an operator token from the local JWT_SECRET")]
    Token(commands::token::TokenArgs),

    #[command(about = "Verification code management")]
    Code {
        #[command(subcommand)]
        cmd: commands::code::CodeCommands,
    },

    #[command(about = "Request a challenge prompt for a fingerprint")]
    Challenge(commands::challenge::ChallengeArgs),

    #[command(about = "Erase an account or a consent session")]
    Erase {
        #[command(subcommand)]
        cmd: commands::erase::EraseCommands,
    },

    #[command(about = "Show the deletion plan for a target (local, no server)")]
    Plan(commands::plan::PlanArgs),

    #[command(about = "Inspect or resume erasure requests")]
    Request {
        #[command(subcommand)]
        cmd: commands::request::RequestCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Token(args) => commands::token::handle(args, output_format),
        Commands::Plan(args) => commands::plan::handle(args, output_format),
        Commands::Code { cmd } => {
            let client = ApiClient::new(&cli.server, cli.token)?;
            commands::code::handle(cmd, &client, output_format).await
        }
        Commands::Challenge(args) => {
            let client = ApiClient::new(&cli.server, cli.token)?;
            commands::challenge::handle(args, &client, output_format).await
        }
        Commands::Erase { cmd } => {
            let client = ApiClient::new(&cli.server, cli.token)?;
            commands::erase::handle(cmd, &client, output_format).await
        }
        Commands::Request { cmd } => {
            let client = ApiClient::new(&cli.server, cli.token)?;
            commands::request::handle(cmd, &client, output_format).await
        }
    }
}
