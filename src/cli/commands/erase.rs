use anyhow::anyhow;
use clap::Subcommand;
use serde_json::json;
use std::io::{BufRead, Write};

use crate::cli::client::{ApiClient, ApiReply};
use crate::cli::commands::challenge::fetch_prompt;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum EraseCommands {
    #[command(about = "Erase a client account using a verification code")]
    Account {
        #[arg(help = "Account UUID")]
        account: String,
        #[arg(long, help = "Verification code issued with `erasure code issue`")]
        code: String,
    },

    #[command(about = "Erase an anonymous consent session")]
    Session {
        #[arg(help = "Session UUID (v4)")]
        session: String,
        #[arg(long, help = "Fingerprint the challenge was issued to")]
        fingerprint: String,
        #[arg(long, help = "Challenge answer; prompts interactively when omitted")]
        answer: Option<String>,
    },
}

pub async fn handle(cmd: EraseCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let reply = match cmd {
        EraseCommands::Account { account, code } => {
            client
                .post(
                    "/api/erasure/account",
                    &json!({ "target_id": account, "code": code }),
                    true,
                )
                .await?
        }
        EraseCommands::Session {
            session,
            fingerprint,
            answer,
        } => {
            let answer = match answer {
                Some(answer) => answer,
                None => {
                    let prompt = fetch_prompt(client, &fingerprint, &output_format).await?;
                    read_answer(&prompt)?
                }
            };
            client
                .post(
                    "/public/erasure/session",
                    &json!({ "session_id": session, "fingerprint": fingerprint, "answer": answer }),
                    false,
                )
                .await?
        }
    };

    report(reply, &output_format)
}

fn read_answer(prompt: &str) -> anyhow::Result<String> {
    eprint!("{} ", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_string();
    if answer.is_empty() {
        return Err(anyhow!("no answer given"));
    }
    Ok(answer)
}

/// A partial failure still carries the request, so print it before failing
fn report(reply: ApiReply, output_format: &OutputFormat) -> anyhow::Result<()> {
    let partial = reply.body.get("partial").and_then(|p| p.as_bool()).unwrap_or(false);
    if !reply.is_success() && !partial {
        return fail_reply(output_format, &reply);
    }

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply.body)?),
        OutputFormat::Text => {
            print_request(reply.data());
            if !partial {
                println!("✓ All associated data has been erased");
            }
        }
    }

    if partial {
        Err(anyhow!("erasure finished with failures; inspect and resume the request"))
    } else {
        Ok(())
    }
}
