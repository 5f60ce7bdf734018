use anyhow::anyhow;
use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::OutputFormat;
use crate::config;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(help = "Operator name recorded in the token subject")]
    pub operator: String,

    #[arg(long, help = "Token lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let hours = args.hours.unwrap_or(security.jwt_expiry_hours);
    let claims = Claims::new(&args.operator, &security.operator_access, hours);
    let token = generate_jwt(&claims, &security.jwt_secret).map_err(|e| anyhow!("{} (is JWT_SECRET set?)", e))?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "token": token,
                "operator": args.operator,
                "expires_in": hours * 3600
            }))?
        ),
        // Bare token so it can be captured with $(erasure token ops)
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
