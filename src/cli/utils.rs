use anyhow::anyhow;
use serde_json::{json, Value};

use crate::cli::client::ApiReply;
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Report a failed API reply and turn it into a command error
pub fn fail_reply(output_format: &OutputFormat, reply: &ApiReply) -> anyhow::Result<()> {
    let mut message = reply.error_message();
    if let Some(seconds) = reply.body.get("remainingSeconds").and_then(Value::as_i64) {
        message = format!("{} ({}s remaining)", message, seconds);
    }
    output_error(output_format, &message, reply.error_code())?;
    Err(anyhow!("request failed with status {}", reply.status))
}

/// Print a deletion plan tier by tier
pub fn print_plan(plan: &Value) {
    let tiers = plan["tiers"].as_array().cloned().unwrap_or_default();
    println!("Plan for {} {}", target_kind(&plan["target"]), target_id(&plan["target"]));
    for tier in &tiers {
        println!("  Tier {}", tier["index"]);
        for step in tier["steps"].as_array().into_iter().flatten() {
            let buckets = step["bucket_refs"]
                .as_array()
                .map(|refs| {
                    refs.iter()
                        .filter_map(|r| r["bucket"].as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            if buckets.is_empty() {
                println!("    - {}", text(&step["collection"]));
            } else {
                println!("    - {} (objects: {})", text(&step["collection"]), buckets);
            }
        }
    }
}

/// Print an erasure request with per-step outcomes
pub fn print_request(request: &Value) {
    let status = &request["status"];
    let state = text(&status["state"]);
    match status.get("severity").and_then(Value::as_str) {
        Some(severity) => println!("Request {}: {} ({})", text(&request["id"]), state, severity),
        None => println!("Request {}: {}", text(&request["id"]), state),
    }
    println!("Target: {} {}", target_kind(&request["target"]), target_id(&request["target"]));

    let steps = request["step_results"].as_array().cloned().unwrap_or_default();
    if steps.is_empty() {
        return;
    }
    println!("{:<6} {:<28} {:<16} {:>6} {:>8}", "TIER", "COLLECTION", "OUTCOME", "ROWS", "OBJECTS");
    println!("{}", "-".repeat(68));
    for step in &steps {
        println!(
            "{:<6} {:<28} {:<16} {:>6} {:>8}",
            step["tier"],
            text(&step["collection"]),
            text(&step["outcome"]),
            step["rows_deleted"],
            step["objects_deleted"],
        );
        if let Some(error) = step.get("error").and_then(Value::as_str) {
            println!("       error: {}", error);
        }
    }
}

fn target_kind(target: &Value) -> &str {
    match target["kind"].as_str() {
        Some("tenant") => "account",
        Some(other) => other,
        None => "?",
    }
}

fn target_id(target: &Value) -> &str {
    target
        .get("account_id")
        .or_else(|| target.get("session_id"))
        .and_then(Value::as_str)
        .unwrap_or("?")
}

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or("")
}
