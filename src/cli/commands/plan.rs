use anyhow::anyhow;
use clap::Args;

use crate::cli::utils::print_plan;
use crate::cli::OutputFormat;
use crate::erasure::relations::RelationGraph;
use crate::erasure::types::{parse_account_id, parse_session_id};
use crate::erasure::{DependencyPlanner, Target, TargetKind};

#[derive(Args)]
pub struct PlanArgs {
    #[arg(help = "Target kind: account or session")]
    pub kind: String,

    #[arg(help = "Target UUID")]
    pub id: String,

    #[arg(long, env = "ERASURE_RELATIONS_PATH", help = "Relationship graph YAML (defaults to the built-in graph)")]
    pub relations: Option<String>,
}

pub fn handle(args: PlanArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let kind = TargetKind::parse(&args.kind).ok_or_else(|| anyhow!("unknown target kind '{}'", args.kind))?;
    let id = match kind {
        TargetKind::Tenant => parse_account_id(&args.id),
        TargetKind::Session => parse_session_id(&args.id),
    }
    .ok_or_else(|| anyhow!("invalid {} id '{}'", kind.as_str(), args.id))?;

    let graph = RelationGraph::load_or_builtin(args.relations.as_deref())?;
    let planner = DependencyPlanner::new(&graph)?;
    let plan = planner.plan(&Target::from_parts(kind, id));

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print_plan(&serde_json::to_value(&plan)?),
    }
    Ok(())
}
