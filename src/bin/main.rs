use financial_intelligence_engine::{agent::Orchestrator, config::EngineConfig, models::Intent, QueryPlan};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: orchestrator <INTENT> <query...>\n       orchestrator --plan <plan.json>";

enum Command {
    Inline(QueryPlan),
    PlanFile(PathBuf),
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args {
        [flag, path] if flag == "--plan" => Ok(Command::PlanFile(PathBuf::from(path))),
        [intent, query @ ..] if !query.is_empty() => {
            let intent: Intent = intent.parse().map_err(|e| format!("{}", e))?;
            Ok(Command::Inline(QueryPlan::new(intent, query.join(" "))))
        }
        _ => Err(USAGE.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let plan = match parse_args(&args)? {
        Command::Inline(plan) => plan,
        Command::PlanFile(path) => {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        }
    };

    let config = EngineConfig::from_env()?;
    let orchestrator = Orchestrator::from_config(&config)?;

    info!(intent = %plan.intent, query = %plan.query, "Running orchestrator");

    let envelope = orchestrator.run(plan).await;
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    Ok(())
}
