use std::process::ExitCode;

use clap::Parser;
use cua_agent::{AgentError, Config, Platform, PlannerKind, build_planner, run_web_task};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit status for a platform that has no executor yet.
const EXIT_NOT_IMPLEMENTED: u8 = 3;
/// `EX_CONFIG` from sysexits.h.
const EXIT_CONFIG: u8 = 78;

#[derive(Debug, Parser)]
#[command(name = "agent", about = "Computer-use agent runner")]
struct Cli {
    /// Target platform
    #[arg(long, value_enum)]
    platform: Platform,

    /// Planner type [default: $PLANNER or simple]
    #[arg(long, value_enum)]
    planner: Option<PlannerKind>,

    /// URL to open (web platform)
    #[arg(long, required_if_eq("platform", "web"))]
    url: Option<String>,

    /// Natural language goal or simple patterned goal
    #[arg(long)]
    goal: String,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Maximum planning steps [default: $AGENT_MAX_STEPS or 15]
    #[arg(long, alias = "max_steps")]
    max_steps: Option<usize>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {e}");
    }

    let config = Config::from_env();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AgentError::NotImplemented(what)) => {
            error!("not implemented: {what}");
            ExitCode::from(EXIT_NOT_IMPLEMENTED)
        }
        Err(AgentError::Config(msg)) => {
            error!("configuration error: {msg}");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(e) => {
            error!("run failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mut config: Config) -> Result<(), AgentError> {
    cli.platform.ensure_implemented()?;

    // The parser enforces `--url` for web; a hand-built `Cli` does not.
    let url = cli
        .url
        .ok_or_else(|| AgentError::Config("--url is required for web platform".into()))?;
    let kind = cli
        .planner
        .unwrap_or_else(|| PlannerKind::from_name(&config.planner));
    let planner = build_planner(kind, &config)?;

    config.headless |= cli.headless;
    let max_steps = cli.max_steps.unwrap_or(config.max_steps);

    let termination = run_web_task(&url, planner, &cli.goal, max_steps, &config).await?;
    info!("finished: {termination}");
    Ok(())
}
