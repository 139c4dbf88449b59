mod replay_commands;
mod run_commands;
mod session_commands;

use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    wayfarer_config::WayfarerConfig,
};

#[derive(Parser)]
#[command(name = "wayfarer", version, about = "Wayfarer: plan-driven browser automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML, YAML or JSON). Discovered when not set.
    #[arg(long, global = true, env = "WAYFARER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a plan file against a fresh browser.
    Run(run_commands::RunArgs),
    /// Replay a recorded session.
    Replay(replay_commands::ReplayArgs),
    /// Recorded sessions.
    Sessions {
        #[command(subcommand)]
        action: Option<session_commands::SessionAction>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WayfarerConfig> {
    match path {
        Some(path) => wayfarer_config::load_config(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(wayfarer_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "wayfarer starting");
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run_commands::handle_run(&config, args).await,
        Commands::Replay(args) => replay_commands::handle_replay(&config, args).await,
        Commands::Sessions { action } => {
            session_commands::handle_sessions(&config, action.unwrap_or_default()).await
        },
    }
}
