//! Story server entry point.
//!
//! ```bash
//! ANTHROPIC_API_KEY=... cargo run -p story-server -- --config story.toml -v
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::info;
use std::path::PathBuf;
use story_server::config::DEFAULT_CONFIG_PATH;
use story_server::{build_orchestrator, router, AppState, Config};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "story-server", about = "HTTP backend for an AI-narrated text adventure")]
struct Args {
    /// Path to a TOML config file (defaults to ./story.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding config and STORY_BIND
    #[arg(short, long)]
    bind: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match args.config {
        Some(ref path) => Config::load(path).await?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH).await?,
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    config.validate()?;

    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .context("ANTHROPIC_API_KEY is not set (use the environment or a .env file)")?;
    let orchestrator = build_orchestrator(&config, &api_key)?;

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!("story server listening on {}", listener.local_addr()?);
    info!(
        "sessions: max {}, idle timeout {}s; exchange cap {}",
        config.sessions.max_sessions,
        config.sessions.idle_timeout_secs,
        config.story.max_exchanges
    );

    axum::serve(listener, router(AppState::new(orchestrator)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("story server stopped");
    Ok(())
}

fn init_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    let base_level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // RUST_LOG, when set, refines the CLI level
    builder.parse_default_env();
    builder.init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
