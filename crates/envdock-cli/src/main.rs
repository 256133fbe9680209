//! envdock - ComfyUI environment manager

use clap::Parser;
use envdock_api::HttpApi;
use envdock_config::GlobalConfig;
use envdock_core::{EnvironmentManager, Notifier};
use envdock_tui::Toasts;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "envdock")]
#[command(author, version, about = "ComfyUI Environment Manager", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Backend URL (overrides the configured one)
    #[arg(long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging. The TUI swaps in a no-op subscriber while it
    // owns the terminal; this covers startup and shutdown.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = GlobalConfig::load().unwrap_or_default();
    if let Some(server) = cli.server {
        config.server.url = server;
    }

    let api = HttpApi::new(
        &config.server.url,
        Duration::from_secs(config.server.request_timeout_secs),
    )?;

    let toasts = Toasts::new();
    let manager = Arc::new(EnvironmentManager::new(
        Arc::new(api),
        Arc::new(toasts.clone()) as Arc<dyn Notifier>,
        config,
    ));

    envdock_tui::run(manager, toasts).await?;
    Ok(())
}
