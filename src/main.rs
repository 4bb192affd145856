use std::env;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ptrap::logging::{log_level_to_filter, prepare_log_file};
use ptrap::Server;
use ptrap_config::{default_config_dir, load_config, Config};

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level_to_filter(config.log.level.as_str())));

    match &config.log.file {
        Some(path) => {
            let file = prepare_log_file(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run_server(overlay: Option<PathBuf>) -> Result<()> {
    let config_dir = default_config_dir().context("failed to locate config directory")?;
    let config = load_config(&config_dir, overlay.as_deref())
        .with_context(|| format!("failed to load config from {}", config_dir.display()))?;
    init_tracing(&config)?;

    let server = Server::bind(&config, ptrap_platform::native())
        .await
        .with_context(|| {
            format!(
                "failed to start server on {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    info!(version = env!("CARGO_PKG_VERSION"), "ptrap started");
    server.run().await?;
    info!("ptrap stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let overlay = env::args_os().nth(1).map(PathBuf::from);
    if let Err(e) = run_server(overlay).await {
        eprintln!("ptrap: {:#}", e);
        std::process::exit(1);
    }
}
