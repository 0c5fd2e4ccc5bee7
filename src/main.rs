use anyhow::Result;
use nle_dashboard::{Config, Server};
use std::{env, path::PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    info!(
        port = config.server_port,
        default_path = %config.data.default_path.display(),
        runs_to_read = config.data.default_runs_to_read,
        stats = %config.data.stats,
        "config loaded"
    );

    // ─── 3) serve until ctrl-c ───────────────────────────────────────
    let server = Server::start(&config)?;
    info!("dashboard: http://localhost:{}/", server.local_addr().port());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.stop().await?;

    info!("all done");
    Ok(())
}
