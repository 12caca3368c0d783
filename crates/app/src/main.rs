use anyhow::Context;
use clap::Parser;
use services::{AppServices, Clock};
use storage::repository::Storage;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod seed;

use config::{Cli, Command, prepare_sqlite_file};

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let db_url = cli.database_url();

    // Migrations run here, before anything is served.
    prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url)
        .await
        .with_context(|| format!("opening {db_url}"))?;
    let app = AppServices::from_storage(&storage, Clock::default_clock());

    match cli.command() {
        Command::Serve => serve(app, cli.bind).await,
        Command::Seed => seed::seed(&storage, &app).await,
    }
}

async fn serve(app: AppServices, bind: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(addr = %listener.local_addr()?, "LMS API listening");
    axum::serve(listener, api::router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            warn!(error = %err, "Ctrl-C handler unavailable; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}
