use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lawontip_core::bootstrap::AppBuilder;
use lawontip_core::ingest::run_ingestion;
use lawontip_gateway::GatewayServer;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "lawontip")]
#[command(about = "Legal assistant answering questions from your PDF documents")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (overrides LAWONTIP_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the vector store from the documents directory
    Ingest,
    /// Start the web chat interface
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let app = AppBuilder::from_env(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;

    match cli.command {
        Command::Ingest => ingest(&app).await,
        Command::Serve => serve(&app).await,
    }
}

async fn ingest(app: &AppBuilder) -> anyhow::Result<()> {
    let config = app.config();
    tracing::info!(
        documents = %config.documents.dir.display(),
        index = %config.index.dir.display(),
        "building vector store"
    );
    let report = run_ingestion(config, app.build_embedder()?).await?;

    println!(
        "Indexed {} chunk(s) from {} page(s) in {} file(s) into {}",
        report.chunks,
        report.pages,
        report.files,
        config.index.dir.display()
    );
    for failure in &report.failures {
        println!("  skipped {}: {}", failure.path.display(), failure.error);
    }
    Ok(())
}

async fn serve(app: &AppBuilder) -> anyhow::Result<()> {
    let assistant = Arc::new(app.build_assistant()?);
    let gateway = &app.config().gateway;
    let (shutdown_tx, shutdown_rx) = AppBuilder::build_shutdown();
    spawn_ctrl_c_handler(shutdown_tx);

    GatewayServer::new(gateway.host.clone(), gateway.port, assistant, shutdown_rx)
        .with_rate_limit(gateway.rate_limit)
        .with_max_body_size(gateway.max_body_size)
        .with_session_ttl(Duration::from_secs(app.config().memory.session_ttl_secs))
        .serve()
        .await?;
    Ok(())
}

fn spawn_ctrl_c_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
