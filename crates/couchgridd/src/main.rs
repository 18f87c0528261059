//! couchgridd — the couchgrid daemon.
//!
//! Single binary that wires the cluster manager together:
//! - Orchestration client (Kubernetes)
//! - State store (redb)
//! - Node spawner for the configured strategy
//! - Replication topology engine
//! - Lifecycle controller behind the REST API
//!
//! # Usage
//!
//! ```text
//! couchgridd serve --config /etc/couchgrid/couchgrid.toml --port 8080
//! couchgridd config --spawner petset
//! ```

mod options;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use couchgrid_core::CouchgridConfig;
use couchgrid_health::TokioClock;
use couchgrid_lifecycle::{ClusterController, ControllerSettings};
use couchgrid_platform::KubePlatform;
use couchgrid_replication::{HttpControl, TopologyEngine};
use couchgrid_state::StateStore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::options::ConfigArgs;

#[derive(Parser)]
#[command(name = "couchgridd", about = "Replicated database cluster manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server.
    Serve(ConfigArgs),
    /// Print the effective configuration as TOML.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,couchgrid=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args.resolve()?).await,
        Command::Config(args) => {
            print!("{}", args.resolve()?.to_toml_string()?);
            Ok(())
        }
    }
}

async fn serve(config: CouchgridConfig) -> anyhow::Result<()> {
    info!(
        namespace = %config.platform.namespace,
        spawner = %config.spawner.strategy,
        "couchgrid daemon starting"
    );

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("couchgrid.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let platform = Arc::new(KubePlatform::connect(config.platform.api_url.as_deref()).await?);

    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let spawner = couchgrid_spawner::build_spawner(&config.spawner, platform.clone());
    info!(strategy = %spawner.strategy(), "node spawner ready");

    let settings = ControllerSettings::from(&config);
    let clock = Arc::new(TokioClock);
    let topology = TopologyEngine::new(Arc::new(HttpControl::default()), clock.clone(), settings.readiness);

    let controller = ClusterController::new(platform, spawner, topology, state, clock, settings);

    // ── Start API server ───────────────────────────────────────

    let router = couchgrid_api::build_router(Arc::new(controller));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("couchgrid daemon stopped");
    Ok(())
}
