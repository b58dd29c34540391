use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ledger_wire::bytes_to_address;
use mint_core::{MintOrchestrator, ServiceConfig, SqliteStore};
use registry_client::{load_keypair_file, HttpLedgerRpc, RegistryClient};
use tracing::info;

mod app;
mod config;
mod dto;
mod error;
mod routes;
mod state;
mod telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let args = config::Args::parse();
    let mut cfg = ServiceConfig::load(args.config.as_deref())?;
    args.apply(&mut cfg);

    telemetry::init(&cfg.log_level, cfg.json_logs)?;

    let ledger = cfg.ledger.resolve()?;
    let authority = Arc::new(
        load_keypair_file(&ledger.keypair_path)
            .with_context(|| format!("loading {}", ledger.keypair_path.display()))?,
    );
    let rpc = HttpLedgerRpc::new(ledger.rpc_url.clone(), ledger.request_timeout)?;
    let client = RegistryClient::new(rpc, authority, ledger.program_id, ledger.client);

    let store = Arc::new(SqliteStore::open(&cfg.database_path)?);
    let orchestrator = MintOrchestrator::new(client, store.clone(), store, cfg.mint);

    let router = app::build_router(state::AppState::new(Arc::new(orchestrator)));

    let addr: SocketAddr = cfg.listen_addr.parse()?;
    info!(
        %addr,
        program_id = %bytes_to_address(&ledger.program_id),
        rpc_url = %ledger.rpc_url,
        "starting mint-service"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
