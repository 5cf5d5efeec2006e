// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! entgl-node: the engine host binary. Wires a [`SqliteStore`] to an
//! [`OplogCoordinator`] for local writes, a [`SyncServer`] for inbound
//! peer connections, and a [`SyncOrchestrator`] for outbound gossip,
//! then runs until `SIGINT`/`SIGTERM`.

mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use entgl_sync::{OplogCoordinator, OrchestratorConfig, ServerConfig, SyncOrchestrator, SyncServer};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Args, NodeConfig};
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = NodeConfig::load(&args)?;
    info!(node_id = %config.node_id, tcp_port = config.tcp_port, "starting entgl-node");

    let store = entgl_store::SqliteStore::open(config.db_path())?;
    for peer in config.peer.clone() {
        store.upsert_peer(&peer.into_remote_peer())?;
    }

    let resolver = config.conflict_resolver.into();
    let coordinator = OplogCoordinator::new(store.clone(), config.node_id.clone(), resolver);
    info!(node_id = %coordinator.node_id(), "local-write coordinator ready");

    let listener = TcpListener::bind(("0.0.0.0", config.tcp_port)).await?;
    let server = SyncServer::new(store.clone(), resolver, server_config(&config));
    let orchestrator = SyncOrchestrator::new(store, resolver, orchestrator_config(&config));

    let cancel = CancellationToken::new();
    let server_task = tokio::spawn(Arc::clone(&server).run(listener, cancel.clone()));
    let orchestrator_task = tokio::spawn(Arc::clone(&orchestrator).run(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    cancel.cancel();

    let _ = server_task.await;
    let _ = orchestrator_task.await;
    Ok(())
}

fn server_config(config: &NodeConfig) -> ServerConfig {
    ServerConfig {
        node_id: config.node_id.clone(),
        auth_token: config.auth_token.clone(),
        max_connections: config.max_connections,
        idle_timeout: Duration::from_millis(config.operation_timeout_ms),
        compression_enabled: true,
    }
}

fn orchestrator_config(config: &NodeConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        node_id: config.node_id.clone(),
        auth_token: config.auth_token.clone(),
        maintenance_interval: Duration::from_secs(config.maintenance_interval_minutes * 60),
        retention: Duration::from_secs(config.oplog_retention_hours * 60 * 60),
        request_timeout: Duration::from_millis(config.operation_timeout_ms),
        ..Default::default()
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
