// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # minichain Node
//!
//! Entry point for the `minichain-node` binary. Parses CLI arguments,
//! initializes logging, opens the block store, binds the TCP transport,
//! dials the seeds, and runs the server next to the status/metrics API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     - start a node (a validator when given a key)
//! - `keygen`  - print a fresh validator key pair
//! - `version` - print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use minichain_protocol::config::{NodeConfig, PROTOCOL_VERSION};
use minichain_protocol::crypto::keys::PrivateKey;
use minichain_protocol::network::{NetAddr, Server, ServerConfig, TcpTransport, Transport};
use minichain_protocol::storage::{BlockStore, Ledger, MemoryStore, SledStore};

use cli::{Commands, MinichainCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MinichainCli::parse();

    match cli.command {
        Commands::Run(args) => {
            logging::init_logging(logging::DEFAULT_DIRECTIVES, cli.log_format);
            let config = args.node_config().context("failed to load configuration")?;
            run_node(config).await
        }
        Commands::Keygen => {
            keygen();
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn open_store(config: &NodeConfig) -> Result<Arc<dyn BlockStore>> {
    match &config.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create data directory {}", dir.display()))?;
            let store = SledStore::open(dir)
                .with_context(|| format!("failed to open block store at {}", dir.display()))?;
            info!(path = %dir.display(), "block store opened");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Runs a node until Ctrl+C / SIGTERM or until the server stops on its own.
async fn run_node(config: NodeConfig) -> Result<()> {
    let server_config = ServerConfig::from_node_config(&config).context("invalid configuration")?;
    info!(
        node_id = %server_config.node_id,
        listen_addr = %config.listen_addr,
        seeds = config.seeds.len(),
        validator = server_config.validator.is_some(),
        block_time = ?server_config.block_time,
        "starting minichain-node"
    );

    let store = open_store(&config)?;
    let ledger = Ledger::restore(store).context("failed to load ledger")?;

    let transport = Arc::new(
        TcpTransport::bind(&config.listen_addr)
            .await
            .with_context(|| format!("failed to bind peer listener on {}", config.listen_addr))?,
    );
    let server = Server::new(server_config, vec![transport.clone() as Arc<dyn Transport>], ledger)
        .context("failed to start server")?;
    let handle = server.handle();
    let mut server_task = tokio::spawn(server.run());

    for seed in &config.seeds {
        let addr = NetAddr::from(seed.as_str());
        match transport.connect(&addr).await {
            Ok(()) => info!(%addr, "connected to seed"),
            Err(err) => warn!(%addr, %err, "seed unreachable"),
        }
    }

    let api_task = match &config.api_addr {
        Some(addr) => {
            let metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
            let router = api::create_router(api::AppState {
                node: handle.clone(),
                metrics,
            });
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind API listener on {addr}"))?;
            info!(%addr, "status API listening");
            Some(tokio::spawn(async move {
                if let Err(err) = axum::serve(listener, router).await {
                    error!(%err, "API server error");
                }
            }))
        }
        None => None,
    };

    let finished = tokio::select! {
        _ = shutdown_signal() => None,
        joined = &mut server_task => Some(joined),
    };
    let result = match finished {
        Some(joined) => joined,
        None => {
            info!("shutdown signal received");
            handle.shutdown();
            server_task.await
        }
    };

    if let Some(api) = api_task {
        api.abort();
    }

    match result {
        Ok(Ok(())) => {
            info!(height = handle.height(), "minichain-node stopped");
            Ok(())
        }
        Ok(Err(err)) => Err(err).context("server failed"),
        Err(err) => Err(err).context("server task panicked"),
    }
}

/// Prints a fresh validator key pair to stdout.
fn keygen() {
    let key = PrivateKey::generate();
    println!("secret key : {}", key.to_hex());
    println!("public key : {}", key.public_key().to_hex());
}

fn print_version() {
    println!("minichain-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is never delivered.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
