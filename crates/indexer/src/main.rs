//! Aergo metadata indexer CLI.
//!
//! Wires a store backend (picked from the `--dburl` scheme) and the node
//! client into the synchronization engine, then runs until a signal or, in
//! `--exit-on-complete` mode, until the reindex catch-up finishes.

mod node_http;

use aergo_index_core::{Indexer, SyncConfig};
use aergo_index_store::{Connect, Store};
use aergo_index_store_es::EsConnector;
use aergo_index_store_sql::SqlConnector;
use clap::Parser;
use node_http::HttpNodeClient;
use std::{process::ExitCode, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aergo-indexer", about = "Aergo Metadata Indexer")]
struct Args {
    /// Reindex blocks from genesis and swap index aliases after catching up
    #[arg(long)]
    reindex: bool,

    /// Exit when the reindexing sync completes for the first time
    #[arg(long)]
    exit_on_complete: bool,

    /// Host address of the aergo server
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Port number of the aergo server
    #[arg(short = 'p', long, default_value_t = 7845)]
    port: u16,

    /// Host and port of the aergo server; overrides --host and --port
    #[arg(short = 'A', long)]
    aergo: Option<String>,

    /// URL of the document store
    #[arg(short = 'D', long, default_value = "http://localhost:9200")]
    dburl: String,

    /// Prefix used for index names
    #[arg(short = 'X', long, default_value = "chain_")]
    prefix: String,
}

impl Args {
    fn node_address(&self) -> String {
        match &self.aergo {
            Some(addr) if !addr.is_empty() => addr.clone(),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    info!("starting");

    let cfg = SyncConfig {
        alias_prefix: args.prefix.clone(),
        reindex: args.reindex,
        exit_on_complete: args.exit_on_complete,
    };
    let node = wait_for_node(&args.node_address()).await;

    // A refused store connection at boot is the one fatal startup error.
    if args.dburl.starts_with("http://") || args.dburl.starts_with("https://") {
        match EsConnector::new(&args.dburl).connect().await {
            Ok(store) => run(store, node, cfg).await,
            Err(error) => {
                error!(%error, dburl = %args.dburl, "could not connect to document store");
                ExitCode::FAILURE
            }
        }
    } else {
        match SqlConnector::new(&args.dburl).connect().await {
            Ok(store) => run(store, node, cfg).await,
            Err(error) => {
                error!(%error, dburl = %args.dburl, "could not connect to document store");
                ExitCode::FAILURE
            }
        }
    }
}

async fn run<S: Store>(store: S, node: HttpNodeClient, cfg: SyncConfig) -> ExitCode {
    let mut handle = match Indexer::new(store, node, cfg).start().await {
        Ok(handle) => handle,
        Err(error) => {
            error!(%error, "could not start indexer");
            return ExitCode::FAILURE;
        }
    };

    let mut waiter = handle.clone();
    tokio::select! {
        _ = shutdown_signal() => {
            info!("received shutdown signal, stopping");
            handle.stop();
            handle.wait_stopped().await;
            return ExitCode::FAILURE;
        }
        _ = waiter.wait_stopped() => {}
    }

    info!("sync stopped, exiting");
    ExitCode::SUCCESS
}

/// Wait for the node to answer a status request, retrying every second.
async fn wait_for_node(addr: &str) -> HttpNodeClient {
    use aergo_index_types::NodeClient;

    let client = HttpNodeClient::new(addr);
    loop {
        match client.status().await {
            Ok(status) => {
                info!(addr, best_height = status.best_height, "connected to aergo server");
                return client;
            }
            Err(error) => {
                info!(%error, addr, "could not connect to aergo server, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Resolves when SIGINT, SIGQUIT, or SIGTERM arrives.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        match (signal(SignalKind::terminate()), signal(SignalKind::quit())) {
            (Ok(mut term), Ok(mut quit)) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                    _ = quit.recv() => {}
                }
            }
            _ => ctrl_c.await,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
