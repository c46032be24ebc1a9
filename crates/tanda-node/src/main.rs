//! tanda-node — the tanda circle-engine node binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the state database
//!   2. Build the in-memory dev token ledger
//!   3. Start the JSON-RPC 2.0 server
//!   4. Wait for a shutdown signal

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use tanda_rpc::{RpcServer, RpcServerState};
use tanda_state::{CircleEngine, StateDb};
use tanda_token::{MemoryLedger, TokenLedger};

#[derive(Parser, Debug)]
#[command(
    name = "tanda-node",
    version,
    about = "Tanda node — rotating savings circles with collateral-backed settlement"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.tanda/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8545")]
    rpc_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tanda=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("tanda node starting");

    // ── State database ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);

    // ── Token ledger ──────────────────────────────────────────────────────────
    let ledger = Arc::new(MemoryLedger::new());
    warn!("dev token ledger is in-memory; balances and allowances reset on restart");

    // ── Engine ────────────────────────────────────────────────────────────────
    let engine = Arc::new(CircleEngine::new(
        Arc::clone(&db),
        Arc::clone(&ledger) as Arc<dyn TokenLedger>,
    ));

    // ── RPC server ────────────────────────────────────────────────────────────
    let state = Arc::new(RpcServerState { engine, db, ledger });
    let _rpc_handle = RpcServer::new(state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!("node ready");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
