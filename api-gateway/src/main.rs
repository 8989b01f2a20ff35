// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `chain` crate:
//!
//! - `GET /health`
//! - `POST /node_api/v1/temp/pending_transactions`
//! - `POST /node_api/v1/temp/votes`
//!
//! It embeds a `RocksStore`-backed `Mempool` and `VoteManager`, a
//! background mining/voting loop, a garbage collector, and a Prometheus
//! metrics exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use secp256k1::SecretKey;
use tokio::signal;

use chain::{Assembler, Mempool, MetricsRegistry, NodeConfig, PassthroughStateRoot, RocksStore, Store, VoteManager, run_prometheus_http_server};
use config::ApiConfig;
use routes::{health, pending_transactions, votes};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "api_gateway=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::default();
    let node_cfg = NodeConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if node_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = node_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage + mempool + consensus
    // ---------------------------

    let store: Arc<dyn Store> = Arc::new(RocksStore::open(&node_cfg.storage).map_err(|e| {
        format!("failed to open RocksDB store at {}: {e}", node_cfg.storage.path)
    })?);

    let mempool = Arc::new(Mempool::new(store.clone()));
    let assembler = Arc::new(Assembler::new(
        node_cfg.consensus.clone(),
        store.clone(),
        mempool.clone(),
        PassthroughStateRoot,
    ));
    // In a real node this is loaded from a keystore.
    let miner_secret = SecretKey::from_slice(&[77u8; 32]).expect("fixed demo key is valid");
    let miner_public = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, &miner_secret);
    let miner_address = chain::crypto::address_from_pubkey(&miner_public);

    let vote_manager = Arc::new(VoteManager::with_slashing(
        node_cfg.consensus.clone(),
        store.clone(),
        mempool.clone(),
        miner_secret,
        miner_address,
    ));

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        store: store.clone(),
        mempool: mempool.clone(),
        vote_manager: vote_manager.clone(),
        metrics: metrics.clone(),
    });

    // ---------------------------
    // Background mining/voting loop + garbage collector
    // ---------------------------

    tokio::spawn(mining_loop(
        node_cfg.consensus.clone(),
        store.clone(),
        assembler,
        vote_manager,
        mempool.clone(),
        metrics.clone(),
        miner_secret,
        miner_address,
    ));
    tokio::spawn(garbage_collector(store.clone(), node_cfg.consensus.clone()));

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route(
            "/node_api/v1/temp/pending_transactions",
            post(pending_transactions::submit_pending_transaction),
        )
        .route("/node_api/v1/temp/votes", post(votes::submit_vote))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Background mining/voting loop.
///
/// Each round: assemble a candidate on top of the current head, cast a
/// self-vote, wait for quorum or the collection timeout, then commit or
/// escalate. This runs independently of the HTTP router, which only
/// admits transactions and votes submitted by other participants.
#[allow(clippy::too_many_arguments)]
async fn mining_loop(
    config: chain::ConsensusConfig,
    store: Arc<dyn Store>,
    assembler: Arc<Assembler<PassthroughStateRoot>>,
    vote_manager: Arc<VoteManager>,
    mempool: Arc<Mempool>,
    metrics: Arc<MetricsRegistry>,
    secret: SecretKey,
    miner_address: chain::Address,
) {
    let interval = Duration::from_secs(config.block_time_secs.max(1));
    tracing::info!(interval_secs = interval.as_secs(), "mining loop running");

    loop {
        let next_height = match store.head() {
            Ok(Some(head)) => head.number() + 1,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read chain head");
                tokio::time::sleep(interval).await;
                continue;
            }
        };

        let miner_nonce = chain::accounts::next_nonce(store.as_ref(), &miner_address).unwrap_or(0);

        match assembler.assemble(miner_address, miner_nonce) {
            Ok(pending) => {
                if let Err(e) = store.write_pending_block(&pending.header) {
                    tracing::warn!(error = %e, "failed to persist candidate block");
                    tokio::time::sleep(interval).await;
                    continue;
                }
                if let Some(body) = &pending.body {
                    if let Err(e) = store.write_body(&pending.header.hash, body) {
                        tracing::warn!(error = %e, "failed to persist candidate body");
                        tokio::time::sleep(interval).await;
                        continue;
                    }
                }
                metrics
                    .consensus
                    .mempool_size
                    .set(mempool.unmined().map(|v| v.len()).unwrap_or(0) as f64);

                cast_self_vote(&vote_manager, &secret, miner_address, next_height, pending.header.hash, &metrics);

                let timer = std::time::Instant::now();
                let deadline = tokio::time::Instant::now() + config.vote_collection_timeout;
                loop {
                    if vote_manager.winning_candidate(next_height).ok().flatten().is_some() {
                        break;
                    }
                    if vote_manager.early_counting_satisfied(next_height).unwrap_or(false) {
                        break;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                metrics.consensus.vote_round_seconds.observe(timer.elapsed().as_secs_f64());

                if let Some(winner) = vote_manager.winning_candidate(next_height).ok().flatten() {
                    match vote_manager.commit(next_height, winner) {
                        Ok(block) => {
                            metrics.consensus.blocks_committed.inc();
                            if let Err(e) = mempool.remove_mined(&block.txs) {
                                tracing::warn!(error = %e, "failed to prune mined transactions");
                            }
                            tracing::info!(height = block.number(), hash = %block.hash(), "committed block");
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to commit winning candidate"),
                    }
                } else {
                    vote_manager.escalate(next_height);
                    tracing::info!(
                        height = next_height,
                        round = vote_manager.get_current_voting_round(next_height),
                        "escalated round"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to assemble candidate block"),
        }

        tokio::time::sleep(interval).await;
    }
}

fn cast_self_vote(
    vote_manager: &VoteManager,
    secret: &SecretKey,
    miner_address: chain::Address,
    height: u64,
    block_hash: chain::Hash256,
    metrics: &MetricsRegistry,
) {
    let mut vote = chain::Vote {
        miner_address,
        block_number: height,
        block_hash,
        voting_round: vote_manager.get_current_voting_round(height),
        v: 0,
        r: [0u8; 32],
        s: [0u8; 32],
        hash: chain::Hash256::ZERO,
    };
    let (v, r, s) = chain::crypto::sign(secret, &vote.signing_hash());
    vote.v = v;
    vote.r = r;
    vote.s = s;
    vote.finalize();

    match vote_manager.cast_vote(vote) {
        Ok(()) => metrics.consensus.votes_cast.inc(),
        Err(e) => tracing::warn!(error = %e, "failed to cast self-vote"),
    }
}

/// Periodically prunes pending blocks superseded by a commit.
async fn garbage_collector(store: Arc<dyn Store>, config: chain::ConsensusConfig) {
    let period = Duration::from_secs(config.block_time_secs.max(1) * 10);
    loop {
        tokio::time::sleep(period).await;

        let Ok(Some(head)) = store.head() else { continue };
        if head.number() == 0 {
            continue;
        }

        for number in 0..=head.number() {
            match store.list_pending_blocks_at(number) {
                Ok(stale) => {
                    for header in stale {
                        if let Err(e) = store.delete_pending_block(&header.hash) {
                            tracing::warn!(error = %e, hash = %header.hash, "failed to prune stale pending block");
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to list pending blocks during gc"),
            }
        }
    }
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
