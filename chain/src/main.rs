//! Standalone node binary.
//!
//! Wires up the chain library's storage, mempool, assembler, and vote
//! manager, and drives three long-running tasks:
//!
//! - a mining loop that assembles a candidate, casts a self-vote, and
//!   either commits on quorum or escalates the round on timeout,
//! - a Prometheus metrics exporter,
//! - a garbage collector that prunes pending blocks superseded by a
//!   commit.
//!
//! `api-gateway` is the HTTP-facing alternative to this binary; both
//! share the `chain` library's consensus stack.

use std::sync::Arc;
use std::time::Duration;

use secp256k1::SecretKey;

use chain::consensus::PassthroughStateRoot;
use chain::{Assembler, ConsensusConfig, Mempool, MetricsRegistry, NodeConfig, RocksStore, Store, VoteManager};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "chain=info".to_string()))
        .init();

    if let Err(err) = run_node().await {
        tracing::error!(%err, "fatal error");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = NodeConfig::default();
    tracing::info!(session_id = %cfg.session_id, "starting node");

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = chain::run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!(error = %e, "metrics HTTP server error");
            }
        });
    }

    let store: Arc<dyn Store> = Arc::new(
        RocksStore::open(&cfg.storage)
            .map_err(|e| format!("failed to open RocksDB store at {}: {e}", cfg.storage.path))?,
    );

    let mempool = Arc::new(Mempool::new(store.clone()));
    let assembler = Arc::new(Assembler::new(
        cfg.consensus.clone(),
        store.clone(),
        mempool.clone(),
        PassthroughStateRoot,
    ));

    // Demo miner identity; a real deployment loads this from a keystore.
    let secret = SecretKey::from_slice(&[42u8; 32]).expect("fixed demo key is valid");
    let public = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, &secret);
    let miner_address = chain::crypto::address_from_pubkey(&public);

    let vote_manager = Arc::new(VoteManager::with_slashing(
        cfg.consensus.clone(),
        store.clone(),
        mempool.clone(),
        secret,
        miner_address,
    ));

    tokio::spawn(mining_loop(
        cfg.consensus.clone(),
        store.clone(),
        mempool.clone(),
        assembler,
        vote_manager,
        metrics.clone(),
        secret,
        miner_address,
    ));

    tokio::spawn(garbage_collector(store.clone(), cfg.consensus.clone()));

    // Block forever; the spawned tasks do the work. A real deployment
    // would await a shutdown signal here instead.
    std::future::pending::<()>().await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn mining_loop(
    config: ConsensusConfig,
    store: Arc<dyn Store>,
    mempool: Arc<Mempool>,
    assembler: Arc<Assembler<PassthroughStateRoot>>,
    vote_manager: Arc<VoteManager>,
    metrics: Arc<MetricsRegistry>,
    secret: SecretKey,
    miner_address: chain::Address,
) {
    loop {
        let next_height = match store.head() {
            Ok(Some(head)) => head.number() + 1,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read chain head");
                tokio::time::sleep(Duration::from_secs(config.block_time_secs)).await;
                continue;
            }
        };

        let miner_nonce = chain::accounts::next_nonce(store.as_ref(), &miner_address).unwrap_or(0);

        match assembler.assemble(miner_address, miner_nonce) {
            Ok(pending) => {
                if let Err(e) = store.write_pending_block(&pending.header) {
                    tracing::warn!(error = %e, "failed to persist candidate block");
                    continue;
                }
                if let Some(body) = &pending.body {
                    if let Err(e) = store.write_body(&pending.header.hash, body) {
                        tracing::warn!(error = %e, "failed to persist candidate body");
                        continue;
                    }
                }
                metrics.consensus.mempool_size.set(mempool.unmined().map(|v| v.len()).unwrap_or(0) as f64);

                cast_self_vote(&vote_manager, &secret, miner_address, next_height, pending.header.hash, &metrics);

                collect_until_quorum_or_timeout(&vote_manager, &config, next_height, &metrics).await;

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
                    tracing::info!(height = next_height, round = vote_manager.get_current_voting_round(next_height), "escalated round");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to assemble candidate block"),
        }

        tokio::time::sleep(Duration::from_secs(config.block_time_secs)).await;
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

async fn collect_until_quorum_or_timeout(
    vote_manager: &VoteManager,
    config: &ConsensusConfig,
    height: u64,
    metrics: &MetricsRegistry,
) {
    let timer = std::time::Instant::now();
    let deadline = tokio::time::Instant::now() + config.vote_collection_timeout;

    loop {
        if vote_manager.winning_candidate(height).ok().flatten().is_some() {
            break;
        }
        if vote_manager.early_counting_satisfied(height).unwrap_or(false) {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    metrics.consensus.vote_round_seconds.observe(timer.elapsed().as_secs_f64());
}

async fn garbage_collector(store: Arc<dyn Store>, config: ConsensusConfig) {
    loop {
        tokio::time::sleep(Duration::from_secs(config.block_time_secs.max(1) * 10)).await;

        let Ok(Some(head)) = store.head() else { continue };
        if head.number() == 0 {
            continue;
        }

        // Pending blocks at or below the confirmed height are either
        // committed already (and thus deleted by `VoteManager::commit`)
        // or lost their race; either way they no longer need a home.
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
