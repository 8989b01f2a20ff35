//! Shared application state.

use std::sync::Arc;

use chain::{Mempool, MetricsRegistry, Store, VoteManager};

/// Shared state held by the API and background tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor. There is no separate transaction pool struct here:
/// [`Mempool`] already sits directly on top of the [`Store`], so admitting a
/// transaction from an HTTP handler and reading it back from the mining
/// loop both go through the same durable table.
pub struct AppState {
    /// Durable K/V + trie storage backing everything below.
    pub store: Arc<dyn Store>,
    /// Pending transaction admission and batching.
    pub mempool: Arc<Mempool>,
    /// Per-height/round voting state machine.
    pub vote_manager: Arc<VoteManager>,
    /// Metrics registry shared between consensus and the API.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
