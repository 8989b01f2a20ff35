//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed consensus metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Consensus-related Prometheus metrics.
#[derive(Clone)]
pub struct ConsensusMetrics {
    /// Latency of a full vote-collection round, in seconds.
    pub vote_round_seconds: Histogram,
    /// Number of transactions sitting in the mempool, sampled on each
    /// block assembly.
    pub mempool_size: Gauge,
    /// Total votes cast, across all heights.
    pub votes_cast: IntCounter,
    /// Total blocks committed by the vote manager.
    pub blocks_committed: IntCounter,
    /// Total slash transactions applied.
    pub slashes_applied: IntCounter,
    /// Average participation rate across registered miners, sampled
    /// periodically by the garbage collector task.
    pub mean_participation_rate: Gauge,
}

impl ConsensusMetrics {
    /// Registers consensus metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let vote_round_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "consensus_vote_round_seconds",
                "Time to collect votes for a single height/round in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(vote_round_seconds.clone()))?;

        let mempool_size = Gauge::with_opts(Opts::new(
            "consensus_mempool_size",
            "Number of transactions currently pending in the mempool",
        ))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let votes_cast = IntCounter::with_opts(Opts::new(
            "consensus_votes_cast_total",
            "Total number of votes accepted by the vote manager",
        ))?;
        registry.register(Box::new(votes_cast.clone()))?;

        let blocks_committed = IntCounter::with_opts(Opts::new(
            "consensus_blocks_committed_total",
            "Total number of blocks committed",
        ))?;
        registry.register(Box::new(blocks_committed.clone()))?;

        let slashes_applied = IntCounter::with_opts(Opts::new(
            "consensus_slashes_applied_total",
            "Total number of slash transactions applied",
        ))?;
        registry.register(Box::new(slashes_applied.clone()))?;

        let mean_participation_rate = Gauge::with_opts(Opts::new(
            "consensus_mean_participation_rate",
            "Mean participation rate across registered miners",
        ))?;
        registry.register(Box::new(mean_participation_rate.clone()))?;

        Ok(Self {
            vote_round_seconds,
            mempool_size,
            votes_cast,
            blocks_committed,
            slashes_applied,
            mean_participation_rate,
        })
    }
}

/// Wrapper around a Prometheus registry and the consensus metrics.
///
/// This is the main handle you pass around in the node. It can be
/// wrapped in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the consensus metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        Ok(Self { registry, consensus })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics exporter listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "metrics connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .unwrap()),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        metrics.vote_round_seconds.observe(0.123);
        metrics.mempool_size.set(42.0);
        metrics.votes_cast.inc();
        metrics.blocks_committed.inc();
        metrics.slashes_applied.inc();
        metrics.mean_participation_rate.set(0.9);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.consensus.vote_round_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("consensus_vote_round_seconds"));
    }
}
