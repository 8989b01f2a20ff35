//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - storage (RocksDB path and creation flags),
//! - the metrics exporter (enable flag + listen address),
//! - and a node-local session identifier used in log lines.
//!
//! The goal is a single `NodeConfig` struct that binaries can construct
//! from defaults, a config file, or environment variables as needed.

use std::net::SocketAddr;

use crate::consensus::ConsensusConfig;
use crate::storage::RocksDbConfig;

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a chain node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub consensus: ConsensusConfig,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
    /// Identifies this node in structured log lines; useful when
    /// running several nodes in one process during local testing.
    pub session_id: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            consensus: ConsensusConfig::default(),
            storage: RocksDbConfig::default(),
            metrics: MetricsConfig::default(),
            session_id: "node-0".to_string(),
        }
    }
}
