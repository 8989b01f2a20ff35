//! Chain library crate.
//!
//! This crate provides the core building blocks for a stake-weighted
//! proof-of-stake chain:
//!
//! - strongly-typed domain types (`types`),
//! - deterministic binary encoding (`codec`),
//! - ECDSA sign/recover and address derivation (`crypto`),
//! - derived account state (`accounts`),
//! - mempool admission and batching (`mempool`),
//! - the consensus engine: block assembly, voting, slashing,
//!   participation accounting (`consensus`),
//! - block validity predicates (`validation`),
//! - storage backends (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! The `api-gateway` binary composes these pieces into an HTTP-facing
//! node; `main.rs` in this crate runs the background mining/voting loops
//! directly for standalone deployments.

pub mod accounts;
pub mod codec;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod mempool;
pub mod metrics;
pub mod storage;
pub mod types;
pub mod validation;

pub use config::NodeConfig;

pub use consensus::{
    Assembler, ConsensusConfig, ConsensusError, DefaultAssembler, ExternalError,
    PassthroughStateRoot, StateRootProvider, ValidationError, VoteManager,
};

pub use mempool::{Mempool, MempoolError};

pub use storage::{MemStore, RocksDbConfig, RocksStore, Store, StorageError};

pub use metrics::{ConsensusMetrics, MetricsRegistry, run_prometheus_http_server};

pub use types::*;
