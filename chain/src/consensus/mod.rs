//! Consensus engine and related abstractions.
//!
//! - [`config::ConsensusConfig`] — tunable protocol parameters.
//! - [`error`] — the `ValidationError`/`ConsensusError`/`ExternalError`
//!   taxonomy used across the consensus layer.
//! - [`assembler`] — Block Assembler (C6): builds candidate blocks.
//! - [`vote_manager`] — Vote Manager (C7): the voting state machine.
//! - [`slasher`] — Slasher (C8): equivocation detection and penalties.
//! - [`coinbase`] — coinbase minting and fee-sum validation (C9).
//! - [`participation`] — participation-rate accounting (C10).

pub mod assembler;
pub mod coinbase;
pub mod config;
pub mod error;
pub mod participation;
pub mod slasher;
pub mod vote_manager;

pub use assembler::{Assembler, PassthroughStateRoot, StateRootProvider};
pub use config::ConsensusConfig;
pub use error::{ConsensusError, ExternalError, ValidationError};
pub use vote_manager::VoteManager;

/// Default stack used by a real node: no alternate state-root providers
/// are wired up yet, so the default assembler runs with
/// [`PassthroughStateRoot`].
pub type DefaultAssembler = Assembler<PassthroughStateRoot>;
