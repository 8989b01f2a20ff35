//! Error taxonomy for the consensus layer.
//!
//! Errors are grouped the way callers need to react to them: a
//! [`ValidationError`] means "reject this input", a [`ConsensusError`]
//! wraps everything the voting/assembly loop can fail with, and both
//! carry [`crate::storage::StorageError`] via `#[from]` so a `?` at a
//! storage call site composes without manual mapping.

use crate::mempool::MempoolError;
use crate::storage::StorageError;

/// Why a candidate block, vote, or transaction was rejected.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("block references unknown parent {0}")]
    UnknownParent(crate::types::Hash256),
    #[error("block height {got} does not follow parent height {expected}")]
    WrongHeight { expected: u64, got: u64 },
    #[error("block carries {got} transactions, more than the {max} limit")]
    TooManyTxs { max: usize, got: usize },
    #[error("block body is {got} bytes, over the {max} byte limit")]
    BlockTooLarge { max: usize, got: usize },
    #[error("coinbase value does not match the sum of the block's other fees")]
    CoinbaseFeeMismatch,
    #[error("tx_root {computed} does not match header tx_root {declared}")]
    TxRootMismatch {
        declared: crate::types::Hash256,
        computed: crate::types::Hash256,
    },
    #[error("vote signature does not recover to the claimed miner")]
    BadVoteSignature,
    #[error("vote cast by unregistered miner {0}")]
    UnknownMiner(crate::types::Address),
    #[error("miner {0} has not cleared the warm-up period")]
    MinerWarmingUp(crate::types::Address),
    #[error("miner {0} already voted this round")]
    AlreadyVoted(crate::types::Address),
    #[error("slash proof is not structurally valid")]
    BadSlashProof,
    #[error("mempool rejected transaction: {0}")]
    Mempool(#[from] MempoolError),
}

/// Top-level error for the consensus engine's async tasks.
#[derive(thiserror::Error, Debug)]
pub enum ConsensusError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("no candidate block available to vote on at height {0}")]
    NoCandidate(u64),
    #[error("no transactions available to assemble a block at height {0}")]
    NoTxs(u64),
    #[error("external dependency failed: {0}")]
    External(#[from] ExternalError),
}

/// Failures coming from outside the consensus core: the pluggable state
/// root provider, or the crypto layer when asked to recover a signer.
#[derive(thiserror::Error, Debug)]
pub enum ExternalError {
    #[error("state root computation failed: {0}")]
    StateRoot(String),
    #[error("slash proof rejected: {0}")]
    InvalidProof(String),
    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),
}
