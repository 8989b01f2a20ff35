use std::time::Duration;

/// Consensus configuration parameters.
///
/// Includes both protocol-level knobs (vote collection timeout, early
/// vote counting) and implementation-level limits (target block size).
/// The stake-weighted supermajority threshold itself (two-thirds of a
/// round's voting power) is not configurable; see
/// [`crate::consensus::VoteManager::winning_candidate`].
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Target block time in seconds.
    pub block_time_secs: u64,
    /// Soft limit on the number of transactions per block.
    pub max_block_txs: usize,
    /// Soft limit on the total serialized size of a block, in bytes.
    pub max_block_size_bytes: usize,
    /// Wall-clock budget to collect votes for a height/round before
    /// escalating to the next round.
    pub vote_collection_timeout: Duration,
    /// Number of valid votes collected this round, regardless of stake,
    /// that allow collection to terminate early instead of waiting out
    /// the full `vote_collection_timeout`. Independent of the
    /// stake-weighted supermajority check that actually decides a
    /// winner.
    pub early_vote_counting_threshold: u64,
    /// Whether newly registered miners must wait out a warm-up period
    /// before their votes count towards quorum. Off by default; no
    /// production deployment has needed it yet.
    pub enforce_warm_up: bool,
    /// Warm-up period, only consulted when `enforce_warm_up` is set.
    pub warm_up: Duration,
    /// Desired number of transactions per block; used by the mempool
    /// batcher as a sizing hint, not a hard cap.
    pub target_txs_per_block: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_time_secs: 5,
            max_block_txs: 10_000,
            max_block_size_bytes: 1_000_000,
            vote_collection_timeout: Duration::from_secs(10),
            early_vote_counting_threshold: 50,
            enforce_warm_up: false,
            warm_up: Duration::from_secs(3600),
            target_txs_per_block: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = ConsensusConfig::default();
        assert_eq!(cfg.early_vote_counting_threshold, 50);
        assert!(!cfg.enforce_warm_up);
    }
}
