//! Participation-rate accounting.
//!
//! Each miner's `participation_rate` is a rolling estimate of how often
//! it casts a vote when eligible. It decays on a missed vote and grows
//! on a cast vote, clamped to `[MIN_PARTICIPATION_RATE,
//! MAX_PARTICIPATION_RATE]` (see [`crate::types::miner`]).

use std::collections::HashSet;

use crate::storage::{Store, StorageError, DEFAULT_LIST_LIMIT};
use crate::types::{Address, Miner};

/// Step size applied on every update. Small enough that a single missed
/// round does not tank a long-participating miner's rate, large enough
/// that a miner gone offline converges towards the floor within a
/// bounded number of rounds.
const PARTICIPATION_STEP: f64 = 0.01;

/// Records that `miner` cast a valid vote this round.
pub fn record_vote_cast(miner: &mut Miner) {
    miner.participation_rate += PARTICIPATION_STEP;
    miner.clamp_participation();
}

/// Records that `miner` was eligible to vote this round but did not.
pub fn record_vote_missed(miner: &mut Miner) {
    miner.participation_rate -= PARTICIPATION_STEP;
    miner.clamp_participation();
}

/// Updates every registered miner's `participation_rate` for one
/// concluded round: `voters` cast a valid vote and move towards the
/// ceiling, everyone else (not just a miner that voted for the loser)
/// abstained and moves towards the floor. Called once per round
/// resolution (commit or escalate), not on every tally poll, so a
/// round in progress doesn't get credited or penalized repeatedly.
pub fn record_round(store: &dyn Store, voters: &HashSet<Address>) -> Result<(), StorageError> {
    for mut miner in store.list_miners(DEFAULT_LIST_LIMIT)? {
        if voters.contains(&miner.address) {
            record_vote_cast(&mut miner);
        } else {
            record_vote_missed(&mut miner);
        }
        store.write_miner(&miner)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::miner::{MAX_PARTICIPATION_RATE, MIN_PARTICIPATION_RATE};
    use crate::types::Address;
    use std::str::FromStr;

    #[test]
    fn repeated_misses_converge_to_floor() {
        let mut miner = Miner::new(Address::ZERO, crate::codec::Decimal::from_str("1").unwrap(), 0);
        for _ in 0..1000 {
            record_vote_missed(&mut miner);
        }
        assert_eq!(miner.participation_rate, MIN_PARTICIPATION_RATE);
    }

    #[test]
    fn casting_votes_stays_at_ceiling() {
        let mut miner = Miner::new(Address::ZERO, crate::codec::Decimal::from_str("1").unwrap(), 0);
        record_vote_cast(&mut miner);
        assert_eq!(miner.participation_rate, MAX_PARTICIPATION_RATE);
    }

    #[test]
    fn record_round_only_rewards_voters() {
        use crate::storage::MemStore;
        use std::collections::HashSet;

        let store = MemStore::new();
        let voter = Address([1u8; 20]);
        let abstainer = Address([2u8; 20]);
        store
            .write_miner(&Miner::new(voter, crate::codec::Decimal::from_str("1").unwrap(), 0))
            .unwrap();
        store
            .write_miner(&Miner::new(abstainer, crate::codec::Decimal::from_str("1").unwrap(), 0))
            .unwrap();

        let voters: HashSet<Address> = [voter].into_iter().collect();
        record_round(&store, &voters).unwrap();

        let voter_after = store.get_miner(&voter).unwrap().unwrap();
        let abstainer_after = store.get_miner(&abstainer).unwrap().unwrap();
        assert_eq!(voter_after.participation_rate, MAX_PARTICIPATION_RATE);
        assert!(abstainer_after.participation_rate < MAX_PARTICIPATION_RATE);
    }
}
