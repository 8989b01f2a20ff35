//! Registered miner (validator) records.

use serde::{Deserialize, Serialize};

use crate::codec::Decimal;
use crate::types::Address;

/// Lower/upper bounds for [`Miner::participation_rate`].
pub const MIN_PARTICIPATION_RATE: f64 = 0.0001;
pub const MAX_PARTICIPATION_RATE: f64 = 1.0;

/// A registered miner (validator). Created by an (external) deposit
/// transaction, mutated by the Participation and Slasher components,
/// never deleted by the core — stake may drop to zero but the record
/// stays.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Miner {
    pub address: Address,
    pub stake_amount: Decimal,
    /// Unix timestamp, seconds, of registration. Used by the (disabled by
    /// default) warm-up check.
    pub inserted_at: u64,
    pub participation_rate: f64,
}

impl Miner {
    pub fn new(address: Address, stake_amount: Decimal, inserted_at: u64) -> Self {
        Self {
            address,
            stake_amount,
            inserted_at,
            participation_rate: MAX_PARTICIPATION_RATE,
        }
    }

    /// Clamps `participation_rate` back into its valid range. Called
    /// after every increment/decrement so a long run never drifts past
    /// the bounds documented in the glossary.
    pub fn clamp_participation(&mut self) {
        self.participation_rate = self
            .participation_rate
            .clamp(MIN_PARTICIPATION_RATE, MAX_PARTICIPATION_RATE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn clamp_participation_respects_bounds() {
        let mut m = Miner::new(Address::ZERO, Decimal::from_str("1").unwrap(), 0);
        m.participation_rate = 1.5;
        m.clamp_participation();
        assert_eq!(m.participation_rate, MAX_PARTICIPATION_RATE);

        m.participation_rate = -3.0;
        m.clamp_participation();
        assert_eq!(m.participation_rate, MIN_PARTICIPATION_RATE);
    }
}
