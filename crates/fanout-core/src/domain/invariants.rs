//! # Domain Invariants
//!
//! Rules that must hold for a fleet of sharded instances to cover the stream
//! exactly once, and for filter snapshots to be internally consistent.

use crate::algorithms::{FilterSnapshot, Sharder};
use crate::domain::config::SubscriberLimits;

/// Invariant: `mask == count - 1` and `index < count`.
pub fn invariant_sharder_consistent(sharder: &Sharder) -> bool {
    sharder.count().is_power_of_two()
        && sharder.mask() == sharder.count() - 1
        && sharder.index() < sharder.count()
}

/// Invariant: for a fixed count, every identifier matches exactly one index.
///
/// `fleet` must hold one sharder per index of the same count.
pub fn invariant_exclusive_cover<'a, I>(fleet: &[Sharder], dids: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    dids.into_iter()
        .all(|did| fleet.iter().filter(|s| s.matches(did)).count() == 1)
}

/// Invariant: a snapshot never exceeds the limits it was validated against.
pub fn invariant_snapshot_within_limits(
    snapshot: &FilterSnapshot,
    limits: &SubscriberLimits,
) -> bool {
    snapshot.wanted_collections().len() <= limits.max_wanted_collections
        && snapshot.wanted_dids().len() <= limits.max_wanted_dids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet(count: i64) -> Vec<Sharder> {
        (0..count).map(|i| Sharder::new(count, i).unwrap()).collect()
    }

    #[test]
    fn test_invariant_sharder_consistent() {
        for count in [1, 2, 4, 64, 1024] {
            for sharder in fleet(count) {
                assert!(invariant_sharder_consistent(&sharder));
            }
        }
    }

    #[test]
    fn test_invariant_exclusive_cover_hex_digits() {
        let dids: Vec<String> = (0..16).map(|d| format!("{d:x}")).collect();
        for count in [1, 2, 4, 8, 16] {
            assert!(invariant_exclusive_cover(
                &fleet(count),
                dids.iter().map(String::as_str)
            ));
        }
    }

    #[test]
    fn test_invariant_exclusive_cover_detects_gap() {
        // Only half of a two-shard fleet: some identifiers match nothing.
        let partial = vec![Sharder::new(2, 0).unwrap()];
        let dids: Vec<String> = (0..64).map(|n| format!("did:plc:{n}")).collect();
        assert!(!invariant_exclusive_cover(&partial, dids.iter().map(String::as_str)));
    }

    #[test]
    fn test_invariant_snapshot_within_limits() {
        let snapshot = FilterSnapshot::default();
        assert!(invariant_snapshot_within_limits(&snapshot, &SubscriberLimits::default()));
    }
}
