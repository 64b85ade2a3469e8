//! Stats hooks (spec.md §6: `heartbeat_stats`/`warmup_stats`/
//! `final_stats`) — structured observation, no semantic effect.

use serde::Serialize;

use crate::interval::{Counters, Metrics, SmoothedTotals};

/// A point-in-time view of one CPU's prefetcher state. Replaces the
/// original `printf`-based stats hooks (SPEC_FULL.md §0) with a
/// serializable snapshot a host can log or export however it likes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub counters: Counters,
    pub totals: SmoothedTotals,
    pub metrics: Metrics,
    pub aggressive_level: u8,
}

impl Snapshot {
    pub(crate) fn new(counters: Counters, totals: SmoothedTotals, metrics: Metrics, aggressive_level: u8) -> Self {
        Self {
            counters,
            totals,
            metrics,
            aggressive_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_carries_fields_through() {
        let snapshot = Snapshot::new(
            Counters::default(),
            SmoothedTotals::default(),
            Metrics {
                acc: 0.5,
                lat: 0.1,
                pol: 0.01,
            },
            4,
        );
        assert_eq!(snapshot.aggressive_level, 4);
        assert!((snapshot.metrics.acc - 0.5).abs() < 1e-9);
    }
}
