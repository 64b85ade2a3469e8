//! Interval Counters & EWMA (spec.md §4.E).
//!
//! Raw per-interval event counts and their exponentially-smoothed
//! totals. Closing an interval produces the three ratios §4.H classifies
//! on.

/// Non-negative per-interval event counts (spec.md §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Counters {
    pub used: u64,
    pub prefetch: u64,
    pub late: u64,
    pub miss: u64,
    pub miss_prefetch: u64,
    pub evict: u64,
}

impl Counters {
    fn reset_non_evict(&mut self) {
        self.used = 0;
        self.prefetch = 0;
        self.late = 0;
        self.miss = 0;
        self.miss_prefetch = 0;
    }
}

/// Exponentially-smoothed totals (spec.md §3), α = `Config::ewma_alpha`.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct SmoothedTotals {
    pub used: f64,
    pub prefetch: f64,
    pub late: f64,
    pub miss: f64,
    pub miss_prefetch: f64,
}

/// Derived ratios computed once an interval closes (spec.md §4.E step 3).
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Metrics {
    pub acc: f64,
    pub lat: f64,
    pub pol: f64,
}

pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Owns the live counters and smoothed totals and knows how to close an
/// interval (spec.md §4.E).
#[derive(Debug, Clone, Default)]
pub struct Interval {
    pub counters: Counters,
    pub totals: SmoothedTotals,
    t_interval: u32,
    alpha: f64,
    epsilon: f64,
}

impl Interval {
    #[must_use]
    pub fn new(t_interval: u32, alpha: f64, epsilon: f64) -> Self {
        Self {
            counters: Counters::default(),
            totals: SmoothedTotals::default(),
            t_interval,
            alpha,
            epsilon,
        }
    }

    /// Record one eviction-bearing fill; returns `true` once `evict`
    /// reaches `T_INTERVAL` (spec.md §4.E: "When evict reaches
    /// T_INTERVAL, close the interval").
    #[must_use]
    pub fn record_evict(&mut self) -> bool {
        self.counters.evict += 1;
        self.counters.evict >= self.t_interval
    }

    fn smooth(&self, total: f64, count: u64) -> f64 {
        let updated = self.alpha * total + (1.0 - self.alpha) * count as f64;
        if updated < self.epsilon {
            0.0
        } else {
            updated
        }
    }

    /// Close the interval: EWMA-update the smoothed totals, zero the
    /// interval counters, and compute the derived metrics (spec.md
    /// §4.E steps 1-3). Caller is responsible for resetting `evict`
    /// itself via [`Counters::evict`] since it is the trigger the
    /// caller already observed.
    pub fn close(&mut self) -> Metrics {
        self.totals.used = self.smooth(self.totals.used, self.counters.used);
        self.totals.prefetch = self.smooth(self.totals.prefetch, self.counters.prefetch);
        self.totals.late = self.smooth(self.totals.late, self.counters.late);
        self.totals.miss = self.smooth(self.totals.miss, self.counters.miss);
        self.totals.miss_prefetch = self.smooth(self.totals.miss_prefetch, self.counters.miss_prefetch);

        log::debug!(
            "interval close: counts used={} prefetch={} late={} miss={} miss_prefetch={}",
            self.counters.used,
            self.counters.prefetch,
            self.counters.late,
            self.counters.miss,
            self.counters.miss_prefetch,
        );

        self.counters.reset_non_evict();
        self.counters.evict = 0;

        let metrics = Metrics {
            acc: ratio(self.totals.used, self.totals.prefetch),
            lat: ratio(self.totals.late, self.totals.used),
            pol: ratio(self.totals.miss_prefetch, self.totals.miss),
        };

        log::debug!(
            "interval close: metrics acc={:.6} lat={:.6} pol={:.6}",
            metrics.acc,
            metrics.lat,
            metrics.pol,
        );

        metrics
    }
}
