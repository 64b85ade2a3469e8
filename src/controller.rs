//! Aggressiveness Controller (spec.md §4.H): a five-level state machine
//! driven by accuracy/lateness/pollution, re-tuning detector knobs at
//! every closed interval.

use crate::interval::Metrics;

/// Detector knobs for one aggressiveness level (spec.md §4.H table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Knobs {
    /// FDP-only; AMPM reads only [`Knobs::prefetch_degree`] (spec.md
    /// §4.H: "The AMPM variant uses only prefetch_degree").
    pub stream_window: i32,
    pub prefetch_degree: u32,
}

const fn knobs_for_level(level: u8) -> Knobs {
    match level {
        1 => Knobs {
            stream_window: 4,
            prefetch_degree: 1,
        },
        2 => Knobs {
            stream_window: 8,
            prefetch_degree: 1,
        },
        3 => Knobs {
            stream_window: 16,
            prefetch_degree: 2,
        },
        4 => Knobs {
            stream_window: 32,
            prefetch_degree: 4,
        },
        _ => Knobs {
            stream_window: 64,
            prefetch_degree: 4,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryLevel {
    Low,
    High,
}

fn classify(metrics: Metrics, a_low: f64, a_high: f64, t_lat: f64, t_pol: f64) -> (AccLevel, BinaryLevel, BinaryLevel) {
    let acc_level = if metrics.acc < a_low {
        AccLevel::Low
    } else if metrics.acc < a_high {
        AccLevel::Medium
    } else {
        AccLevel::High
    };
    let lat_level = if metrics.lat >= t_lat {
        BinaryLevel::High
    } else {
        BinaryLevel::Low
    };
    let pol_level = if metrics.pol >= t_pol {
        BinaryLevel::High
    } else {
        BinaryLevel::Low
    };
    (acc_level, lat_level, pol_level)
}

/// The update-rule table (spec.md §4.H), made fully exhaustive per §9
/// open question 3 (explicit `Δ=0` in the level-2/not-late/not-polluted
/// arm, where the source's `switch` fell through its default case).
fn delta(acc: AccLevel, lat: BinaryLevel, pol: BinaryLevel) -> i8 {
    use AccLevel::{High, Low, Medium};
    use BinaryLevel::{High as H, Low as L};
    match (acc, lat, pol) {
        (Low, H, _) => -1,
        (Low, L, L) => 0,
        (Low, L, H) => -1,
        (Medium, H, L) => 1,
        (Medium, H, H) => -1,
        (Medium, L, L) => 0,
        (Medium, L, H) => -1,
        (High, H, _) => 1,
        (High, L, L) => 0,
        (High, L, H) => -1,
    }
}

/// Level state machine + knob table (spec.md §4.H). Owns no detector
/// state itself — [`Prefetcher`](crate::Prefetcher) reconfigures the
/// active detector from [`Controller::knobs`] after every transition.
#[derive(Debug, Clone, Copy)]
pub struct Controller {
    level: u8,
    a_low: f64,
    a_high: f64,
    t_lat: f64,
    t_pol: f64,
}

impl Controller {
    #[must_use]
    pub fn new(a_low: f64, a_high: f64, t_lat: f64, t_pol: f64) -> Self {
        Self {
            level: 3,
            a_low,
            a_high,
            t_lat,
            t_pol,
        }
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub fn knobs(&self) -> Knobs {
        knobs_for_level(self.level)
    }

    /// Classify `metrics`, apply the update rule, clamp to `[1,5]`, and
    /// return the new knobs (spec.md §4.H "Update rule" / knob table).
    pub fn reconfigure(&mut self, metrics: Metrics) -> Knobs {
        let (acc, lat, pol) = classify(metrics, self.a_low, self.a_high, self.t_lat, self.t_pol);
        let d = delta(acc, lat, pol);
        let old_level = self.level;
        let new_level = (i16::from(self.level) + i16::from(d)).clamp(1, 5) as u8;
        self.level = new_level;
        if new_level != old_level {
            log::info!(
                "aggressiveness level {old_level} -> {new_level} (delta={d}, acc={:.4} lat={:.4} pol={:.4})",
                metrics.acc,
                metrics.lat,
                metrics.pol,
            );
        }
        self.knobs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(acc: f64, lat: f64, pol: f64) -> Metrics {
        Metrics { acc, lat, pol }
    }

    #[test]
    fn initial_level_is_three_with_matching_knobs() {
        let controller = Controller::new(0.40, 0.75, 0.01, 0.005);
        assert_eq!(controller.level(), 3);
        assert_eq!(
            controller.knobs(),
            Knobs {
                stream_window: 16,
                prefetch_degree: 2
            }
        );
    }

    #[test]
    fn escalates_and_saturates_at_five() {
        let mut controller = Controller::new(0.40, 0.75, 0.01, 0.005);
        // acc=0.9 (high), lat=0.05 (>=T_LAT), pol=0.001 (<T_POL) => delta=+1.
        for _ in 0..6 {
            controller.reconfigure(metrics(0.9, 0.05, 0.001));
        }
        assert_eq!(controller.level(), 5);
        assert_eq!(
            controller.knobs(),
            Knobs {
                stream_window: 64,
                prefetch_degree: 4
            }
        );
    }

    #[test]
    fn low_accuracy_and_late_deescalates() {
        let mut controller = Controller::new(0.40, 0.75, 0.01, 0.005);
        controller.reconfigure(metrics(0.1, 0.05, 0.0));
        assert_eq!(controller.level(), 2);
    }

    #[test]
    fn level_never_leaves_one_to_five() {
        let mut controller = Controller::new(0.40, 0.75, 0.01, 0.005);
        for _ in 0..20 {
            controller.reconfigure(metrics(0.0, 1.0, 1.0));
        }
        assert!((1..=5).contains(&controller.level()));
    }

    #[test]
    fn medium_accuracy_clean_is_neutral() {
        let mut controller = Controller::new(0.40, 0.75, 0.01, 0.005);
        let before = controller.level();
        controller.reconfigure(metrics(0.5, 0.0, 0.0));
        assert_eq!(controller.level(), before);
    }
}
