//! Collaborator traits implemented by the host simulator.
//!
//! The prefetcher never touches the L2/LLC, the MSHR file, or the cycle
//! counter directly — it only ever calls back into the host through
//! these two trait seams (spec.md §6).

use std::fmt;

/// Destination cache level for an issued prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillLevel {
    L2,
    Llc,
}

impl fmt::Display for FillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillLevel::L2 => write!(f, "L2"),
            FillLevel::Llc => write!(f, "LLC"),
        }
    }
}

/// Read-only queries the prefetcher issues against the host simulator.
///
/// `cpu` identifies which core's state is being queried; implementors
/// are expected to be cheap to call on every access/fill event.
pub trait HostQuery {
    /// Monotonic cycle counter (spec.md §6: `get_current_cycle`).
    fn current_cycle(&self, cpu: usize) -> u64;

    /// Number of in-flight L2 misses (spec.md §6: `get_l2_mshr_occupancy`).
    fn l2_mshr_occupancy(&self, cpu: usize) -> u32;

    /// Set index an address maps to (spec.md §6: `l2_get_set`).
    fn l2_set(&self, addr: u64) -> usize;

    /// Way an address currently occupies in a set, or `None` if not
    /// present (spec.md §6: `l2_get_way`, `-1` maps to `None`).
    fn l2_way(&self, cpu: usize, addr: u64, set: usize) -> Option<usize>;
}

/// The single action the prefetcher performs on the host (spec.md §6:
/// `l2_prefetch_line`). Best-effort: the host may silently drop it.
pub trait PrefetchIssuer {
    fn issue_prefetch(&mut self, cpu: usize, trigger_addr: u64, pf_addr: u64, level: FillLevel);
}
