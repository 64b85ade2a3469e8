//! Prefetch-Tracking MSHR Mirror (spec.md §4.B, §8 invariant 2).
//!
//! A bounded table of in-flight prefetches, scoped to this prefetcher's
//! own bookkeeping — not the simulator's real MSHR file (spec.md
//! GLOSSARY). Fixed size, allocated once, entries reused in place.

#[derive(Debug, Clone, Copy)]
struct Entry {
    valid: bool,
    cache_line: u64,
    late: bool,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            valid: false,
            cache_line: 0,
            late: false,
        }
    }
}

/// Linear-scan mirror of outstanding prefetches. O(N) per operation,
/// N bounded by `Config::mshr_mirror_size` (spec.md §9 design notes:
/// acceptable, cache-friendly, bounded).
#[derive(Debug, Clone)]
pub struct Mshr {
    entries: Vec<Entry>,
}

impl Mshr {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![Entry::default(); size],
        }
    }

    /// Register a prefetch to `cache_line` as in-flight and not yet
    /// consumed. Silently dropped if the table is full — tracking
    /// fidelity loss is tolerated, not an error (spec.md §4.B, §7).
    pub fn insert(&mut self, cache_line: u64) {
        match self.entries.iter_mut().find(|e| !e.valid) {
            Some(slot) => {
                slot.valid = true;
                slot.cache_line = cache_line;
                slot.late = true;
            }
            None => {
                log::trace!(
                    "mshr mirror full ({} entries), dropping tracking for cache line {cache_line:#x}",
                    self.entries.len()
                );
            }
        }
    }

    /// Locate the (at most one, spec.md §8 invariant 2) valid entry for
    /// `cache_line`.
    #[must_use]
    pub fn find(&self, cache_line: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.valid && e.cache_line == cache_line)
    }

    #[must_use]
    pub fn is_late(&self, index: usize) -> bool {
        self.entries[index].late
    }

    /// Clear the late-bit without deallocating the entry (spec.md §4.B:
    /// "the bit clears so it counts only once").
    pub fn clear_late(&mut self, index: usize) {
        self.entries[index].late = false;
    }

    /// Invalidate and reset an entry (spec.md §4.B `clear`), called on
    /// fill.
    pub fn clear(&mut self, index: usize) {
        self.entries[index] = Entry::default();
    }

    #[cfg(test)]
    fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }
}
