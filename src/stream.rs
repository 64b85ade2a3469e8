//! Stream Detector, FDP variant (spec.md §4.F).
//!
//! Per-page monotonic-direction detector with FIFO replacement, grounded
//! directly on `examples/original_source/src/fdp.c`.

use crate::address;

/// One page's detector state (spec.md §3).
#[derive(Debug, Clone, Copy)]
struct Detector {
    page: u64,
    direction: i8,
    confidence: u8,
    pf_index: i8,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            page: 0,
            direction: 0,
            confidence: 0,
            pf_index: -1,
        }
    }
}

/// 64-entry, FIFO-replaced table of per-page stream detectors.
#[derive(Debug, Clone)]
pub struct StreamDetector {
    detectors: Vec<Detector>,
    replacement_index: usize,
    pub stream_window: i32,
    pub prefetch_degree: u32,
}

impl StreamDetector {
    #[must_use]
    pub fn new(page_table_size: usize, stream_window: i32, prefetch_degree: u32) -> Self {
        Self {
            detectors: vec![Detector::default(); page_table_size],
            replacement_index: 0,
            stream_window,
            prefetch_degree,
        }
    }

    pub fn reconfigure(&mut self, stream_window: i32, prefetch_degree: u32) {
        self.stream_window = stream_window;
        self.prefetch_degree = prefetch_degree;
    }

    fn find(&self, page: u64) -> Option<usize> {
        self.detectors.iter().position(|d| d.page == page)
    }

    /// FIFO-evict the next slot and seed it for `page`/`offset` (spec.md
    /// §4.F step 1).
    fn allocate(&mut self, page: u64, offset: u8) -> usize {
        let index = self.replacement_index;
        self.replacement_index = (self.replacement_index + 1) % self.detectors.len();
        log::trace!("stream detector replacing slot {index} with page {page:#x}");
        self.detectors[index] = Detector {
            page,
            direction: 0,
            confidence: 0,
            pf_index: offset as i8,
        };
        index
    }

    /// Train on an access at `addr`, returning the prefetch candidates to
    /// issue to L2/LLC (spec.md §4.F steps 2-3). MSHR/mirror-registration
    /// policy is the caller's responsibility (it needs mirror access).
    #[must_use]
    pub fn on_access(&mut self, addr: u64) -> Vec<(i32, u64)> {
        let decoded = address::decode(addr);
        let page = decoded.page;
        let offset = decoded.offset;

        let index = self.find(page).unwrap_or_else(|| self.allocate(page, offset));
        let detector = &mut self.detectors[index];

        let delta = i32::from(offset) - i32::from(detector.pf_index);
        if delta > 0 && delta < self.stream_window {
            if detector.direction == -1 {
                detector.confidence = 0;
            } else {
                detector.confidence = detector.confidence.saturating_add(1);
            }
            detector.direction = 1;
        } else if delta < 0 && -delta < self.stream_window {
            if detector.direction == 1 {
                detector.confidence = 0;
            } else {
                detector.confidence = detector.confidence.saturating_add(1);
            }
            detector.direction = -1;
        }
        // delta == 0, or |delta| >= stream_window: no training.

        let mut steps = Vec::new();
        if detector.confidence >= 2 {
            for _ in 0..self.prefetch_degree {
                let next = i32::from(detector.pf_index) + i32::from(detector.direction);
                if !(0..=63).contains(&next) {
                    break;
                }
                detector.pf_index = next as i8;
                let pf_addr = address::page_line_addr(page, next);
                steps.push((next, pf_addr));
            }
        }
        steps
    }
}
