//! Access-Map Detector, AMPM variant (spec.md §4.G).
//!
//! Per-page 64-bit access/prefetch bitmaps with LRU page replacement,
//! grounded directly on `examples/original_source/src/ampm.c`.

use bitvec::prelude::*;

use crate::address;

type PageMap = BitArr!(for 64, in u64);

/// One page's access/prefetch maps plus its LRU timestamp.
#[derive(Debug, Clone, Copy)]
struct Page {
    page: u64,
    access_map: PageMap,
    pf_map: PageMap,
    lru: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 0,
            access_map: PageMap::ZERO,
            pf_map: PageMap::ZERO,
            lru: 0,
        }
    }
}

/// A prefetch candidate the scan wants issued, plus whether the negative
/// scan's asymmetric mirror-registration policy applies (spec.md §4.G
/// step 4, §9 open question 1: preserved, not "fixed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub pf_index: i32,
    pub pf_addr: u64,
    /// `true` for a negative-scan candidate, which additionally
    /// registers L2 issues in the MSHR mirror; `false` for positive,
    /// which never does.
    pub from_negative_scan: bool,
}

/// 64-entry, LRU-replaced table of per-page access maps.
#[derive(Debug, Clone)]
pub struct AccessMapDetector {
    pages: Vec<Page>,
    pub prefetch_degree: u32,
}

impl AccessMapDetector {
    #[must_use]
    pub fn new(page_table_size: usize, prefetch_degree: u32) -> Self {
        Self {
            pages: vec![Page::default(); page_table_size],
            prefetch_degree,
        }
    }

    pub fn reconfigure(&mut self, prefetch_degree: u32) {
        self.prefetch_degree = prefetch_degree;
    }

    fn find(&self, page: u64) -> Option<usize> {
        self.pages.iter().position(|p| p.page == page)
    }

    fn lru_victim(&self) -> usize {
        self.pages
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.lru)
            .map(|(i, _)| i)
            .expect("page table is never empty")
    }

    /// Train on an access at `addr`/`current_cycle`, returning the
    /// prefetch candidates from both scans, in scan order (positive
    /// first, then negative — spec.md §4.G steps 3-4).
    #[must_use]
    pub fn on_access(&mut self, addr: u64, current_cycle: u64) -> Vec<Candidate> {
        let decoded = address::decode(addr);
        let page_id = decoded.page;
        let offset = i32::from(decoded.offset);

        let index = self.find(page_id).unwrap_or_else(|| {
            let victim = self.lru_victim();
            log::trace!("ampm detector replacing slot {victim} with page {page_id:#x}");
            self.pages[victim] = Page {
                page: page_id,
                ..Page::default()
            };
            victim
        });

        let page = &mut self.pages[index];
        page.lru = current_cycle;
        page.access_map.set(offset as usize, true);

        let mut candidates = Vec::new();

        // Positive scan (spec.md §4.G step 3).
        let mut count = 0u32;
        for i in 1..=16i32 {
            let check1 = offset - i;
            let check2 = offset - 2 * i;
            let pf_index = offset + i;
            if check2 < 0 || pf_index > 63 || count >= self.prefetch_degree {
                break;
            }
            if page.access_map[pf_index as usize] || page.pf_map[pf_index as usize] {
                continue;
            }
            if page.access_map[check1 as usize] && page.access_map[check2 as usize] {
                page.pf_map.set(pf_index as usize, true);
                count += 1;
                candidates.push(Candidate {
                    pf_index,
                    pf_addr: address::page_line_addr(page_id, pf_index),
                    from_negative_scan: false,
                });
            }
        }

        // Negative scan (spec.md §4.G step 4).
        let mut count = 0u32;
        for i in 1..=16i32 {
            let check1 = offset + i;
            let check2 = offset + 2 * i;
            let pf_index = offset - i;
            if check2 > 63 || pf_index < 0 || count >= self.prefetch_degree {
                break;
            }
            if page.access_map[pf_index as usize] || page.pf_map[pf_index as usize] {
                continue;
            }
            if page.access_map[check1 as usize] && page.access_map[check2 as usize] {
                page.pf_map.set(pf_index as usize, true);
                count += 1;
                candidates.push(Candidate {
                    pf_index,
                    pf_addr: address::page_line_addr(page_id, pf_index),
                    from_negative_scan: true,
                });
            }
        }

        candidates
    }
}
