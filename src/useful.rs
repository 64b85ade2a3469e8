//! Useful/Late Bit Store (spec.md §4.C): one bit per cached line.

use bitvec::vec::BitVec;

/// `bit[L2_SETS][L2_WAYS]`, flattened into a single packed vector
/// (spec.md §9 design notes: prefer packed bitsets over per-element
/// arrays).
#[derive(Debug, Clone)]
pub struct UsefulBits {
    bits: BitVec,
    associativity: usize,
}

impl UsefulBits {
    #[must_use]
    pub fn new(sets: usize, associativity: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, sets * associativity),
            associativity,
        }
    }

    fn index(&self, set: usize, way: usize) -> usize {
        set * self.associativity + way
    }

    #[must_use]
    pub fn get(&self, set: usize, way: usize) -> bool {
        self.bits[self.index(set, way)]
    }

    pub fn set(&mut self, set: usize, way: usize, value: bool) {
        let idx = self.index(set, way);
        self.bits.set(idx, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let u = UsefulBits::new(4, 4);
        assert!(!u.get(1, 1));
    }

    #[test]
    fn set_and_clear() {
        let mut u = UsefulBits::new(4, 4);
        u.set(2, 3, true);
        assert!(u.get(2, 3));
        u.set(2, 3, false);
        assert!(!u.get(2, 3));
    }

    #[test]
    fn independent_slots() {
        let mut u = UsefulBits::new(4, 4);
        u.set(0, 0, true);
        assert!(!u.get(0, 1));
        assert!(!u.get(1, 0));
    }
}
