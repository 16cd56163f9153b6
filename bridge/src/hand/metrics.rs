//! Per-frame memoization of pairwise landmark distances.
//!
//! A fixed triangular table covers every unordered (a, b) landmark pair.
//! Each slot remembers the epoch it was filled in; advancing the epoch
//! invalidates the whole table without touching it.

use std::cell::Cell;

use super::landmarks::LANDMARK_COUNT;

/// Number of unordered pairs including (i, i).
const TABLE_SIZE: usize = LANDMARK_COUNT * (LANDMARK_COUNT + 1) / 2;

#[derive(Debug, Clone, Copy)]
struct Slot {
    epoch: u64,
    value: f32,
}

impl Slot {
    const EMPTY: Slot = Slot { epoch: 0, value: 0.0 };
}

/// Epoch-versioned symmetric distance table.
#[derive(Debug)]
pub struct DistanceTable {
    epoch: u64,
    slots: [Cell<Slot>; TABLE_SIZE],
}

impl Default for DistanceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceTable {
    pub fn new() -> Self {
        Self {
            // Slots start at epoch 0, so the first real epoch is 1.
            epoch: 1,
            slots: std::array::from_fn(|_| Cell::new(Slot::EMPTY)),
        }
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new frame; every cached value becomes stale.
    pub fn advance(&mut self) {
        self.epoch += 1;
    }

    /// Cached distance for the unordered pair, computing it on a miss.
    ///
    /// Pairs outside the 21-landmark table are computed every time.
    pub fn get_or_compute(&self, a: usize, b: usize, compute: impl FnOnce() -> f32) -> f32 {
        let Some(slot) = slot_index(a, b).map(|i| &self.slots[i]) else {
            return compute();
        };

        let cached = slot.get();
        if cached.epoch == self.epoch {
            return cached.value;
        }

        let value = compute();
        slot.set(Slot {
            epoch: self.epoch,
            value,
        });
        value
    }

    /// Whether the pair has a value for the current epoch.
    #[cfg(test)]
    pub fn is_cached(&self, a: usize, b: usize) -> bool {
        slot_index(a, b)
            .map(|i| self.slots[i].get().epoch == self.epoch)
            .unwrap_or(false)
    }
}

/// Triangular index for (min, max).
fn slot_index(a: usize, b: usize) -> Option<usize> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if hi >= LANDMARK_COUNT {
        return None;
    }
    Some(hi * (hi + 1) / 2 + lo)
}
