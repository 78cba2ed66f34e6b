//! Shuffled index cycle over the dataset, sliced into fixed-size windows.

use crate::error::{BatchError, BatchResult};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Hands out windows of dataset indices.
///
/// Each pass is a fresh permutation. A window that would run past the end of the current pass
/// starts a new pass instead, so the short tail of a pass is never returned.
#[derive(Debug)]
pub struct BatchCycler {
    order: Vec<usize>,
    cursor: usize,
    passes: usize,
    rng: StdRng,
}

impl BatchCycler {
    pub fn new(len: usize, rng: StdRng) -> BatchResult<Self> {
        if len == 0 {
            return Err(BatchError::config("dataset contains no samples"));
        }
        let mut cycler = BatchCycler {
            order: (0..len).collect(),
            cursor: 0,
            passes: 0,
            rng,
        };
        cycler.reshuffle();
        Ok(cycler)
    }

    fn reshuffle(&mut self) {
        self.order.shuffle(&mut self.rng);
        self.cursor = 0;
        self.passes += 1;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of passes started so far, counting the one begun at construction
    pub fn pass(&self) -> usize {
        self.passes
    }

    /// Next `n` indices; larger than the dataset yields one whole new permutation
    pub fn next_window(&mut self, n: usize) -> BatchResult<Vec<usize>> {
        if n == 0 {
            return Err(BatchError::config("batch size must be at least 1"));
        }

        if self.cursor + n > self.order.len() {
            debug!(
                "Starting pass {} ({} of {} indices unused)",
                self.passes + 1,
                self.order.len() - self.cursor,
                self.order.len()
            );
            self.reshuffle();
        }

        let end = (self.cursor + n).min(self.order.len());
        let window = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(window)
    }
}
