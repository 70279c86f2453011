//! Index sources used to pick the marker recipient of a broadcast round.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Produces the position of the marker recipient for a round.
///
/// `bound` is the number of members and is always at least 1; the returned
/// value is expected to lie in `[0, bound)`.
pub trait IndexSource: Send + Sync {
    fn pick(&self, bound: usize) -> usize;
}

/// Uniform draw from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngIndex;

impl IndexSource for ThreadRngIndex {
    fn pick(&self, bound: usize) -> usize {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Uniform draw from a seeded RNG, so a run can be replayed.
#[derive(Debug)]
pub struct SeededIndex {
    rng: Mutex<StdRng>,
}

impl SeededIndex {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IndexSource for SeededIndex {
    fn pick(&self, bound: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..bound)
    }
}

/// Replays a scripted list of indexes, then keeps returning 0.
#[derive(Debug, Default)]
pub struct SequenceIndex {
    picks: Mutex<VecDeque<usize>>,
}

impl SequenceIndex {
    pub fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            picks: Mutex::new(picks.into_iter().collect()),
        }
    }

    /// Queues another index behind the ones already scripted.
    pub fn push(&self, index: usize) {
        self.picks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(index);
    }
}

impl IndexSource for SequenceIndex {
    fn pick(&self, _bound: usize) -> usize {
        self.picks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(0)
    }
}
