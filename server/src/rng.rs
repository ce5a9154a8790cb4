//! Process-wide random source shared by both player sessions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{DIE_MAX, DIE_MIN};
use std::sync::{Mutex, PoisonError};

/// A serialized source of uniformly distributed integers.
///
/// Implementations must be safe to call from both session tasks at once;
/// every call is one linearized draw.
pub trait Draw: Send + Sync {
    /// Returns a value in `low..=high`. Bounds given in the wrong order are swapped.
    fn draw(&self, low: u32, high: u32) -> u32;

    fn roll_die(&self) -> u32 {
        self.draw(DIE_MIN, DIE_MAX)
    }
}

/// Standard generator guarded by a single critical section.
#[derive(Debug)]
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible generator, used by `--seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Draw for SharedRng {
    fn draw(&self, low: u32, high: u32) -> u32 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        // Recover from poisoning; a draw never fails.
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(low..=high)
    }
}
