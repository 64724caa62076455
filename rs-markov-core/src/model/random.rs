use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform integer source used for every random choice made by a chain.
///
/// Called with an exclusive upper bound `bound > 0`, it must return an
/// integer in `[0, bound)`. Swapping it lets tests drive generation
/// deterministically.
pub type RandomSource = Arc<dyn Fn(usize) -> usize + Send + Sync>;

/// Draws from the thread-local generator.
pub fn thread_random_source() -> RandomSource {
	Arc::new(|bound: usize| rand::rng().random_range(0..bound))
}

/// Draws from a `StdRng` seeded with `seed`.
///
/// The generator is shared behind a mutex, so the sequence is reproducible
/// for a single caller and still safe to share between threads.
pub fn seeded_random_source(seed: u64) -> RandomSource {
	let rng = Mutex::new(StdRng::seed_from_u64(seed));
	Arc::new(move |bound: usize| {
		let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
		rng.random_range(0..bound)
	})
}

/// Always returns `value`, clamped to `bound - 1`.
pub fn fixed_random_source(value: usize) -> RandomSource {
	Arc::new(move |bound: usize| value.min(bound.saturating_sub(1)))
}
