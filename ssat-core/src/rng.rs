//! The single seeded random number generator all solver randomness is drawn from.
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Create the solver's RNG from an explicit seed, or from wall-clock time if none is given.
///
/// All random draws in a solve (clause-shuffle order, initial surveys, WalkSAT's initial
/// assignment, its noise coin and its tie-breaks) go through a single such generator, in that
/// order, so that a fixed seed reproduces a run exactly.
pub fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            SmallRng::seed_from_u64(nanos)
        }
    }
}
