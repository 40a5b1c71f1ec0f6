//! Random draws used by population setup and the round engine.
//!
//! Every helper takes the caller's RNG so a run stays reproducible from its seed.

use crate::error::{SimError, SimResult};
use outbreak_common::Direction;
use rand::prelude::*;
use rand::seq::index;
use rand_distr::Exp1;

/// Draws `count` distinct integers uniformly from the inclusive range `[low, high]`.
///
/// Fails with `InvalidParameter` when `count` exceeds the size of the range.
pub fn sample_without_replacement<R: Rng + ?Sized>(
    rng: &mut R,
    low: usize,
    high: usize,
    count: usize,
) -> SimResult<Vec<usize>> {
    let available = if high >= low { high - low + 1 } else { 0 };
    if count > available {
        return Err(SimError::invalid(
            "sample count",
            count,
            format!("{} values in [{}, {}]", available, low, high),
        ));
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    Ok(index::sample(rng, available, count)
        .into_iter()
        .map(|offset| low + offset)
        .collect())
}

/// Incubation length in rounds: `Exp(1)` shifted by `k_scale - 1`, rounded to the nearest integer.
pub fn sample_incubation_period<R: Rng + ?Sized>(rng: &mut R, k_scale: f64) -> u32 {
    let draw: f64 = rng.sample(Exp1);
    let shifted = draw + (k_scale - 1.0);
    shifted.round().max(0.0) as u32
}

/// True with probability `p`. `p` is clamped into `[0, 1]`.
#[inline(always)]
pub fn bernoulli<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.random_bool(p.clamp(0.0, 1.0))
}

/// Picks one of `candidates` uniformly, or `None` when there is nothing to pick.
#[inline(always)]
pub fn choose_uniform_direction<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[Direction],
) -> Option<Direction> {
    candidates.choose(rng).copied()
}
