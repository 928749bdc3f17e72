//! Randomized exact-sum budget splits.
//!
//! The split works entirely in integer micro-units, so "each part is
//! rounded to the asset's precision" and "the parts sum exactly" hold by
//! construction on the uniform path and after a single drift correction on
//! the Gamma path.
//!
//! ## Variance parameter
//!
//! The split is a Dirichlet-distributed partition with concentration
//! `variance`:
//!
//! - `variance == 1.0`: classic cut-the-line (uniform simplex sampling)
//! - `variance < 1.0`: high variance, mass concentrates on few recipients
//! - `variance > 1.0`: low variance, amounts cluster around the mean

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Gamma};

use hongbao_types::Amount;

use crate::{AllocError, Result};

/// Floor for the Gamma shape parameter. Shapes this small already put
/// nearly all mass on a single recipient; going lower only risks
/// degenerate all-zero samples.
pub const MIN_GAMMA_SHAPE: f64 = 1e-3;

/// Split `total` into `n` randomized amounts, each at least `minimum`,
/// summing to `total` exactly.
///
/// The returned vector is shuffled, so element order carries no positional
/// bias (in particular, drift correction never correlates with the holder
/// that later receives the element).
///
/// # Arguments
///
/// * `total` - The full budget in micro-units
/// * `n` - Number of recipients
/// * `minimum` - Per-recipient floor
/// * `variance` - Dirichlet concentration parameter (must be > 0)
/// * `rng` - Randomness source; seed it for deterministic output
///
/// # Errors
///
/// - [`AllocError::InvalidVariance`] if `variance` is not positive and finite
///   (checked before any randomness is drawn)
/// - [`AllocError::InsufficientBudget`] if `minimum * n > total`
pub fn allocate<R: Rng + ?Sized>(
    total: Amount,
    n: usize,
    minimum: Amount,
    variance: f64,
    rng: &mut R,
) -> Result<Vec<Amount>> {
    if !variance.is_finite() || variance <= 0.0 {
        return Err(AllocError::InvalidVariance { variance });
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let required = match minimum.checked_mul(n as u64) {
        Some(required) if required <= total => required,
        // Overflow of minimum * n also means the budget cannot cover it.
        _ => {
            return Err(AllocError::InsufficientBudget {
                total,
                holders: n,
                minimum,
            })
        }
    };

    if n == 1 {
        return Ok(vec![total]);
    }

    let remaining = total.micro_units() - required.micro_units();

    let mut parts = if variance == 1.0 {
        cut_the_line(remaining, n, rng)
    } else {
        gamma_parts(remaining, n, variance, rng)
    };
    correct_drift(&mut parts, remaining);

    // Each element is bounded by total, so the add cannot overflow.
    let mut amounts: Vec<Amount> = parts
        .into_iter()
        .map(|part| Amount::from_micro_units(minimum.micro_units() + part))
        .collect();
    amounts.shuffle(rng);

    tracing::debug!(
        n,
        total = %total,
        minimum = %minimum,
        variance,
        "allocated randomized amounts"
    );

    Ok(amounts)
}

/// Uniform simplex sampling: `n - 1` uniform cut points partition
/// `[0, remaining]` into `n` segments. Integer cut points make the segment
/// sum exact with no drift to correct.
fn cut_the_line<R: Rng + ?Sized>(remaining: u64, n: usize, rng: &mut R) -> Vec<u64> {
    if remaining == 0 {
        return vec![0; n];
    }
    let mut cuts: Vec<u64> = (0..n - 1).map(|_| rng.gen_range(0..=remaining)).collect();
    cuts.sort_unstable();

    let mut parts = Vec::with_capacity(n);
    let mut prev = 0u64;
    for cut in cuts {
        parts.push(cut - prev);
        prev = cut;
    }
    parts.push(remaining - prev);
    parts
}

/// Dirichlet split via normalized Gamma variates, rounded to micro-units.
fn gamma_parts<R: Rng + ?Sized>(remaining: u64, n: usize, variance: f64, rng: &mut R) -> Vec<u64> {
    if remaining == 0 {
        return vec![0; n];
    }

    let shape = variance.max(MIN_GAMMA_SHAPE);
    let gamma = match Gamma::new(shape, 1.0) {
        Ok(gamma) => gamma,
        // Unreachable with a positive shape; fall back to an even split.
        Err(_) => return even_split(remaining, n),
    };

    let samples: Vec<f64> = (0..n)
        .map(|_| {
            let g = gamma.sample(rng);
            if g.is_finite() && g > 0.0 {
                g
            } else {
                0.0
            }
        })
        .collect();

    let sum: f64 = samples.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        // All samples degenerated to zero at an extreme shape value.
        tracing::warn!(shape, "gamma samples degenerated, falling back to even split");
        return even_split(remaining, n);
    }

    samples
        .into_iter()
        .map(|g| {
            let part = (remaining as f64 * (g / sum)).round();
            (part.max(0.0) as u64).min(remaining)
        })
        .collect()
}

/// Exact even split: floor division with the remainder on the first part.
fn even_split(remaining: u64, n: usize) -> Vec<u64> {
    let base = remaining / n as u64;
    let mut parts = vec![base; n];
    parts[0] += remaining % n as u64;
    parts
}

/// Force the parts to sum to `remaining` exactly by applying the rounding
/// residual to the largest part (smallest relative distortion). A residual
/// larger than the largest part walks down to the next-largest parts.
fn correct_drift(parts: &mut [u64], remaining: u64) {
    let sum: u128 = parts.iter().map(|&p| p as u128).sum();
    let mut drift = remaining as i128 - sum as i128;
    if drift == 0 {
        return;
    }

    let mut order: Vec<usize> = (0..parts.len()).collect();
    order.sort_by(|&a, &b| parts[b].cmp(&parts[a]));

    for &i in &order {
        if drift == 0 {
            break;
        }
        if drift > 0 {
            parts[i] += drift as u64;
            drift = 0;
        } else {
            let take = ((-drift) as u128).min(parts[i] as u128) as u64;
            parts[i] -= take;
            drift += take as i128;
        }
    }
}
