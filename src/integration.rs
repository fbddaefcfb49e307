//! Monte-Carlo integration over axis-aligned boxes and the convergence sweep.
//!
//! An estimate is `volume * mean(h(x_i))` over uniform draws `x_i` from the
//! box. The sweep repeats the estimate on a ladder of sample counts, each cell
//! with its own generator, so the spread of a row shows the estimator variance
//! at that sample count.

use itertools::Itertools;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    density::{Integrand, UnitDisk},
    diagnostics::{mean, variance},
    error::{Result, SimError},
    lcg::UniformSource,
    metropolis::stream_rng,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxDomain<const D: usize> {
    lower: [f64; D],
    upper: [f64; D],
}

impl<const D: usize> BoxDomain<D> {
    pub fn new(lower: [f64; D], upper: [f64; D]) -> Result<Self> {
        if D == 0 {
            return Err(SimError::config("Domain needs at least one dimension"));
        }
        for (lo, hi) in lower.iter().zip(upper.iter()) {
            if !(lo.is_finite() && hi.is_finite() && lo < hi && (hi - lo).is_finite()) {
                return Err(SimError::config(format!(
                    "Invalid domain interval [{}, {}]",
                    lo, hi
                )));
            }
        }
        let domain = BoxDomain { lower, upper };
        if !domain.volume().is_finite() {
            return Err(SimError::config("Domain volume overflows"));
        }
        Ok(domain)
    }

    /// The box `[-half_width, half_width]^D`.
    pub fn symmetric(half_width: f64) -> Result<Self> {
        BoxDomain::new([-half_width; D], [half_width; D])
    }

    pub fn lower(&self) -> &[f64; D] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64; D] {
        &self.upper
    }

    pub fn volume(&self) -> f64 {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(lo, hi)| hi - lo)
            .product()
    }

    /// A uniform draw from the box, one uniform value per coordinate.
    pub fn sample<R: UniformSource + ?Sized>(&self, rng: &mut R) -> [f64; D] {
        let mut point = self.lower;
        for (x, hi) in point.iter_mut().zip(self.upper.iter()) {
            *x += (hi - *x) * rng.next_uniform();
        }
        point
    }
}

/// Estimate the integral of `integrand` over `domain` from `num_draws` uniform draws.
pub fn estimate<const D: usize, I, R>(
    integrand: &I,
    domain: &BoxDomain<D>,
    rng: &mut R,
    num_draws: usize,
) -> Result<f64>
where
    I: Integrand<D> + ?Sized,
    R: UniformSource + ?Sized,
{
    if num_draws == 0 {
        return Err(SimError::config("Number of draws must be positive"));
    }
    let (min, max) = integrand.range();
    let mut sum = 0f64;
    for _ in 0..num_draws {
        let point = domain.sample(rng);
        let value = integrand.evaluate(&point);
        if !(min..=max).contains(&value) {
            return Err(SimError::NumericDomain {
                what: "integrand",
                value,
                at: format!("{:?}", point),
            });
        }
        sum += value;
    }
    Ok(domain.volume() * sum / num_draws as f64)
}

/// Estimate pi as four times the fraction of draws from `[-1, 1]^2` inside the unit disk.
pub fn estimate_pi<R: UniformSource + ?Sized>(rng: &mut R, num_draws: usize) -> Result<f64> {
    let domain = BoxDomain::<2>::symmetric(1.)?;
    estimate(&UnitDisk::default(), &domain, rng, num_draws)
}

/// `steps` sample counts starting at `start`, each `multiplier` times the previous.
pub fn geometric_ladder(start: usize, multiplier: usize, steps: usize) -> Result<Vec<usize>> {
    if start == 0 || multiplier == 0 || steps == 0 {
        return Err(SimError::config(format!(
            "Ladder start ({}), multiplier ({}) and number of rungs ({}) must be positive",
            start, multiplier, steps
        )));
    }
    let mut rungs = Vec::with_capacity(steps);
    let mut size = start;
    for i in 0..steps {
        rungs.push(size);
        if i + 1 < steps {
            size = size
                .checked_mul(multiplier)
                .ok_or_else(|| SimError::config("Ladder sample count overflows"))?;
        }
    }
    Ok(rungs)
}

fn validate_ladder(rung_sizes: &[usize], repetitions: usize) -> Result<()> {
    if rung_sizes.is_empty() {
        return Err(SimError::config("Sweep needs at least one rung"));
    }
    if rung_sizes.contains(&0) {
        return Err(SimError::config("Sample counts of all rungs must be positive"));
    }
    if repetitions == 0 {
        return Err(SimError::config("Number of repetitions must be positive"));
    }
    Ok(())
}

/// Independent estimates indexed by rung (sample count) and repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateTable {
    rung_sizes: Vec<usize>,
    repetitions: usize,
    values: Vec<f64>,
}

impl EstimateTable {
    pub fn rung_sizes(&self) -> &[usize] {
        &self.rung_sizes
    }

    pub fn num_rungs(&self) -> usize {
        self.rung_sizes.len()
    }

    pub fn repetitions(&self) -> usize {
        self.repetitions
    }

    /// The estimates of one rung.
    ///
    /// # Panics
    ///
    /// Panics if `rung >= self.num_rungs()`.
    pub fn row(&self, rung: usize) -> &[f64] {
        &self.values[rung * self.repetitions..(rung + 1) * self.repetitions]
    }

    pub fn get(&self, rung: usize, repetition: usize) -> Option<f64> {
        if rung >= self.num_rungs() || repetition >= self.repetitions {
            return None;
        }
        Some(self.values[rung * self.repetitions + repetition])
    }

    /// Pairs of sample count and the estimates of that rung.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[f64])> + '_ {
        self.rung_sizes
            .iter()
            .copied()
            .zip(self.values.chunks_exact(self.repetitions))
    }

    /// Panics like [`EstimateTable::row`].
    pub fn rung_mean(&self, rung: usize) -> f64 {
        mean(self.row(rung))
    }

    /// Sample standard deviation of a rung, zero for a single repetition.
    pub fn rung_std(&self, rung: usize) -> f64 {
        variance(self.row(rung)).sqrt()
    }
}

/// Run `repetitions` independent estimates for every rung.
///
/// `make_rng` is called once per cell with the cell's stream index
/// `rung * repetitions + repetition` and must return a fresh generator.
pub fn sweep<const D: usize, I, R, F>(
    integrand: &I,
    domain: &BoxDomain<D>,
    rung_sizes: &[usize],
    repetitions: usize,
    mut make_rng: F,
) -> Result<EstimateTable>
where
    I: Integrand<D> + ?Sized,
    R: UniformSource,
    F: FnMut(u64) -> R,
{
    validate_ladder(rung_sizes, repetitions)?;
    let mut values = Vec::with_capacity(rung_sizes.len() * repetitions);
    for (rung, &num_draws) in rung_sizes.iter().enumerate() {
        for rep in 0..repetitions {
            let mut rng = make_rng((rung * repetitions + rep) as u64);
            values.push(estimate(integrand, domain, &mut rng, num_draws)?);
        }
        trace!(rung, num_draws, "Finished rung");
    }
    Ok(EstimateTable {
        rung_sizes: rung_sizes.to_vec(),
        repetitions,
        values,
    })
}

/// Settings for the convergence sweep
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepSettings {
    /// Sample count of the first rung.
    pub start: usize,
    pub multiplier: usize,
    pub num_rungs: usize,
    /// Explicit sample counts, replacing the geometric ladder.
    pub rung_sizes: Option<Vec<usize>>,
    pub repetitions: usize,
    pub seed: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        SweepSettings {
            start: 100,
            multiplier: 10,
            num_rungs: 5,
            rung_sizes: None,
            repetitions: 10,
            seed: 0,
        }
    }
}

impl SweepSettings {
    pub fn rung_sizes(&self) -> Result<Vec<usize>> {
        match &self.rung_sizes {
            Some(sizes) => Ok(sizes.clone()),
            None => geometric_ladder(self.start, self.multiplier, self.num_rungs),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_ladder(&self.rung_sizes()?, self.repetitions)
    }
}

/// Evaluate all sweep cells in parallel.
///
/// Cell generators are ChaCha streams of `settings.seed`, so the table equals
/// `sweep` called with the same per-cell generators.
pub fn sweep_parallel<const D: usize, I>(
    integrand: &I,
    domain: &BoxDomain<D>,
    settings: &SweepSettings,
) -> Result<EstimateTable>
where
    I: Integrand<D> + Sync + ?Sized,
{
    let rung_sizes = settings.rung_sizes()?;
    let repetitions = settings.repetitions;
    validate_ladder(&rung_sizes, repetitions)?;
    debug!(?rung_sizes, repetitions, "Starting convergence sweep");

    let cells = rung_sizes
        .iter()
        .flat_map(|&num_draws| std::iter::repeat(num_draws).take(repetitions))
        .collect_vec();
    let values = cells
        .par_iter()
        .enumerate()
        .map(|(idx, &num_draws)| {
            let mut rng = stream_rng(settings.seed, idx as u64);
            estimate(integrand, domain, &mut rng, num_draws)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EstimateTable {
        rung_sizes,
        repetitions,
        values,
    })
}
