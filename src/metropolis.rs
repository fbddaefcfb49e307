use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::{
    density::{checked_density, Density},
    error::{Result, SimError},
    lcg::UniformSource,
};

/// A symmetric proposal distribution, `q(x' | x) = q(x | x')`.
pub trait Proposal {
    fn propose<R: Rng + ?Sized>(&self, current: f64, rng: &mut R) -> f64;
}

/// Normal random walk with a fixed standard deviation.
#[derive(Debug, Clone, Copy)]
pub struct NormalProposal {
    step: Normal<f64>,
}

impl NormalProposal {
    pub fn new(std_dev: f64) -> Result<Self> {
        if !(std_dev.is_finite() && std_dev > 0.) {
            return Err(SimError::config(format!(
                "Proposal standard deviation must be positive and finite, got {}",
                std_dev
            )));
        }
        Ok(NormalProposal {
            step: Normal::new(0., std_dev)?,
        })
    }

    pub fn std_dev(&self) -> f64 {
        self.step.std_dev()
    }
}

impl Proposal for NormalProposal {
    fn propose<R: Rng + ?Sized>(&self, current: f64, rng: &mut R) -> f64 {
        current + self.step.sample(rng)
    }
}

/// `min(1, f(x') / f(x))`, defined as one if the current density is zero.
///
/// Both densities must be non-negative; the result is then always in `[0, 1]`.
pub fn acceptance_ratio(current_density: f64, proposal_density: f64) -> f64 {
    if current_density == 0. {
        return 1.;
    }
    (proposal_density / current_density).min(1.)
}

/// Information about a single Metropolis transition.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub position: f64,
    pub proposal: f64,
    pub acceptance: f64,
    pub accepted: bool,
}

/// The draws of one Markov chain, starting with the initial value.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    samples: Vec<f64>,
    num_accepted: u64,
}

impl Chain {
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_accepted(&self) -> u64 {
        self.num_accepted
    }

    /// Fraction of transitions that moved to the proposal.
    pub fn acceptance_rate(&self) -> f64 {
        let transitions = self.samples.len().saturating_sub(1);
        if transitions == 0 {
            return 0.;
        }
        self.num_accepted as f64 / transitions as f64
    }

    /// The draws after discarding the first `burn_in` values.
    pub fn after_burn_in(&self, burn_in: usize) -> &[f64] {
        &self.samples[burn_in.min(self.samples.len())..]
    }
}

pub struct MetropolisSampler<'d, D: Density + ?Sized, P: Proposal> {
    density: &'d D,
    proposal: P,
    position: f64,
    current_density: f64,
    num_accepted: u64,
}

impl<'d, D: Density + ?Sized, P: Proposal> MetropolisSampler<'d, D, P> {
    /// This fails if the density is negative or NaN at `initial`.
    pub fn new(density: &'d D, proposal: P, initial: f64) -> Result<Self> {
        let mut sampler = MetropolisSampler {
            density,
            proposal,
            position: 0.,
            current_density: 0.,
            num_accepted: 0,
        };
        sampler.set_position(initial)?;
        Ok(sampler)
    }

    pub fn set_position(&mut self, position: f64) -> Result<()> {
        if !position.is_finite() {
            return Err(SimError::config(format!(
                "Initial value must be finite, got {}",
                position
            )));
        }
        self.current_density = checked_density(self.density, position)?;
        self.position = position;
        Ok(())
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Number of accepted proposals since construction.
    pub fn num_accepted(&self) -> u64 {
        self.num_accepted
    }

    /// Advance the chain by one transition.
    ///
    /// The state is left untouched if the density at the proposal is invalid.
    pub fn step<R: UniformSource + ?Sized>(&mut self, rng: &mut R) -> Result<Transition> {
        let proposal = self.proposal.propose(self.position, rng);
        let proposal_density = checked_density(self.density, proposal)?;
        let acceptance = acceptance_ratio(self.current_density, proposal_density);
        let accepted = rng.next_uniform() < acceptance;
        if accepted {
            self.position = proposal;
            self.current_density = proposal_density;
            self.num_accepted += 1;
        }
        Ok(Transition {
            position: self.position,
            proposal,
            acceptance,
            accepted,
        })
    }

    /// Draw a chain of `num_steps` values whose first element is the current position.
    pub fn sample<R: UniformSource + ?Sized>(
        &mut self,
        num_steps: usize,
        rng: &mut R,
    ) -> Result<Chain> {
        if num_steps == 0 {
            return Err(SimError::config("Number of steps must be positive"));
        }
        let mut samples = Vec::with_capacity(num_steps);
        samples.push(self.position);
        let mut num_accepted = 0;
        for _ in 1..num_steps {
            let transition = self.step(rng)?;
            num_accepted += transition.accepted as u64;
            samples.push(transition.position);
        }
        Ok(Chain {
            samples,
            num_accepted,
        })
    }
}

/// Run a Metropolis chain with a normal random-walk proposal.
pub fn run<D: Density + ?Sized, R: UniformSource + ?Sized>(
    initial: f64,
    proposal_std: f64,
    density: &D,
    num_steps: usize,
    rng: &mut R,
) -> Result<Chain> {
    if num_steps == 0 {
        return Err(SimError::config("Number of steps must be positive"));
    }
    let proposal = NormalProposal::new(proposal_std)?;
    let mut sampler = MetropolisSampler::new(density, proposal, initial)?;
    let chain = sampler.sample(num_steps, rng)?;
    debug!(
        num_steps,
        acceptance_rate = chain.acceptance_rate(),
        "Finished Metropolis chain"
    );
    Ok(chain)
}

/// Settings for the Metropolis sampler
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetropolisSettings {
    pub initial_value: f64,
    pub proposal_std: f64,
    /// Length of each chain, including the initial value.
    pub num_steps: usize,
    /// Number of leading draws that diagnostics should ignore.
    pub burn_in: usize,
    pub num_chains: usize,
    pub seed: u64,
}

impl Default for MetropolisSettings {
    fn default() -> Self {
        MetropolisSettings {
            initial_value: 0.,
            proposal_std: 10.,
            num_steps: 100_000,
            burn_in: 0,
            num_chains: 1,
            seed: 0,
        }
    }
}

impl MetropolisSettings {
    pub fn validate(&self) -> Result<()> {
        if self.num_steps == 0 {
            return Err(SimError::config("Number of steps must be positive"));
        }
        if self.burn_in >= self.num_steps {
            return Err(SimError::config(format!(
                "Burn-in ({}) must be shorter than the chain ({})",
                self.burn_in, self.num_steps
            )));
        }
        if self.num_chains == 0 {
            return Err(SimError::config("Number of chains must be positive"));
        }
        if !self.initial_value.is_finite() {
            return Err(SimError::config("Initial value must be finite"));
        }
        NormalProposal::new(self.proposal_std).map(|_| ())
    }
}

/// ChaCha generator for `seed` with its own stream; chains and sweep cells use their index.
pub fn stream_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Run `num_chains` independent chains in parallel.
///
/// The result is ordered by chain id and does not depend on the number of threads.
pub fn sample_chains<D: Density + Sync + ?Sized>(
    settings: &MetropolisSettings,
    density: &D,
) -> Result<Vec<Chain>> {
    settings.validate()?;
    let proposal = NormalProposal::new(settings.proposal_std)?;
    debug!(?settings, "Starting Metropolis chains");
    (0..settings.num_chains as u64)
        .into_par_iter()
        .map(|chain_id| {
            let mut rng = stream_rng(settings.seed, chain_id);
            let mut sampler = MetropolisSampler::new(density, proposal, settings.initial_value)?;
            let chain = sampler.sample(settings.num_steps, &mut rng)?;
            debug!(
                chain_id,
                acceptance_rate = chain.acceptance_rate(),
                "Finished chain"
            );
            Ok(chain)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{density::GaussianMixture, lcg::Lcg};

    use pretty_assertions::assert_eq;
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};
    use rand::rngs::StdRng;

    #[test]
    fn chain_length_and_start() {
        let target = GaussianMixture::default();
        let mut rng = StdRng::seed_from_u64(42);
        let chain = run(0., 10., &target, 1000, &mut rng).unwrap();
        assert_eq!(chain.len(), 1000);
        assert_eq!(chain.samples()[0], 0.);
        assert!(chain.num_accepted() <= 999);

        let chain = run(3.5, 1., &target, 1, &mut rng).unwrap();
        assert_eq!(chain.samples(), &[3.5]);
        assert_eq!(chain.acceptance_rate(), 0.);
    }

    #[test]
    fn repeated_values_are_kept() {
        // Proposals far into the tails are almost always rejected.
        let narrow = |x: f64| (-50. * x * x).exp();
        let mut rng = StdRng::seed_from_u64(1);
        let chain = run(0., 100., &narrow, 500, &mut rng).unwrap();
        let repeats = chain
            .samples()
            .windows(2)
            .filter(|w| w[0] == w[1])
            .count();
        assert_eq!(repeats as u64, 499 - chain.num_accepted());
        assert!(repeats > 400);
    }

    #[test]
    fn deterministic_with_lcg() {
        let target = GaussianMixture::default();
        let mut rng1 = Lcg::with_seed(7).unwrap();
        let mut rng2 = Lcg::with_seed(7).unwrap();
        let a = run(0., 10., &target, 2000, &mut rng1).unwrap();
        let b = run(0., 10., &target, 2000, &mut rng2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_density_start_moves() {
        let half_line = |x: f64| if x > 0. { (-x).exp() } else { 0. };
        let mut rng = StdRng::seed_from_u64(3);
        let mut sampler =
            MetropolisSampler::new(&half_line, NormalProposal::new(1.).unwrap(), -1.).unwrap();
        let transition = sampler.step(&mut rng).unwrap();
        assert_eq!(transition.acceptance, 1.);
        assert!(transition.accepted);
        assert_eq!(sampler.position(), transition.proposal);
    }

    #[test]
    fn negative_density_aborts() {
        let bad = |x: f64| x;
        let mut rng = StdRng::seed_from_u64(0);
        let err = run(1., 10., &bad, 1000, &mut rng).unwrap_err();
        assert!(matches!(err, SimError::NumericDomain { .. }));

        let err = run(-1., 10., &bad, 10, &mut rng).unwrap_err();
        assert!(matches!(err, SimError::NumericDomain { .. }));
    }

    #[test]
    fn invalid_configuration() {
        let target = GaussianMixture::default();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            run(0., 10., &target, 0, &mut rng),
            Err(SimError::Configuration(_))
        ));
        assert!(run(0., 0., &target, 10, &mut rng).is_err());
        assert!(run(0., f64::NAN, &target, 10, &mut rng).is_err());
        assert!(run(f64::INFINITY, 1., &target, 10, &mut rng).is_err());
    }

    #[test]
    fn settings_validation() {
        assert!(MetropolisSettings::default().validate().is_ok());
        let settings = MetropolisSettings {
            burn_in: 10,
            num_steps: 10,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let settings = MetropolisSettings {
            num_chains: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parallel_chains_match_sequential() {
        let target = GaussianMixture::default();
        let settings = MetropolisSettings {
            num_steps: 500,
            num_chains: 4,
            seed: 11,
            ..Default::default()
        };
        let chains = sample_chains(&settings, &target).unwrap();
        assert_eq!(chains.len(), 4);
        for (chain_id, chain) in chains.iter().enumerate() {
            let mut rng = stream_rng(11, chain_id as u64);
            let expected = run(0., 10., &target, 500, &mut rng).unwrap();
            assert_eq!(chain, &expected);
        }
        assert_ne!(chains[0], chains[1]);
    }

    proptest! {
        #[test]
        fn acceptance_is_probability(current in 0f64..1e6, proposal in 0f64..1e6) {
            let alpha = acceptance_ratio(current, proposal);
            prop_assert!((0. ..=1.).contains(&alpha));
        }

        #[test]
        fn chain_length_holds(seed in any::<u64>(), n in 1usize..200, x0 in -20f64..20.) {
            let target = GaussianMixture::default();
            let mut rng = Lcg::seed_from_u64(seed);
            let chain = run(x0, 10., &target, n, &mut rng).unwrap();
            prop_assert_eq!(chain.len(), n);
            prop_assert_eq!(chain.samples()[0], x0);
        }
    }
}
