//! Sample from distributions without a closed-form sampler.
//!
//! The crate provides a reproducible linear congruential uniform stream,
//! a Metropolis-Hastings sampler for unnormalized one-dimensional densities,
//! and Monte-Carlo integration with a convergence sweep over a ladder of
//! sample counts.
//!
//! ```
//! use stochsim::{run, GaussianMixture, Lcg};
//!
//! let target = GaussianMixture::default();
//! let mut rng = Lcg::with_seed(0)?;
//! let chain = run(0., 10., &target, 1000, &mut rng)?;
//! assert_eq!(chain.len(), 1000);
//! # Ok::<(), stochsim::SimError>(())
//! ```

pub(crate) mod config;
pub(crate) mod density;
pub(crate) mod diagnostics;
pub(crate) mod error;
pub(crate) mod integration;
pub(crate) mod lcg;
pub(crate) mod metropolis;
pub(crate) mod report;

pub use config::{Config, TargetSettings, UniformSettings};
pub use density::{Density, FnIntegrand, GaussianMixture, Integrand, UnitBall, UnitDisk};
pub use diagnostics::{ks_distance, mean, variance, Ecdf, Histogram};
pub use error::{Result, SimError};
pub use integration::{
    estimate, estimate_pi, geometric_ladder, sweep, sweep_parallel, BoxDomain, EstimateTable,
    SweepSettings,
};
pub use lcg::{
    produce_stream, produce_stream_with, Lcg, LcgParams, UniformSource, INCREMENT, MAX_MODULUS,
    MODULUS, MULTIPLIER,
};
pub use metropolis::{
    acceptance_ratio, run, sample_chains, stream_rng, Chain, MetropolisSampler,
    MetropolisSettings, NormalProposal, Proposal, Transition,
};
pub use report::{format_table, round_significant};
