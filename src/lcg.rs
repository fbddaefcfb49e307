//! Linear congruential uniform streams.
//!
//! The generator follows the recurrence `X_{n+1} = (A * X_n + C) mod M` and
//! emits `U_n = X_n / M`, starting with the seed itself. The stream is a pure
//! function of the parameters and the seed.

use rand::distr::{Distribution, StandardUniform};
use rand::rngs::{SmallRng, StdRng, ThreadRng};
use rand_chacha::ChaCha8Rng;
use rand_core::{impls, RngCore, SeedableRng};

use crate::error::{Result, SimError};

pub const MODULUS: u64 = 1 << 32;
pub const MULTIPLIER: u64 = 1664525;
pub const INCREMENT: u64 = 1013904223;

/// Largest modulus for which every `X / M` is an exactly rounded value below one.
pub const MAX_MODULUS: u64 = 1 << 53;

/// A source of independent uniform draws on `[0, 1)`.
///
/// Samplers and estimators only need this capability, so they accept the
/// linear congruential generator as well as any of the `rand` generators.
pub trait UniformSource: RngCore {
    fn next_uniform(&mut self) -> f64 {
        StandardUniform.sample(self)
    }
}

impl UniformSource for StdRng {}
impl UniformSource for SmallRng {}
impl UniformSource for ChaCha8Rng {}
impl UniformSource for ThreadRng {}

impl<R: UniformSource + ?Sized> UniformSource for &mut R {
    fn next_uniform(&mut self) -> f64 {
        (**self).next_uniform()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcgParams {
    modulus: u64,
    multiplier: u64,
    increment: u64,
}

impl Default for LcgParams {
    fn default() -> Self {
        LcgParams {
            modulus: MODULUS,
            multiplier: MULTIPLIER,
            increment: INCREMENT,
        }
    }
}

impl LcgParams {
    pub fn new(modulus: u64, multiplier: u64, increment: u64) -> Result<Self> {
        if modulus == 0 {
            return Err(SimError::config("LCG modulus must be positive"));
        }
        if modulus > MAX_MODULUS {
            return Err(SimError::config(format!(
                "LCG modulus {} exceeds the largest supported modulus 2^53",
                modulus
            )));
        }
        if multiplier >= modulus || increment >= modulus {
            return Err(SimError::config(format!(
                "LCG multiplier ({}) and increment ({}) must be smaller than the modulus ({})",
                multiplier, increment, modulus
            )));
        }
        Ok(LcgParams {
            modulus,
            multiplier,
            increment,
        })
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn increment(&self) -> u64 {
        self.increment
    }

    /// Emit the value for `state` and return it together with the successor state.
    ///
    /// States outside `[0, M)` are reduced modulo `M` first.
    pub fn step(&self, state: u64) -> (f64, u64) {
        let state = state % self.modulus;
        let value = state as f64 / self.modulus as f64;
        (value, self.advance(state))
    }

    #[inline]
    fn advance(&self, state: u64) -> u64 {
        let next = (self.multiplier as u128 * state as u128 + self.increment as u128)
            % self.modulus as u128;
        next as u64
    }
}

/// Linear congruential generator owning its current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    params: LcgParams,
    state: u64,
}

impl Default for Lcg {
    fn default() -> Self {
        Lcg {
            params: LcgParams::default(),
            state: 0,
        }
    }
}

impl Lcg {
    pub fn new(params: LcgParams, seed: u64) -> Result<Self> {
        if seed >= params.modulus {
            return Err(SimError::config(format!(
                "LCG seed {} must be smaller than the modulus {}",
                seed, params.modulus
            )));
        }
        Ok(Lcg {
            params,
            state: seed,
        })
    }

    /// Generator with the default constants.
    pub fn with_seed(seed: u64) -> Result<Self> {
        Lcg::new(LcgParams::default(), seed)
    }

    pub fn params(&self) -> &LcgParams {
        &self.params
    }

    /// The value the next draw will be computed from.
    pub fn state(&self) -> u64 {
        self.state
    }

    fn next_raw(&mut self) -> u64 {
        let current = self.state;
        self.state = self.params.advance(current);
        current
    }
}

impl UniformSource for Lcg {
    fn next_uniform(&mut self) -> f64 {
        let (value, next) = self.params.step(self.state);
        self.state = next;
        value
    }
}

impl RngCore for Lcg {
    fn next_u32(&mut self) -> u32 {
        let raw = self.next_raw() as u128;
        ((raw << 32) / self.params.modulus as u128) as u32
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst)
    }
}

impl SeedableRng for Lcg {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Lcg::seed_from_u64(u64::from_le_bytes(seed))
    }

    /// Use the value directly as `X_0` (reduced modulo `M`).
    fn seed_from_u64(state: u64) -> Self {
        Lcg {
            params: LcgParams::default(),
            state: state % MODULUS,
        }
    }
}

/// `count` uniform values from the default generator started at `seed`.
pub fn produce_stream(seed: u64, count: usize) -> Result<Vec<f64>> {
    produce_stream_with(LcgParams::default(), seed, count)
}

pub fn produce_stream_with(params: LcgParams, seed: u64, count: usize) -> Result<Vec<f64>> {
    let mut lcg = Lcg::new(params, seed)?;
    Ok((0..count).map(|_| lcg.next_uniform()).collect())
}
