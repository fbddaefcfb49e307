//! Grouped settings for the three simulations, loadable from TOML.
//!
//! Every section is optional and falls back to the defaults of its settings
//! struct, so an empty file is a valid configuration.

use std::path::Path;

use serde::Deserialize;

use crate::{
    density::GaussianMixture,
    error::{Result, SimError},
    integration::SweepSettings,
    lcg::{Lcg, LcgParams, INCREMENT, MODULUS, MULTIPLIER},
    metropolis::MetropolisSettings,
};

/// Settings for the uniform stream
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniformSettings {
    pub seed: u64,
    pub num_draws: usize,
    pub modulus: u64,
    pub multiplier: u64,
    pub increment: u64,
}

impl Default for UniformSettings {
    fn default() -> Self {
        UniformSettings {
            seed: 0,
            num_draws: 1_000_000,
            modulus: MODULUS,
            multiplier: MULTIPLIER,
            increment: INCREMENT,
        }
    }
}

impl UniformSettings {
    pub fn params(&self) -> Result<LcgParams> {
        LcgParams::new(self.modulus, self.multiplier, self.increment)
    }

    pub fn generator(&self) -> Result<Lcg> {
        Lcg::new(self.params()?, self.seed)
    }
}

/// Parameters of the two-kernel target density
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSettings {
    pub density_weights: (f64, f64),
    pub means: (f64, f64),
    pub rate: f64,
}

impl Default for TargetSettings {
    fn default() -> Self {
        let target = GaussianMixture::default();
        TargetSettings {
            density_weights: target.weights(),
            means: target.means(),
            rate: target.rate(),
        }
    }
}

impl TargetSettings {
    pub fn density(&self) -> Result<GaussianMixture> {
        GaussianMixture::new(self.density_weights, self.means, self.rate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub uniform: UniformSettings,
    pub target: TargetSettings,
    pub metropolis: MetropolisSettings,
    pub sweep: SweepSettings,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)
            .map_err(|err| SimError::config(format!("Could not parse configuration: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read configuration file {}", path.display()))?;
        Config::from_toml_str(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Check every section before anything is sampled.
    pub fn validate(&self) -> Result<()> {
        self.uniform.generator()?;
        self.target.density()?;
        self.metropolis.validate()?;
        self.sweep.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.metropolis.num_steps, 100_000);
        assert_eq!(config.sweep.rung_sizes().unwrap().len(), 5);
    }

    #[test]
    fn shipped_file_lists_defaults() {
        let config = Config::from_toml_str(include_str!("../stochsim.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_sections() {
        let text = r#"
            [target]
            density_weights = [0.5, 0.5]

            [metropolis]
            proposal_std = 2.5
            num_chains = 4
            seed = 42

            [sweep]
            rung_sizes = [10, 20, 40]
            repetitions = 3
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.target.density_weights, (0.5, 0.5));
        assert_eq!(config.target.rate, 0.2);
        assert_eq!(config.metropolis.proposal_std, 2.5);
        assert_eq!(config.metropolis.num_chains, 4);
        assert_eq!(config.metropolis.num_steps, 100_000);
        assert_eq!(config.sweep.rung_sizes().unwrap(), vec![10, 20, 40]);
        assert_eq!(config.uniform, UniformSettings::default());
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for text in [
            "[uniform]\nmodulus = 0",
            "[target]\ndensity_weights = [-1.0, 1.0]",
            "[metropolis]\nnum_steps = 0",
            "[sweep]\nrepetitions = 0",
            "[sweep]\nrung_sizes = []",
            "[metropolis]\nunknown = 1",
        ] {
            assert!(
                matches!(Config::from_toml_str(text), Err(SimError::Configuration(_))),
                "{}",
                text
            );
        }
    }
}
