use std::f64::consts::PI;

use statrs::function::erf::erf;

use crate::error::{Result, SimError};

/// An unnormalized, non-negative target density on the real line.
pub trait Density {
    fn density(&self, x: f64) -> f64;
}

impl<F: Fn(f64) -> f64> Density for F {
    fn density(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Evaluate `density` and reject negative or NaN values.
pub(crate) fn checked_density<D: Density + ?Sized>(density: &D, x: f64) -> Result<f64> {
    let value = density.density(x);
    if value >= 0. {
        Ok(value)
    } else {
        Err(SimError::NumericDomain {
            what: "density",
            value,
            at: format!("{}", x),
        })
    }
}

/// Weighted sum of two Gaussian kernels with a shared rate,
/// `f(x) = w1 exp(-rate (x - mu1)^2) + w2 exp(-rate (x - mu2)^2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianMixture {
    weights: (f64, f64),
    means: (f64, f64),
    rate: f64,
}

impl Default for GaussianMixture {
    fn default() -> Self {
        GaussianMixture {
            weights: (0.3, 0.7),
            means: (0., 10.),
            rate: 0.2,
        }
    }
}

impl GaussianMixture {
    pub fn new(weights: (f64, f64), means: (f64, f64), rate: f64) -> Result<Self> {
        let (w1, w2) = weights;
        if !(w1.is_finite() && w2.is_finite()) || w1 < 0. || w2 < 0. {
            return Err(SimError::config(format!(
                "Mixture weights must be finite and non-negative, got ({}, {})",
                w1, w2
            )));
        }
        if w1 + w2 == 0. {
            return Err(SimError::config("At least one mixture weight must be positive"));
        }
        if !(means.0.is_finite() && means.1.is_finite()) {
            return Err(SimError::config("Mixture means must be finite"));
        }
        if !(rate.is_finite() && rate > 0.) {
            return Err(SimError::config(format!(
                "Kernel rate must be positive and finite, got {}",
                rate
            )));
        }
        Ok(GaussianMixture {
            weights,
            means,
            rate,
        })
    }

    /// The default kernels with custom weights.
    pub fn with_weights(w1: f64, w2: f64) -> Result<Self> {
        let default = GaussianMixture::default();
        GaussianMixture::new((w1, w2), default.means, default.rate)
    }

    pub fn weights(&self) -> (f64, f64) {
        self.weights
    }

    pub fn means(&self) -> (f64, f64) {
        self.means
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Integral of the unnormalized density over the real line.
    pub fn normalizing_constant(&self) -> f64 {
        (self.weights.0 + self.weights.1) * (PI / self.rate).sqrt()
    }

    pub fn normalized(&self, x: f64) -> f64 {
        self.density(x) / self.normalizing_constant()
    }

    /// Cumulative distribution function of the normalized target.
    pub fn cdf(&self, x: f64) -> f64 {
        let (w1, w2) = self.weights;
        let scale = self.rate.sqrt();
        let kernel_cdf = |mu: f64| 0.5 * (1. + erf(scale * (x - mu)));
        (w1 * kernel_cdf(self.means.0) + w2 * kernel_cdf(self.means.1)) / (w1 + w2)
    }

    /// Mean of the normalized target.
    pub fn mean(&self) -> f64 {
        let (w1, w2) = self.weights;
        (w1 * self.means.0 + w2 * self.means.1) / (w1 + w2)
    }
}

impl Density for GaussianMixture {
    fn density(&self, x: f64) -> f64 {
        let kernel = |mu: f64| {
            let diff = x - mu;
            (-self.rate * diff * diff).exp()
        };
        self.weights.0 * kernel(self.means.0) + self.weights.1 * kernel(self.means.1)
    }
}

/// A function of a `D`-dimensional point with a declared value range.
pub trait Integrand<const D: usize> {
    fn evaluate(&self, point: &[f64; D]) -> f64;

    /// Inclusive bounds every value of `evaluate` must lie in.
    fn range(&self) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }
}

/// Indicator of the closed unit ball. In two dimensions this is the unit disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitBall<const D: usize>;

pub type UnitDisk = UnitBall<2>;

impl<const D: usize> Integrand<D> for UnitBall<D> {
    fn evaluate(&self, point: &[f64; D]) -> f64 {
        let norm_sq: f64 = point.iter().map(|x| x * x).sum();
        if norm_sq <= 1. {
            1.
        } else {
            0.
        }
    }

    fn range(&self) -> (f64, f64) {
        (0., 1.)
    }
}

/// Closure integrand with an explicit range.
pub struct FnIntegrand<F> {
    func: F,
    range: (f64, f64),
}

impl<F> FnIntegrand<F> {
    pub fn new(func: F, range: (f64, f64)) -> Result<Self> {
        if range.0.is_nan() || range.1.is_nan() || range.0 > range.1 {
            return Err(SimError::config(format!(
                "Invalid integrand range ({}, {})",
                range.0, range.1
            )));
        }
        Ok(FnIntegrand { func, range })
    }

    pub fn unbounded(func: F) -> Self {
        FnIntegrand {
            func,
            range: (f64::NEG_INFINITY, f64::INFINITY),
        }
    }
}

impl<const D: usize, F: Fn(&[f64; D]) -> f64> Integrand<D> for FnIntegrand<F> {
    fn evaluate(&self, point: &[f64; D]) -> f64 {
        (self.func)(point)
    }

    fn range(&self) -> (f64, f64) {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mixture_values() {
        let target = GaussianMixture::default();
        assert_abs_diff_eq!(target.density(0.), 0.3 + 0.7 * (-20f64).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(target.density(10.), 0.7 + 0.3 * (-20f64).exp(), epsilon = 1e-15);
        assert!(target.density(1e6) >= 0.);
        assert!(target.density(-1e300) >= 0.);
    }

    #[test]
    fn normalization_with_unit_weight_sum() {
        // Weights summing to one give sqrt(rate / pi).
        let target = GaussianMixture::default();
        let expected = (0.2f64).sqrt() / PI.sqrt();
        assert_abs_diff_eq!(target.normalized(3.), expected * target.density(3.), epsilon = 1e-15);
    }

    #[test]
    fn normalized_integrates_to_one() {
        let target = GaussianMixture::with_weights(2., 5.).unwrap();
        let (lo, hi, n) = (-30., 40., 70_000);
        let h = (hi - lo) / n as f64;
        let integral: f64 = (0..n)
            .map(|i| target.normalized(lo + (i as f64 + 0.5) * h) * h)
            .sum();
        assert_abs_diff_eq!(integral, 1., epsilon = 1e-9);
    }

    #[test]
    fn cdf_limits() {
        let target = GaussianMixture::default();
        assert_abs_diff_eq!(target.cdf(-50.), 0., epsilon = 1e-12);
        assert_abs_diff_eq!(target.cdf(60.), 1., epsilon = 1e-12);
        // The left kernel carries 0.3 of the mass and is well separated.
        assert_abs_diff_eq!(target.cdf(5.), 0.3, epsilon = 1e-3);
        assert_abs_diff_eq!(target.mean(), 7., epsilon = 1e-12);
    }

    #[test]
    fn invalid_mixtures() {
        assert!(GaussianMixture::with_weights(-0.1, 1.).is_err());
        assert!(GaussianMixture::with_weights(0., 0.).is_err());
        assert!(GaussianMixture::with_weights(f64::NAN, 1.).is_err());
        assert!(GaussianMixture::new((1., 1.), (0., 1.), 0.).is_err());
        assert!(GaussianMixture::new((1., 1.), (f64::INFINITY, 1.), 1.).is_err());
    }

    #[test]
    fn checked_density_rejects_negative() {
        let bad = |x: f64| x;
        assert_eq!(checked_density(&bad, 2.).unwrap(), 2.);
        assert!(matches!(
            checked_density(&bad, -1.),
            Err(SimError::NumericDomain { .. })
        ));
        let nan = |_: f64| f64::NAN;
        assert!(checked_density(&nan, 0.).is_err());
    }

    #[test]
    fn unit_disk() {
        let disk = UnitDisk::default();
        assert_eq!(disk.evaluate(&[0., 0.]), 1.);
        assert_eq!(disk.evaluate(&[1., 0.]), 1.);
        assert_eq!(disk.evaluate(&[0.8, 0.7]), 0.);
        assert_eq!(disk.evaluate(&[-1., -1.]), 0.);
        assert_eq!(UnitBall::<1>.evaluate(&[-0.5]), 1.);
        assert_eq!(disk.range(), (0., 1.));
    }

    #[test]
    fn closure_integrand() {
        let square = FnIntegrand::new(|p: &[f64; 1]| p[0] * p[0], (0., 1.)).unwrap();
        assert_eq!(square.evaluate(&[0.5]), 0.25);
        assert!(FnIntegrand::new(|_: &[f64; 1]| 0., (1., 0.)).is_err());
    }
}
