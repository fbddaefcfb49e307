use crate::error::{Result, SimError};

/// Empirical cumulative distribution function of a set of draws.
#[derive(Debug, Clone)]
pub struct Ecdf {
    sorted: Vec<f64>,
}

impl Ecdf {
    pub fn new(samples: &[f64]) -> Result<Self> {
        if samples.is_empty() {
            return Err(SimError::config("Empirical CDF needs at least one sample"));
        }
        if let Some(bad) = samples.iter().find(|x| !x.is_finite()) {
            return Err(SimError::NumericDomain {
                what: "sample",
                value: *bad,
                at: "empirical CDF".into(),
            });
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        Ok(Ecdf { sorted })
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Fraction of draws less than or equal to `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let count = self.sorted.partition_point(|&s| s <= x);
        count as f64 / self.sorted.len() as f64
    }

    /// Pairs `(x, F(x))` at every jump, preceded by `(-inf, 0)`.
    ///
    /// Repeated draws produce a single jump of the combined height.
    fn step_points(&self) -> Vec<(f64, f64)> {
        let n = self.sorted.len() as f64;
        let mut points = Vec::with_capacity(self.sorted.len() + 1);
        let mut last = f64::NEG_INFINITY;
        for (count, &x) in self.sorted.iter().enumerate() {
            if x != last {
                points.push((last, count as f64 / n));
                last = x;
            }
        }
        points.push((last, 1.));
        points
    }

    /// Kolmogorov-Smirnov distance to a continuous CDF.
    pub fn ks_distance(&self, cdf: impl Fn(f64) -> f64) -> f64 {
        self.step_points()
            .windows(2)
            .map(|pair| {
                let (_, before) = pair[0];
                let (x, after) = pair[1];
                let expected = cdf(x);
                (expected - after).abs().max((expected - before).abs())
            })
            .fold(0., f64::max)
    }
}

pub fn ks_distance(samples: &[f64], cdf: impl Fn(f64) -> f64) -> Result<f64> {
    Ok(Ecdf::new(samples)?.ks_distance(cdf))
}

pub fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Unbiased sample variance.
pub fn variance(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.;
    }
    let mu = mean(samples);
    samples.iter().map(|x| (x - mu) * (x - mu)).sum::<f64>() / (samples.len() - 1) as f64
}

/// Equal-width binning of draws over `[lower, upper)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    lower: f64,
    upper: f64,
    counts: Vec<u64>,
    /// Draws that fell outside the range.
    outside: u64,
}

impl Histogram {
    pub fn new(samples: &[f64], num_bins: usize, lower: f64, upper: f64) -> Result<Self> {
        if num_bins == 0 {
            return Err(SimError::config("Histogram needs at least one bin"));
        }
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(SimError::config(format!(
                "Invalid histogram range [{}, {})",
                lower, upper
            )));
        }
        let width = (upper - lower) / num_bins as f64;
        let mut counts = vec![0u64; num_bins];
        let mut outside = 0;
        for &x in samples {
            if !(lower..upper).contains(&x) {
                outside += 1;
                continue;
            }
            let bin = (((x - lower) / width) as usize).min(num_bins - 1);
            counts[bin] += 1;
        }
        Ok(Histogram {
            lower,
            upper,
            counts,
            outside,
        })
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn outside(&self) -> u64 {
        self.outside
    }

    pub fn bin_width(&self) -> f64 {
        (self.upper - self.lower) / self.counts.len() as f64
    }

    pub fn bin_centers(&self) -> impl Iterator<Item = f64> + '_ {
        let width = self.bin_width();
        (0..self.counts.len()).map(move |i| self.lower + (i as f64 + 0.5) * width)
    }

    /// Counts scaled so that the bars over all draws integrate to one.
    pub fn densities(&self) -> Vec<f64> {
        let total = self.counts.iter().sum::<u64>() + self.outside;
        let scale = 1. / (total as f64 * self.bin_width());
        self.counts.iter().map(|&c| c as f64 * scale).collect()
    }
}
