//! Naive linear spending forecast.
//!
//! The slope is a least-squares fit over the monthly series indexed by
//! position, so gaps between months are ignored. Each forecast is
//! `last + slope * i + noise`, floored at zero. The noise term exists for
//! display only and is supplied through [`NoiseSource`].

use crate::config::InsightsConfig;
use crate::error::{InsightsError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Source of the additive perturbation applied to each forecast period.
pub trait NoiseSource {
    fn sample(&mut self) -> f64;
}

/// Always zero. Makes forecasts exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// Mean-zero Gaussian noise.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    normal: Normal<f64>,
    rng: StdRng,
}

impl GaussianNoise {
    pub fn new(sigma: f64, seed: Option<u64>) -> Result<Self> {
        let normal = Normal::new(0.0, sigma).map_err(|e| {
            InsightsError::InvalidConfig(format!("noise sigma {}: {}", sigma, e))
        })?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { normal, rng })
    }

    pub fn from_config(config: &InsightsConfig) -> Result<Self> {
        Self::new(config.noise_sigma, config.noise_seed)
    }
}

impl NoiseSource for GaussianNoise {
    fn sample(&mut self) -> f64 {
        self.normal.sample(&mut self.rng)
    }
}

/// Noise source described by `config`: zero noise when sigma is 0.
pub fn noise_from_config(config: &InsightsConfig) -> Result<Box<dyn NoiseSource>> {
    if config.noise_sigma == 0.0 {
        Ok(Box::new(ZeroNoise))
    } else {
        Ok(Box::new(GaussianNoise::from_config(config)?))
    }
}

/// Least-squares slope of `values` against their positions 0..n.
/// Zero for fewer than two points.
pub fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendingTrend {
    Increasing,
    StableOrDecreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub average_monthly: f64,
    pub slope: f64,
}

impl TrendSummary {
    pub fn from_monthly(values: &[f64]) -> Self {
        let average_monthly = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        Self {
            average_monthly,
            slope: least_squares_slope(values),
        }
    }

    pub fn direction(&self) -> SpendingTrend {
        if self.slope > 0.0 {
            SpendingTrend::Increasing
        } else {
            SpendingTrend::StableOrDecreasing
        }
    }
}

/// Forecasts `horizon` periods past the end of `monthly`. Returns an empty
/// vector when there is no history.
pub fn forecast(monthly: &[f64], horizon: usize, noise: &mut dyn NoiseSource) -> Vec<f64> {
    let Some(&last) = monthly.last() else {
        return Vec::new();
    };
    let slope = least_squares_slope(monthly);

    (1..=horizon)
        .map(|i| (last + slope * i as f64 + noise.sample()).max(0.0))
        .collect()
}
