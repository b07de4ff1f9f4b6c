//! Market Data
//!
//! Price series plus per-step feature rows consumed by the trading
//! environment. Feature engineering itself lives outside the core: callers
//! supply one fixed-width numeric row per step, and construction validates
//! that every index the simulation will visit is covered and finite.

use rand::Rng;

use crate::error::{BotError, Result};

/// A price series with aligned per-step feature rows
#[derive(Debug, Clone)]
pub struct MarketData {
    closes: Vec<f64>,
    features: Vec<Vec<f32>>,
    feature_width: usize,
}

impl MarketData {
    /// Create market data from a close series and externally engineered
    /// feature rows. Fails fast on shape mismatches or non-finite values.
    pub fn new(closes: Vec<f64>, features: Vec<Vec<f32>>) -> Result<Self> {
        if closes.len() < 2 {
            return Err(BotError::InvalidData(format!(
                "price series needs at least 2 steps, got {}",
                closes.len()
            )));
        }
        if features.len() != closes.len() {
            return Err(BotError::InvalidData(format!(
                "feature rows ({}) do not match price series length ({})",
                features.len(),
                closes.len()
            )));
        }

        let feature_width = features[0].len();
        if feature_width == 0 {
            return Err(BotError::InvalidData("feature rows are empty".into()));
        }

        for (i, close) in closes.iter().enumerate() {
            if !close.is_finite() || *close <= 0.0 {
                return Err(BotError::InvalidData(format!(
                    "close at step {} is not a positive finite number: {}",
                    i, close
                )));
            }
        }
        for (i, row) in features.iter().enumerate() {
            if row.len() != feature_width {
                return Err(BotError::InvalidData(format!(
                    "feature row {} has width {}, expected {}",
                    i,
                    row.len(),
                    feature_width
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(BotError::InvalidData(format!(
                    "feature row {} contains a non-finite value",
                    i
                )));
            }
        }

        Ok(Self {
            closes,
            features,
            feature_width,
        })
    }

    /// Build market data from a bare close series, deriving a default set of
    /// return/momentum/volatility features.
    pub fn from_closes(closes: Vec<f64>) -> Result<Self> {
        let features = derive_features(&closes);
        Self::new(closes, features)
    }

    /// Number of steps in the series
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Width of each feature row
    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    /// Close price at a step
    pub fn close(&self, step: usize) -> f64 {
        self.closes[step]
    }

    /// Full close series
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Feature row at a step
    pub fn features(&self, step: usize) -> &[f32] {
        &self.features[step]
    }
}

/// Width of the feature rows produced by [`derive_features`].
pub const DERIVED_FEATURE_WIDTH: usize = 5;

/// Derive simple technical features from a close series: normalized price,
/// 1-step return, 5-step momentum, 10-step volatility, and a 14-step
/// RSI-style oscillator. All values are finite by construction.
fn derive_features(closes: &[f64]) -> Vec<Vec<f32>> {
    let base = closes.first().copied().unwrap_or(1.0);
    let mut rows = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        let close = closes[i];

        let ret_1 = if i >= 1 {
            (close / closes[i - 1] - 1.0) as f32
        } else {
            0.0
        };
        let momentum_5 = if i >= 5 {
            (close / closes[i - 5] - 1.0) as f32
        } else {
            0.0
        };

        let vol_10 = if i >= 10 {
            let window = &closes[i - 10..i];
            let rets: Vec<f64> = window
                .windows(2)
                .map(|w| w[1] / w[0] - 1.0)
                .collect();
            let mean = rets.iter().sum::<f64>() / rets.len() as f64;
            let var = rets.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rets.len() as f64;
            var.sqrt() as f32
        } else {
            0.0
        };

        let rsi_14 = if i >= 14 {
            let window = &closes[i - 14..=i];
            let mut gains = 0.0;
            let mut losses = 0.0;
            for w in window.windows(2) {
                let delta = w[1] - w[0];
                if delta >= 0.0 {
                    gains += delta;
                } else {
                    losses -= delta;
                }
            }
            if gains + losses > 0.0 {
                (gains / (gains + losses)) as f32
            } else {
                0.5
            }
        } else {
            0.5
        };

        rows.push(vec![
            (close / base - 1.0) as f32,
            ret_1,
            momentum_5,
            vol_10,
            rsi_14,
        ]);
    }

    rows
}

/// Synthetic series configuration
#[derive(Debug, Clone)]
pub struct SeriesConfig {
    /// Initial close price
    pub initial_price: f64,
    /// Per-step return volatility (std dev)
    pub volatility: f64,
    /// Mean reversion strength (0 = random walk)
    pub mean_reversion: f64,
    /// Long-term mean price
    pub mean_price: f64,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            initial_price: 100.0,
            volatility: 0.01,
            mean_reversion: 0.05,
            mean_price: 100.0,
        }
    }
}

/// Generate a synthetic mean-reverting close series and derived features,
/// for training and tests without an external data source.
pub fn generate_series(config: &SeriesConfig, len: usize) -> Result<MarketData> {
    let mut rng = rand::thread_rng();
    let mut closes = Vec::with_capacity(len);
    let mut price = config.initial_price;

    for _ in 0..len {
        closes.push(price);

        // Box-Muller transform for a standard normal sample
        let u1: f64 = rng.gen_range(0.0001..1.0);
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();

        let random_return = z * config.volatility;
        let reversion = config.mean_reversion * (config.mean_price / price - 1.0);
        price = (price * (1.0 + random_return + reversion)).max(config.initial_price * 0.01);
    }

    MarketData::from_closes(closes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_length_mismatch() {
        let closes = vec![1.0, 2.0, 3.0];
        let features = vec![vec![0.0f32]; 2];
        assert!(MarketData::new(closes, features).is_err());
    }

    #[test]
    fn test_rejects_ragged_feature_rows() {
        let closes = vec![1.0, 2.0];
        let features = vec![vec![0.0f32, 1.0], vec![0.0f32]];
        assert!(MarketData::new(closes, features).is_err());
    }

    #[test]
    fn test_rejects_nan_feature() {
        let closes = vec![1.0, 2.0];
        let features = vec![vec![0.0f32], vec![f32::NAN]];
        assert!(MarketData::new(closes, features).is_err());
    }

    #[test]
    fn test_rejects_non_positive_close() {
        let closes = vec![1.0, 0.0];
        let features = vec![vec![0.0f32], vec![0.0f32]];
        assert!(MarketData::new(closes, features).is_err());
    }

    #[test]
    fn test_derived_features_are_finite() {
        let closes: Vec<f64> = (1..100).map(|i| 100.0 + (i as f64).sin() * 5.0).collect();
        let data = MarketData::from_closes(closes).unwrap();

        assert_eq!(data.feature_width(), DERIVED_FEATURE_WIDTH);
        for step in 0..data.len() {
            assert!(data.features(step).iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_generate_series_shape() {
        let data = generate_series(&SeriesConfig::default(), 200).unwrap();
        assert_eq!(data.len(), 200);
        assert!(data.close(0) > 0.0);
        assert!(data.close(199) > 0.0);
    }
}
