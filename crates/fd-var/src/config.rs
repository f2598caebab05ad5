//! Run configuration.
//!
//! Every run receives an explicit [`VarConfig`] value. Defaults reproduce the
//! standard study setup: four rolling windows from one month to one year,
//! 95% and 99% confidence, and a seeded Monte-Carlo draw set.

use crate::{Result, VarError};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::path::Path;

/// A labelled rolling estimation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Short label used in artifact names (e.g. `1m`)
    pub label: String,
    /// Window length in periods
    pub size: usize,
}

impl WindowSpec {
    /// Create a new window specification.
    pub fn new(label: impl Into<String>, size: usize) -> Self {
        Self {
            label: label.into(),
            size,
        }
    }
}

/// Default rolling windows: 1, 3, 6 and 12 months of trading days.
pub fn default_windows() -> Vec<WindowSpec> {
    vec![
        WindowSpec::new("1m", 21),
        WindowSpec::new("3m", 63),
        WindowSpec::new("6m", 126),
        WindowSpec::new("12m", 252),
    ]
}

/// Monte-Carlo simulation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Number of standard-normal draws (default: 100,000)
    pub simulations: usize,
    /// Seed for the draw set (default: 42)
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            simulations: 100_000,
            seed: 42,
        }
    }
}

/// Column names expected in the two raw input files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputColumns {
    /// Timestamp column present in both files
    pub date: String,
    /// Asset price column
    pub price: String,
    /// Volatility index level column
    pub vol_index: String,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            price: "price".to_string(),
            vol_index: "vol_index".to_string(),
        }
    }
}

/// Configuration for a complete forecasting and backtesting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarConfig {
    /// Rolling estimation windows, in output order
    pub windows: Vec<WindowSpec>,
    /// Confidence levels for VaR forecasts
    pub confidence_levels: Vec<f64>,
    /// Significance level for the Kupiec test (default: 0.05)
    pub significance_level: f64,
    /// Monte-Carlo simulation parameters
    pub monte_carlo: MonteCarloConfig,
    /// Trailing window for realized volatility (default: 21)
    pub realized_vol_window: usize,
    /// Trading periods per year used for annualization (default: 252)
    pub trading_periods_per_year: usize,
    /// Divisor that turns the raw volatility index into a fraction (default: 100)
    pub vol_index_scale: f64,
    /// Absolute log return above which a return is flagged as implausible (default: 0.5)
    pub extreme_return_threshold: f64,
    /// Backtests with fewer aligned observations log a small-sample warning (default: 5)
    pub min_backtest_observations: usize,
    /// Input file column names
    pub input: InputColumns,
}

impl Default for VarConfig {
    fn default() -> Self {
        Self {
            windows: default_windows(),
            confidence_levels: vec![0.95, 0.99],
            significance_level: 0.05,
            monte_carlo: MonteCarloConfig::default(),
            realized_vol_window: 21,
            trading_periods_per_year: 252,
            vol_index_scale: 100.0,
            extreme_return_threshold: 0.5,
            min_backtest_observations: 5,
            input: InputColumns::default(),
        }
    }
}

impl VarConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VarError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every parameter that does not depend on the data.
    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            return Err(VarError::Config("at least one rolling window is required".into()));
        }
        for window in &self.windows {
            if window.size == 0 {
                return Err(VarError::InvalidWindow {
                    label: window.label.clone(),
                    size: window.size,
                });
            }
        }
        if self.confidence_levels.is_empty() {
            return Err(VarError::Config("at least one confidence level is required".into()));
        }
        validate_confidence_levels(&self.confidence_levels)?;
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(VarError::Config(format!(
                "significance level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        if self.monte_carlo.simulations == 0 {
            return Err(VarError::Config("simulation count must be positive".into()));
        }
        if self.realized_vol_window < 2 {
            return Err(VarError::Config(format!(
                "realized volatility window must be at least 2, got {}",
                self.realized_vol_window
            )));
        }
        if self.trading_periods_per_year == 0 {
            return Err(VarError::Config("trading periods per year must be positive".into()));
        }
        if !(self.vol_index_scale.is_finite() && self.vol_index_scale > 0.0) {
            return Err(VarError::Config(format!(
                "volatility index scale must be positive, got {}",
                self.vol_index_scale
            )));
        }
        Ok(())
    }

    /// Square root of the annualization factor.
    pub fn annualization_factor(&self) -> f64 {
        (self.trading_periods_per_year as f64).sqrt()
    }

    /// Z-scores for the configured confidence levels.
    pub fn z_scores(&self) -> Result<ZScoreTable> {
        ZScoreTable::from_levels(&self.confidence_levels)
    }
}

/// Reject any confidence level outside the open interval (0, 1).
pub fn validate_confidence_levels(levels: &[f64]) -> Result<()> {
    match levels.iter().find(|&&c| !(c > 0.0 && c < 1.0)) {
        Some(&c) => Err(VarError::InvalidConfidence(c)),
        None => Ok(()),
    }
}

/// Ordered mapping from confidence level to standard-normal quantile.
#[derive(Debug, Clone, PartialEq)]
pub struct ZScoreTable {
    entries: Vec<(f64, f64)>,
}

impl Default for ZScoreTable {
    fn default() -> Self {
        Self {
            entries: vec![(0.95, 1.644_853_626_951_472_2), (0.99, 2.326_347_874_040_840_8)],
        }
    }
}

impl ZScoreTable {
    const TOLERANCE: f64 = 1e-9;

    /// Tabulate `Φ⁻¹(c)` for each confidence level.
    pub fn from_levels(levels: &[f64]) -> Result<Self> {
        validate_confidence_levels(levels)?;
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| VarError::Config(format!("standard normal: {e}")))?;
        let entries = levels.iter().map(|&c| (c, normal.inverse_cdf(c))).collect();
        Ok(Self { entries })
    }

    /// Z-score for a confidence level, if tabulated.
    pub fn get(&self, level: f64) -> Option<f64> {
        self.entries
            .iter()
            .find(|(c, _)| (c - level).abs() < Self::TOLERANCE)
            .map(|&(_, z)| z)
    }

    /// Z-score for a confidence level, or [`VarError::MissingZScore`].
    pub fn require(&self, level: f64) -> Result<f64> {
        self.get(level).ok_or(VarError::MissingZScore(level))
    }

    /// Tabulated `(confidence, z)` pairs in insertion order.
    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        let config = VarConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.windows.len(), 4);
        assert_eq!(config.windows[3], WindowSpec::new("12m", 252));
        assert_eq!(config.monte_carlo.simulations, 100_000);
        assert_eq!(config.monte_carlo.seed, 42);
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.5)]
    #[case(1.5)]
    fn test_rejects_confidence_outside_unit_interval(#[case] level: f64) {
        let config = VarConfig {
            confidence_levels: vec![0.95, level],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VarError::InvalidConfidence(c)) if c == level));
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = VarConfig {
            windows: vec![WindowSpec::new("bad", 0)],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VarError::InvalidWindow { size: 0, .. })));
    }

    #[test]
    fn test_toml_partial_override() {
        let toml = r#"
            confidence_levels = [0.9, 0.975]
            significance_level = 0.01

            [[windows]]
            label = "2w"
            size = 10

            [monte_carlo]
            seed = 7
        "#;
        let config: VarConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.windows, vec![WindowSpec::new("2w", 10)]);
        assert_eq!(config.confidence_levels, vec![0.9, 0.975]);
        assert_eq!(config.monte_carlo.seed, 7);
        assert_eq!(config.monte_carlo.simulations, 100_000);
        assert_eq!(config.realized_vol_window, 21);
    }

    #[test]
    fn test_toml_round_trip_preserves_defaults() {
        let config = VarConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: VarConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_z_scores_match_tabulated_defaults() {
        let computed = ZScoreTable::from_levels(&[0.95, 0.99]).unwrap();
        let tabulated = ZScoreTable::default();
        for &(level, z) in tabulated.entries() {
            assert_relative_eq!(computed.require(level).unwrap(), z, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_missing_z_score() {
        let table = ZScoreTable::default();
        assert!(matches!(table.require(0.9), Err(VarError::MissingZScore(_))));
        assert!(table.get(0.95).is_some());
    }
}
