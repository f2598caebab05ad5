//! VaR models - three competing one-day-ahead forecasters.
//!
//! Every model plugs a per-point estimator into the shared rolling engine.
//! Models differ only in how they turn a trailing window of feature records
//! into a loss threshold.

pub mod historical;
pub mod monte_carlo;
pub mod vol_regression;

pub use historical::HistoricalVar;
pub use monte_carlo::MonteCarloVar;
pub use vol_regression::VolRegressionVar;

use crate::{
    FeatureFrame, Result, VarConfig, VarError,
    config::{WindowSpec, validate_confidence_levels},
    rolling::{ForecastSeries, PointEstimate, rolling_forecast},
};
use std::sync::Arc;

/// A rolling-window VaR forecaster.
///
/// Implementors supply the numeric core in [`VarModel::estimate_point`];
/// parameter validation and the rolling loop are provided.
pub trait VarModel: Send + Sync + std::fmt::Debug {
    /// Stable identifier used in result tables (e.g. `Historical`).
    fn name(&self) -> &str;

    /// Human-readable description of the method.
    fn description(&self) -> &str;

    /// Feature columns the estimator reads.
    fn required_columns(&self) -> &[&str];

    /// Estimate VaR at `index` from history strictly before it.
    ///
    /// Must only read records in `[index - window, index)`, plus the lagged
    /// index at `index` for models that use it.
    fn estimate_point(
        &self,
        features: &FeatureFrame,
        index: usize,
        window: usize,
        confidence_levels: &[f64],
    ) -> PointEstimate;

    /// Model-specific parameter checks run before any computation.
    fn validate(&self, _confidence_levels: &[f64]) -> Result<()> {
        Ok(())
    }

    /// Forecasts for a single rolling window.
    fn forecast_window(
        &self,
        features: &FeatureFrame,
        window: &WindowSpec,
        confidence_levels: &[f64],
    ) -> Result<ForecastSeries> {
        validate_model_inputs(features.len(), std::slice::from_ref(window), confidence_levels)?;
        self.validate(confidence_levels)?;

        let series = rolling_forecast(&features.dates, window, confidence_levels, |i, levels| {
            self.estimate_point(features, i, window.size, levels)
        });
        tracing::info!(
            model = self.name(),
            window = %window.label,
            size = window.size,
            forecasts = series.len(),
            skipped = series.skipped.total(),
            "generated VaR forecasts"
        );
        Ok(series)
    }

    /// Forecasts for every window. All parameters are validated up front.
    fn forecast(
        &self,
        features: &FeatureFrame,
        windows: &[WindowSpec],
        confidence_levels: &[f64],
    ) -> Result<ModelForecasts> {
        validate_model_inputs(features.len(), windows, confidence_levels)?;
        self.validate(confidence_levels)?;

        let series = windows
            .iter()
            .map(|window| self.forecast_window(features, window, confidence_levels))
            .collect::<Result<Vec<_>>>()?;
        Ok(ModelForecasts {
            model: self.name().to_string(),
            series,
        })
    }
}

/// All window forecasts of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecasts {
    /// Model name
    pub model: String,
    /// One series per window, in configuration order
    pub series: Vec<ForecastSeries>,
}

/// Check windows and confidence levels against the data length.
pub fn validate_model_inputs(
    data_len: usize,
    windows: &[WindowSpec],
    confidence_levels: &[f64],
) -> Result<()> {
    for window in windows {
        if window.size == 0 {
            return Err(VarError::InvalidWindow {
                label: window.label.clone(),
                size: window.size,
            });
        }
        if window.size > data_len {
            return Err(VarError::WindowExceedsData {
                label: window.label.clone(),
                size: window.size,
                available: data_len,
            });
        }
    }
    validate_confidence_levels(confidence_levels)
}

/// Ordered collection of models to run.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Arc<dyn VarModel>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { models: Vec::new() }
    }

    /// Historical, Monte-Carlo and volatility-regression models configured
    /// from `config`.
    pub fn with_defaults(config: &VarConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(HistoricalVar::new()));
        registry.register(Arc::new(MonteCarloVar::new(config.monte_carlo.clone())));
        registry.register(Arc::new(VolRegressionVar::from_config(config)?));
        Ok(registry)
    }

    /// Append a model. A model with the same name is replaced in place.
    pub fn register(&mut self, model: Arc<dyn VarModel>) {
        match self.models.iter().position(|m| m.name() == model.name()) {
            Some(idx) => self.models[idx] = model,
            None => self.models.push(model),
        }
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn VarModel>> {
        self.models.iter().find(|m| m.name() == name).cloned()
    }

    /// Models in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn VarModel>> {
        self.models.iter()
    }

    /// Position of a model in registration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.models.iter().position(|m| m.name() == name)
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::synthetic_frame;
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_registry_defaults_in_canonical_order() {
        let registry = ModelRegistry::with_defaults(&VarConfig::default()).unwrap();
        let names: Vec<_> = registry.iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["Historical", "MonteCarlo", "VolRegression"]);
        assert_eq!(registry.position("VolRegression"), Some(2));
        assert!(registry.get("Unknown").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(HistoricalVar::new()));
        registry.register(Arc::new(HistoricalVar::new()));
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    #[case(WindowSpec::new("zero", 0))]
    #[case(WindowSpec::new("huge", 500))]
    fn test_invalid_windows_fail_before_computation(#[case] window: WindowSpec) {
        let frame = synthetic_frame(100, 1);
        let registry = ModelRegistry::with_defaults(&VarConfig::default()).unwrap();
        for model in registry.iter() {
            assert!(model.forecast(&frame, std::slice::from_ref(&window), &[0.95]).is_err());
        }
    }

    #[test]
    fn test_invalid_confidence_fails() {
        let frame = synthetic_frame(100, 1);
        let model = HistoricalVar::new();
        let err = model
            .forecast(&frame, &[WindowSpec::new("1m", 21)], &[0.95, 1.0])
            .unwrap_err();
        assert!(matches!(err, VarError::InvalidConfidence(_)));
    }

    #[test]
    fn test_var_99_never_below_var_95() {
        let frame = synthetic_frame(300, 42);
        let config = VarConfig::default();
        let registry = ModelRegistry::with_defaults(&config).unwrap();
        let windows = [WindowSpec::new("1m", 21), WindowSpec::new("3m", 63)];
        for model in registry.iter() {
            let forecasts = model.forecast(&frame, &windows, &[0.95, 0.99]).unwrap();
            for series in &forecasts.series {
                assert!(!series.is_empty(), "{} produced no forecasts", model.name());
                for row in &series.rows {
                    assert!(row.values[1] >= row.values[0], "{} at {}", model.name(), row.date);
                }
            }
        }
    }

    #[test]
    fn test_rows_plus_skips_for_every_model() {
        let mut frame = synthetic_frame(200, 3);
        frame.returns[50] = None;
        frame.realized_vol[120] = None;
        let registry = ModelRegistry::with_defaults(&VarConfig::default()).unwrap();
        let windows = [WindowSpec::new("1m", 21), WindowSpec::new("3m", 63)];
        for model in registry.iter() {
            let forecasts = model.forecast(&frame, &windows, &[0.95, 0.99]).unwrap();
            for series in &forecasts.series {
                assert_eq!(
                    series.len() + series.skipped.total(),
                    frame.len() - series.window.size
                );
            }
        }
    }
}
