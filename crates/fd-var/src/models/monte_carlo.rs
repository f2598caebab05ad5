//! Monte-Carlo (parametric normal simulation) VaR.
//!
//! Mean `μ` and Bessel-corrected standard deviation `σ` are estimated on the
//! trailing window, returns are simulated as `μ + σ·z` from a fixed seeded
//! draw set, and VaR is the negated `(1 - c)` quantile of the simulation.
//!
//! The draw set is generated once per model and shared by every point and
//! window, so forecasts are reproducible for a given seed.

use crate::{
    FeatureFrame, Result, VarError,
    config::MonteCarloConfig,
    features::columns,
    models::VarModel,
    rolling::{PointEstimate, SkipReason, trailing_window},
    stats::quantile_sorted,
};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};
use statrs::statistics::Statistics;

/// Monte-Carlo VaR model.
///
/// # Required Columns
/// - `return`: log return
pub struct MonteCarloVar {
    config: MonteCarloConfig,
    /// Standard-normal draws, sorted ascending
    draws: Vec<f64>,
}

impl std::fmt::Debug for MonteCarloVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonteCarloVar")
            .field("config", &self.config)
            .field("draws", &self.draws.len())
            .finish()
    }
}

impl Default for MonteCarloVar {
    fn default() -> Self {
        Self::new(MonteCarloConfig::default())
    }
}

impl MonteCarloVar {
    /// Create a model and generate its draw set.
    pub fn new(config: MonteCarloConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut draws: Vec<f64> = Distribution::<f64>::sample_iter(StandardNormal, &mut rng)
            .take(config.simulations)
            .collect();
        draws.sort_by(f64::total_cmp);
        Self { config, draws }
    }

    /// Simulation parameters.
    pub const fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Sample quantile of the standard-normal draws.
    pub fn draw_quantile(&self, q: f64) -> f64 {
        quantile_sorted(&self.draws, q)
    }
}

impl VarModel for MonteCarloVar {
    fn name(&self) -> &str {
        "MonteCarlo"
    }

    fn description(&self) -> &str {
        "Quantile of simulated N(mu, sigma^2) returns estimated on the trailing window"
    }

    fn required_columns(&self) -> &[&str] {
        &[columns::RETURN]
    }

    fn validate(&self, _confidence_levels: &[f64]) -> Result<()> {
        if self.draws.is_empty() {
            return Err(VarError::Config("simulation count must be positive".into()));
        }
        Ok(())
    }

    fn estimate_point(
        &self,
        features: &FeatureFrame,
        index: usize,
        window: usize,
        confidence_levels: &[f64],
    ) -> PointEstimate {
        let Some(returns) = trailing_window(&features.returns, index, window) else {
            return PointEstimate::Skip(SkipReason::MissingData);
        };
        let mu = returns.iter().mean();
        if !mu.is_finite() {
            return PointEstimate::Skip(SkipReason::InvalidEstimate);
        }
        let sigma = returns.iter().std_dev();

        // Zero volatility collapses every simulated return onto μ.
        if !sigma.is_finite() || sigma == 0.0 {
            return PointEstimate::Forecast(vec![-mu; confidence_levels.len()]);
        }

        // μ + σ·z is increasing in z, so its quantile is μ + σ·quantile(z).
        let values: Vec<f64> = confidence_levels
            .iter()
            .map(|c| -(mu + sigma * self.draw_quantile(1.0 - c)))
            .collect();
        if values.iter().all(|v| v.is_finite()) {
            PointEstimate::Forecast(values)
        } else {
            PointEstimate::Skip(SkipReason::InvalidEstimate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowSpec;
    use crate::models::test_support::synthetic_frame;
    use crate::stats::quantile;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn frame_from_returns(returns: Vec<f64>) -> FeatureFrame {
        let n = returns.len();
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        FeatureFrame::from_columns(
            (0..n as u64).map(|d| start + chrono::Days::new(d)).collect(),
            returns.into_iter().map(Some).collect(),
            vec![None; n],
            vec![None; n],
        )
    }

    fn small_model() -> MonteCarloVar {
        MonteCarloVar::new(MonteCarloConfig {
            simulations: 20_000,
            seed: 42,
        })
    }

    #[test]
    fn test_monte_carlo_metadata() {
        let model = MonteCarloVar::default();
        assert_eq!(model.name(), "MonteCarlo");
        assert_eq!(model.config().simulations, 100_000);
        assert_eq!(model.required_columns(), &["return"]);
    }

    #[test]
    fn test_same_seed_same_forecasts() {
        let frame = synthetic_frame(120, 9);
        let window = WindowSpec::new("1m", 21);
        let a = small_model().forecast_window(&frame, &window, &[0.95, 0.99]).unwrap();
        let b = small_model().forecast_window(&frame, &window, &[0.95, 0.99]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_matches_quantile_of_explicit_simulation() {
        let model = small_model();
        let returns = vec![0.01, -0.02, 0.015, -0.005, 0.003, -0.012, 0.007, 0.0];
        let frame = frame_from_returns([returns.clone(), vec![0.0]].concat());

        let mu = returns.iter().mean();
        let sigma = returns.iter().std_dev();
        let sims: Vec<f64> = model.draws.iter().map(|z| mu + sigma * z).collect();

        let PointEstimate::Forecast(values) = model.estimate_point(&frame, 8, 8, &[0.95, 0.99])
        else {
            panic!("expected a forecast");
        };
        assert_relative_eq!(values[0], -quantile(&sims, 0.05), epsilon = 1e-12);
        assert_relative_eq!(values[1], -quantile(&sims, 0.01), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_volatility_returns_negated_mean() {
        let frame = frame_from_returns(vec![0.125; 6]);
        let estimate = small_model().estimate_point(&frame, 5, 5, &[0.95, 0.99]);
        assert_eq!(estimate, PointEstimate::Forecast(vec![-0.125, -0.125]));
    }

    #[test]
    fn test_single_observation_window_is_degenerate() {
        let frame = frame_from_returns(vec![-0.03, 0.0]);
        let estimate = small_model().estimate_point(&frame, 1, 1, &[0.95]);
        assert_eq!(estimate, PointEstimate::Forecast(vec![0.03]));
    }

    #[test]
    fn test_non_finite_mean_is_skipped() {
        let frame = frame_from_returns(vec![f64::INFINITY, 0.01, 0.02, 0.0]);
        assert_eq!(
            small_model().estimate_point(&frame, 3, 3, &[0.95]),
            PointEstimate::Skip(SkipReason::InvalidEstimate)
        );
    }

    #[test]
    fn test_empty_draw_set_is_rejected() {
        let model = MonteCarloVar::new(MonteCarloConfig {
            simulations: 0,
            seed: 42,
        });
        let frame = synthetic_frame(60, 1);
        let err = model
            .forecast_window(&frame, &WindowSpec::new("1m", 21), &[0.95, 0.99])
            .unwrap_err();
        assert!(matches!(err, VarError::Config(_)));

        // called directly, the estimator skips rather than emitting NaN
        assert_eq!(
            model.estimate_point(&frame, 30, 21, &[0.95, 0.99]),
            PointEstimate::Skip(SkipReason::InvalidEstimate)
        );
    }

    #[test]
    fn test_end_to_end_row_count_and_positivity() {
        let frame = synthetic_frame(300, 42);
        let series = MonteCarloVar::default()
            .forecast_window(&frame, &WindowSpec::new("1m", 21), &[0.95, 0.99])
            .unwrap();
        assert_eq!(series.len(), 279);
        for row in &series.rows {
            assert!(row.values.iter().all(|v| v.is_finite() && *v > 0.0));
        }
    }
}
