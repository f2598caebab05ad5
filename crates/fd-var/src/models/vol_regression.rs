//! Volatility-regression VaR.
//!
//! At each forecast index `i`:
//! 1. Regress realized volatility on the normalized volatility index over the
//!    trailing window `[i - w, i)`.
//! 2. Evaluate the fitted line at the lagged index for `i`, which is the
//!    normalized index observed at `i - 1`.
//! 3. De-annualize: `σ_daily = σ_annual / sqrt(252)`.
//! 4. `VaR_c = z_c × σ_daily`.
//!
//! Evaluating at the lagged value keeps the forecast free of look-ahead: the
//! predictor is the most recent value known before period `i` opens.

use crate::{
    FeatureFrame, Result, VarConfig,
    config::ZScoreTable,
    features::columns,
    models::VarModel,
    rolling::{PointEstimate, SkipReason, trailing_window},
    stats::LinearFit,
};

/// Volatility-index regression VaR model.
///
/// # Required Columns
/// - `realized_vol`: annualized realized volatility (regression target)
/// - `vol_index_normalized`: normalized volatility index (regressor)
/// - `vol_index_lagged`: previous period's normalized index (predictor)
#[derive(Debug, Clone)]
pub struct VolRegressionVar {
    z_scores: ZScoreTable,
    trading_periods_per_year: usize,
}

impl Default for VolRegressionVar {
    fn default() -> Self {
        Self::new(ZScoreTable::default(), 252)
    }
}

impl VolRegressionVar {
    /// Create a model with an explicit z-score table.
    pub const fn new(z_scores: ZScoreTable, trading_periods_per_year: usize) -> Self {
        Self {
            z_scores,
            trading_periods_per_year,
        }
    }

    /// Z-scores for the configured confidence levels and the configured
    /// annualization.
    pub fn from_config(config: &VarConfig) -> Result<Self> {
        Ok(Self::new(config.z_scores()?, config.trading_periods_per_year))
    }

    /// Tabulated z-scores.
    pub const fn z_scores(&self) -> &ZScoreTable {
        &self.z_scores
    }

    /// Annualized volatility forecast for `index`, or why none exists.
    pub fn predict_volatility(
        &self,
        features: &FeatureFrame,
        index: usize,
        window: usize,
    ) -> std::result::Result<f64, SkipReason> {
        let x = trailing_window(&features.vol_index_normalized, index, window);
        let y = trailing_window(&features.realized_vol, index, window);
        let predictor = features.vol_index_lagged.get(index).copied().flatten();
        let (Some(x), Some(y), Some(predictor)) = (x, y, predictor) else {
            return Err(SkipReason::MissingData);
        };

        let fit = LinearFit::ols(&x, &y);
        let sigma_annual = fit.predict(predictor);
        if !fit.is_finite() || !sigma_annual.is_finite() || sigma_annual <= 0.0 {
            return Err(SkipReason::InvalidEstimate);
        }
        Ok(sigma_annual)
    }
}

impl VarModel for VolRegressionVar {
    fn name(&self) -> &str {
        "VolRegression"
    }

    fn description(&self) -> &str {
        "Normal VaR from realized volatility regressed on the lagged volatility index"
    }

    fn required_columns(&self) -> &[&str] {
        &[
            columns::REALIZED_VOL,
            columns::VOL_INDEX_NORMALIZED,
            columns::VOL_INDEX_LAGGED,
        ]
    }

    fn validate(&self, confidence_levels: &[f64]) -> Result<()> {
        for &level in confidence_levels {
            self.z_scores.require(level)?;
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
        let sigma_annual = match self.predict_volatility(features, index, window) {
            Ok(sigma) => sigma,
            Err(reason) => return PointEstimate::Skip(reason),
        };
        let sigma_daily = sigma_annual / (self.trading_periods_per_year as f64).sqrt();

        confidence_levels
            .iter()
            .map(|&c| self.z_scores.get(c).map(|z| z * sigma_daily))
            .collect::<Option<Vec<_>>>()
            .map_or(
                PointEstimate::Skip(SkipReason::InvalidEstimate),
                PointEstimate::Forecast,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VarError;
    use crate::config::WindowSpec;
    use crate::models::test_support::synthetic_frame;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n as u64).map(|d| start + chrono::Days::new(d)).collect()
    }

    /// Index oscillates; realized vol is exactly `0.2 + 2 × index`.
    fn linear_frame(n: usize) -> FeatureFrame {
        let index: Vec<f64> = (0..n).map(|i| 0.15 + 0.01 * (i % 7) as f64).collect();
        FeatureFrame::from_columns(
            dates(n),
            vec![Some(0.0); n],
            index.iter().map(|x| Some(0.2 + 2.0 * x)).collect(),
            index.iter().copied().map(Some).collect(),
        )
    }

    #[test]
    fn test_vol_regression_metadata() {
        let model = VolRegressionVar::default();
        assert_eq!(model.name(), "VolRegression");
        assert!(model.required_columns().contains(&"vol_index_lagged"));
    }

    #[test]
    fn test_forecast_uses_previous_period_index() {
        let frame = linear_frame(40);
        let model = VolRegressionVar::default();
        let z95 = model.z_scores().require(0.95).unwrap();
        for i in 10..40 {
            let PointEstimate::Forecast(values) = model.estimate_point(&frame, i, 10, &[0.95])
            else {
                panic!("expected a forecast at {i}");
            };
            let expected_annual = 0.2 + 2.0 * frame.vol_index_normalized[i - 1].unwrap();
            assert_relative_eq!(
                values[0],
                z95 * expected_annual / 252.0_f64.sqrt(),
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_no_look_ahead() {
        let frame = synthetic_frame(120, 17);
        let model = VolRegressionVar::default();
        let t = 80;
        let baseline = model.estimate_point(&frame, t, 21, &[0.95, 0.99]);

        // Perturb everything at or after t except the lagged value carried at t.
        let mut altered = frame.clone();
        for i in t..altered.len() {
            altered.returns[i] = Some(-0.5);
            altered.realized_vol[i] = Some(5.0);
            altered.vol_index_normalized[i] = Some(0.9);
            if i > t {
                altered.vol_index_lagged[i] = Some(0.9);
            }
        }
        assert_eq!(model.estimate_point(&altered, t, 21, &[0.95, 0.99]), baseline);

        // The lagged value itself does move the forecast.
        altered.vol_index_lagged[t] = Some(0.9);
        assert_ne!(model.estimate_point(&altered, t, 21, &[0.95, 0.99]), baseline);
    }

    #[test]
    fn test_missing_realized_vol_in_window_skips() {
        let mut frame = linear_frame(30);
        frame.realized_vol[12] = None;
        let model = VolRegressionVar::default();
        assert_eq!(
            model.estimate_point(&frame, 20, 10, &[0.95]),
            PointEstimate::Skip(SkipReason::MissingData)
        );
        assert!(matches!(
            model.estimate_point(&frame, 23, 10, &[0.95]),
            PointEstimate::Forecast(_)
        ));
    }

    #[test]
    fn test_missing_lagged_predictor_skips() {
        let mut frame = linear_frame(30);
        frame.vol_index_lagged[20] = None;
        assert_eq!(
            VolRegressionVar::default().estimate_point(&frame, 20, 10, &[0.95]),
            PointEstimate::Skip(SkipReason::MissingData)
        );
    }

    #[rstest]
    #[case(-2.0)]
    #[case(-0.2)]
    fn test_non_positive_prediction_skips(#[case] intercept: f64) {
        // negative intercept and shallow slope drive the prediction below zero
        let index: Vec<f64> = (0..30).map(|i| 0.1 + 0.01 * (i % 5) as f64).collect();
        let frame = FeatureFrame::from_columns(
            dates(30),
            vec![Some(0.0); 30],
            index.iter().map(|x| Some(intercept + 0.5 * x)).collect(),
            index.iter().copied().map(Some).collect(),
        );
        assert_eq!(
            VolRegressionVar::default().estimate_point(&frame, 20, 10, &[0.95]),
            PointEstimate::Skip(SkipReason::InvalidEstimate)
        );
    }

    #[test]
    fn test_constant_index_window_skips() {
        let n = 30;
        let frame = FeatureFrame::from_columns(
            dates(n),
            vec![Some(0.0); n],
            vec![Some(0.4); n],
            vec![Some(0.15); n],
        );
        assert_eq!(
            VolRegressionVar::default().estimate_point(&frame, 20, 10, &[0.95]),
            PointEstimate::Skip(SkipReason::InvalidEstimate)
        );
    }

    #[test]
    fn test_untabulated_level_fails_eagerly() {
        let frame = linear_frame(40);
        let err = VolRegressionVar::default()
            .forecast(&frame, &[WindowSpec::new("w", 10)], &[0.9])
            .unwrap_err();
        assert!(matches!(err, VarError::MissingZScore(_)));
    }

    #[test]
    fn test_from_config_tabulates_configured_levels() {
        let config = VarConfig {
            confidence_levels: vec![0.9, 0.975],
            ..Default::default()
        };
        let model = VolRegressionVar::from_config(&config).unwrap();
        assert!(model.validate(&[0.9, 0.975]).is_ok());
        assert_relative_eq!(model.z_scores().require(0.975).unwrap(), 1.959964, epsilon = 1e-5);
    }
}
