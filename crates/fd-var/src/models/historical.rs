//! Historical (empirical-quantile) VaR.
//!
//! VaR at confidence `c` is the negated `(1 - c)` quantile of the trailing
//! window of returns, with linear interpolation between order statistics.
//!
//! Formula: `VaR_c = -quantile(r[t-w..t), 1 - c)`

use crate::{
    FeatureFrame,
    features::columns,
    models::VarModel,
    rolling::{PointEstimate, SkipReason, trailing_window},
    stats::quantile_sorted,
};

/// Historical simulation VaR model.
///
/// Non-parametric: makes no assumption about the return distribution.
///
/// # Required Columns
/// - `return`: log return
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalVar;

impl HistoricalVar {
    /// Create a new historical VaR model.
    pub const fn new() -> Self {
        Self
    }
}

impl VarModel for HistoricalVar {
    fn name(&self) -> &str {
        "Historical"
    }

    fn description(&self) -> &str {
        "Empirical quantile of trailing returns (historical simulation)"
    }

    fn required_columns(&self) -> &[&str] {
        &[columns::RETURN]
    }

    fn estimate_point(
        &self,
        features: &FeatureFrame,
        index: usize,
        window: usize,
        confidence_levels: &[f64],
    ) -> PointEstimate {
        let Some(mut returns) = trailing_window(&features.returns, index, window) else {
            return PointEstimate::Skip(SkipReason::MissingData);
        };
        returns.sort_by(f64::total_cmp);

        let values: Vec<f64> = confidence_levels
            .iter()
            .map(|c| -quantile_sorted(&returns, 1.0 - c))
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
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use statrs::distribution::{ContinuousCDF, Normal};

    fn frame_from_returns(returns: Vec<Option<f64>>) -> FeatureFrame {
        let n = returns.len();
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        FeatureFrame::from_columns(
            (0..n as u64).map(|d| start + chrono::Days::new(d)).collect(),
            returns,
            vec![None; n],
            vec![None; n],
        )
    }

    #[test]
    fn test_historical_metadata() {
        let model = HistoricalVar::new();
        assert_eq!(model.name(), "Historical");
        assert_eq!(model.required_columns(), &["return"]);
    }

    #[test]
    fn test_point_uses_only_trailing_window() {
        // window [0, 5) holds -0.05..-0.01; index 5 is a huge loss that must not leak
        let frame = frame_from_returns(
            [-0.05, -0.04, -0.03, -0.02, -0.01, -0.90]
                .into_iter()
                .map(Some)
                .collect(),
        );
        let estimate = HistoricalVar::new().estimate_point(&frame, 5, 5, &[0.75]);
        // 25th percentile of the window: h = 4 * 0.25 = 1 -> -0.04
        assert_eq!(estimate, PointEstimate::Forecast(vec![0.04]));
    }

    #[test]
    fn test_missing_return_skips_window() {
        let mut returns: Vec<Option<f64>> = vec![Some(0.01); 10];
        returns[3] = None;
        let frame = frame_from_returns(returns);
        let model = HistoricalVar::new();
        assert_eq!(
            model.estimate_point(&frame, 5, 5, &[0.95]),
            PointEstimate::Skip(SkipReason::MissingData)
        );
        assert!(matches!(
            model.estimate_point(&frame, 9, 5, &[0.95]),
            PointEstimate::Forecast(_)
        ));
    }

    #[test]
    fn test_end_to_end_row_count_and_positivity() {
        let frame = synthetic_frame(300, 42);
        let series = HistoricalVar::new()
            .forecast_window(&frame, &WindowSpec::new("1m", 21), &[0.95, 0.99])
            .unwrap();
        assert_eq!(series.len(), 279);
        assert_eq!(series.skipped.total(), 0);
        for row in &series.rows {
            assert!(row.values.iter().all(|v| v.is_finite() && *v > 0.0));
        }
    }

    #[test]
    fn test_converges_to_theoretical_quantile() {
        // Stratified N(0, 0.02²) sample; its empirical quantile approaches the
        // analytic one as the sample grows.
        let normal = Normal::new(0.0, 0.02).unwrap();
        let theoretical = -normal.inverse_cdf(0.05);
        let mut errors = Vec::new();
        for n in [100_usize, 1_000, 10_000] {
            let mut returns: Vec<Option<f64>> = (0..n)
                .map(|i| Some(normal.inverse_cdf((i as f64 + 0.5) / n as f64)))
                .collect();
            returns.push(Some(0.0));
            let frame = frame_from_returns(returns);
            let PointEstimate::Forecast(values) =
                HistoricalVar::new().estimate_point(&frame, n, n, &[0.95])
            else {
                panic!("expected a forecast");
            };
            errors.push((values[0] - theoretical).abs());
        }
        assert!(errors[2] < errors[0]);
        assert_relative_eq!(errors[2], 0.0, epsilon = 1e-4);
    }
}
