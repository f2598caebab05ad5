//! Kupiec unconditional-coverage (proportion of failures) test.
//!
//! A violation at `t` occurs when `r_t < -VaR_t`. With `x` violations in `n`
//! observations and expected rate `p0 = 1 - c`:
//!
//! `LR = -2 [ (n-x) ln(1-p0) + x ln(p0) - (n-x) ln(1-p̂) - x ln(p̂) ]`, `p̂ = x / n`
//!
//! `LR` is asymptotically χ²(1); its upper tail is `erfc(sqrt(LR / 2))`.
//! When `x = 0` or `x = n` the alternative likelihood is degenerate and the
//! test reports `LR = ∞`, `p = 0`.

use crate::{
    FeatureFrame, Result, VarConfig, VarError,
    models::ModelForecasts,
    rolling::{ForecastSeries, var_column_name},
};
use chrono::NaiveDate;
use serde::Serialize;
use statrs::function::erf::erfc;

/// Outcome of one Kupiec test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KupiecStatistic {
    /// Aligned observations `n`
    pub observations: usize,
    /// Violations `x`
    pub violations: usize,
    /// `n × (1 - c)`
    pub expected_violations: f64,
    /// `x / n`
    pub violation_rate: f64,
    /// Likelihood-ratio statistic
    pub lr_statistic: f64,
    /// Upper-tail χ²(1) probability of the statistic
    pub p_value: f64,
}

/// Likelihood-ratio test of `violations` out of `observations` against the
/// rate implied by `confidence_level`.
pub fn kupiec_statistic(
    violations: usize,
    observations: usize,
    confidence_level: f64,
) -> Result<KupiecStatistic> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(VarError::InvalidConfidence(confidence_level));
    }
    if observations == 0 {
        return Err(VarError::EmptyAlignment("Kupiec test".into()));
    }
    debug_assert!(violations <= observations);

    let n = observations as f64;
    let x = violations as f64;
    let p0 = 1.0 - confidence_level;

    let (lr_statistic, p_value) = if violations == 0 || violations == observations {
        (f64::INFINITY, 0.0)
    } else {
        let p_hat = x / n;
        let log_l0 = (n - x) * (1.0 - p0).ln() + x * p0.ln();
        let log_l1 = (n - x) * (1.0 - p_hat).ln() + x * p_hat.ln();
        let lr = (-2.0 * (log_l0 - log_l1)).max(0.0);
        (lr, erfc((lr / 2.0).sqrt()))
    };

    Ok(KupiecStatistic {
        observations,
        violations,
        expected_violations: n * p0,
        violation_rate: x / n,
        lr_statistic,
        p_value,
    })
}

/// Number of `(return, var)` pairs where the return breaches `-var`.
pub fn count_violations(pairs: &[(f64, f64)]) -> usize {
    pairs.iter().filter(|(r, var)| *r < -*var).count()
}

/// Pair each date's return with the VaR forecast for that date.
///
/// Both inputs are in ascending date order. Records sharing a date are paired
/// with that date's forecasts in order of appearance, one forecast each.
/// Pairs missing either value are dropped.
pub fn align_returns(features: &FeatureFrame, forecasts: &[(NaiveDate, f64)]) -> Vec<(f64, f64)> {
    let mut pairs = Vec::with_capacity(forecasts.len());
    let mut next = forecasts.iter().peekable();
    for (date, ret) in features.dates.iter().zip(&features.returns) {
        while next.next_if(|(d, _)| d < date).is_some() {}
        let Some(&(_, var)) = next.next_if(|(d, _)| d == date) else {
            continue;
        };
        if let Some(r) = ret.filter(|_| !var.is_nan()) {
            pairs.push((r, var));
        }
    }
    pairs
}

/// Test parameters shared by every combination in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KupiecSettings {
    /// Reject when the p-value falls below this level
    pub significance_level: f64,
    /// Smaller samples are tested but flagged in the log
    pub min_observations: usize,
}

impl Default for KupiecSettings {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            min_observations: 5,
        }
    }
}

impl From<&VarConfig> for KupiecSettings {
    fn from(config: &VarConfig) -> Self {
        Self {
            significance_level: config.significance_level,
            min_observations: config.min_backtest_observations,
        }
    }
}

/// Backtest of one (model, window, confidence level) combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    /// Model name
    pub model: String,
    /// Window label
    pub window: String,
    /// Window length in periods
    pub window_size: usize,
    /// Confidence level tested
    pub confidence_level: f64,
    /// Aligned observations
    pub observations: usize,
    /// Observed violations
    pub violations: usize,
    /// Expected violations under correct calibration
    pub expected_violations: f64,
    /// Observed violation frequency
    pub violation_rate: f64,
    /// Likelihood-ratio statistic
    pub lr_statistic: f64,
    /// p-value of the statistic
    pub p_value: f64,
    /// Whether calibration is rejected at the significance level
    pub reject: bool,
}

/// Kupiec test of one forecast series at one confidence level.
pub fn run_kupiec_test(
    features: &FeatureFrame,
    series: &ForecastSeries,
    confidence_level: f64,
    model: &str,
    settings: &KupiecSettings,
) -> Result<BacktestResult> {
    let forecasts = series.series(confidence_level)?;
    let pairs = align_returns(features, &forecasts);
    if pairs.is_empty() {
        return Err(VarError::EmptyAlignment(format!(
            "{model} {} {}",
            series.window.label,
            var_column_name(confidence_level)
        )));
    }

    let stat = kupiec_statistic(count_violations(&pairs), pairs.len(), confidence_level)?;
    if stat.observations < settings.min_observations {
        tracing::warn!(
            model,
            window = %series.window.label,
            confidence_level,
            observations = stat.observations,
            "too few observations for a reliable Kupiec test"
        );
    }
    let reject = stat.p_value < settings.significance_level;
    tracing::debug!(
        model,
        window = %series.window.label,
        confidence_level,
        violations = stat.violations,
        expected = stat.expected_violations,
        lr = stat.lr_statistic,
        p_value = stat.p_value,
        reject,
        "kupiec test"
    );

    Ok(BacktestResult {
        model: model.to_string(),
        window: series.window.label.clone(),
        window_size: series.window.size,
        confidence_level,
        observations: stat.observations,
        violations: stat.violations,
        expected_violations: stat.expected_violations,
        violation_rate: stat.violation_rate,
        lr_statistic: stat.lr_statistic,
        p_value: stat.p_value,
        reject,
    })
}

/// Kupiec tests for every window and confidence level of one model.
///
/// A failing combination is logged and left out; it never aborts the batch.
pub fn run_kupiec_batch(
    features: &FeatureFrame,
    forecasts: &ModelForecasts,
    confidence_levels: &[f64],
    settings: &KupiecSettings,
) -> Vec<BacktestResult> {
    let mut results = Vec::with_capacity(forecasts.series.len() * confidence_levels.len());
    for series in &forecasts.series {
        for &level in confidence_levels {
            match run_kupiec_test(features, series, level, &forecasts.model, settings) {
                Ok(result) => results.push(result),
                Err(err) => tracing::warn!(
                    model = %forecasts.model,
                    window = %series.window.label,
                    confidence_level = level,
                    error = %err,
                    "kupiec test failed; combination excluded"
                ),
            }
        }
    }
    results
}

/// Concatenate per-model results ordered by confidence level, then window
/// size, then model (input order).
pub fn combine_results(batches: Vec<Vec<BacktestResult>>) -> Result<Vec<BacktestResult>> {
    let mut combined: Vec<_> = batches.into_iter().flatten().collect();
    if combined.is_empty() {
        return Err(VarError::EmptyData("backtesting every model".into()));
    }
    combined.sort_by(|a, b| {
        a.confidence_level
            .total_cmp(&b.confidence_level)
            .then(a.window_size.cmp(&b.window_size))
    });
    Ok(combined)
}
