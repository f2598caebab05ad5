//! Rolling-window forecast engine shared by every VaR model.
//!
//! The engine drives the index loop, counts skipped points and assembles the
//! output series. It never slices data itself: the estimator closure receives
//! the forecast index and must restrict itself to history before it.

use crate::{Result, VarError, config::WindowSpec};
use chrono::NaiveDate;
use derive_more::Display;
use polars::prelude::*;

/// Why a forecast point was not produced.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The estimation window contains a missing value
    #[display("missing data")]
    MissingData,
    /// The model's parameters or prediction are not usable
    #[display("invalid estimate")]
    InvalidEstimate,
}

/// Outcome of estimating one forecast point.
#[derive(Debug, Clone, PartialEq)]
pub enum PointEstimate {
    /// VaR magnitudes, one per confidence level in request order
    Forecast(Vec<f64>),
    /// No forecast for this point
    Skip(SkipReason),
}

/// Skipped points broken down by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SkipCounts {
    /// Windows with missing values
    pub missing_data: usize,
    /// Non-finite or otherwise unusable estimates
    pub invalid_estimate: usize,
}

impl SkipCounts {
    /// Total skipped points.
    pub const fn total(&self) -> usize {
        self.missing_data + self.invalid_estimate
    }

    fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingData => self.missing_data += 1,
            SkipReason::InvalidEstimate => self.invalid_estimate += 1,
        }
    }
}

/// One dated forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    /// Date being forecast
    pub date: NaiveDate,
    /// VaR per confidence level, aligned with [`ForecastSeries::confidence_levels`]
    pub values: Vec<f64>,
}

/// Forecasts of one model for one rolling window.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    /// Window the forecasts were estimated with
    pub window: WindowSpec,
    /// Confidence levels, in column order
    pub confidence_levels: Vec<f64>,
    /// Forecasts in date order
    pub rows: Vec<ForecastRow>,
    /// Points that produced no forecast
    pub skipped: SkipCounts,
}

impl ForecastSeries {
    /// Number of forecast rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no forecast was produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a confidence level among the forecast columns.
    pub fn level_index(&self, level: f64) -> Option<usize> {
        self.confidence_levels
            .iter()
            .position(|c| (c - level).abs() < 1e-9)
    }

    /// `(date, VaR)` pairs for one confidence level.
    pub fn series(&self, level: f64) -> Result<Vec<(NaiveDate, f64)>> {
        let idx = self
            .level_index(level)
            .ok_or_else(|| VarError::MissingForecast(var_column_name(level)))?;
        Ok(self.rows.iter().map(|r| (r.date, r.values[idx])).collect())
    }

    /// Table with a `date` column and one `VaR_<percent>` column per level.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self.rows.iter().map(|r| r.date.to_string()).collect();
        let mut columns = vec![Column::new("date".into(), dates)];
        for (idx, &level) in self.confidence_levels.iter().enumerate() {
            let values: Vec<f64> = self.rows.iter().map(|r| r.values[idx]).collect();
            columns.push(Column::new(var_column_name(level).into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Column name for a confidence level: `VaR_95`, `VaR_99`, `VaR_97.5`.
pub fn var_column_name(level: f64) -> String {
    let percent = level * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("VaR_{}", percent.round() as i64)
    } else {
        format!("VaR_{:.1}", percent)
    }
}

/// Values at positions `[index - size, index)`, or `None` if any is missing
/// or the window would start before the data.
pub fn trailing_window(values: &[Option<f64>], index: usize, size: usize) -> Option<Vec<f64>> {
    let start = index.checked_sub(size)?;
    values.get(start..index)?.iter().copied().collect()
}

/// Run an estimator over every point that has a full trailing window.
///
/// For each `i` in `window.size..dates.len()` the estimator is called with
/// `(i, confidence_levels)`. Skips are counted, never raised, and the output
/// may be empty. `rows + skipped == dates.len() - window.size` always holds.
pub fn rolling_forecast<F>(
    dates: &[NaiveDate],
    window: &WindowSpec,
    confidence_levels: &[f64],
    mut estimator: F,
) -> ForecastSeries
where
    F: FnMut(usize, &[f64]) -> PointEstimate,
{
    let mut rows = Vec::with_capacity(dates.len().saturating_sub(window.size));
    let mut skipped = SkipCounts::default();

    for (i, &date) in dates.iter().enumerate().skip(window.size) {
        match estimator(i, confidence_levels) {
            PointEstimate::Forecast(values) if values.len() == confidence_levels.len() => {
                rows.push(ForecastRow { date, values });
            }
            PointEstimate::Forecast(_) => skipped.record(SkipReason::InvalidEstimate),
            PointEstimate::Skip(reason) => skipped.record(reason),
        }
    }

    if skipped.total() > 0 {
        tracing::warn!(
            window = %window.label,
            missing_data = skipped.missing_data,
            invalid_estimate = skipped.invalid_estimate,
            "skipped forecasts due to invalid data"
        );
    }

    ForecastSeries {
        window: window.clone(),
        confidence_levels: confidence_levels.to_vec(),
        rows,
        skipped,
    }
}
