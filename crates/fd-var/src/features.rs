//! Feature pipeline - merges raw price and volatility-index series into the
//! per-date feature records consumed by every VaR model.
//!
//! Features:
//! - `return`: log return `ln(P_t) - ln(P_{t-1})`
//! - `realized_vol`: rolling sample standard deviation of returns × `sqrt(252)`
//! - `vol_index_normalized`: raw index / 100
//! - `vol_index_change`: first difference of the raw index
//! - `vol_index_lagged`: normalized index shifted by exactly one period
//!
//! The lagged index is the only view of the indicator a model may use to
//! forecast the current period.

use crate::{Result, VarConfig, VarError};
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;

/// Column names of the merged feature table.
pub mod columns {
    /// Observation date
    pub const DATE: &str = "date";
    /// Raw asset price
    pub const PRICE: &str = "price";
    /// Raw volatility index level
    pub const VOL_INDEX: &str = "vol_index";
    /// Log return
    pub const RETURN: &str = "return";
    /// Annualized realized volatility
    pub const REALIZED_VOL: &str = "realized_vol";
    /// Volatility index as a fraction
    pub const VOL_INDEX_NORMALIZED: &str = "vol_index_normalized";
    /// First difference of the raw index
    pub const VOL_INDEX_CHANGE: &str = "vol_index_change";
    /// Normalized index from the previous period
    pub const VOL_INDEX_LAGGED: &str = "vol_index_lagged";

    /// Every column of the feature table, in output order.
    pub const ALL: [&str; 8] = [
        DATE,
        PRICE,
        VOL_INDEX,
        RETURN,
        REALIZED_VOL,
        VOL_INDEX_NORMALIZED,
        VOL_INDEX_CHANGE,
        VOL_INDEX_LAGGED,
    ];
}

use columns::*;

/// A raw `(date, value)` series read from one input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    /// Observation dates
    pub dates: Vec<NaiveDate>,
    /// Observed values; `None` where the source cell was empty
    pub values: Vec<Option<f64>>,
}

impl TimeSeries {
    /// Create a series from parallel date and value vectors.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        Self { dates, values }
    }

    /// Read a series from a CSV file with a header row.
    pub fn read_csv(path: impl AsRef<Path>, date_column: &str, value_column: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VarError::FileNotFound(path.to_path_buf()));
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        let series = Self::from_dataframe(&df, date_column, value_column)?;
        tracing::info!(path = %path.display(), rows = series.len(), "loaded input series");
        Ok(series)
    }

    /// Extract a series from a DataFrame, sorted by date.
    ///
    /// Both columns must exist. Values are cast to `f64`; `NaN` is treated
    /// as missing.
    pub fn from_dataframe(df: &DataFrame, date_column: &str, value_column: &str) -> Result<Self> {
        for name in [date_column, value_column] {
            if df.column(name).is_err() {
                return Err(VarError::MissingColumn(name.to_string()));
            }
        }

        let raw_dates = df.column(date_column)?.cast(&DataType::String)?;
        let dates = raw_dates
            .str()?
            .into_iter()
            .map(|d| parse_date(d.unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;

        let raw_values = df.column(value_column)?.cast(&DataType::Float64)?;
        let values = raw_values
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect::<Vec<_>>();

        let mut points: Vec<_> = dates.into_iter().zip(values).collect();
        points.sort_by_key(|(date, _)| *date);
        let (dates, values) = points.into_iter().unzip();
        Ok(Self { dates, values })
    }

    /// DataFrame with columns `date` and `value_name`.
    pub fn to_dataframe(&self, value_name: &str) -> Result<DataFrame> {
        let dates: Vec<String> = self.dates.iter().map(ToString::to_string).collect();
        Ok(DataFrame::new(vec![
            Column::new(DATE.into(), dates),
            Column::new(value_name.into(), self.values.clone()),
        ])?)
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.split(['T', ' ']).next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| VarError::InvalidDate(raw.to_string()))
}

/// Merged feature records, one per date, stored column-wise.
///
/// Built once per run and shared read-only by every model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    /// Observation dates, ascending
    pub dates: Vec<NaiveDate>,
    /// Raw asset price
    pub price: Vec<Option<f64>>,
    /// Raw volatility index level
    pub vol_index: Vec<Option<f64>>,
    /// Log return
    pub returns: Vec<Option<f64>>,
    /// Annualized realized volatility
    pub realized_vol: Vec<Option<f64>>,
    /// Volatility index as a fraction
    pub vol_index_normalized: Vec<Option<f64>>,
    /// First difference of the raw index
    pub vol_index_change: Vec<Option<f64>>,
    /// Normalized index from the previous period
    pub vol_index_lagged: Vec<Option<f64>>,
}

impl FeatureFrame {
    /// Build a frame from already-derived model inputs.
    ///
    /// Raw price and index columns are left empty; the lagged index is
    /// derived from `vol_index_normalized`.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        returns: Vec<Option<f64>>,
        realized_vol: Vec<Option<f64>>,
        vol_index_normalized: Vec<Option<f64>>,
    ) -> Self {
        let n = dates.len();
        debug_assert!(returns.len() == n && realized_vol.len() == n);
        debug_assert_eq!(vol_index_normalized.len(), n);
        let vol_index_lagged = lag_one(&vol_index_normalized);
        Self {
            dates,
            price: vec![None; n],
            vol_index: vec![None; n],
            returns,
            realized_vol,
            vol_index_normalized,
            vol_index_change: vec![None; n],
            vol_index_lagged,
        }
    }

    /// Read a frame back from the feature table layout.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        for name in columns::ALL {
            if df.column(name).is_err() {
                return Err(VarError::MissingColumn(name.to_string()));
            }
        }
        let dates = df
            .column(DATE)?
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|d| parse_date(d.unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            dates,
            price: float_column(df, PRICE)?,
            vol_index: float_column(df, VOL_INDEX)?,
            returns: float_column(df, RETURN)?,
            realized_vol: float_column(df, REALIZED_VOL)?,
            vol_index_normalized: float_column(df, VOL_INDEX_NORMALIZED)?,
            vol_index_change: float_column(df, VOL_INDEX_CHANGE)?,
            vol_index_lagged: float_column(df, VOL_INDEX_LAGGED)?,
        })
    }

    /// Read a feature table written by [`FeatureFrame::to_dataframe`].
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VarError::FileNotFound(path.to_path_buf()));
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Self::from_dataframe(&df)
    }

    /// The feature table with the columns in [`columns::ALL`].
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self.dates.iter().map(ToString::to_string).collect();
        Ok(DataFrame::new(vec![
            Column::new(DATE.into(), dates),
            Column::new(PRICE.into(), self.price.clone()),
            Column::new(VOL_INDEX.into(), self.vol_index.clone()),
            Column::new(RETURN.into(), self.returns.clone()),
            Column::new(REALIZED_VOL.into(), self.realized_vol.clone()),
            Column::new(VOL_INDEX_NORMALIZED.into(), self.vol_index_normalized.clone()),
            Column::new(VOL_INDEX_CHANGE.into(), self.vol_index_change.clone()),
            Column::new(VOL_INDEX_LAGGED.into(), self.vol_index_lagged.clone()),
        ])?)
    }

    /// Number of feature records.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the frame has no records.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// First and last date, if any.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

fn lag_one(values: &[Option<f64>]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(values.iter().copied())
        .take(values.len())
        .collect()
}

/// Counts of non-fatal data-quality findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DataQualityReport {
    /// Dates appearing more than once (each repeat counted)
    pub duplicate_dates: usize,
    /// Negative volatility index values
    pub negative_vol_index: usize,
    /// Returns whose magnitude exceeds the implausibility threshold
    pub extreme_returns: usize,
}

impl DataQualityReport {
    /// Inspect a feature frame.
    pub fn assess(frame: &FeatureFrame, extreme_return_threshold: f64) -> Self {
        let duplicate_dates = frame.dates.windows(2).filter(|w| w[0] == w[1]).count();
        let negative_vol_index = frame
            .vol_index_normalized
            .iter()
            .flatten()
            .filter(|v| **v < 0.0)
            .count();
        let extreme_returns = frame
            .returns
            .iter()
            .flatten()
            .filter(|r| r.abs() > extreme_return_threshold)
            .count();
        Self {
            duplicate_dates,
            negative_vol_index,
            extreme_returns,
        }
    }

    /// Total number of findings.
    pub const fn total(&self) -> usize {
        self.duplicate_dates + self.negative_vol_index + self.extreme_returns
    }

    /// Emit one warning per finding category.
    pub fn log(&self) {
        if self.duplicate_dates > 0 {
            tracing::warn!(count = self.duplicate_dates, "duplicate dates in feature data");
        }
        if self.negative_vol_index > 0 {
            tracing::warn!(count = self.negative_vol_index, "negative volatility index values");
        }
        if self.extreme_returns > 0 {
            tracing::warn!(count = self.extreme_returns, "implausibly large returns");
        }
        if self.total() > 0 {
            tracing::warn!(total = self.total(), "data quality check found issues; results may be affected");
        }
    }
}

/// Merge the raw inputs and derive every feature.
///
/// Inner-joins on date, drops rows with a missing price or index, drops the
/// first row (no return), then derives the feature columns. Data-quality
/// findings are logged and returned, never fatal.
pub fn build_features(
    prices: &TimeSeries,
    vol_index: &TimeSeries,
    config: &VarConfig,
) -> Result<(FeatureFrame, DataQualityReport)> {
    let window = config.realized_vol_window;
    let annualization = config.annualization_factor();

    let merged = prices
        .to_dataframe(PRICE)?
        .lazy()
        .join(
            vol_index.to_dataframe(VOL_INDEX)?.lazy(),
            [col(DATE)],
            [col(DATE)],
            JoinArgs::new(JoinType::Inner),
        )
        .filter(col(PRICE).is_not_null().and(col(VOL_INDEX).is_not_null()))
        .sort([DATE], SortMultipleOptions::default().with_maintain_order(true))
        .collect()?;
    tracing::info!(rows = merged.height(), "merged price and volatility index on date");
    if merged.height() == 0 {
        return Err(VarError::EmptyData("merging price and volatility index".into()));
    }

    let features = merged
        .lazy()
        .with_column(
            (col(PRICE).log(std::f64::consts::E)
                - col(PRICE).shift(lit(1)).log(std::f64::consts::E))
            .alias(RETURN),
        )
        .filter(col(RETURN).is_not_null())
        .with_columns([
            (col(RETURN).rolling_std(RollingOptionsFixedWindow {
                window_size: window,
                min_periods: window,
                ..Default::default()
            }) * lit(annualization))
            .alias(REALIZED_VOL),
            (col(VOL_INDEX) / lit(config.vol_index_scale)).alias(VOL_INDEX_NORMALIZED),
            (col(VOL_INDEX) - col(VOL_INDEX).shift(lit(1))).alias(VOL_INDEX_CHANGE),
        ])
        .with_column(col(VOL_INDEX_NORMALIZED).shift(lit(1)).alias(VOL_INDEX_LAGGED))
        .select(columns::ALL.map(col))
        .collect()?;
    if features.height() == 0 {
        return Err(VarError::EmptyData("computing returns".into()));
    }

    let frame = FeatureFrame::from_dataframe(&features)?;
    tracing::info!(rows = frame.len(), realized_vol_window = window, "feature records ready");

    let quality = DataQualityReport::assess(&frame, config.extreme_return_threshold);
    quality.log();
    Ok((frame, quality))
}
