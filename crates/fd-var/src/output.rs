//! Results directory layout and artifact writers.

use crate::{
    FeatureFrame, Result,
    backtest::{
        BacktestResult, ComparisonRow, RankingRow, comparison_frame, rankings_frame,
        results_frame,
    },
    rolling::ForecastSeries,
};
use polars::prelude::*;
use serde::Serialize;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

/// Feature table file name.
pub const FEATURES_FILE: &str = "features.csv";
/// Combined backtest results file name.
pub const RESULTS_FILE: &str = "kupiec_results.csv";
/// Comparison table file name, under `comparisons/`.
pub const COMPARISON_FILE: &str = "model_comparison.csv";
/// Ranking table file name, under `comparisons/`.
pub const RANKINGS_FILE: &str = "model_rankings.csv";
/// Run summary file name.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Directory conventions under a results root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsLayout {
    root: PathBuf,
}

impl ResultsLayout {
    /// Layout rooted at `root`. Nothing is created until [`Self::ensure`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Results root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Comparison and ranking tables.
    pub fn comparisons(&self) -> PathBuf {
        self.root.join("comparisons")
    }

    /// Per-model forecast tables.
    pub fn var_forecasts(&self) -> PathBuf {
        self.root.join("var_forecasts")
    }

    /// Reserved for charts.
    pub fn figures(&self) -> PathBuf {
        self.root.join("figures")
    }

    /// Create the root and every subdirectory.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.comparisons(), self.var_forecasts(), self.figures()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path of the feature table.
    pub fn features_path(&self) -> PathBuf {
        self.root.join(FEATURES_FILE)
    }

    /// Path of one model's forecasts for one window.
    pub fn forecast_path(&self, model: &str, window: &str) -> PathBuf {
        self.var_forecasts().join(format!("{model}_{window}.csv"))
    }

    /// Path of the combined backtest table.
    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    /// Path of the comparison table.
    pub fn comparison_path(&self) -> PathBuf {
        self.comparisons().join(COMPARISON_FILE)
    }

    /// Path of the ranking table.
    pub fn rankings_path(&self) -> PathBuf {
        self.comparisons().join(RANKINGS_FILE)
    }

    /// Path of the JSON run summary.
    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }
}

/// Write a frame as comma-separated text with a header row.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    tracing::debug!(path = %path.display(), rows = df.height(), "wrote table");
    Ok(())
}

/// Write the feature table.
pub fn write_features(layout: &ResultsLayout, features: &FeatureFrame) -> Result<PathBuf> {
    let path = layout.features_path();
    write_csv(&mut features.to_dataframe()?, &path)?;
    Ok(path)
}

/// Write one forecast table.
pub fn write_forecasts(
    layout: &ResultsLayout,
    model: &str,
    series: &ForecastSeries,
) -> Result<PathBuf> {
    let path = layout.forecast_path(model, &series.window.label);
    write_csv(&mut series.to_dataframe()?, &path)?;
    Ok(path)
}

/// Write the combined backtest, comparison and ranking tables.
pub fn write_backtest_tables(
    layout: &ResultsLayout,
    results: &[BacktestResult],
    comparison: &[ComparisonRow],
    rankings: &[RankingRow],
) -> Result<()> {
    write_csv(&mut results_frame(results)?, layout.results_path())?;
    write_csv(&mut comparison_frame(comparison)?, layout.comparison_path())?;
    write_csv(&mut rankings_frame(rankings)?, layout.rankings_path())?;
    Ok(())
}

/// Serialize a value as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}
