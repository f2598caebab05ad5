//! Cross-model comparison and ranking of backtest results.
//!
//! Deviation measures how far observed violations sit from the calibrated
//! expectation; models are ranked on its absolute value within each
//! (window, confidence level) group.

use crate::{Result, backtest::BacktestResult};
use polars::prelude::*;
use serde::Serialize;

/// Backtest result augmented with deviation measures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    /// Model name
    pub model: String,
    /// Window label
    pub window: String,
    /// Window length in periods
    pub window_size: usize,
    /// Confidence level
    pub confidence_level: f64,
    /// Aligned observations
    pub observations: usize,
    /// Observed violations
    pub violations: usize,
    /// Expected violations
    pub expected_violations: f64,
    /// Observed violation frequency
    pub violation_rate: f64,
    /// `violations - expected`
    pub deviation: f64,
    /// Deviation as a percentage of expected violations
    pub deviation_pct: f64,
    /// `|deviation|`
    pub abs_deviation: f64,
    /// Kupiec p-value
    pub p_value: f64,
    /// Kupiec rejection
    pub reject: bool,
}

impl From<&BacktestResult> for ComparisonRow {
    fn from(result: &BacktestResult) -> Self {
        let deviation = result.violations as f64 - result.expected_violations;
        Self {
            model: result.model.clone(),
            window: result.window.clone(),
            window_size: result.window_size,
            confidence_level: result.confidence_level,
            observations: result.observations,
            violations: result.violations,
            expected_violations: result.expected_violations,
            violation_rate: result.violation_rate,
            deviation,
            deviation_pct: deviation / result.expected_violations * 100.0,
            abs_deviation: deviation.abs(),
            p_value: result.p_value,
            reject: result.reject,
        }
    }
}

/// Comparison rows in the order of `results`.
pub fn compare_models(results: &[BacktestResult]) -> Vec<ComparisonRow> {
    results.iter().map(ComparisonRow::from).collect()
}

/// Position of a model within its (window, confidence level) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    /// Model name
    pub model: String,
    /// Window label
    pub window: String,
    /// Confidence level
    pub confidence_level: f64,
    /// Observed violations
    pub violations: usize,
    /// Expected violations
    pub expected_violations: f64,
    /// `|violations - expected|`
    pub abs_deviation: f64,
    /// 1 is closest to calibration
    pub rank: usize,
}

/// Rank models within each (window, confidence level) group by absolute
/// deviation, ascending.
///
/// Groups appear in first-seen order. Ties keep their input order, so ranks
/// within a group are always exactly `1..=k`.
pub fn rank_models(rows: &[ComparisonRow]) -> Vec<RankingRow> {
    let mut groups: Vec<((&str, u64), Vec<&ComparisonRow>)> = Vec::new();
    for row in rows {
        let key = (row.window.as_str(), row.confidence_level.to_bits());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    groups
        .into_iter()
        .flat_map(|(_, mut members)| {
            members.sort_by(|a, b| a.abs_deviation.total_cmp(&b.abs_deviation));
            members
                .into_iter()
                .enumerate()
                .map(|(idx, row)| RankingRow {
                    model: row.model.clone(),
                    window: row.window.clone(),
                    confidence_level: row.confidence_level,
                    violations: row.violations,
                    expected_violations: row.expected_violations,
                    abs_deviation: row.abs_deviation,
                    rank: idx + 1,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// First-ranked model of every group.
pub fn best_models(rankings: &[RankingRow]) -> Vec<&RankingRow> {
    rankings.iter().filter(|r| r.rank == 1).collect()
}

/// Per-model aggregate across every window and confidence level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Model name
    pub model: String,
    /// Combinations tested
    pub tests: usize,
    /// Combinations where calibration was rejected
    pub rejections: usize,
    /// Sum of observed violations
    pub total_violations: usize,
    /// Sum of expected violations
    pub total_expected: f64,
    /// Sum of aligned observations
    pub total_observations: usize,
    /// `total_violations / total_observations`
    pub violation_rate: f64,
    /// Mean absolute deviation across combinations
    pub mean_abs_deviation: f64,
    /// Mean rank across groups
    pub average_rank: f64,
}

/// Aggregate comparison and ranking tables per model, in first-seen order.
pub fn summarize_models(rows: &[ComparisonRow], rankings: &[RankingRow]) -> Vec<ModelSummary> {
    let mut models: Vec<&str> = Vec::new();
    for row in rows {
        if !models.contains(&row.model.as_str()) {
            models.push(&row.model);
        }
    }

    models
        .into_iter()
        .map(|model| {
            let own: Vec<_> = rows.iter().filter(|r| r.model == model).collect();
            let ranks: Vec<_> = rankings
                .iter()
                .filter(|r| r.model == model)
                .map(|r| r.rank as f64)
                .collect();
            let total_violations = own.iter().map(|r| r.violations).sum();
            let total_observations = own.iter().map(|r| r.observations).sum();
            ModelSummary {
                model: model.to_string(),
                tests: own.len(),
                rejections: own.iter().filter(|r| r.reject).count(),
                total_violations,
                total_expected: own.iter().map(|r| r.expected_violations).sum(),
                total_observations,
                violation_rate: total_violations as f64 / total_observations as f64,
                mean_abs_deviation: own.iter().map(|r| r.abs_deviation).sum::<f64>()
                    / own.len() as f64,
                average_rank: ranks.iter().sum::<f64>() / ranks.len() as f64,
            }
        })
        .collect()
}

fn usize_column(name: &str, values: impl Iterator<Item = usize>) -> Column {
    Column::new(name.into(), values.map(|v| v as u64).collect::<Vec<u64>>())
}

/// Backtest results as a table.
pub fn results_frame(results: &[BacktestResult]) -> Result<DataFrame> {
    let columns = vec![
        Column::new("model".into(), results.iter().map(|r| r.model.as_str()).collect::<Vec<_>>()),
        Column::new("window".into(), results.iter().map(|r| r.window.as_str()).collect::<Vec<_>>()),
        usize_column("window_size", results.iter().map(|r| r.window_size)),
        Column::new(
            "confidence_level".into(),
            results.iter().map(|r| r.confidence_level).collect::<Vec<_>>(),
        ),
        usize_column("observations", results.iter().map(|r| r.observations)),
        usize_column("violations", results.iter().map(|r| r.violations)),
        Column::new(
            "expected_violations".into(),
            results.iter().map(|r| r.expected_violations).collect::<Vec<_>>(),
        ),
        Column::new(
            "violation_rate".into(),
            results.iter().map(|r| r.violation_rate).collect::<Vec<_>>(),
        ),
        Column::new(
            "lr_statistic".into(),
            results.iter().map(|r| r.lr_statistic).collect::<Vec<_>>(),
        ),
        Column::new("p_value".into(), results.iter().map(|r| r.p_value).collect::<Vec<_>>()),
        Column::new("reject".into(), results.iter().map(|r| r.reject).collect::<Vec<_>>()),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Comparison rows as a table.
pub fn comparison_frame(rows: &[ComparisonRow]) -> Result<DataFrame> {
    let columns = vec![
        Column::new("model".into(), rows.iter().map(|r| r.model.as_str()).collect::<Vec<_>>()),
        Column::new("window".into(), rows.iter().map(|r| r.window.as_str()).collect::<Vec<_>>()),
        Column::new(
            "confidence_level".into(),
            rows.iter().map(|r| r.confidence_level).collect::<Vec<_>>(),
        ),
        usize_column("observations", rows.iter().map(|r| r.observations)),
        usize_column("violations", rows.iter().map(|r| r.violations)),
        Column::new(
            "expected_violations".into(),
            rows.iter().map(|r| r.expected_violations).collect::<Vec<_>>(),
        ),
        Column::new(
            "violation_rate".into(),
            rows.iter().map(|r| r.violation_rate).collect::<Vec<_>>(),
        ),
        Column::new("deviation".into(), rows.iter().map(|r| r.deviation).collect::<Vec<_>>()),
        Column::new(
            "deviation_pct".into(),
            rows.iter().map(|r| r.deviation_pct).collect::<Vec<_>>(),
        ),
        Column::new(
            "abs_deviation".into(),
            rows.iter().map(|r| r.abs_deviation).collect::<Vec<_>>(),
        ),
        Column::new("p_value".into(), rows.iter().map(|r| r.p_value).collect::<Vec<_>>()),
        Column::new("reject".into(), rows.iter().map(|r| r.reject).collect::<Vec<_>>()),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Rankings as a table.
pub fn rankings_frame(rankings: &[RankingRow]) -> Result<DataFrame> {
    let columns = vec![
        Column::new("model".into(), rankings.iter().map(|r| r.model.as_str()).collect::<Vec<_>>()),
        Column::new(
            "window".into(),
            rankings.iter().map(|r| r.window.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "confidence_level".into(),
            rankings.iter().map(|r| r.confidence_level).collect::<Vec<_>>(),
        ),
        usize_column("violations", rankings.iter().map(|r| r.violations)),
        Column::new(
            "expected_violations".into(),
            rankings.iter().map(|r| r.expected_violations).collect::<Vec<_>>(),
        ),
        Column::new(
            "abs_deviation".into(),
            rankings.iter().map(|r| r.abs_deviation).collect::<Vec<_>>(),
        ),
        usize_column("rank", rankings.iter().map(|r| r.rank)),
    ];
    Ok(DataFrame::new(columns)?)
}
