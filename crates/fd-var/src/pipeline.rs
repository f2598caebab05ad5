//! End-to-end run: features, forecasts for every model, backtests, and
//! comparison tables.

use crate::{
    FeatureFrame, Result, VarConfig,
    backtest::{
        BacktestResult, ComparisonRow, KupiecSettings, ModelSummary, RankingRow, combine_results,
        compare_models, rank_models, run_kupiec_batch, summarize_models,
    },
    features::{DataQualityReport, TimeSeries, build_features},
    models::{ModelForecasts, ModelRegistry},
    output::{ResultsLayout, write_backtest_tables, write_features, write_forecasts, write_json},
    rolling::SkipCounts,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

/// Read both raw inputs and build the feature table.
pub fn load_features(
    prices_path: impl AsRef<Path>,
    vol_index_path: impl AsRef<Path>,
    config: &VarConfig,
) -> Result<(FeatureFrame, DataQualityReport)> {
    let input = &config.input;
    let prices = TimeSeries::read_csv(prices_path, &input.date, &input.price)?;
    let vol_index = TimeSeries::read_csv(vol_index_path, &input.date, &input.vol_index)?;
    tracing::info!(
        prices = prices.len(),
        vol_index = vol_index.len(),
        "loaded raw inputs"
    );
    build_features(&prices, &vol_index, config)
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Data-quality findings on the feature table
    pub quality: DataQualityReport,
    /// Forecasts per model, in registry order
    pub forecasts: Vec<ModelForecasts>,
    /// Backtest results ordered by confidence level, window size, model
    pub results: Vec<BacktestResult>,
    /// Results with deviation measures
    pub comparison: Vec<ComparisonRow>,
    /// Ranks within each (window, confidence level) group
    pub rankings: Vec<RankingRow>,
    /// Per-model aggregates
    pub summaries: Vec<ModelSummary>,
}

/// Forecast and backtest every registered model on `features`.
///
/// Parameter errors abort before any model runs. Individual backtest
/// combinations that fail are excluded; the run fails only if none succeed.
pub fn run_pipeline(
    features: &FeatureFrame,
    quality: DataQualityReport,
    registry: &ModelRegistry,
    config: &VarConfig,
) -> Result<RunReport> {
    config.validate()?;
    let settings = KupiecSettings::from(config);

    let mut forecasts = Vec::with_capacity(registry.len());
    let mut batches = Vec::with_capacity(registry.len());
    for model in registry.iter() {
        let model_forecasts = model.forecast(features, &config.windows, &config.confidence_levels)?;
        batches.push(run_kupiec_batch(
            features,
            &model_forecasts,
            &config.confidence_levels,
            &settings,
        ));
        forecasts.push(model_forecasts);
    }

    let results = combine_results(batches)?;
    let comparison = compare_models(&results);
    let rankings = rank_models(&comparison);
    let summaries = summarize_models(&comparison, &rankings);
    tracing::info!(
        models = registry.len(),
        tests = results.len(),
        rejections = results.iter().filter(|r| r.reject).count(),
        "backtesting complete"
    );

    Ok(RunReport {
        quality,
        forecasts,
        results,
        comparison,
        rankings,
        summaries,
    })
}

/// Forecast row and skip counts of one (model, window) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    /// Model name
    pub model: String,
    /// Window label
    pub window: String,
    /// Forecast rows produced
    pub rows: usize,
    /// Points skipped
    pub skipped: SkipCounts,
}

/// Machine-readable run summary written as `run_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    /// Crate version that produced the run
    pub version: &'a str,
    /// Effective configuration
    pub config: &'a VarConfig,
    /// Feature records
    pub feature_rows: usize,
    /// First and last feature date
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Data-quality findings
    pub quality: DataQualityReport,
    /// Per-forecast accounting
    pub forecasts: Vec<ForecastSummary>,
    /// Per-model aggregates
    pub models: &'a [ModelSummary],
}

impl<'a> RunSummary<'a> {
    /// Summarize a completed run.
    pub fn new(config: &'a VarConfig, features: &FeatureFrame, report: &'a RunReport) -> Self {
        let forecasts = report
            .forecasts
            .iter()
            .flat_map(|f| {
                f.series.iter().map(|s| ForecastSummary {
                    model: f.model.clone(),
                    window: s.window.label.clone(),
                    rows: s.len(),
                    skipped: s.skipped,
                })
            })
            .collect();
        Self {
            version: crate::VERSION,
            config,
            feature_rows: features.len(),
            date_range: features.date_range(),
            quality: report.quality,
            forecasts,
            models: &report.summaries,
        }
    }
}

/// Persist every artifact of a run under `layout`.
pub fn write_report(
    layout: &ResultsLayout,
    config: &VarConfig,
    features: &FeatureFrame,
    report: &RunReport,
) -> Result<()> {
    layout.ensure()?;
    write_features(layout, features)?;
    for model in &report.forecasts {
        for series in &model.series {
            write_forecasts(layout, &model.model, series)?;
        }
    }
    write_backtest_tables(layout, &report.results, &report.comparison, &report.rankings)?;
    write_json(&RunSummary::new(config, features, report), layout.summary_path())?;
    tracing::info!(root = %layout.root().display(), "results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowSpec;
    use crate::models::test_support::synthetic_frame;

    fn small_config() -> VarConfig {
        VarConfig {
            windows: vec![WindowSpec::new("1m", 21), WindowSpec::new("3m", 63)],
            monte_carlo: crate::config::MonteCarloConfig {
                simulations: 5_000,
                seed: 7,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_pipeline_covers_every_combination() {
        let config = small_config();
        let frame = synthetic_frame(300, 11);
        let registry = ModelRegistry::with_defaults(&config).unwrap();
        let report =
            run_pipeline(&frame, DataQualityReport::default(), &registry, &config).unwrap();

        assert_eq!(report.forecasts.len(), 3);
        // 3 models x 2 windows x 2 levels
        assert_eq!(report.results.len(), 12);
        assert_eq!(report.comparison.len(), 12);
        assert_eq!(report.rankings.len(), 12);
        assert_eq!(report.summaries.len(), 3);
        assert!(
            report
                .results
                .windows(2)
                .all(|w| w[0].confidence_level <= w[1].confidence_level)
        );
        assert_eq!(report.results[0].model, "Historical");
    }

    #[test]
    fn test_window_longer_than_data_aborts() {
        let config = VarConfig {
            windows: vec![WindowSpec::new("12m", 252)],
            ..small_config()
        };
        let frame = synthetic_frame(100, 11);
        let registry = ModelRegistry::with_defaults(&config).unwrap();
        assert!(run_pipeline(&frame, DataQualityReport::default(), &registry, &config).is_err());
    }

    #[test]
    fn test_summary_counts_forecasts() {
        let config = small_config();
        let frame = synthetic_frame(200, 5);
        let registry = ModelRegistry::with_defaults(&config).unwrap();
        let report =
            run_pipeline(&frame, DataQualityReport::default(), &registry, &config).unwrap();
        let summary = RunSummary::new(&config, &frame, &report);
        assert_eq!(summary.forecasts.len(), 6);
        for f in &summary.forecasts {
            let size = if f.window == "1m" { 21 } else { 63 };
            assert_eq!(f.rows + f.skipped.total(), 200 - size);
        }
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"feature_rows\":200"));
    }
}
