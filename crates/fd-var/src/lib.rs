#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/var/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backtest;
pub mod config;
pub mod error;
pub mod features;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod rolling;
pub mod stats;

// Re-export core types
pub use backtest::{BacktestResult, ComparisonRow, ModelSummary, RankingRow};
pub use config::{VarConfig, WindowSpec, ZScoreTable};
pub use error::{Result, VarError};
pub use features::{DataQualityReport, FeatureFrame, TimeSeries, build_features};
pub use models::{HistoricalVar, ModelRegistry, MonteCarloVar, VarModel, VolRegressionVar};
pub use output::ResultsLayout;
pub use pipeline::{RunReport, load_features, run_pipeline, write_report};
pub use rolling::{ForecastSeries, PointEstimate, SkipReason};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
