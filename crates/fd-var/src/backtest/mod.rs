//! Backtesting of VaR forecasts against realized returns.

pub mod comparison;
pub mod kupiec;

pub use comparison::{
    ComparisonRow, ModelSummary, RankingRow, best_models, compare_models, comparison_frame,
    rank_models, rankings_frame, results_frame, summarize_models,
};
pub use kupiec::{
    BacktestResult, KupiecSettings, KupiecStatistic, align_returns, combine_results,
    count_violations, kupiec_statistic, run_kupiec_batch, run_kupiec_test,
};
