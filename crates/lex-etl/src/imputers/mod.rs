//! Imputation of missing values.
//!
//! Numeric columns take the median, mean or zero; categorical columns take
//! their mode or a constant sentinel; boolean columns take their mode.

mod statistical;

pub use statistical::StatisticalImputer;
