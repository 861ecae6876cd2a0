//! Report and chart generation.

mod generator;
mod plots;

pub use generator::{AnalysisReport, ReportGenerator, ReportPaths, render_summary, write_csv};
pub use plots::PlotGenerator;
