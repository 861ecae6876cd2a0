//! Chart rendering.
//!
//! Charts are written as SVG so rendering needs no system fonts.

use crate::analyzer::correlations;
use crate::error::{EtlError, Result};
use crate::types::CorrelationMatrix;
use crate::utils::{
    ColumnKind, column_kind, numeric_values, sanitize_identifier, value_frequencies,
};
use plotters::prelude::*;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CHART_SIZE: (u32, u32) = (800, 600);
const HEATMAP_SIZE: (u32, u32) = (900, 800);
const MAX_HISTOGRAM_BINS: usize = 30;

/// Renders histograms, bar charts and a correlation heatmap for a table.
#[derive(Debug, Clone)]
pub struct PlotGenerator {
    output_dir: PathBuf,
    max_categories: usize,
}

impl PlotGenerator {
    /// `max_categories` is the largest number of distinct values a
    /// categorical column may have and still get a bar chart.
    pub fn new(output_dir: impl Into<PathBuf>, max_categories: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_categories,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render every applicable chart and return how many were written.
    ///
    /// A chart that fails to render is logged and skipped. Numeric columns
    /// without values and categorical columns that are empty or have too
    /// many distinct values get no chart.
    pub fn generate_plots(&self, df: &DataFrame, name: &str) -> Result<usize> {
        fs::create_dir_all(&self.output_dir).map_err(|e| EtlError::PlotFailed {
            plot: self.output_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let prefix = sanitize_identifier(name);
        let mut generated = 0;

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let column = series.name().to_string();
            let slug = sanitize_identifier(&column);

            match column_kind(series) {
                ColumnKind::Numeric => {
                    let values = numeric_values(series)?;
                    if values.is_empty() {
                        debug!("Skipping histogram for '{}': no values", column);
                        continue;
                    }
                    let path = self
                        .output_dir
                        .join(format!("{prefix}_{slug}_histogram.svg"));
                    generated += attempt(&path, || render_histogram(&path, &column, &values));
                }
                ColumnKind::Categorical => {
                    let frequencies = value_frequencies(series)?;
                    if frequencies.is_empty() || frequencies.len() > self.max_categories {
                        debug!(
                            "Skipping bar chart for '{}': {} distinct values",
                            column,
                            frequencies.len()
                        );
                        continue;
                    }
                    let path = self.output_dir.join(format!("{prefix}_{slug}_bar.svg"));
                    generated += attempt(&path, || render_bar_chart(&path, &column, &frequencies));
                }
                ColumnKind::Boolean => {}
            }
        }

        if let Some(matrix) = correlations(df)? {
            let path = self
                .output_dir
                .join(format!("{prefix}_correlation_heatmap.svg"));
            generated += attempt(&path, || render_heatmap(&path, &matrix));
        }

        info!(
            "Generated {} plots in {}",
            generated,
            self.output_dir.display()
        );
        Ok(generated)
    }
}

fn attempt(path: &Path, render: impl FnOnce() -> anyhow::Result<()>) -> usize {
    match render() {
        Ok(()) => {
            debug!("Saved {}", path.display());
            1
        }
        Err(e) => {
            let error = EtlError::PlotFailed {
                plot: path.display().to_string(),
                reason: format!("{e:#}"),
            };
            warn!("{}", error);
            0
        }
    }
}

/// Sturges' rule, capped.
fn histogram_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    ((n as f64).log2().ceil() as usize + 1).clamp(1, MAX_HISTOGRAM_BINS)
}

fn render_histogram(path: &Path, column: &str, values: &[f64]) -> anyhow::Result<()> {
    let (mut min, mut max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if min == max {
        min -= 0.5;
        max += 0.5;
    }

    let bins = histogram_bins(values.len());
    let width = (max - min) / bins as f64;
    let mut counts = vec![0u32; bins];
    for value in values {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let y_max = counts.iter().copied().max().unwrap_or(0) + 1;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Distribution of {column}"), ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(min..max, 0u32..y_max)?;
    chart
        .configure_mesh()
        .x_desc(column)
        .y_desc("Frequency")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, count)| {
        let x0 = min + i as f64 * width;
        Rectangle::new([(x0, 0), (x0 + width, *count)], BLUE.mix(0.6).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn render_bar_chart(
    path: &Path,
    column: &str,
    frequencies: &[(String, usize)],
) -> anyhow::Result<()> {
    let n = frequencies.len() as i32;
    let y_max = frequencies
        .iter()
        .map(|(_, count)| *count as u32)
        .max()
        .unwrap_or(0)
        + 1;
    let label = |x: &i32| {
        usize::try_from(*x)
            .ok()
            .and_then(|idx| frequencies.get(idx))
            .map(|(value, _)| value.clone())
            .unwrap_or_default()
    };

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Value counts of {column}"), ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(50)
        .build_cartesian_2d(0i32..n, 0u32..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(frequencies.len() + 1)
        .x_label_formatter(&label)
        .x_desc(column)
        .y_desc("Count")
        .draw()?;

    chart.draw_series(frequencies.iter().enumerate().map(|(i, (_, count))| {
        let x = i as i32;
        let mut bar = Rectangle::new(
            [(x, 0), (x + 1, *count as u32)],
            GREEN.mix(0.6).filled(),
        );
        bar.set_margin(0, 0, 5, 5);
        bar
    }))?;

    root.present()?;
    Ok(())
}

fn render_heatmap(path: &Path, matrix: &CorrelationMatrix) -> anyhow::Result<()> {
    let n = matrix.columns.len() as i32;
    let column_at = |idx: i32| {
        usize::try_from(idx)
            .ok()
            .and_then(|i| matrix.columns.get(i))
            .cloned()
            .unwrap_or_default()
    };
    // first column at the top
    let x_label = |x: &i32| column_at(*x);
    let y_label = |y: &i32| column_at(n - 1 - *y);

    let root = SVGBackend::new(path, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation matrix", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(80)
        .y_label_area_size(120)
        .build_cartesian_2d(0i32..n, 0i32..n)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(matrix.columns.len() + 1)
        .y_labels(matrix.columns.len() + 1)
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .draw()?;

    chart.draw_series(matrix.values.iter().enumerate().flat_map(|(i, row)| {
        let y = n - 1 - i as i32;
        row.iter().enumerate().map(move |(j, value)| {
            let x = j as i32;
            Rectangle::new([(x, y), (x + 1, y + 1)], correlation_color(*value).filled())
        })
    }))?;

    root.present()?;
    Ok(())
}

/// Blue for -1, white for 0, red for +1, grey when undefined.
fn correlation_color(value: Option<f64>) -> RGBColor {
    match value {
        None => RGBColor(200, 200, 200),
        Some(v) => {
            let v = v.clamp(-1.0, 1.0);
            let fade = (255.0 * (1.0 - v.abs())).round() as u8;
            if v >= 0.0 {
                RGBColor(255, fade, fade)
            } else {
                RGBColor(fade, fade, 255)
            }
        }
    }
}
