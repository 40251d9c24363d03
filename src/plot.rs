//! SVG bar charts of the results table.
//!
//! One chart per fingerprint and correlation method, written to
//! `<directory>/<fingerprint>/<method>.svg`. Datasets form the groups, one
//! bar per spectral similarity measure, bar height is the mean correlation
//! over iterations (NaN values are skipped).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::color::ColorMap;
use crate::error::{Error, Result};
use crate::experiment::{CorrelationMethod, ResultRow};

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_TOP: f64 = 40.0;
const PLOT_HEIGHT: f64 = 300.0;
const LABEL_SPACE: f64 = 180.0;
const LEGEND_WIDTH: f64 = 220.0;
const BAR_WIDTH: f64 = 14.0;
const GROUP_GAP: f64 = 18.0;

/// Mean of the finite values, `None` when there are none.
fn finite_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    (!finite.is_empty()).then(|| finite.iter().sum::<f64>() / finite.len() as f64)
}

fn first_seen<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render one chart. `means` maps `(dataset, measure)` to the bar height.
fn render_chart(
    title: &str,
    datasets: &[&str],
    measures: &[&str],
    means: &BTreeMap<(&str, &str), f64>,
) -> String {
    let colors = ColorMap::new(measures.iter().copied());
    let group_width = measures.len() as f64 * BAR_WIDTH + GROUP_GAP;
    let plot_width = datasets.len() as f64 * group_width + GROUP_GAP;
    let width = MARGIN_LEFT + plot_width + LEGEND_WIDTH;
    let height = MARGIN_TOP + PLOT_HEIGHT + LABEL_SPACE;
    // Correlations live in [-1, 1]; zero sits mid-plot.
    let y = |value: f64| MARGIN_TOP + (1.0 - value.clamp(-1.0, 1.0)) / 2.0 * PLOT_HEIGHT;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" font-family="sans-serif" font-size="11">"#
    ));
    svg.push_str(&format!(
        r#"<text x="{:.1}" y="20" font-size="14" text-anchor="middle">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        escape(title)
    ));

    // Horizontal grid with tick labels
    for tick in [-1.0, -0.5, 0.0, 0.5, 1.0] {
        let ty = y(tick);
        let stroke = if tick == 0.0 { "#000000" } else { "#dddddd" };
        svg.push_str(&format!(
            r#"<line x1="{MARGIN_LEFT:.1}" y1="{ty:.1}" x2="{:.1}" y2="{ty:.1}" stroke="{stroke}"/>"#,
            MARGIN_LEFT + plot_width
        ));
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{tick:.1}</text>"#,
            MARGIN_LEFT - 6.0,
            ty + 4.0
        ));
    }

    // One group of bars per dataset
    for (g, dataset) in datasets.iter().enumerate() {
        let group_x = MARGIN_LEFT + GROUP_GAP + g as f64 * group_width;
        for (m, measure) in measures.iter().enumerate() {
            let Some(&mean) = means.get(&(*dataset, *measure)) else {
                continue;
            };
            let x = group_x + m as f64 * BAR_WIDTH;
            let (top, bottom) = if mean >= 0.0 { (y(mean), y(0.0)) } else { (y(0.0), y(mean)) };
            svg.push_str(&format!(
                r#"<rect x="{x:.1}" y="{top:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}: {mean:.4}</title></rect>"#,
                BAR_WIDTH - 1.0,
                bottom - top,
                colors.color_for(measure),
                escape(measure)
            ));
        }
        let label_x = group_x + measures.len() as f64 * BAR_WIDTH / 2.0;
        let label_y = MARGIN_TOP + PLOT_HEIGHT + 12.0;
        svg.push_str(&format!(
            r#"<text x="{label_x:.1}" y="{label_y:.1}" text-anchor="end" transform="rotate(-40 {label_x:.1} {label_y:.1})">{}</text>"#,
            escape(dataset)
        ));
    }

    // Legend
    let legend_x = MARGIN_LEFT + plot_width + 20.0;
    for (i, (measure, color)) in colors.legend_entries().into_iter().enumerate() {
        let ly = MARGIN_TOP + i as f64 * 18.0;
        svg.push_str(&format!(
            r#"<rect x="{legend_x:.1}" y="{ly:.1}" width="12" height="12" fill="{color}"/>"#
        ));
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}">{}</text>"#,
            legend_x + 18.0,
            ly + 10.0,
            escape(measure)
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

/// Write every chart under `directory`, returning the written paths.
pub fn render_bar_charts(rows: &[ResultRow], directory: &Path) -> Result<Vec<PathBuf>> {
    let fingerprints = first_seen(rows.iter().map(|r| r.fingerprint.as_str()));
    let datasets = first_seen(rows.iter().map(|r| r.dataset.as_str()));
    let measures = first_seen(rows.iter().map(|r| r.spectral_similarity.as_str()));

    let mut written = Vec::new();
    for fingerprint in &fingerprints {
        let chart_dir = directory.join(fingerprint);
        fs::create_dir_all(&chart_dir).map_err(|e| Error::io(&chart_dir, e))?;

        for method in CorrelationMethod::ALL {
            let mut samples: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
            for row in rows
                .iter()
                .filter(|r| r.fingerprint == *fingerprint && r.correlation_method == method)
            {
                samples
                    .entry((row.dataset.as_str(), row.spectral_similarity.as_str()))
                    .or_default()
                    .push(row.correlation);
            }
            let means: BTreeMap<(&str, &str), f64> = samples
                .into_iter()
                .filter_map(|(key, values)| finite_mean(&values).map(|mean| (key, mean)))
                .collect();

            let title = format!("{fingerprint}: {method} correlation");
            let svg = render_chart(&title, &datasets, &measures, &means);
            let path = chart_dir.join(format!("{method}.svg"));
            fs::write(&path, svg).map_err(|e| Error::io(&path, e))?;
            written.push(path);
        }
    }
    log::info!("wrote {} charts to {}", written.len(), directory.display());
    Ok(written)
}
