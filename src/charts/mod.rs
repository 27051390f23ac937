//! Per-metric chart generation from benchmark result CSVs.
//!
//! Each metric becomes one [`Chart`]: a title, axis labels and one series per
//! input file. Charts are rendered either to inline SVG ([`svg`]) or to a
//! Plotly figure description ([`interactive`]) and collected for the HTML
//! report.

use crate::dataset::{self, DatasetError};
use crate::schema::MetricsMetadata;
use crate::{ChartFormat, XScale};
use std::path::{Path, PathBuf};

pub mod interactive;
pub mod svg;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("rendering failed: {0}")]
    Render(String),
}

/// One result file and the legend label it is plotted under.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartInput {
    pub path: PathBuf,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub x_axis: String,
    /// Custom x-axis label; the x-axis column name is used when absent.
    pub x_label: Option<String>,
    pub x_scale: XScale,
    pub annotate_values: bool,
    pub format: ChartFormat,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            x_axis: "RBAC_POLICY_SIZE".to_string(),
            x_label: None,
            x_scale: XScale::Linear,
            annotate_values: false,
            format: ChartFormat::Svg,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// Everything needed to draw one metric, independent of the output format.
#[derive(Debug, Clone)]
pub struct Chart {
    pub metric: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_scale: XScale,
    pub annotate_values: bool,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone)]
pub enum RenderedChart {
    Svg(String),
    Plotly(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct GeneratedChart {
    pub metric: String,
    pub rendered: RenderedChart,
}

/// Series colours: blue for the first file, red for the second, then the
/// usual categorical palette.
const PALETTE: [(u8, u8, u8); 10] = [
    (0, 0, 255),
    (255, 0, 0),
    (44, 160, 44),
    (214, 39, 40),
    (148, 103, 189),
    (140, 86, 75),
    (227, 119, 194),
    (127, 127, 127),
    (188, 189, 34),
    (23, 190, 207),
];

pub fn series_rgb(index: usize) -> (u8, u8, u8) {
    PALETTE[index % PALETTE.len()]
}

pub fn series_css_color(index: usize) -> String {
    let (r, g, b) = series_rgb(index);
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Pair every input path with its legend label.
///
/// Explicit version labels win; otherwise the label is derived from the
/// result directory name. The previous file, when given, comes first.
pub fn resolve_inputs(
    previous: Option<&Path>,
    current: &Path,
    previous_version: Option<&str>,
    current_version: Option<&str>,
) -> Vec<ChartInput> {
    let mut inputs = Vec::with_capacity(2);

    if let Some(prev) = previous {
        let path = dataset::normalize_csv_path(prev);
        let label = previous_version
            .map(str::to_string)
            .unwrap_or_else(|| dataset::extract_version(&path));
        inputs.push(ChartInput { path, label });
    }

    let path = dataset::normalize_csv_path(current);
    let label = current_version
        .map(str::to_string)
        .unwrap_or_else(|| dataset::extract_version(&path));
    inputs.push(ChartInput { path, label });

    inputs
}

/// Load every input's series for `metric` and attach titles and labels.
pub fn build_chart(
    metric: &str,
    inputs: &[ChartInput],
    options: &ChartOptions,
    metadata: &MetricsMetadata,
) -> Result<Chart, ChartError> {
    let mut series = Vec::with_capacity(inputs.len());
    for input in inputs {
        let points = dataset::load_series(&input.path, &options.x_axis, metric)?;
        series.push(Series {
            label: input.label.clone(),
            points,
        });
    }

    let x_label = options
        .x_label
        .clone()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| options.x_axis.clone());

    Ok(Chart {
        metric: metric.to_string(),
        title: metadata.chart_title(metric, &options.x_axis),
        x_label,
        y_label: metadata.y_label(metric),
        x_scale: options.x_scale,
        annotate_values: options.annotate_values,
        series,
    })
}

pub fn render(chart: &Chart, format: ChartFormat) -> Result<RenderedChart, ChartError> {
    match format {
        ChartFormat::Svg => svg::render_svg(chart).map(RenderedChart::Svg),
        ChartFormat::Interactive => Ok(RenderedChart::Plotly(interactive::plotly_figure(chart))),
    }
}

/// Metrics to chart: the explicit list, else the single metric, else every
/// numeric column of the first input. An empty result is not an error.
pub fn select_metrics(
    explicit: &[String],
    single: Option<&str>,
    first_input: &Path,
    x_axis: &str,
) -> Result<Vec<String>, DatasetError> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    if let Some(metric) = single {
        return Ok(vec![metric.to_string()]);
    }
    dataset::detect_numeric_columns(first_input, x_axis)
}

/// File stem for a metric: characters outside `[A-Za-z0-9._-]` become `_`,
/// and a stem made only of dots becomes `chart`.
pub fn file_stem(metric: &str) -> String {
    let stem: String = metric
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.chars().all(|c| c == '.') {
        "chart".to_string()
    } else {
        stem
    }
}

/// Write a rendered chart next to the report: `<stem>.svg` or `<stem>.json`.
pub fn write_chart(output_dir: &Path, chart: &GeneratedChart) -> std::io::Result<PathBuf> {
    let (ext, contents) = match &chart.rendered {
        RenderedChart::Svg(svg) => ("svg", svg.clone()),
        RenderedChart::Plotly(figure) => (
            "json",
            serde_json::to_string_pretty(figure).map_err(std::io::Error::other)?,
        ),
    };
    let path = output_dir.join(format!("{}.{ext}", file_stem(&chart.metric)));
    std::fs::write(&path, contents)?;
    Ok(path)
}

/// Write every chart; a chart that cannot be written is logged and skipped.
pub fn write_charts(output_dir: &Path, charts: &[GeneratedChart]) -> Vec<PathBuf> {
    charts
        .iter()
        .filter_map(|chart| match write_chart(output_dir, chart) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "chart written");
                Some(path)
            }
            Err(error) => {
                tracing::error!(metric = %chart.metric, %error, "unable to write chart");
                None
            }
        })
        .collect()
}

/// Build and render a chart per metric. A failing metric is logged and
/// skipped so the remaining charts still make it into the report.
pub fn generate_all(
    metrics: &[String],
    inputs: &[ChartInput],
    options: &ChartOptions,
    metadata: &MetricsMetadata,
) -> Vec<GeneratedChart> {
    let mut out = Vec::with_capacity(metrics.len());

    for metric in metrics {
        tracing::info!(%metric, "generating chart");
        let result = build_chart(metric, inputs, options, metadata)
            .and_then(|chart| render(&chart, options.format));

        match result {
            Ok(rendered) => {
                tracing::debug!(%metric, "chart generated");
                out.push(GeneratedChart {
                    metric: metric.clone(),
                    rendered,
                });
            }
            Err(error) => {
                tracing::error!(%metric, %error, "error generating chart");
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_inputs_prefers_explicit_versions() {
        let inputs = resolve_inputs(
            Some(Path::new("/r/.artifacts.scale.1.6.3.111")),
            Path::new("/r/.artifacts.scale.1.7-122.222"),
            Some("v1.6.3 (Baseline)"),
            None,
        );

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].label, "v1.6.3 (Baseline)");
        assert_eq!(
            inputs[0].path,
            PathBuf::from("/r/.artifacts.scale.1.6.3.111/summary.csv")
        );
        assert_eq!(inputs[1].label, "1.7-122");
    }

    #[test]
    fn test_resolve_inputs_current_only() {
        let inputs = resolve_inputs(None, Path::new("run/summary.csv"), None, Some("latest"));
        assert_eq!(
            inputs,
            vec![ChartInput {
                path: PathBuf::from("run/summary.csv"),
                label: "latest".into()
            }]
        );
    }

    #[test]
    fn test_build_chart_fallback_labels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        fs::write(&path, "x,Memory\n10,1048576\n5,2097152\n").unwrap();

        let inputs = vec![ChartInput {
            path,
            label: "current".into(),
        }];
        let options = ChartOptions {
            x_axis: "x".into(),
            ..Default::default()
        };

        let chart = build_chart("Memory", &inputs, &options, &MetricsMetadata::default()).unwrap();
        assert_eq!(chart.title, "Memory vs x");
        assert_eq!(chart.y_label, "Memory");
        assert_eq!(chart.x_label, "x");
        assert_eq!(chart.series[0].points, vec![(5.0, 2.0), (10.0, 1.0)]);
    }

    #[test]
    fn test_generate_all_skips_failing_metric() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("summary.csv");
        fs::write(&good, "x,cpu\n1,0.5\n2,0.75\n").unwrap();

        let ok_inputs = vec![ChartInput {
            path: good,
            label: "a".into(),
        }];
        let options = ChartOptions {
            x_axis: "x".into(),
            format: ChartFormat::Interactive,
            ..Default::default()
        };
        let metadata = MetricsMetadata::default();

        let charts = generate_all(&["cpu".to_string()], &ok_inputs, &options, &metadata);
        assert_eq!(charts.len(), 1);

        let missing = vec![ChartInput {
            path: dir.path().join("missing/summary.csv"),
            label: "b".into(),
        }];
        assert!(generate_all(&["cpu".to_string()], &missing, &options, &metadata).is_empty());
    }

    #[test]
    fn test_write_chart_extension_follows_format() {
        let dir = tempdir().unwrap();
        let svg = GeneratedChart {
            metric: "RHDH_CPU_Avg".into(),
            rendered: RenderedChart::Svg("<svg></svg>".into()),
        };
        let plotly = GeneratedChart {
            metric: "RHDH_Memory_Avg".into(),
            rendered: RenderedChart::Plotly(serde_json::json!({"data": []})),
        };

        let svg_path = write_chart(dir.path(), &svg).unwrap();
        assert_eq!(svg_path, dir.path().join("RHDH_CPU_Avg.svg"));
        let json_path = write_chart(dir.path(), &plotly).unwrap();
        assert_eq!(json_path, dir.path().join("RHDH_Memory_Avg.json"));
        assert!(fs::read_to_string(json_path).unwrap().contains("\"data\""));
    }

    #[test]
    fn test_file_stem_is_path_safe() {
        assert_eq!(file_stem("RHDH_CPU_Avg"), "RHDH_CPU_Avg");
        assert_eq!(file_stem("latency/p95 (ms)"), "latency_p95__ms_");
        assert_eq!(file_stem("../etc"), ".._etc");
        assert_eq!(file_stem(".."), "chart");
        assert_eq!(file_stem(""), "chart");
    }

    #[test]
    fn test_write_charts_skips_failures() {
        let dir = tempdir().unwrap();
        let charts = vec![
            GeneratedChart {
                metric: "Requests/s".into(),
                rendered: RenderedChart::Svg("<svg></svg>".into()),
            },
            GeneratedChart {
                metric: "cpu".into(),
                rendered: RenderedChart::Svg("<svg></svg>".into()),
            },
        ];

        let written = write_charts(dir.path(), &charts);
        assert_eq!(
            written,
            vec![dir.path().join("Requests_s.svg"), dir.path().join("cpu.svg")]
        );

        // A file where the output directory should be fails every write.
        let blocked = dir.path().join("not-a-dir");
        fs::write(&blocked, "").unwrap();
        assert!(write_charts(&blocked, &charts).is_empty());
    }

    #[test]
    fn test_select_metrics_precedence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        fs::write(&path, "x,name,cpu,mem\n1,run-a,0.5,100\n").unwrap();

        let explicit = vec!["mem".to_string()];
        assert_eq!(select_metrics(&explicit, Some("cpu"), &path, "x").unwrap(), explicit);
        assert_eq!(select_metrics(&[], Some("cpu"), &path, "x").unwrap(), vec!["cpu"]);
        assert_eq!(select_metrics(&[], None, &path, "x").unwrap(), vec!["cpu", "mem"]);
    }

    #[test]
    fn test_select_metrics_without_numeric_columns_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        fs::write(&path, "x,name\n1,run-a\n").unwrap();
        assert!(select_metrics(&[], None, &path, "x").unwrap().is_empty());
    }

    #[test]
    fn test_palette_starts_blue_then_red() {
        assert_eq!(series_css_color(0), "#0000ff");
        assert_eq!(series_css_color(1), "#ff0000");
    }
}
