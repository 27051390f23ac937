//! Single-file HTML summary embedding every generated chart.

use crate::charts::{GeneratedChart, RenderedChart};
use crate::schema::MetricsMetadata;
use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const JSZIP_CDN: &str = "https://cdnjs.cloudflare.com/ajax/libs/jszip/3.10.1/jszip.min.js";

const STYLE: &str = r#"
        body {
            font-family: Arial, sans-serif;
            margin: 20px;
            background-color: #f5f5f5;
        }
        .header {
            text-align: center;
            margin-bottom: 30px;
            padding: 20px;
            background-color: white;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        .charts-container {
            display: grid;
            grid-template-columns: 1fr 1fr;
            gap: 20px;
            max-width: 1400px;
            margin: 0 auto;
        }
        .chart-item {
            background-color: white;
            padding: 15px;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
            text-align: center;
        }
        .chart-item svg {
            max-width: 100%;
            height: auto;
            border: 1px solid #ddd;
            border-radius: 4px;
        }
        .plotly-chart {
            width: 100%;
            min-height: 450px;
        }
        .chart-title {
            margin-bottom: 10px;
            font-size: 16px;
            font-weight: bold;
            color: #333;
        }
        .comparison-info {
            margin-bottom: 20px;
            padding: 10px;
            background-color: #e8f4f8;
            border-left: 4px solid #0066cc;
            border-radius: 4px;
        }
        .download {
            padding: 8px 16px;
            background-color: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }
        @media (max-width: 768px) {
            .charts-container {
                grid-template-columns: 1fr;
            }
        }
"#;

const DOWNLOAD_SCRIPT: &str = r#"
        figures.forEach(function (f) {
            Plotly.newPlot(f.id, f.figure.data, f.figure.layout, { responsive: true });
        });

        async function downloadAllCharts() {
            const zip = new JSZip();
            for (const f of figures) {
                const url = await Plotly.toImage(f.id, { format: 'svg', width: 1000, height: 600 });
                zip.file(f.name + '.svg', decodeURIComponent(url.substring(url.indexOf(',') + 1)));
                zip.file(f.name + '.json', JSON.stringify(f.figure, null, 2));
            }
            const blob = await zip.generateAsync({ type: 'blob' });
            const link = document.createElement('a');
            link.href = URL.createObjectURL(blob);
            link.download = archiveName;
            link.click();
            URL.revokeObjectURL(link.href);
        }
"#;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// File-name prefix for a scenario (`"RHDH Scalability"` → `"RHDH_Scalability"`).
pub fn scenario_prefix(scenario: &str) -> String {
    scenario.replace(' ', "_")
}

pub fn report_path(output_dir: &Path, scenario: &str) -> PathBuf {
    output_dir.join(format!("{}_summary.html", scenario_prefix(scenario)))
}

fn header(scenario: &str, labels: &[String]) -> String {
    let comparing = labels.len() > 1;
    let (heading, versions_caption) = if comparing {
        ("Comparison", "Comparing RHDH Versions")
    } else {
        ("Report", "RHDH Version")
    };
    let versions = labels
        .iter()
        .map(|l| escape_html(l))
        .collect::<Vec<_>>()
        .join(" vs ");

    format!(
        r#"    <div class="header">
        <h1>RHDH Performance {heading} Summary</h1>
        <div class="comparison-info">
            <strong>Scenario:</strong> {scenario}<br>
            <strong>{versions_caption}:</strong> {versions}<br>
        </div>
    </div>
"#,
        scenario = escape_html(scenario),
    )
}

/// Script-safe JSON literal (no premature `</script>`).
fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Render the summary page. `labels` holds one entry per compared version.
pub fn render_html(
    charts: &[GeneratedChart],
    labels: &[String],
    scenario: &str,
    metadata: &MetricsMetadata,
) -> String {
    let comparing = labels.len() > 1;
    let interactive = charts
        .iter()
        .any(|c| matches!(c.rendered, RenderedChart::Plotly(_)));

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str(&format!(
        "    <title>RHDH Performance {} Summary</title>\n",
        if comparing { "Comparison" } else { "Report" }
    ));
    if interactive {
        html.push_str(&format!("    <script src=\"{PLOTLY_CDN}\"></script>\n"));
        html.push_str(&format!("    <script src=\"{JSZIP_CDN}\"></script>\n"));
    }
    html.push_str(&format!("    <style>{STYLE}    </style>\n</head>\n<body>\n"));
    html.push_str(&header(scenario, labels));

    if interactive {
        html.push_str(
            "    <p style=\"text-align:center\"><button class=\"download\" onclick=\"downloadAllCharts()\">Download all charts</button></p>\n",
        );
    }

    html.push_str("    <div class=\"charts-container\">\n");
    let mut figures = Vec::new();
    for (index, chart) in charts.iter().enumerate() {
        let display_name = escape_html(&metadata.display_name(&chart.metric));
        let body = match &chart.rendered {
            RenderedChart::Svg(svg) => svg.clone(),
            RenderedChart::Plotly(figure) => {
                let id = format!("chart-{index}");
                figures.push(json!({ "id": id, "name": chart.metric, "figure": figure }));
                format!("<div id=\"{id}\" class=\"plotly-chart\"></div>")
            }
        };
        html.push_str(&format!(
            r#"        <div class="chart-item">
            <div class="chart-title">{display_name}</div>
            {body}
        </div>
"#
        ));
    }
    html.push_str("    </div>\n");

    if interactive {
        let archive = format!("{}_charts.zip", scenario_prefix(scenario));
        html.push_str("    <script>\n");
        html.push_str(&format!(
            "        const figures = {};\n",
            script_json(&serde_json::Value::Array(figures))
        ));
        html.push_str(&format!(
            "        const archiveName = {};\n",
            script_json(&json!(archive))
        ));
        html.push_str(DOWNLOAD_SCRIPT);
        html.push_str("    </script>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Write the report next to the charts and return its path.
pub fn write_report(
    output_dir: &Path,
    scenario: &str,
    charts: &[GeneratedChart],
    labels: &[String],
    metadata: &MetricsMetadata,
) -> io::Result<PathBuf> {
    let path = report_path(output_dir, scenario);
    fs::write(&path, render_html(charts, labels, scenario, metadata))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn svg_chart(metric: &str) -> GeneratedChart {
        GeneratedChart {
            metric: metric.into(),
            rendered: RenderedChart::Svg("<svg id=\"x\"></svg>".into()),
        }
    }

    #[test]
    fn test_single_version_wording() {
        let html = render_html(
            &[svg_chart("RHDH_CPU_Avg")],
            &["1.7-122".to_string()],
            "RHDH Scalability",
            &MetricsMetadata::default(),
        );

        assert!(html.contains("RHDH Performance Report Summary"));
        assert!(html.contains("<strong>RHDH Version:</strong> 1.7-122"));
        assert!(!html.contains("Comparison"));
        assert!(!html.contains("plotly"));
        assert!(html.contains("<svg id=\"x\"></svg>"));
    }

    #[test]
    fn test_comparison_wording() {
        let html = render_html(
            &[svg_chart("RHDH_CPU_Avg")],
            &["1.6.3".to_string(), "1.7-122".to_string()],
            "RHDH Scalability",
            &MetricsMetadata::default(),
        );

        assert!(html.contains("RHDH Performance Comparison Summary"));
        assert!(html.contains("<strong>Comparing RHDH Versions:</strong> 1.6.3 vs 1.7-122"));
    }

    #[test]
    fn test_interactive_report_bundles_figures() {
        let chart = GeneratedChart {
            metric: "RHDH_Memory_Avg".into(),
            rendered: RenderedChart::Plotly(json!({"data": [], "layout": {"title": {"text": "</script>"}}})),
        };
        let html = render_html(&[chart], &["v".to_string()], "RBAC Scale", &MetricsMetadata::default());

        assert!(html.contains(PLOTLY_CDN));
        assert!(html.contains(JSZIP_CDN));
        assert!(html.contains("id=\"chart-0\""));
        assert!(html.contains("downloadAllCharts"));
        assert!(html.contains("\"RBAC_Scale_charts.zip\""));
        assert!(html.contains("<\\/script>"));
    }

    #[test]
    fn test_write_report_path() {
        let dir = tempdir().unwrap();
        let path = write_report(
            dir.path(),
            "RHDH Scalability",
            &[svg_chart("m")],
            &["v".to_string()],
            &MetricsMetadata::default(),
        )
        .unwrap();

        assert_eq!(path, dir.path().join("RHDH_Scalability_summary.html"));
        assert!(fs::read_to_string(path).unwrap().contains("chart-item"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
