use super::{series_css_color, Chart};
use crate::XScale;
use serde_json::{json, Value};

const FONT_SIZE: u32 = 12;

/// Plotly figure (`{"data": [...], "layout": {...}}`) for a chart.
///
/// Series without points are left out so they do not show up in the legend.
pub fn plotly_figure(chart: &Chart) -> Value {
    let mode = if chart.annotate_values {
        "lines+markers+text"
    } else {
        "lines+markers"
    };

    let data: Vec<Value> = chart
        .series
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.points.is_empty())
        .map(|(index, s)| {
            let x: Vec<f64> = s.points.iter().map(|p| p.0).collect();
            let y: Vec<f64> = s.points.iter().map(|p| p.1).collect();
            let mut trace = json!({
                "type": "scatter",
                "mode": mode,
                "name": s.label,
                "x": x,
                "y": y,
                "line": { "color": series_css_color(index) },
                "marker": { "size": 8 },
            });
            if chart.annotate_values {
                let text: Vec<String> = y.iter().map(|v| format!("{v:.2}")).collect();
                trace["text"] = json!(text);
                trace["textposition"] = json!("top center");
            }
            trace
        })
        .collect();

    let axis_type = match chart.x_scale {
        XScale::Linear => "linear",
        XScale::Log => "log",
    };

    json!({
        "data": data,
        "layout": {
            "title": { "text": chart.title },
            "font": { "size": FONT_SIZE },
            "xaxis": {
                "title": { "text": chart.x_label },
                "type": axis_type,
                "showgrid": true,
            },
            "yaxis": {
                "title": { "text": chart.y_label },
                "rangemode": "tozero",
                "showgrid": true,
            },
            "legend": { "x": 1.02, "y": 1, "xanchor": "left" },
            "margin": { "r": 160 },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::Series;

    #[test]
    fn test_figure_traces_and_axes() {
        let chart = Chart {
            metric: "RHDH_Memory_Avg".into(),
            title: "RHDH Memory Consumption".into(),
            x_label: "Policies".into(),
            y_label: "Memory Usage [MiB]".into(),
            x_scale: XScale::Log,
            annotate_values: true,
            series: vec![
                Series {
                    label: "1.6.3".into(),
                    points: vec![],
                },
                Series {
                    label: "1.7-122".into(),
                    points: vec![(1.0, 384.0), (1000.0, 402.5)],
                },
            ],
        };

        let figure = plotly_figure(&chart);
        let data = figure["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], "1.7-122");
        assert_eq!(data[0]["line"]["color"], "#ff0000");
        assert_eq!(data[0]["text"][1], "402.50");
        assert_eq!(figure["layout"]["xaxis"]["type"], "log");
        assert_eq!(figure["layout"]["yaxis"]["title"]["text"], "Memory Usage [MiB]");
    }
}
