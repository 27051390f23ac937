use super::{series_rgb, Chart, ChartError};
use crate::XScale;
use plotters::prelude::*;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;
const FONT_SIZE: f64 = 12.0;
const FONT: &str = "sans-serif";

/// Map an x value into plot space. Log charts are drawn on log10(x) with
/// tick labels mapped back; non-positive x has no position on a log axis.
fn project_x(x: f64, scale: XScale) -> Option<f64> {
    match scale {
        XScale::Linear => Some(x),
        XScale::Log => (x > 0.0).then(|| x.log10()),
    }
}

fn format_log_tick(v: f64) -> String {
    let value = 10f64.powf(v);
    if value >= 1.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn axis_ranges(series: &[Vec<(f64, f64)>], scale: XScale) -> ((f64, f64), (f64, f64)) {
    let all = series.iter().flatten();
    let (mut x_min, mut x_max, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY, 0.0f64);
    for &(x, y) in all {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_max = y_max.max(y);
    }

    // The x axis starts at 1 (log10(1) = 0) unless data sits below it.
    let origin = match scale {
        XScale::Linear => 1.0,
        XScale::Log => 0.0,
    };
    if !x_min.is_finite() {
        x_min = origin;
        x_max = origin + 1.0;
    }
    let x_lo = x_min.min(origin);
    let x_hi = if x_max > x_lo {
        x_max + (x_max - x_lo) * 0.05
    } else {
        x_lo + 1.0
    };

    let y_hi = if y_max > 0.0 { y_max * 1.15 } else { 1.0 };
    ((x_lo, x_hi), (0.0, y_hi))
}

/// Render a chart to a standalone SVG document.
pub fn render_svg(chart: &Chart) -> Result<String, ChartError> {
    let mut svg = String::new();
    draw(&mut svg, chart).map_err(|e| ChartError::Render(e.to_string()))?;
    Ok(svg)
}

fn draw(svg: &mut String, chart: &Chart) -> Result<(), Box<dyn std::error::Error>> {
    let projected: Vec<Vec<(f64, f64)>> = chart
        .series
        .iter()
        .map(|s| {
            s.points
                .iter()
                .filter_map(|&(x, y)| project_x(x, chart.x_scale).map(|px| (px, y)))
                .collect()
        })
        .collect();
    let ((x_lo, x_hi), (y_lo, y_hi)) = axis_ranges(&projected, chart.x_scale);

    let root = SVGBackend::with_string(svg, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, (FONT, FONT_SIZE))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    let log_ticks = |v: &f64| format_log_tick(*v);
    let mut mesh = ctx.configure_mesh();
    mesh.x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .label_style((FONT, FONT_SIZE))
        .axis_desc_style((FONT, FONT_SIZE));
    if chart.x_scale == XScale::Log {
        mesh.x_label_formatter(&log_ticks);
    }
    mesh.draw()?;

    let mut has_legend = false;
    for (index, (series, points)) in chart.series.iter().zip(&projected).enumerate() {
        if points.is_empty() {
            continue;
        }
        let (r, g, b) = series_rgb(index);
        let color = RGBColor(r, g, b);

        ctx.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(series.label.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
        ctx.draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))?;
        has_legend = true;

        if chart.annotate_values {
            ctx.draw_series(points.iter().map(|&(x, y)| {
                EmptyElement::at((x, y))
                    + Text::new(format!("{y:.2}"), (-12, -20), (FONT, FONT_SIZE).into_font())
            }))?;
        }
    }

    if has_legend {
        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font((FONT, FONT_SIZE))
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::Series;

    fn chart(scale: XScale, annotate: bool) -> Chart {
        Chart {
            metric: "RHDH_CPU_Avg".into(),
            title: "RHDH_CPU_Avg vs RBAC_POLICY_SIZE".into(),
            x_label: "RBAC_POLICY_SIZE".into(),
            y_label: "RHDH_CPU_Avg".into(),
            x_scale: scale,
            annotate_values: annotate,
            series: vec![
                Series {
                    label: "1.6.3".into(),
                    points: vec![(1.0, 0.2), (10.0, 0.4), (100.0, 0.9)],
                },
                Series {
                    label: "1.7-122".into(),
                    points: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_render_linear_svg() {
        let svg = render_svg(&chart(XScale::Linear, false)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("RHDH_CPU_Avg vs RBAC_POLICY_SIZE"));
        assert!(svg.contains("1.6.3"));
        // Empty series contributes no trace and no legend entry.
        assert!(!svg.contains("1.7-122"));
    }

    #[test]
    fn test_render_log_svg_with_annotations() {
        let svg = render_svg(&chart(XScale::Log, true)).unwrap();
        assert!(svg.contains("0.90"));
    }

    #[test]
    fn test_axis_ranges_start_at_one_and_zero() {
        let ((x_lo, x_hi), (y_lo, y_hi)) =
            axis_ranges(&[vec![(5.0, 2.0), (10.0, 1.0)]], XScale::Linear);
        assert_eq!(x_lo, 1.0);
        assert!(x_hi > 10.0);
        assert_eq!(y_lo, 0.0);
        assert!(y_hi > 2.0);
    }

    #[test]
    fn test_axis_ranges_without_data() {
        let ((x_lo, x_hi), (_, y_hi)) = axis_ranges(&[vec![]], XScale::Linear);
        assert!(x_hi > x_lo);
        assert_eq!(y_hi, 1.0);
    }

    #[test]
    fn test_log_projection() {
        let projected = project_x(100.0, XScale::Log).unwrap();
        assert!((projected - 2.0).abs() < 1e-12);
        assert_eq!(project_x(0.0, XScale::Log), None);
        assert_eq!(format_log_tick(2.0), "100");
    }
}
