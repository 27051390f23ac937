use anyhow::{Context, Result};
use clap::Parser;
use rhdh_perf::charts::{self, ChartOptions};
use rhdh_perf::schema::MetricsMetadata;
use rhdh_perf::{logging, report, ChartFormat, XScale};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rhdh-perf-chart")]
#[command(about = "Compare RHDH benchmark results and generate charts plus an HTML summary")]
struct Args {
    /// Previous results: a summary CSV or a directory holding summary.csv.
    #[arg(long, value_name = "PATH")]
    previous: Option<PathBuf>,

    /// Current results: a summary CSV or a directory holding summary.csv.
    #[arg(long, value_name = "PATH")]
    current: PathBuf,

    /// Single metric to chart.
    #[arg(long)]
    metric: Option<String>,

    /// Metrics to chart; every numeric column when neither this nor --metric is given.
    #[arg(long, num_args = 1.., value_name = "METRIC")]
    metrics: Vec<String>,

    #[arg(long, default_value = "RBAC_POLICY_SIZE")]
    x_axis: String,

    #[arg(long, default_value = "RHDH Scalability")]
    scenario: String,

    #[arg(long, value_enum, default_value_t = XScale::Linear)]
    x_scale: XScale,

    #[arg(long, default_value = ".", value_name = "DIR")]
    output_dir: PathBuf,

    /// Skip the HTML summary.
    #[arg(long, default_value_t = false)]
    no_html: bool,

    /// Print the value above every data point.
    #[arg(long, default_value_t = false)]
    annotate_values: bool,

    /// Custom x-axis label (defaults to the x-axis column name).
    #[arg(long)]
    x_label: Option<String>,

    /// YAML file with per-metric titles, labels and units.
    #[arg(long, default_value = "rhdh-perf-chart_metric-metadata.yaml", value_name = "FILE")]
    metrics_metadata: PathBuf,

    /// Legend label of the current results (derived from the directory name otherwise).
    #[arg(long)]
    current_version: Option<String>,

    /// Legend label of the previous results (derived from the directory name otherwise).
    #[arg(long)]
    previous_version: Option<String>,

    #[arg(long, value_enum, default_value_t = ChartFormat::Svg)]
    format: ChartFormat,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    let metadata = MetricsMetadata::load(&args.metrics_metadata);
    let inputs = charts::resolve_inputs(
        args.previous.as_deref(),
        &args.current,
        args.previous_version.as_deref(),
        args.current_version.as_deref(),
    );

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("unable to create output directory {}", args.output_dir.display())
    })?;

    let first = &inputs[0].path;
    let metrics = charts::select_metrics(&args.metrics, args.metric.as_deref(), first, &args.x_axis)
        .with_context(|| format!("unable to detect metrics in {}", first.display()))?;
    if metrics.is_empty() {
        tracing::warn!(path = %first.display(), "no numeric metric columns to chart");
    }

    let options = ChartOptions {
        x_axis: args.x_axis.clone(),
        x_label: args.x_label.clone(),
        x_scale: args.x_scale,
        annotate_values: args.annotate_values,
        format: args.format,
    };

    println!("Processing {} metrics...", metrics.len());
    let generated = charts::generate_all(&metrics, &inputs, &options, &metadata);
    charts::write_charts(&args.output_dir, &generated);

    let labels: Vec<String> = inputs.iter().map(|i| i.label.clone()).collect();
    let html_path = if !args.no_html && !generated.is_empty() {
        let path = report::write_report(&args.output_dir, &args.scenario, &generated, &labels, &metadata)
            .context("unable to write HTML summary")?;
        println!("HTML summary saved: {}", path.display());
        Some(path)
    } else {
        None
    };

    println!("\nSummary:");
    println!("  Generated {} chart(s)", generated.len());
    if let Some(path) = html_path {
        println!("  Single HTML file with embedded charts: {}", path.display());
    }
    println!("  Output directory: {}", args.output_dir.display());

    Ok(())
}
