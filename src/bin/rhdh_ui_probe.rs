use anyhow::{bail, Result};
use clap::Parser;
use rhdh_perf::probe::{self, ProbeConfig};
use rhdh_perf::logging;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rhdh-ui-probe")]
#[command(about = "Reload the RHDH home page in headless Chrome and record load timings")]
struct Args {
    /// RHDH URL to open.
    #[arg(long, env = "RHDH_ENDPOINT")]
    endpoint: String,

    /// Number of reload cycles.
    #[arg(long, env = "RHDH_RELOAD_COUNT", required_unless_present = "smoke")]
    reload_count: Option<u32>,

    /// Run the guest-entry and search-bar UI checks instead of the reload cycles.
    #[arg(long, default_value_t = false)]
    smoke: bool,

    /// CSV file receiving one row per cycle.
    #[arg(long, env = "RHDH_PROBE_OUTPUT", default_value = probe::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Chrome/Chromium binary (auto-detected when omitted).
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    if args.smoke {
        let endpoint = probe::validate_endpoint(&args.endpoint)?;
        let outcomes = probe::run_smoke_checks(&endpoint, args.chrome_path.as_deref())?;
        for outcome in &outcomes {
            match &outcome.failure {
                None => println!("PASS  {}", outcome.check.name()),
                Some(reason) => println!("FAIL  {}: {reason}", outcome.check.name()),
            }
        }
        let failed = outcomes.iter().filter(|o| !o.passed()).count();
        if failed > 0 {
            bail!("{failed} of {} smoke check(s) failed", outcomes.len());
        }
        return Ok(());
    }

    let config = ProbeConfig::new(
        &args.endpoint,
        args.reload_count.unwrap_or_default(),
        Some(args.output),
        args.chrome_path,
    )?;

    let samples = probe::run_probe(&config)?;

    println!("{}", probe::format_table(&samples));
    println!("Recorded {} cycle(s) to {}", samples.len(), config.output.display());
    Ok(())
}
