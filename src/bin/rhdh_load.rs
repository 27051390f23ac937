use anyhow::{Context, Result};
use clap::Parser;
use rhdh_perf::partition;
use rhdh_perf::scenarios::{self, AttackSettings, LoadOptions, ScenarioContext};
use rhdh_perf::{logging, ScenarioKind};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "rhdh-load")]
#[command(about = "Run an RHDH load-test scenario")]
struct Args {
    #[arg(long, value_enum, default_value_t = ScenarioKind::Mvp)]
    scenario: ScenarioKind,

    /// Backstage base URL, e.g. https://rhdh.example.com
    #[arg(long, short = 'H')]
    host: String,

    /// Total virtual users across all workers. Each worker starts one
    /// virtual user per username of its share of the pool.
    #[arg(long, short = 'u', default_value_t = 1)]
    users: usize,

    /// Users started per second, per worker.
    #[arg(long, short = 'r')]
    hatch_rate: Option<String>,

    /// Stop after this long (`90`, `30s`, `5m`, `1h30m`).
    #[arg(long, short = 't', value_parser = scenarios::parse_run_time)]
    run_time: Option<usize>,

    /// Stop each user after this many passes over its tasks.
    #[arg(long)]
    iterations: Option<usize>,

    /// Keycloak host; enables the OAuth login instead of the guest token.
    #[arg(long, default_value = "")]
    keycloak_host: String,

    #[arg(long, env = "KEYCLOAK_PASSWORD", default_value = "", hide_env_values = true)]
    keycloak_password: String,

    /// Log request and response details.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Include orchestrator permissions in the realistic scenario.
    #[arg(long, default_value_t = false)]
    enable_orchestrator: bool,

    /// Index of this process among the load workers.
    #[arg(long, default_value_t = 0)]
    worker_index: usize,

    /// Number of load worker processes sharing the user pool.
    #[arg(long, default_value_t = 1)]
    worker_count: usize,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.verbose || args.debug);

    let prefix = args.scenario.username_prefix();
    let usernames = partition::worker_chunk(prefix, args.users, args.worker_index, args.worker_count)
        .context("invalid worker assignment")?;
    tracing::info!(
        worker = args.worker_index,
        workers = args.worker_count,
        usernames = usernames.len(),
        "user pool assigned"
    );

    let options = LoadOptions {
        scenario: args.scenario,
        host: args.host.trim_end_matches('/').to_string(),
        keycloak_host: Some(args.keycloak_host).filter(|h| !h.is_empty()),
        keycloak_password: args.keycloak_password,
        debug: args.debug,
        enable_orchestrator: args.enable_orchestrator,
    };
    let settings = AttackSettings {
        hatch_rate: args.hatch_rate,
        run_time: args.run_time,
        iterations: args.iterations,
        ..AttackSettings::for_worker(&usernames)
    };

    let ctx = Arc::new(ScenarioContext::new(options, usernames));

    scenarios::run_attack(ctx, &settings)
        .await
        .context("load test failed")?;
    tracing::info!("load test finished");
    Ok(())
}
