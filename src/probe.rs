//! Headless-browser load timing probe.
//!
//! Opens the portal, enters as guest, then reloads the home page a fixed
//! number of times. Every cycle starts with its reload and records the new
//! document's paint/navigation timings together with the CPU, memory and
//! network usage observed while it ran. Rows are appended to the CSV as
//! soon as they complete.
//!
//! The same page driver also runs the one-shot UI smoke checks.

use crate::harness::{measure_cycle, CycleUsage};
use crate::sampler::DEFAULT_INTERVAL;
use crate::schema::{TimingSample, TIMING_SAMPLE_COLUMNS};
use anyhow::{bail, Context, Result};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use serde::Deserialize;
use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const GUEST_ENTER_XPATH: &str = r#"//span[@class="MuiButton-label-222" and text()="Enter"]"#;
pub const READY_XPATH: &str = r#"//h1[contains(text(),"Welcome back!")]"#;
pub const EXPECTED_TITLE: &str = "Welcome back! | Red Hat Developer Hub";
pub const DEFAULT_OUTPUT: &str = "test.csv";

const TIMINGS_SCRIPT: &str = r#"
JSON.stringify({
    paint: performance.getEntriesByType('paint').map(function (e) {
        return { name: e.name, startTime: e.startTime };
    }),
    navigation: performance.getEntriesByType('navigation').map(function (e) {
        return {
            domContentLoadedEventStart: e.domContentLoadedEventStart,
            domContentLoadedEventEnd: e.domContentLoadedEventEnd
        };
    })
})
"#;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProbeConfigError {
    #[error("RHDH endpoint is empty")]
    MissingEndpoint,

    #[error("invalid RHDH endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),

    #[error("reload count must be at least 1")]
    NoReloads,
}

/// Trimmed endpoint, rejected when empty or not an absolute URL.
pub fn validate_endpoint(endpoint: &str) -> Result<String, ProbeConfigError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ProbeConfigError::MissingEndpoint);
    }
    url::Url::parse(endpoint)
        .map_err(|e| ProbeConfigError::InvalidEndpoint(endpoint.to_string(), e.to_string()))?;
    Ok(endpoint.to_string())
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub endpoint: String,
    pub reload_count: u32,
    pub output: PathBuf,
    pub chrome_path: Option<PathBuf>,
    pub sample_interval: Duration,
}

impl ProbeConfig {
    pub fn new(
        endpoint: &str,
        reload_count: u32,
        output: Option<PathBuf>,
        chrome_path: Option<PathBuf>,
    ) -> Result<Self, ProbeConfigError> {
        let endpoint = validate_endpoint(endpoint)?;
        if reload_count == 0 {
            return Err(ProbeConfigError::NoReloads);
        }

        Ok(Self {
            endpoint,
            reload_count,
            output: output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            chrome_path,
            sample_interval: DEFAULT_INTERVAL,
        })
    }
}

/// Paint and navigation timestamps of the current document, in ms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTimings {
    pub first_paint: f64,
    pub first_contentful_paint: f64,
    pub dom_content_loaded_start: f64,
    pub dom_content_loaded_end: f64,
}

#[derive(Deserialize)]
struct RawPaint {
    name: String,
    #[serde(rename = "startTime")]
    start_time: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNavigation {
    dom_content_loaded_event_start: f64,
    dom_content_loaded_event_end: f64,
}

#[derive(Deserialize)]
struct RawTimings {
    paint: Vec<RawPaint>,
    navigation: Vec<RawNavigation>,
}

/// Parse the JSON produced by the in-page timing script.
pub fn parse_timings(raw: &str) -> Result<PageTimings> {
    let timings: RawTimings =
        serde_json::from_str(raw).context("unable to parse performance entries")?;

    let paint = |name: &str| {
        timings
            .paint
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.start_time)
            .with_context(|| format!("no '{name}' paint entry"))
    };
    let navigation = timings
        .navigation
        .first()
        .context("no navigation entry")?;

    Ok(PageTimings {
        first_paint: paint("first-paint")?,
        first_contentful_paint: paint("first-contentful-paint")?,
        dom_content_loaded_start: navigation.dom_content_loaded_event_start,
        dom_content_loaded_end: navigation.dom_content_loaded_event_end,
    })
}

pub fn build_sample(
    cycle: u32,
    hostname: &str,
    timings: &PageTimings,
    usage: &CycleUsage,
) -> TimingSample {
    TimingSample {
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        hostname: hostname.to_string(),
        cycle,
        first_paint_ms: timings.first_paint,
        first_contentful_paint_ms: timings.first_contentful_paint,
        dom_content_loaded_start_ms: timings.dom_content_loaded_start,
        dom_content_loaded_end_ms: timings.dom_content_loaded_end,
        user_cpu_s: usage.cpu.user,
        system_cpu_s: usage.cpu.system,
        children_user_cpu_s: usage.cpu.children_user,
        children_system_cpu_s: usage.cpu.children_system,
        avg_rss_mib: usage.memory.rss_mib,
        avg_vms_mib: usage.memory.vms_mib,
        avg_shared_mib: usage.memory.shared_mib,
        bytes_sent: usage.net.bytes_sent,
        bytes_recv: usage.net.bytes_recv,
        packets_sent: usage.net.packets_sent,
        packets_recv: usage.net.packets_recv,
    }
}

/// Probe CSV opened for writing; every row is flushed as it is appended.
pub struct SampleWriter {
    writer: csv::Writer<File>,
}

impl SampleWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("unable to create probe output {}", path.display()))?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, sample: &TimingSample) -> Result<()> {
        self.writer
            .serialize(sample)
            .context("failed to write probe sample")?;
        self.writer.flush().context("failed to flush probe output")?;
        Ok(())
    }
}

/// Browser operations the probe needs. [`Tab`] is the real page; the cycle
/// and smoke-check logic is written against this trait.
pub trait ProbePage {
    /// Open `url` and wait for the navigation to finish.
    fn open(&self, url: &str) -> Result<()>;
    /// Reload the current document and wait for the new one to finish loading.
    fn reload_page(&self) -> Result<()>;
    fn wait_for(&self, xpath: &str) -> Result<()>;
    fn click(&self, xpath: &str) -> Result<()>;
    /// Type `text` into the element matched by CSS `selector`, then press Enter.
    fn submit_text(&self, selector: &str, text: &str) -> Result<()>;
    fn read_timings(&self) -> Result<PageTimings>;
    fn page_title(&self) -> Result<String>;
}

impl ProbePage for Tab {
    fn open(&self, url: &str) -> Result<()> {
        self.navigate_to(url)
            .with_context(|| format!("failed to navigate to {url}"))?
            .wait_until_navigated()
            .with_context(|| format!("navigation to {url} did not complete"))?;
        Ok(())
    }

    fn reload_page(&self) -> Result<()> {
        self.reload(false, None)
            .context("failed to reload page")?
            .wait_until_navigated()
            .context("reload did not complete")?;
        Ok(())
    }

    fn wait_for(&self, xpath: &str) -> Result<()> {
        self.wait_for_xpath(xpath)
            .with_context(|| format!("element {xpath} not found"))?;
        Ok(())
    }

    fn click(&self, xpath: &str) -> Result<()> {
        self.wait_for_xpath(xpath)
            .with_context(|| format!("element {xpath} not found"))?
            .click()
            .with_context(|| format!("failed to click {xpath}"))?;
        Ok(())
    }

    fn submit_text(&self, selector: &str, text: &str) -> Result<()> {
        self.wait_for_element(selector)
            .with_context(|| format!("element {selector} not found"))?
            .type_into(text)
            .with_context(|| format!("failed to type into {selector}"))?;
        self.press_key("Enter").context("failed to press Enter")?;
        Ok(())
    }

    fn read_timings(&self) -> Result<PageTimings> {
        let value = self
            .evaluate(TIMINGS_SCRIPT, false)
            .context("failed to execute performance probe")?
            .value
            .context("performance probe returned no value")?;
        let raw = value
            .as_str()
            .context("performance probe returned a non-string value")?;
        parse_timings(raw)
    }

    fn page_title(&self) -> Result<String> {
        self.get_title().context("unable to read page title")
    }
}

/// Open the portal and click the guest "Enter" button.
pub fn enter_as_guest<P: ProbePage + ?Sized>(page: &P, endpoint: &str) -> Result<()> {
    page.open(endpoint)?;
    page.click(GUEST_ENTER_XPATH)
        .context("guest Enter button not available")?;
    tracing::info!(%endpoint, "entered as guest");
    Ok(())
}

/// One cycle: reload, wait for the fresh home page, read its timings and
/// check the title. Runs inside the cycle's meter so the reload's cost is
/// attributed to the row it produces.
fn run_cycle<P: ProbePage + ?Sized>(page: &P) -> Result<PageTimings> {
    page.reload_page()?;
    page.wait_for(READY_XPATH)
        .context("home page did not become ready")?;
    let timings = page.read_timings()?;
    tracing::debug!(?timings, "page timings");

    let title = page.page_title()?;
    if title != EXPECTED_TITLE {
        bail!("unexpected page title {title:?}, expected {EXPECTED_TITLE:?}");
    }
    Ok(timings)
}

/// Run every reload cycle on an already entered page, appending each row to
/// `writer` as soon as it is measured.
pub fn run_cycles<P: ProbePage + ?Sized>(
    page: &P,
    config: &ProbeConfig,
    hostname: &str,
    writer: &mut SampleWriter,
) -> Result<Vec<TimingSample>> {
    let mut samples = Vec::with_capacity(config.reload_count as usize);

    for cycle in 1..=config.reload_count {
        let (timings, usage) = measure_cycle(config.sample_interval, || run_cycle(page))
            .with_context(|| format!("cycle {cycle} failed"))?;

        let sample = build_sample(cycle, hostname, &timings, &usage);
        writer.append(&sample)?;
        tracing::info!(cycle, fcp_ms = sample.first_contentful_paint_ms, "cycle recorded");
        samples.push(sample);
    }
    Ok(samples)
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn launch_browser(chrome_path: Option<&Path>) -> Result<Browser> {
    let mut launch = LaunchOptionsBuilder::default();
    launch.headless(true).sandbox(false);
    if let Some(path) = chrome_path {
        launch.path(Some(path.to_path_buf()));
    }
    let launch = launch
        .build()
        .context("unable to construct headless Chromium launch options")?;
    Browser::new(launch).context("failed to launch Chromium/Chrome")
}

/// Drive the browser through every cycle and return the recorded samples.
pub fn run_probe(config: &ProbeConfig) -> Result<Vec<TimingSample>> {
    let hostname = local_hostname();
    let browser = launch_browser(config.chrome_path.as_deref())?;
    let tab = browser.new_tab().context("failed to open probe tab")?;

    enter_as_guest(&*tab, &config.endpoint)?;

    let mut writer = SampleWriter::create(&config.output)?;
    let samples = run_cycles(&*tab, config, &hostname, &mut writer)?;

    drop(tab);
    drop(browser);
    Ok(samples)
}

/// Non-interactive UI checks run once against a fresh tab each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmokeCheck {
    /// Guest entry lands on the home page.
    GuestEnter,
    /// Searching "demo" and opening the first hit lands on its overview.
    SearchBar,
}

pub const SMOKE_CHECKS: [SmokeCheck; 2] = [SmokeCheck::GuestEnter, SmokeCheck::SearchBar];
pub const SEARCH_FIELD_SELECTOR: &str = "#search-bar-text-field";
pub const SEARCH_TERM: &str = "demo";
pub const SEARCH_HIT_XPATH: &str = r#"//mark[contains(text(), "demo")]"#;
pub const SEARCH_RESULT_TITLE: &str = "demo | Overview | Red Hat Developer Hub";
pub const TITLE_TIMEOUT: Duration = Duration::from_secs(5);

impl SmokeCheck {
    pub fn name(&self) -> &'static str {
        match self {
            SmokeCheck::GuestEnter => "guest-enter",
            SmokeCheck::SearchBar => "search-bar",
        }
    }

    pub fn expected_title(&self) -> &'static str {
        match self {
            SmokeCheck::GuestEnter => EXPECTED_TITLE,
            SmokeCheck::SearchBar => SEARCH_RESULT_TITLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmokeOutcome {
    pub check: SmokeCheck,
    /// `None` when the check passed.
    pub failure: Option<String>,
}

impl SmokeOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Poll the title until it equals `expected` or `timeout` elapses.
pub fn await_title<P: ProbePage + ?Sized>(page: &P, expected: &str, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let title = page.page_title()?;
        if title == expected {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("unexpected page title {title:?}, expected {expected:?}");
        }
        std::thread::sleep(Duration::from_millis(250));
    }
}

/// Run one smoke check on a page that has not been entered yet.
pub fn run_smoke_check<P: ProbePage + ?Sized>(
    page: &P,
    endpoint: &str,
    check: SmokeCheck,
    title_timeout: Duration,
) -> SmokeOutcome {
    let result = (|| -> Result<()> {
        enter_as_guest(page, endpoint)?;
        if check == SmokeCheck::SearchBar {
            page.submit_text(SEARCH_FIELD_SELECTOR, SEARCH_TERM)?;
            page.click(SEARCH_HIT_XPATH)?;
        }
        await_title(page, check.expected_title(), title_timeout)
    })();

    let failure = result.err().map(|e| format!("{e:#}"));
    match &failure {
        None => tracing::info!(check = check.name(), "smoke check passed"),
        Some(reason) => tracing::error!(check = check.name(), %reason, "smoke check failed"),
    }
    SmokeOutcome { check, failure }
}

/// Run every smoke check, each in its own tab.
pub fn run_smoke_checks(endpoint: &str, chrome_path: Option<&Path>) -> Result<Vec<SmokeOutcome>> {
    let browser = launch_browser(chrome_path)?;
    let mut outcomes = Vec::with_capacity(SMOKE_CHECKS.len());
    for check in SMOKE_CHECKS {
        let tab = browser.new_tab().context("failed to open smoke check tab")?;
        outcomes.push(run_smoke_check(&*tab, endpoint, check, TITLE_TIMEOUT));
        if let Err(error) = tab.close(true) {
            tracing::debug!(%error, "unable to close smoke check tab");
        }
    }
    Ok(outcomes)
}

/// Fixed-width table of the recorded samples, one row per cycle.
pub fn format_table(samples: &[TimingSample]) -> String {
    let columns = &TIMING_SAMPLE_COLUMNS[2..];
    let widths: Vec<usize> = columns.iter().map(|c| c.len().max(10)).collect();

    let mut out = String::new();
    for (name, width) in columns.iter().zip(&widths) {
        let _ = write!(out, "{name:>width$} ");
    }
    out.push('\n');

    for s in samples {
        let cells = [
            s.cycle.to_string(),
            format!("{:.1}", s.first_paint_ms),
            format!("{:.1}", s.first_contentful_paint_ms),
            format!("{:.1}", s.dom_content_loaded_start_ms),
            format!("{:.1}", s.dom_content_loaded_end_ms),
            format!("{:.3}", s.user_cpu_s),
            format!("{:.3}", s.system_cpu_s),
            format!("{:.3}", s.children_user_cpu_s),
            format!("{:.3}", s.children_system_cpu_s),
            format!("{:.2}", s.avg_rss_mib),
            format!("{:.2}", s.avg_vms_mib),
            format!("{:.2}", s.avg_shared_mib),
            s.bytes_sent.to_string(),
            s.bytes_recv.to_string(),
            s.packets_sent.to_string(),
            s.packets_recv.to_string(),
        ];
        for (cell, width) in cells.iter().zip(&widths) {
            let _ = write!(out, "{cell:>width$} ");
        }
        out.push('\n');
    }
    out
}
