use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Chart decoration for one metric column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricMeta {
    pub title: Option<String>,
    pub label: Option<String>,
    pub units: Option<String>,
}

/// Contents of the metric metadata YAML file:
///
/// ```yaml
/// metrics:
///   RHDH_Memory_Avg:
///     title: "RHDH Memory Consumption"
///     label: "Memory Usage"
///     units: "MiB"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsMetadata {
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricMeta>,
}

impl MetricsMetadata {
    /// Load metadata, degrading to an empty set when the file is absent or unreadable.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no metric metadata file");
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                if text.trim().is_empty() {
                    Ok(Self::default())
                } else {
                    serde_yaml::from_str::<Self>(&text).map_err(|e| e.to_string())
                }
            });

        match parsed {
            Ok(meta) => meta,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not load metric metadata");
                Self::default()
            }
        }
    }

    pub fn get(&self, metric: &str) -> Option<&MetricMeta> {
        self.metrics.get(metric)
    }

    /// Chart title, falling back to `"<metric> vs <x-axis>"`.
    pub fn chart_title(&self, metric: &str, x_axis: &str) -> String {
        self.get(metric)
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| format!("{metric} vs {x_axis}"))
    }

    /// Y-axis label with units appended in brackets when known.
    pub fn y_label(&self, metric: &str) -> String {
        let meta = self.get(metric);
        let mut label = meta
            .and_then(|m| m.label.clone())
            .unwrap_or_else(|| metric.to_string());
        if let Some(units) = meta.and_then(|m| m.units.as_deref()) {
            label.push_str(&format!(" [{units}]"));
        }
        label
    }

    /// Heading shown above a chart in the HTML report.
    pub fn display_name(&self, metric: &str) -> String {
        self.get(metric)
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| metric.to_string())
    }
}

/// Column order of the probe CSV. Downstream tooling reads these names.
pub const TIMING_SAMPLE_COLUMNS: [&str; 18] = [
    "timestamp",
    "hostname",
    "cycle",
    "first-paint_start_time",
    "first-contentful-paint_start_time",
    "domContentLoadedEventStart",
    "domContentLoadedEventEnd",
    "user_cpu_s",
    "system_cpu_s",
    "children_user_cpu_s",
    "children_system_cpu_s",
    "avg_rss_mib",
    "avg_vms_mib",
    "avg_shared_mib",
    "bytes_sent",
    "bytes_recv",
    "packets_sent",
    "packets_recv",
];

/// One browser reload cycle as recorded by the UI probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSample {
    pub timestamp: String,
    pub hostname: String,
    pub cycle: u32,

    #[serde(rename = "first-paint_start_time")]
    pub first_paint_ms: f64,
    #[serde(rename = "first-contentful-paint_start_time")]
    pub first_contentful_paint_ms: f64,
    #[serde(rename = "domContentLoadedEventStart")]
    pub dom_content_loaded_start_ms: f64,
    #[serde(rename = "domContentLoadedEventEnd")]
    pub dom_content_loaded_end_ms: f64,

    pub user_cpu_s: f64,
    pub system_cpu_s: f64,
    pub children_user_cpu_s: f64,
    pub children_system_cpu_s: f64,

    pub avg_rss_mib: f64,
    pub avg_vms_mib: f64,
    pub avg_shared_mib: f64,

    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const METADATA: &str = r#"
metrics:
  RHDH_Memory_Avg:
    title: "RHDH Memory Consumption"
    label: "Memory Usage"
    units: "MiB"
  RHDH_CPU_Avg:
    label: "CPU Usage"
"#;

    #[test]
    fn test_load_and_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.yaml");
        fs::write(&path, METADATA).unwrap();

        let meta = MetricsMetadata::load(&path);
        assert_eq!(
            meta.chart_title("RHDH_Memory_Avg", "RBAC_POLICY_SIZE"),
            "RHDH Memory Consumption"
        );
        assert_eq!(meta.y_label("RHDH_Memory_Avg"), "Memory Usage [MiB]");
        assert_eq!(meta.y_label("RHDH_CPU_Avg"), "CPU Usage");
        assert_eq!(
            meta.chart_title("RHDH_CPU_Avg", "RBAC_POLICY_SIZE"),
            "RHDH_CPU_Avg vs RBAC_POLICY_SIZE"
        );
    }

    #[test]
    fn test_missing_entry_falls_back() {
        let meta = MetricsMetadata::default();
        assert_eq!(meta.chart_title("Latency", "x"), "Latency vs x");
        assert_eq!(meta.y_label("Latency"), "Latency");
        assert_eq!(meta.display_name("Latency"), "Latency");
    }

    #[test]
    fn test_unreadable_metadata_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "metrics: [unterminated").unwrap();

        assert_eq!(MetricsMetadata::load(&path), MetricsMetadata::default());
        assert_eq!(
            MetricsMetadata::load(dir.path().join("absent.yaml")),
            MetricsMetadata::default()
        );
    }

    #[test]
    fn test_timing_sample_header_matches_columns() {
        let sample = TimingSample {
            timestamp: "2025-01-01T00:00:00Z".into(),
            hostname: "probe-host".into(),
            cycle: 1,
            first_paint_ms: 120.0,
            first_contentful_paint_ms: 130.5,
            dom_content_loaded_start_ms: 400.0,
            dom_content_loaded_end_ms: 410.0,
            user_cpu_s: 0.1,
            system_cpu_s: 0.05,
            children_user_cpu_s: 0.0,
            children_system_cpu_s: 0.0,
            avg_rss_mib: 50.0,
            avg_vms_mib: 300.0,
            avg_shared_mib: 10.0,
            bytes_sent: 1000,
            bytes_recv: 20000,
            packets_sent: 10,
            packets_recv: 30,
        };

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&sample).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, TIMING_SAMPLE_COLUMNS.join(","));
    }
}
