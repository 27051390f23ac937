//! Loading of benchmark result CSVs for chart generation.
//!
//! A result file has a header row and one record per measured configuration,
//! e.g. a scalability run produces:
//!
//! ```text
//! RBAC_POLICY_SIZE,RHDH_Memory_Avg,RHDH_CPU_Avg
//! 1,402653184,0.12
//! 100,413138944,0.19
//! ```
//!
//! Rows are read once per metric. Values that do not coerce to `f64` are
//! skipped without error, so partially failed runs still chart.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// File name appended when an input path points at a results directory.
pub const SUMMARY_FILE: &str = "summary.csv";

/// Bytes per mebibyte; memory metrics are reported in MiB.
pub const MIB: f64 = 1_048_576.0;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{0} has no data rows")]
    Empty(PathBuf),
}

/// Resolve an input argument to a CSV file, appending [`SUMMARY_FILE`] to
/// anything that does not already name one.
pub fn normalize_csv_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.to_string_lossy().ends_with(SUMMARY_FILE) {
        path.to_path_buf()
    } else {
        path.join(SUMMARY_FILE)
    }
}

pub fn is_memory_metric(metric: &str) -> bool {
    metric.to_lowercase().contains("memory")
}

fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

fn headers(
    reader: &mut csv::Reader<BufReader<File>>,
    path: &Path,
) -> Result<csv::StringRecord, DatasetError> {
    reader
        .headers()
        .cloned()
        .map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Columns of the first data row that parse as numbers, in header order,
/// excluding the x-axis column.
pub fn detect_numeric_columns<P: AsRef<Path>>(
    path: P,
    x_axis: &str,
) -> Result<Vec<String>, DatasetError> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let header = headers(&mut reader, path)?;

    let first = match reader.records().next() {
        Some(record) => record.map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })?,
        None => return Err(DatasetError::Empty(path.to_path_buf())),
    };

    Ok(header
        .iter()
        .zip(first.iter())
        .filter(|(name, _)| *name != x_axis)
        .filter(|(_, value)| parse_value(value).is_some())
        .map(|(name, _)| name.to_string())
        .collect())
}

/// Read the `(x, metric)` series of one result file, sorted ascending by x.
///
/// Rows lacking either column or failing numeric coercion are dropped.
/// Memory metrics are converted from bytes to MiB.
pub fn load_series<P: AsRef<Path>>(
    path: P,
    x_axis: &str,
    metric: &str,
) -> Result<Vec<(f64, f64)>, DatasetError> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let header = headers(&mut reader, path)?;

    let (Some(x_idx), Some(y_idx)) = (
        header.iter().position(|h| h == x_axis),
        header.iter().position(|h| h == metric),
    ) else {
        return Ok(Vec::new());
    };

    let scale = if is_memory_metric(metric) { MIB } else { 1.0 };

    let mut points: Vec<(f64, f64)> = reader
        .records()
        .filter_map(Result::ok)
        .filter_map(|record| {
            let x = record.get(x_idx).and_then(parse_value)?;
            let y = record.get(y_idx).and_then(parse_value)?;
            Some((x, y / scale))
        })
        .collect();

    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    Ok(points)
}

/// Legend label derived from a result path.
///
/// Result directories are named `.artifacts.<scenario>.<version>.<timestamp>`;
/// the version may itself contain dots. Other directory names are used as-is.
pub fn extract_version<P: AsRef<Path>>(path: P) -> String {
    let parent = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let parts: Vec<&str> = parent.split('.').collect();
    if parts.len() >= 4 {
        parts[3..parts.len() - 1].join(".")
    } else {
        parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_memory_series_sorted_and_scaled() {
        let dir = tempdir().unwrap();
        let path = write_csv(dir.path(), "summary.csv", "x,Memory\n10,1048576\n5,2097152\n");

        let series = load_series(&path, "x", "Memory").unwrap();
        assert_eq!(series, vec![(5.0, 2.0), (10.0, 1.0)]);
    }

    #[test]
    fn test_non_numeric_rows_are_skipped() {
        let dir = tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "summary.csv",
            "RBAC_POLICY_SIZE,RHDH_CPU_Avg\n100,0.5\nn/a,0.7\n1,\n10,0.25\n1000\n",
        );

        let series = load_series(&path, "RBAC_POLICY_SIZE", "RHDH_CPU_Avg").unwrap();
        assert_eq!(series, vec![(10.0, 0.25), (100.0, 0.5)]);
        assert!(series.len() <= 5);
    }

    #[test]
    fn test_missing_column_yields_empty_series() {
        let dir = tempdir().unwrap();
        let path = write_csv(dir.path(), "summary.csv", "x,cpu\n1,2\n");

        assert!(load_series(&path, "x", "latency").unwrap().is_empty());
        assert!(load_series(&path, "size", "cpu").unwrap().is_empty());
    }

    #[test]
    fn test_non_memory_metric_is_not_scaled() {
        let dir = tempdir().unwrap();
        let path = write_csv(dir.path(), "summary.csv", "x,Latency_Avg\n1,2097152\n");

        assert_eq!(load_series(&path, "x", "Latency_Avg").unwrap(), vec![(1.0, 2097152.0)]);
        assert!(is_memory_metric("RHDH_MEMORY_max"));
        assert!(!is_memory_metric("RHDH_CPU_Avg"));
    }

    #[test]
    fn test_detect_numeric_columns() {
        let dir = tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "summary.csv",
            "RBAC_POLICY_SIZE,Version,RHDH_Memory_Avg,RHDH_CPU_Avg\n1,v1.7,1024,0.5\n",
        );

        let columns = detect_numeric_columns(&path, "RBAC_POLICY_SIZE").unwrap();
        assert_eq!(columns, vec!["RHDH_Memory_Avg", "RHDH_CPU_Avg"]);
    }

    #[test]
    fn test_detect_numeric_columns_empty_file() {
        let dir = tempdir().unwrap();
        let path = write_csv(dir.path(), "summary.csv", "x,y\n");

        assert!(matches!(
            detect_numeric_columns(&path, "x"),
            Err(DatasetError::Empty(_))
        ));
    }

    #[test]
    fn test_normalize_csv_path() {
        assert_eq!(
            normalize_csv_path("v1.6.3_summary.csv"),
            PathBuf::from("v1.6.3_summary.csv")
        );
        assert_eq!(
            normalize_csv_path("/results/run1"),
            PathBuf::from("/results/run1/summary.csv")
        );
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(
            extract_version("/ci/.artifacts.rbac-scale.1.7-122.20250101/summary.csv"),
            "1.7-122"
        );
        assert_eq!(
            extract_version("/ci/.artifacts.rbac-scale.v1.6.3.20250101/summary.csv"),
            "v1.6.3"
        );
        assert_eq!(extract_version("/ci/results/summary.csv"), "results");
    }

    #[test]
    fn test_open_missing_file() {
        let err = load_series("/definitely/not/here.csv", "x", "y").unwrap_err();
        assert!(matches!(err, DatasetError::Open { .. }));
    }
}
