use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::ports;
use crate::services::service_name;

pub const DEFAULT_TIMEOUT_SECS: f64 = 1.0;
pub const DEFAULT_MAX_WORKERS: usize = 100;

/// Named port set used when no explicit ports are given.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Curated list of well-known service ports.
    #[default]
    Common,
    /// Every port from 1 to 1024.
    All,
    /// Caller-supplied ports; falls back to `common` when none are given.
    Custom,
}

/// Input to one scan. Explicit `ports` override `preset`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub host: String,
    #[serde(default)]
    pub ports: Option<Vec<u16>>,
    #[serde(default)]
    pub preset: Preset,
    /// Per-connection timeout in seconds.
    #[serde(default = "default_timeout", alias = "per_connection_timeout")]
    pub timeout: f64,
    #[serde(default = "default_max_workers", alias = "max_concurrency")]
    pub max_workers: usize,
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

impl ScanRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: None,
            preset: Preset::default(),
            timeout: DEFAULT_TIMEOUT_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = Some(ports);
        self
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Concrete target ports for this request.
    pub fn target_ports(&self) -> Vec<u16> {
        ports::resolve(self.ports.as_deref(), self.preset)
    }

    /// The per-connection timeout as a `Duration`. Rejects negative, NaN and infinite values.
    pub fn timeout_duration(&self) -> Result<Duration, ScanError> {
        Duration::try_from_secs_f64(self.timeout).map_err(|_| ScanError::InvalidTimeout(self.timeout))
    }
}

/// Outcome of one connect attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Open => write!(f, "open"),
            PortStatus::Closed => write!(f, "closed"),
        }
    }
}

/// One scanned port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortProbeResult {
    pub port: u16,
    pub status: PortStatus,
    #[serde(rename = "service")]
    pub service_name: String,
}

impl PortProbeResult {
    /// Build a result, labelling the port from the static service table.
    pub fn new(port: u16, status: PortStatus) -> Self {
        Self {
            port,
            status,
            service_name: service_name(port).to_string(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// Aggregate result of one scan, ordered by port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub host: String,
    pub total_scanned: usize,
    pub open_count: usize,
    pub results: Vec<PortProbeResult>,
    #[serde(alias = "open_results")]
    pub open_ports: Vec<PortProbeResult>,
    /// RFC 3339 completion time, set by a live scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl ScanReport {
    /// Sort results by port and derive the counters and the open subsequence.
    pub fn aggregate(host: impl Into<String>, mut results: Vec<PortProbeResult>) -> Self {
        results.sort_by_key(|r| r.port);
        let open_ports: Vec<PortProbeResult> =
            results.iter().filter(|r| r.is_open()).cloned().collect();
        Self {
            host: host.into(),
            total_scanned: results.len(),
            open_count: open_ports.len(),
            results,
            open_ports,
            finished_at: None,
        }
    }

    pub fn closed_count(&self) -> usize {
        self.total_scanned - self.open_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_sorts_and_counts() {
        let results = vec![
            PortProbeResult::new(443, PortStatus::Open),
            PortProbeResult::new(22, PortStatus::Closed),
            PortProbeResult::new(80, PortStatus::Open),
            PortProbeResult::new(21, PortStatus::Closed),
        ];
        let report = ScanReport::aggregate("example.test", results);

        let ports: Vec<u16> = report.results.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![21, 22, 80, 443]);
        assert_eq!(report.total_scanned, 4);
        assert_eq!(report.open_count, 2);
        assert_eq!(report.closed_count(), 2);
        let open: Vec<u16> = report.open_ports.iter().map(|r| r.port).collect();
        assert_eq!(open, vec![80, 443]);
        assert!(report.finished_at.is_none());
    }

    #[test]
    fn aggregate_keeps_duplicates() {
        let results = vec![
            PortProbeResult::new(80, PortStatus::Closed),
            PortProbeResult::new(80, PortStatus::Closed),
        ];
        let report = ScanReport::aggregate("h", results);
        assert_eq!(report.total_scanned, 2);
        assert_eq!(report.results[0], report.results[1]);
    }

    #[test]
    fn aggregate_empty() {
        let report = ScanReport::aggregate("h", Vec::new());
        assert_eq!(report.total_scanned, 0);
        assert_eq!(report.open_count, 0);
        assert!(report.open_ports.is_empty());
    }

    #[test]
    fn service_label_ignores_status() {
        assert_eq!(PortProbeResult::new(443, PortStatus::Open).service_name, "HTTPS");
        assert_eq!(PortProbeResult::new(443, PortStatus::Closed).service_name, "HTTPS");
        assert_eq!(PortProbeResult::new(54321, PortStatus::Open).service_name, "");
    }

    #[test]
    fn report_json_shape() {
        let report =
            ScanReport::aggregate("h", vec![PortProbeResult::new(80, PortStatus::Open)]);
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["results"][0]["status"], "open");
        assert_eq!(v["results"][0]["service"], "HTTP");
        assert_eq!(v["open_ports"][0]["port"], 80);
        assert!(v.get("finished_at").is_none());
    }

    #[test]
    fn request_defaults_and_aliases() {
        let req: ScanRequest = serde_json::from_str(r#"{"host":"10.0.0.1"}"#).unwrap();
        assert_eq!(req.preset, Preset::Common);
        assert_eq!(req.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(req.max_workers, DEFAULT_MAX_WORKERS);

        let req: ScanRequest = serde_json::from_str(
            r#"{"host":"h","preset":"all","per_connection_timeout":0.5,"max_concurrency":7}"#,
        )
        .unwrap();
        assert_eq!(req.preset, Preset::All);
        assert_eq!(req.timeout, 0.5);
        assert_eq!(req.max_workers, 7);
    }

    #[test]
    fn timeout_validation() {
        assert_eq!(
            ScanRequest::new("h").with_timeout(0.25).timeout_duration().unwrap(),
            Duration::from_millis(250)
        );
        assert!(ScanRequest::new("h").with_timeout(-1.0).timeout_duration().is_err());
        assert!(ScanRequest::new("h").with_timeout(f64::NAN).timeout_duration().is_err());
    }
}
