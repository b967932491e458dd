use thiserror::Error;

/// Errors that stop a scan as a whole.
///
/// Individual port failures never show up here: a refused or timed-out
/// connect is recorded as a closed port in the report.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("invalid port value: {0}")]
    InvalidPort(String),
    #[error("invalid port range {start}-{end} (start > end)")]
    InvalidRange { start: u16, end: u16 },
    #[error("no ports to scan")]
    NoPorts,
    #[error("invalid timeout: {0} seconds")]
    InvalidTimeout(f64),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("probe scheduler closed: {0}")]
    Scheduler(#[from] tokio::sync::AcquireError),
    #[error("probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("failed to start scan runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ScanError {
    /// True for errors caused by the request itself rather than the environment.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ScanError::EmptyHost
                | ScanError::InvalidPort(_)
                | ScanError::InvalidRange { .. }
                | ScanError::NoPorts
                | ScanError::InvalidTimeout(_)
                | ScanError::InvalidBody(_)
        )
    }
}
