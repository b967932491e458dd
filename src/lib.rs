//! Library crate for sysmon-portscan: bounded-concurrency TCP connect port scanning.
pub mod error;
pub mod ports;
pub mod scanner;
pub mod server;
pub mod services;
pub mod types;

pub use error::ScanError;
pub use scanner::{scan_ports, scan_ports_blocking};
pub use types::{PortProbeResult, PortStatus, Preset, ScanReport, ScanRequest};
