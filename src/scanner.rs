use crate::error::ScanError;
use crate::types::{PortProbeResult, PortStatus, ScanReport, ScanRequest};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, info};
use ::time::{format_description::well_known, OffsetDateTime};

/// Hard ceiling on simultaneous connect attempts, whatever the caller asks for.
pub const MAX_CONCURRENCY: usize = 5_000;

/// Probes a single `(host, port)` and classifies it.
///
/// Implementations must not fail: any connection problem is a closed port.
pub trait Prober: Send + Sync + 'static {
    fn probe(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = PortProbeResult> + Send;
}

/// Plain TCP connect-and-close prober.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

impl Prober for TcpConnectProber {
    fn probe(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = PortProbeResult> + Send {
        probe_port(host, port, timeout)
    }
}

/// Connect to `host:port` within `timeout`, then close the socket immediately.
///
/// Name resolution counts against the timeout. Refused, unreachable, timed out
/// and unresolvable all come back as [`PortStatus::Closed`].
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> PortProbeResult {
    let start = Instant::now();
    let status = match time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            debug!(
                host,
                port,
                latency_ms = start.elapsed().as_millis() as u64,
                "open"
            );
            PortStatus::Open
        }
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "closed");
            PortStatus::Closed
        }
        Err(_) => {
            debug!(host, port, "closed (timeout)");
            PortStatus::Closed
        }
    };
    PortProbeResult::new(port, status)
}

/// Probe every port in `ports` with at most `max_concurrency` probes in flight.
///
/// - A semaphore permit is taken before each task is spawned and held until the probe ends.
/// - Returns only after every task has reported; results come back in completion order.
/// - A closed semaphore or a failed task aborts the whole scan.
pub async fn scan_with<P: Prober>(
    prober: Arc<P>,
    host: &str,
    ports: &[u16],
    timeout: Duration,
    max_concurrency: usize,
) -> Result<Vec<PortProbeResult>, ScanError> {
    let sem = Arc::new(Semaphore::new(max_concurrency.clamp(1, MAX_CONCURRENCY)));
    let host: Arc<str> = Arc::from(host);
    let mut set = JoinSet::new();

    for &port in ports {
        let permit = sem.clone().acquire_owned().await?;
        let prober = prober.clone();
        let host = host.clone();

        set.spawn(async move {
            let _permit = permit; // keep permit until the probe completes
            prober.probe(&host, port, timeout).await
        });
    }

    let mut results = Vec::with_capacity(ports.len());
    while let Some(res) = set.join_next().await {
        results.push(res?);
    }
    Ok(results)
}

/// Scan a host over TCP and return a report sorted by port.
///
/// Request validation (empty host, bad timeout) happens before any socket is opened.
pub async fn scan_ports(request: &ScanRequest) -> Result<ScanReport, ScanError> {
    scan_ports_with(Arc::new(TcpConnectProber), request).await
}

/// Same as [`scan_ports`] with a caller-provided prober.
pub async fn scan_ports_with<P: Prober>(
    prober: Arc<P>,
    request: &ScanRequest,
) -> Result<ScanReport, ScanError> {
    let host = request.host.trim();
    if host.is_empty() {
        return Err(ScanError::EmptyHost);
    }
    let timeout = request.timeout_duration()?;
    let targets = request.target_ports();

    let start = Instant::now();
    let results = scan_with(prober, host, &targets, timeout, request.max_workers).await?;

    let mut report = ScanReport::aggregate(host, results);
    report.finished_at = Some(now_rfc3339());
    info!(
        host,
        scanned = report.total_scanned,
        open = report.open_count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "scan finished"
    );
    Ok(report)
}

/// Blocking wrapper around [`scan_ports`] on a dedicated runtime.
///
/// Must not be called from inside an async context. Name lookups still running on the
/// blocking pool after the scan finished are not waited for.
pub fn scan_ports_blocking(request: &ScanRequest) -> Result<ScanReport, ScanError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = rt.block_on(scan_ports(request));
    rt.shutdown_background();
    report
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
