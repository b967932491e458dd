use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use sysmon_portscan::ports::parse_port_list;
use sysmon_portscan::services::SERVICE_NAMES;
use sysmon_portscan::types::{DEFAULT_MAX_WORKERS, DEFAULT_TIMEOUT_SECS};
use sysmon_portscan::{scan_ports, server, PortProbeResult, Preset, ScanReport, ScanRequest};

/// sysmon: network diagnostics with a concurrent TCP port scanner.
#[derive(Debug, Parser)]
#[command(
    name = "sysmon",
    version,
    about = "Network diagnostics: concurrent TCP port scanning with a small JSON API.",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// TCP connect scan of one host.
    Scan(ScanArgs),
    /// Print the port-to-service reference table.
    Services,
    /// Serve the scan JSON API.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8501")]
        bind: String,
    },
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Target hostname or IP address.
    host: String,

    /// Port set to scan when --ports is not given.
    #[arg(long, value_enum, default_value_t = Preset::Common)]
    preset: Preset,

    /// Custom ports, comma separated; ranges allowed (e.g. 22,80,8000-8010). Overrides --preset.
    #[arg(long)]
    ports: Option<String>,

    /// Per-port connect timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: f64,

    /// Max concurrent connect attempts.
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
    workers: usize,

    /// List closed ports too.
    #[arg(long)]
    show_closed: bool,

    /// Print the report as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Write the report as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan(args) => run_scan(args).await,
        Command::Services => {
            print_services();
            Ok(())
        }
        Command::Serve { bind } => {
            println!("Scan API listening on http://{bind} (Ctrl+C to stop)");
            server::serve(&bind).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_scan(args: ScanArgs) -> Result<()> {
    // Malformed custom ports must fail before any connection is attempted.
    let ports = match args.ports.as_deref() {
        Some(text) => Some(parse_port_list(text).context("invalid --ports")?),
        None => {
            if args.preset == Preset::Custom {
                warn!("--preset custom without --ports, scanning the common set");
            }
            None
        }
    };

    let mut request = ScanRequest::new(args.host)
        .with_preset(args.preset)
        .with_timeout(args.timeout)
        .with_max_workers(args.workers);
    request.ports = ports;

    if !args.json {
        println!("Scanning {}...", request.host);
    }
    let report = scan_ports(&request)
        .await
        .with_context(|| format!("scan of {} failed", request.host))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.show_closed);
    }

    if let Some(path) = args.output.as_deref() {
        write_report_json(path, &report)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        if !args.json {
            println!("Wrote JSON report to {}", path.display());
        }
    }
    Ok(())
}

fn print_report(report: &ScanReport, show_closed: bool) {
    println!(
        "Scan complete: {} ports scanned, {} open, {} closed",
        report.total_scanned,
        report.open_count,
        report.closed_count()
    );

    let (title, rows) = if show_closed {
        ("All ports", &report.results)
    } else {
        ("Open ports", &report.open_ports)
    };
    if rows.is_empty() {
        println!("\nNo open ports found on {}", report.host);
        return;
    }
    println!("\n{}: {}", title, report.host);
    print_results_table(rows);
}

fn print_results_table(rows: &[PortProbeResult]) {
    let port_w = 5usize.max("port".len());
    let status_w = "closed".len().max("status".len());
    let mut service_w = "service".len();
    for r in rows {
        service_w = service_w.max(r.service_name.len());
    }

    println!(
        "{:>port_w$}  {:<status_w$}  {:<service_w$}",
        "port",
        "status",
        "service",
        port_w = port_w,
        status_w = status_w,
        service_w = service_w
    );
    println!(
        "{:-<port_w$}  {:-<status_w$}  {:-<service_w$}",
        "",
        "",
        "",
        port_w = port_w,
        status_w = status_w,
        service_w = service_w
    );
    for r in rows {
        println!(
            "{:>port_w$}  {:<status_w$}  {:<service_w$}",
            r.port,
            r.status.to_string(),
            r.service_name,
            port_w = port_w,
            status_w = status_w,
            service_w = service_w
        );
    }
}

fn print_services() {
    println!("{:>5}  service", "port");
    println!("{:-<5}  {:-<16}", "", "");
    for (port, name) in SERVICE_NAMES {
        println!("{:>5}  {}", port, name);
    }
}

fn write_report_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
