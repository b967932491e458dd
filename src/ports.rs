use tracing::warn;

use crate::error::ScanError;
use crate::types::Preset;

/// Upper bound on caller-supplied ports per scan. Extra entries are dropped.
pub const MAX_PORTS: usize = 1000;

/// Ports probed by the `common` preset.
pub const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 143, 443, 465, 587, 993, 995, 1433, 1521, 3306, 3389, 5432, 5900,
    6379, 8080, 8443, 8888, 9200, 27017,
];

/// Last port of the `all` preset (the range starts at 1).
pub const ALL_PRESET_LAST: u16 = 1024;

/// Turn explicit ports or a preset into the list of ports to probe.
///
/// Explicit ports win when non-empty and are capped at [`MAX_PORTS`]. Duplicates are kept.
pub fn resolve(ports: Option<&[u16]>, preset: Preset) -> Vec<u16> {
    match ports {
        Some(list) if !list.is_empty() => {
            if list.len() > MAX_PORTS {
                warn!(
                    supplied = list.len(),
                    kept = MAX_PORTS,
                    "port list truncated"
                );
            }
            list.iter().take(MAX_PORTS).copied().collect()
        }
        _ => match preset {
            Preset::All => (1..=ALL_PRESET_LAST).collect(),
            Preset::Common | Preset::Custom => COMMON_PORTS.to_vec(),
        },
    }
}

/// Parse a custom port list such as `"22, 80 443\n8000-8002 # dev"`.
///
/// Tokens are separated by commas or whitespace; each is a port (1..=65535) or an
/// inclusive `start-end` range. Everything after `#` on a line is ignored.
/// Duplicates are kept in input order. Empty results are an error.
pub fn parse_port_list(s: &str) -> Result<Vec<u16>, ScanError> {
    let mut out: Vec<u16> = Vec::new();

    for raw_line in s.lines() {
        let line = raw_line.split('#').next().unwrap_or("");
        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            if let Some((a, b)) = token.split_once('-') {
                let start = parse_port_str(a.trim())?;
                let end = parse_port_str(b.trim())?;
                if start > end {
                    return Err(ScanError::InvalidRange { start, end });
                }
                out.extend(start..=end);
                continue;
            }
            out.push(parse_port_str(token)?);
        }
    }

    if out.is_empty() {
        return Err(ScanError::NoPorts);
    }
    Ok(out)
}

fn parse_port_str(s: &str) -> Result<u16, ScanError> {
    match s.parse::<u32>() {
        Ok(val) if (1..=65535).contains(&val) => Ok(val as u16),
        _ => Err(ScanError::InvalidPort(s.to_string())),
    }
}
