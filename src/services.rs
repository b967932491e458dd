/// Static port-to-service labels, sorted by port for binary search.
pub const SERVICE_NAMES: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (465, "SMTPS"),
    (587, "SMTP(submission)"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (1521, "Oracle DB"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8080, "HTTP-Alt"),
    (8443, "HTTPS-Alt"),
    (8888, "Jupyter"),
    (9200, "Elasticsearch"),
    (27017, "MongoDB"),
];

/// Label for a TCP port, or `""` if the port is not in the table.
pub fn service_name(port: u16) -> &'static str {
    SERVICE_NAMES
        .binary_search_by_key(&port, |&(p, _)| p)
        .map(|idx| SERVICE_NAMES[idx].1)
        .unwrap_or("")
}
