//! Well-known service registry
//!
//! Immutable, process-wide mapping from a case-insensitive service name to
//! its protocol/port entries, built once from the embedded table below.
//! Based on IANA assigned ports; organized by service category for easy
//! maintenance.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use drishti_common::types::Protocol;

/// One registered (protocol, port range) entry for a service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEntry {
    pub protocol: Protocol,
    pub start_port: u16,
    pub end_port: u16,
}

/// Placeholder for a side of the table with no assigned service.
const NA: &str = "N/A";

/// (port, tcp name, udp name)
const SERVICE_TABLE: &[(u16, &str, &str)] = &[
    // File Transfer Protocol
    (20, "ftp-data", NA),
    (21, "ftp", NA),
    (69, NA, "tftp"),
    (990, "ftps", NA),
    // Secure Shell
    (22, "ssh", NA),
    // Telnet
    (23, "telnet", NA),
    // Simple Mail Transfer Protocol
    (25, "smtp", NA),
    (465, "smtps", NA),
    (587, "submission", NA),
    // Domain Name System
    (53, "domain", "domain"),
    // Dynamic Host Configuration Protocol
    (67, NA, "bootps"),
    (68, NA, "bootpc"),
    // Hypertext Transfer Protocol
    (80, "http", NA),
    (443, "https", "https"),
    (8000, "http-alt", NA),
    (8080, "http-proxy", NA),
    (8443, "https-alt", NA),
    // Post Office Protocol
    (110, "pop3", NA),
    (995, "pop3s", NA),
    // Internet Message Access Protocol
    (143, "imap", NA),
    (993, "imaps", NA),
    // Remote Procedure Call / Microsoft Services
    (111, "rpcbind", "rpcbind"),
    (135, "msrpc", "msrpc"),
    (137, NA, "netbios-ns"),
    (138, NA, "netbios-dgm"),
    (139, "netbios-ssn", NA),
    (445, "microsoft-ds", NA),
    (3389, "rdp", NA),
    (5985, "wsman", NA),
    (5986, "wsmans", NA),
    // Simple Network Management Protocol
    (161, NA, "snmp"),
    (162, NA, "snmptrap"),
    // Lightweight Directory Access Protocol
    (389, "ldap", "ldap"),
    (636, "ldaps", NA),
    // Network Time Protocol
    (123, NA, "ntp"),
    // Kerberos
    (88, "kerberos", "kerberos"),
    (464, "kpasswd", "kpasswd"),
    // System Logging
    (514, "shell", "syslog"),
    (6514, "syslog-tls", NA),
    // Remote Authentication Dial-In User Service
    (1812, NA, "radius"),
    (1813, NA, "radius-acct"),
    // IPsec key exchange
    (500, NA, "isakmp"),
    (4500, NA, "ipsec-nat-t"),
    // Remote Sync
    (873, "rsync", NA),
    // Network File System
    (2049, "nfs", "nfs"),
    // SOCKS Proxy
    (1080, "socks", NA),
    // Squid HTTP Proxy
    (3128, "squid-http", NA),
    // Database Services
    (1433, "mssql", NA),
    (1521, "oracle", NA),
    (3306, "mysql", NA),
    (5432, "postgresql", NA),
    (6379, "redis", NA),
    (9200, "elasticsearch", NA),
    (11211, "memcached", "memcached"),
    (27017, "mongodb", NA),
    // Version Control
    (9418, "git", NA),
    // Virtual Network Computing
    (5900, "vnc", NA),
];

/// Alias key registered on top of the literal `domain` rows.
const DNS_ALIAS: &str = "DNS";

/// Unreachable stub so configurations that reference ICMP still parse and
/// evaluate; TCP/65535-65535 matches no real traffic in this analyzer.
const ALL_ICMP: &str = "ALL_ICMP";

static REGISTRY: Lazy<HashMap<String, Vec<ServiceEntry>>> = Lazy::new(build_registry);

fn build_registry() -> HashMap<String, Vec<ServiceEntry>> {
    let mut registry: HashMap<String, Vec<ServiceEntry>> = HashMap::new();

    let mut register = |name: &str, protocol: Protocol, port: u16| {
        if port == 0 || name.is_empty() || name == NA {
            return;
        }
        let entry = ServiceEntry {
            protocol,
            start_port: port,
            end_port: port,
        };
        let mut keys = vec![name.to_ascii_uppercase()];
        if name.eq_ignore_ascii_case("domain") {
            keys.push(DNS_ALIAS.to_string());
        }
        for key in keys {
            registry.entry(key).or_default().push(entry);
        }
    };

    for (port, tcp_name, udp_name) in SERVICE_TABLE {
        register(tcp_name, Protocol::Tcp, *port);
        register(udp_name, Protocol::Udp, *port);
    }

    registry.insert(
        ALL_ICMP.to_string(),
        vec![ServiceEntry {
            protocol: Protocol::Tcp,
            start_port: 65_535,
            end_port: 65_535,
        }],
    );

    registry
}

/// Case-insensitive lookup of a well-known service name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static [ServiceEntry]> {
    REGISTRY
        .get(&name.to_ascii_uppercase())
        .map(Vec::as_slice)
}
