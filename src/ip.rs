//! IP literal validation and allow-list text parsing.
//!
//! Administrators enter allow-list IPs as free text, one entry per line (or
//! tab-separated). [`parse_ip_block`] turns that text into a clean,
//! de-duplicated list of valid IPv4/IPv6 literals; anything that does not
//! parse is silently dropped rather than rejected. Membership checks are
//! exact string equality on the validated literal — no CIDR ranges, no
//! hostnames.

use std::collections::HashSet;
use std::net::IpAddr;

/// Check whether `s` is a syntactically valid IPv4 or IPv6 address literal.
///
/// Ranges, CIDR notation, and hostnames are all rejected.
///
/// # Example
/// ```
/// use axum_dirgate::ip::is_valid_ip;
///
/// assert!(is_valid_ip("203.0.113.7"));
/// assert!(is_valid_ip("::1"));
/// assert!(!is_valid_ip("203.0.113.0/24"));
/// assert!(!is_valid_ip("example.com"));
/// ```
pub fn is_valid_ip(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}

/// Parse a free-text block of IPs into a validated, de-duplicated list.
///
/// - Line-ending variants (`\r\n`, `\r`) are normalized to `\n`.
/// - Entries are split on runs of tabs and/or newlines. Commas are NOT
///   separators; a line like `1.2.3.4,5.6.7.8` is a single invalid token.
/// - Each token is trimmed; empty tokens are discarded.
/// - Tokens that fail [`is_valid_ip`] are discarded without error.
/// - Duplicates are removed, keeping the first occurrence's position.
///
/// Empty input yields an empty list.
///
/// # Example
/// ```
/// use axum_dirgate::ip::parse_ip_block;
///
/// let ips = parse_ip_block("1.2.3.4\t5.6.7.8\nnot-an-ip\n1.2.3.4");
/// assert_eq!(ips, vec!["1.2.3.4", "5.6.7.8"]);
/// ```
pub fn parse_ip_block(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in text.split(['\t', '\n']) {
        let ip = token.trim();
        if ip.is_empty() || !is_valid_ip(ip) {
            continue;
        }
        if seen.insert(ip.to_string()) {
            out.push(ip.to_string());
        }
    }
    out
}
