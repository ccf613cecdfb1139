use crate::error::{ParseError, ParseErrorExt};
use crate::scalar::parse_comma_strings;
use ipnet::IpNet;
use serde_json::Value;
use std::net::IpAddr;

/// Parses a list (or comma-separated string) of CIDR blocks.
///
/// Bare IP addresses are accepted and become single-host networks (`/32` or `/128`).
pub fn parse_addrs(value: &Value) -> Result<Vec<IpNet>, ParseError> {
    parse_comma_strings(value)?.iter().map(|entry| parse_addrs_str(entry)).collect()
}

/// Parses a single CIDR block or bare IP address.
pub fn parse_addrs_str(entry: &str) -> Result<IpNet, ParseError> {
    let entry = entry.trim();
    if let Ok(ip) = entry.parse::<IpAddr>() {
        let host_prefix = if ip.is_ipv4() { 32 } else { 128 };
        return IpNet::new(ip, host_prefix)
            .map_err(|e| ParseError::invalid(format!("{entry:?}: {e}")));
    }
    entry.parse::<IpNet>().context(format!("Failed to parse {entry:?} as a CIDR block"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_entries() {
        let nets = parse_addrs(&json!("127.0.0.1, 10.0.0.0/8, ::1")).unwrap();
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[0].prefix_len(), 32);
        assert_eq!(nets[1].to_string(), "10.0.0.0/8");
        assert_eq!(nets[2].prefix_len(), 128);
        assert!(nets[1].contains(&"10.1.2.3".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn test_bad_entry_reports_context() {
        let err = parse_addrs(&json!(["10.0.0.0/8", "nope"])).unwrap_err();
        assert!(matches!(err, ParseError::Address { .. }));
        assert!(err.to_string().contains("nope"));
    }
}
