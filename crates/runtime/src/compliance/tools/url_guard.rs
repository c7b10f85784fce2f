//! SSRF-safe URL validation, checked before every outbound fetch.
//!
//! Syntactic/numeric only — DNS resolution happens later, in the
//! fetcher, and can still fail independently.

use std::net::IpAddr;

/// Reason a URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    BadScheme(String),
    EmptyHost,
    LoopbackHost,
    PrivateAddress,
    LoopbackAddress,
    ReservedAddress,
    LinkLocalAddress,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::BadScheme(s) => write!(f, "scheme '{s}' is not http/https"),
            RejectReason::EmptyHost => write!(f, "empty hostname"),
            RejectReason::LoopbackHost => write!(f, "loopback hostname"),
            RejectReason::PrivateAddress => write!(f, "private IP address"),
            RejectReason::LoopbackAddress => write!(f, "loopback IP address"),
            RejectReason::ReservedAddress => write!(f, "reserved IP address"),
            RejectReason::LinkLocalAddress => write!(f, "link-local IP address"),
        }
    }
}

/// Validates a URL against scheme/host/IP rules. Never panics, never
/// performs I/O.
pub fn validate(raw_url: &str) -> Result<(), RejectReason> {
    let parsed = url::Url::parse(raw_url).map_err(|_| RejectReason::BadScheme(raw_url.into()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(RejectReason::BadScheme(other.to_string())),
    }

    let host = parsed.host_str().unwrap_or("");
    if host.is_empty() {
        return Err(RejectReason::EmptyHost);
    }
    if matches!(host, "localhost" | "0.0.0.0" | "::1") {
        return Err(RejectReason::LoopbackHost);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        classify_ip(ip)?;
    }

    Ok(())
}

fn classify_ip(ip: IpAddr) -> Result<(), RejectReason> {
    if ip.is_loopback() {
        return Err(RejectReason::LoopbackAddress);
    }
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_private() {
                return Err(RejectReason::PrivateAddress);
            }
            if v4.is_link_local() {
                return Err(RejectReason::LinkLocalAddress);
            }
            if is_reserved_v4(v4) {
                return Err(RejectReason::ReservedAddress);
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_unique_local() || v6.segments()[0] & 0xfe00 == 0xfc00 {
                return Err(RejectReason::PrivateAddress);
            }
            if v6.is_unicast_link_local() {
                return Err(RejectReason::LinkLocalAddress);
            }
        }
    }
    Ok(())
}

/// Reserved/benchmark IPv4 ranges `std::net::Ipv4Addr` doesn't classify:
/// 0.0.0.0/8, 100.64.0.0/10 (CGNAT), 192.0.0.0/24, 192.0.2.0/24 (TEST-NET-1),
/// 198.18.0.0/15 (benchmark), 198.51.100.0/24 (TEST-NET-2),
/// 203.0.113.0/24 (TEST-NET-3), 240.0.0.0/4 (reserved), 255.255.255.255.
fn is_reserved_v4(ip: std::net::Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 0
        || (o[0] == 100 && (64..=127).contains(&o[1]))
        || (o[0] == 192 && o[1] == 0 && o[2] == 0)
        || (o[0] == 192 && o[1] == 0 && o[2] == 2)
        || (o[0] == 198 && (18..=19).contains(&o[1]))
        || (o[0] == 198 && o[1] == 51 && o[2] == 100)
        || (o[0] == 203 && o[1] == 0 && o[2] == 113)
        || o[0] >= 240
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_https() {
        assert!(validate("https://law.moj.gov.tw/LawClass/LawAll.aspx").is_ok());
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert_eq!(
            validate("ftp://example.com/file"),
            Err(RejectReason::BadScheme("ftp".into()))
        );
    }

    #[test]
    fn rejects_localhost_name() {
        assert_eq!(
            validate("http://localhost/admin"),
            Err(RejectReason::LoopbackHost)
        );
    }

    #[test]
    fn rejects_private_ipv4() {
        assert_eq!(
            validate("http://192.168.1.1/law.pdf"),
            Err(RejectReason::PrivateAddress)
        );
    }

    #[test]
    fn rejects_loopback_ipv4() {
        assert_eq!(
            validate("http://127.0.0.1/x"),
            Err(RejectReason::LoopbackAddress)
        );
    }

    #[test]
    fn rejects_link_local_ipv4() {
        assert_eq!(
            validate("http://169.254.1.1/x"),
            Err(RejectReason::LinkLocalAddress)
        );
    }

    #[test]
    fn rejects_reserved_cgnat() {
        assert_eq!(
            validate("http://100.64.0.5/x"),
            Err(RejectReason::ReservedAddress)
        );
    }

    #[test]
    fn rejects_ipv6_loopback() {
        assert_eq!(
            validate("http://[::1]/x"),
            Err(RejectReason::LoopbackHost)
        );
    }

    #[test]
    fn rejects_ipv6_unique_local() {
        assert_eq!(
            validate("http://[fd00::1]/x"),
            Err(RejectReason::PrivateAddress)
        );
    }
}
