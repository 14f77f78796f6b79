//! Structural and address checks for subscriber webhook URLs.
//!
//! Only literal IP hosts are inspected. DNS names are not resolved here, so a
//! name pointing into a private range passes validation.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

/// Reasons a subscriber URL is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlValidationError {
    /// The URL could not be parsed at all
    #[error("malformed URL: {0}")]
    Malformed(String),

    /// The URL has no host component
    #[error("missing host")]
    MissingHost,

    /// Only `http` and `https` are deliverable
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Plain `http` outside local development mode
    #[error("HTTPS required")]
    HttpsRequired,

    /// Literal address in a private, link-local or loopback range
    #[error("private or loopback address not allowed: {0}")]
    PrivateAddress(IpAddr),
}

/// Validate `raw` as a webhook target.
///
/// Rules, in order:
/// 1. The URL must parse and carry a host.
/// 2. The scheme must be `http` or `https`.
/// 3. `http` is allowed only when `allow_local` is set and the host is local
///    (`localhost`, `127.0.0.0/8`, `::1`, `0.0.0.0`).
/// 4. Literal addresses in RFC1918, link-local or loopback ranges are refused
///    regardless of scheme, except local hosts admitted by rule 3's flag.
pub fn validate_webhook_url(raw: &str, allow_local: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlValidationError::Malformed(e.to_string()))?;

    let host = match url.host() {
        Some(Host::Domain(domain)) if domain.is_empty() => return Err(UrlValidationError::MissingHost),
        Some(host) => host,
        None => return Err(UrlValidationError::MissingHost),
    };

    let local = is_local_host(&host);
    match url.scheme() {
        "https" => {}
        "http" => {
            if !(allow_local && local) {
                return Err(UrlValidationError::HttpsRequired);
            }
        }
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if let Some(ip) = host_ip(&host) {
        if !(allow_local && local) && is_restricted(ip) {
            return Err(UrlValidationError::PrivateAddress(ip));
        }
    }

    Ok(url)
}

fn host_ip(host: &Host<&str>) -> Option<IpAddr> {
    match host {
        Host::Domain(_) => None,
        Host::Ipv4(v4) => Some(IpAddr::V4(*v4)),
        Host::Ipv6(v6) => Some(match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(*v6),
        }),
    }
}

fn is_local_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        _ => match host_ip(host) {
            Some(IpAddr::V4(v4)) => v4.is_loopback() || v4.is_unspecified(),
            Some(IpAddr::V6(v6)) => v6.is_loopback(),
            None => false,
        },
    }
}

fn is_restricted(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_restricted_v4(v4),
        IpAddr::V6(v6) => is_restricted_v6(v6),
    }
}

fn is_restricted_v4(ip: Ipv4Addr) -> bool {
    ip.is_private() || ip.is_link_local() || ip.is_loopback() || ip.is_unspecified()
}

fn is_restricted_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    ip.is_loopback() || ip.is_unspecified() || unique_local || link_local
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.com/x")]
    #[case("HTTPS://Example.com/x")]
    #[case("https://example.com:8443/hooks?a=1")]
    #[case("https://93.184.216.34/x")]
    #[case("https://[2001:db8::1]/x")]
    fn test_accepted_without_local_mode(#[case] url: &str) {
        assert!(validate_webhook_url(url, false).is_ok(), "{url} should be accepted");
    }

    #[rstest]
    #[case("http://example.com/x", UrlValidationError::HttpsRequired)]
    #[case("http://localhost:3000/x", UrlValidationError::HttpsRequired)]
    #[case("ftp://example.com/x", UrlValidationError::UnsupportedScheme("ftp".to_string()))]
    #[case("file:///etc/passwd", UrlValidationError::MissingHost)]
    fn test_scheme_rules(#[case] url: &str, #[case] expected: UrlValidationError) {
        assert_eq!(validate_webhook_url(url, false).unwrap_err(), expected);
    }

    #[rstest]
    #[case("https://10.0.0.1/x")]
    #[case("https://172.16.5.4/x")]
    #[case("https://192.168.1.10/x")]
    #[case("https://169.254.169.254/latest/meta-data")]
    #[case("https://127.0.0.1/x")]
    #[case("https://[::1]/x")]
    #[case("https://[fd00::1]/x")]
    #[case("https://[fe80::1]/x")]
    #[case("https://[::ffff:10.0.0.1]/x")]
    fn test_private_literals_rejected(#[case] url: &str) {
        assert!(matches!(
            validate_webhook_url(url, false),
            Err(UrlValidationError::PrivateAddress(_))
        ));
    }

    #[test]
    fn test_private_range_rejected_even_in_local_mode() {
        assert!(matches!(
            validate_webhook_url("https://10.0.0.1/x", true),
            Err(UrlValidationError::PrivateAddress(_))
        ));
        assert_eq!(
            validate_webhook_url("http://192.168.1.10/x", true).unwrap_err(),
            UrlValidationError::HttpsRequired
        );
    }

    #[rstest]
    #[case("http://localhost:3000/x")]
    #[case("http://127.0.0.1:8080/x")]
    #[case("http://127.8.9.10/x")]
    #[case("http://[::1]:8080/x")]
    #[case("http://0.0.0.0:9000/x")]
    #[case("https://127.0.0.1/x")]
    fn test_local_mode_admits_loopback(#[case] url: &str) {
        assert!(validate_webhook_url(url, true).is_ok(), "{url} should be accepted");
    }

    #[test]
    fn test_shorthand_ipv4_is_normalized() {
        // `127.1` parses to 127.0.0.1 and must not slip past the checks.
        assert!(matches!(
            validate_webhook_url("https://127.1/x", false),
            Err(UrlValidationError::PrivateAddress(_))
        ));
    }

    #[test]
    fn test_dns_names_are_not_resolved() {
        assert!(validate_webhook_url("https://internal.example/x", false).is_ok());
    }

    #[rstest]
    #[case("not a url")]
    #[case("")]
    #[case("example.com/x")]
    fn test_malformed(#[case] url: &str) {
        assert!(matches!(
            validate_webhook_url(url, false),
            Err(UrlValidationError::Malformed(_))
        ));
    }
}
