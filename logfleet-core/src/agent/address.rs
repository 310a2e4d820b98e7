use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs, UdpSocket};

use url::Url;

use crate::error::{FleetError, Result};

/// Normalise a configured control-plane url.
///
/// Adds `http://` when no scheme is given, requires an absolute url with a
/// host, and drops any trailing slash.
pub fn normalize_control_plane_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FleetError::Registration(
            "control-plane url is not configured".to_string(),
        ));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|err| {
        FleetError::Registration(format!("invalid control-plane url {raw:?}: {err}"))
    })?;
    if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
        return Err(FleetError::Registration(format!(
            "control-plane url {raw:?} is not an absolute url"
        )));
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Best guess at the address other hosts can reach this one on.
///
/// Tries, in order: a non-loopback IPv4 address the hostname resolves to,
/// the local address the OS picks for an outbound UDP route, then loopback.
pub fn discover_ip_address() -> IpAddr {
    hostname_ipv4()
        .or_else(outbound_route_ipv4)
        .map(IpAddr::V4)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

fn hostname_ipv4() -> Option<Ipv4Addr> {
    let host = hostname::get().ok()?.into_string().ok()?;
    (host.as_str(), 0)
        .to_socket_addrs()
        .ok()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(ip) if usable(ip) => Some(ip),
            _ => None,
        })
}

fn outbound_route_ipv4() -> Option<Ipv4Addr> {
    // No packet is sent; connecting a UDP socket only selects a route.
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(("8.8.8.8", 65530)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if usable(ip) => Some(ip),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_scheme_and_strips_slash() {
        assert_eq!(
            normalize_control_plane_url("lb.internal:5000/").unwrap(),
            "http://lb.internal:5000"
        );
        assert_eq!(
            normalize_control_plane_url("https://lb.example.com/").unwrap(),
            "https://lb.example.com"
        );
        assert_eq!(
            normalize_control_plane_url("  http://10.0.0.5:8080/base/ ").unwrap(),
            "http://10.0.0.5:8080/base"
        );
    }

    #[test]
    fn rejects_unusable_urls() {
        for raw in ["", "   ", "http://", "http://exa mple.com"] {
            assert!(
                matches!(
                    normalize_control_plane_url(raw),
                    Err(FleetError::Registration(_))
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn discovered_address_is_ipv4() {
        assert!(discover_ip_address().is_ipv4());
    }
}
