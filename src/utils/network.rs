//! Network utilities
//!
//! Provides network-related utility functions.

use log::debug;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Public address used only to pick an outbound interface; nothing is sent.
const PROBE_ADDR: &str = "8.8.8.8:80";

/// LAN address of this host, or loopback when it cannot be determined.
pub fn local_ip() -> IpAddr {
    match probe_local_ip() {
        Ok(ip) => ip,
        Err(e) => {
            debug!("Local IP discovery failed, using loopback: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

fn probe_local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(PROBE_ADDR)?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ip_is_never_unspecified() {
        assert!(!local_ip().is_unspecified());
    }
}
