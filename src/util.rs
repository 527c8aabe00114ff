//! Internal utilities: hex formatting, socket binding, randomness.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Encode bytes as a lowercase hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Decode a hex string to bytes.
///
/// Returns `None` for odd-length input or invalid hex characters.
pub fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Lazy hex formatter - only formats when actually displayed.
///
/// Avoids allocation when logging at disabled levels.
pub struct HexBytes<'a>(pub &'a [u8]);

impl std::fmt::Debug for HexBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Create and bind a UDP socket for the given local address.
///
/// For IPv6 sockets, sets `IPV6_V6ONLY = true`: the socket family is
/// chosen by the address family of the configured peer, so mapped
/// addresses are never wanted.
pub(crate) fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }

    socket.set_reuse_address(true)?;

    // Non-blocking before handing the fd to tokio
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Create an ephemeral UDP socket matching the target's address family.
pub(crate) fn bind_ephemeral_udp_socket(target: SocketAddr) -> io::Result<UdpSocket> {
    let bind_addr: SocketAddr = if target.is_ipv6() {
        "[::]:0".parse().unwrap()
    } else {
        "0.0.0.0:0".parse().unwrap()
    };

    bind_udp_socket(bind_addr)
}

/// Generate a uniform random request ID in `[1, 2^31)`.
///
/// Zero is reserved as "unassigned"; negative values never appear on
/// the wire from this side.
pub(crate) fn random_request_id() -> i32 {
    let mut buf = [0u8; 4];
    loop {
        getrandom::fill(&mut buf).expect("getrandom failed");
        let v = i32::from_ne_bytes(buf) & i32::MAX;
        if v != 0 {
            return v;
        }
    }
}

/// Generate a random non-zero u64 (privacy salt seeding).
pub(crate) fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        getrandom::fill(&mut buf).expect("getrandom failed");
        let val = u64::from_ne_bytes(buf);
        if val != 0 {
            return val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let data = vec![0x00, 0x11, 0xde, 0xad, 0xbe, 0xef, 0xff];
        assert_eq!(decode_hex(&encode_hex(&data)).unwrap(), data);
    }

    #[test]
    fn test_hex_decode_invalid() {
        assert!(decode_hex("abc").is_none());
        assert!(decode_hex("zz").is_none());
        assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_bytes_display() {
        assert_eq!(format!("{}", HexBytes(&[0xde, 0xad])), "dead");
        assert_eq!(format!("{:?}", HexBytes(&[0x00, 0xff])), "00ff");
    }

    #[test]
    fn test_random_request_id_range() {
        for _ in 0..64 {
            let id = random_request_id();
            assert!(id > 0);
        }
    }

    #[tokio::test]
    async fn test_bind_family_follows_target() {
        let v4: SocketAddr = "192.0.2.1:161".parse().unwrap();
        let socket = bind_ephemeral_udp_socket(v4).unwrap();
        assert!(socket.local_addr().unwrap().is_ipv4());

        let v6: SocketAddr = "[2001:db8::1]:161".parse().unwrap();
        let socket = bind_ephemeral_udp_socket(v6).unwrap();
        assert!(socket.local_addr().unwrap().is_ipv6());
    }
}
