//! Transport layer.
//!
//! One [`UdpChannel`] per target: it owns the socket (bound to the
//! target's address family), filters inbound datagrams by source
//! address and request ID, and turns a cancelled token into
//! [`Error::Terminated`]. The [`Transport`] trait exists so the
//! request engine also runs against [`MockTransport`] in tests.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;

/// Receive buffer size: the largest possible UDP payload.
const UDP_RECV_BUFFER_SIZE: usize = 65535;

/// Client-side transport abstraction.
pub trait Transport: Send + Sync {
    /// Send one request datagram to the target.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait until `deadline` for a datagram whose extracted request ID
    /// (msgID for v3) equals `request_id`.
    ///
    /// Datagrams from the wrong source, with a different ID, or that
    /// cannot be parsed at all are dropped silently; they never consume
    /// the attempt.
    fn recv_matching(
        &self,
        request_id: i32,
        deadline: Instant,
    ) -> impl Future<Output = Result<Bytes>> + Send;

    /// The peer (target) address.
    fn peer_addr(&self) -> SocketAddr;
}

/// UDP transport bound to a single target.
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
    local_addr: SocketAddr,
    check_source: bool,
    shutdown: CancellationToken,
}

impl UdpChannel {
    /// Bind an ephemeral socket of the target's address family.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        Self::connect_with(peer, true).await
    }

    /// Bind with source-address validation optionally disabled.
    pub async fn connect_with(peer: SocketAddr, check_source: bool) -> Result<Self> {
        let socket = bind_ephemeral_udp_socket(peer).map_err(|e| Error::Io {
            target: Some(peer),
            source: e,
        })?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io {
            target: Some(peer),
            source: e,
        })?;

        tracing::debug!(target: "usnmp::transport", peer = %peer, local = %local_addr, "UDP channel bound");

        Ok(Self {
            socket,
            peer,
            local_addr,
            check_source,
            shutdown: CancellationToken::new(),
        })
    }

    /// Local bind address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A token that closes the channel when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Close the channel: any in-flight receive finishes with
    /// [`Error::Terminated`].
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Transport for UdpChannel {
    async fn send(&self, data: &[u8]) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Terminated {
                target: Some(self.peer),
            });
        }
        tracing::trace!(target: "usnmp::transport", peer = %self.peer, bytes = data.len(), "UDP send");
        self.socket
            .send_to(data, self.peer)
            .await
            .map_err(|e| Error::Io {
                target: Some(self.peer),
                source: e,
            })?;
        Ok(())
    }

    async fn recv_matching(&self, request_id: i32, deadline: Instant) -> Result<Bytes> {
        let started = Instant::now();
        let mut buf = vec![0u8; UDP_RECV_BUFFER_SIZE];

        loop {
            let recv = self.socket.recv_from(&mut buf);

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Err(Error::Terminated { target: Some(self.peer) });
                }
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    return Err(Error::Timeout {
                        target: Some(self.peer),
                        elapsed: started.elapsed(),
                        request_id,
                        retries: 0,
                    });
                }
                result = recv => {
                    let (len, source) = result.map_err(|e| Error::Io {
                        target: Some(self.peer),
                        source: e,
                    })?;

                    if self.check_source && source != self.peer {
                        tracing::debug!(target: "usnmp::transport", peer = %self.peer, %source, "dropping datagram from unexpected source");
                        continue;
                    }

                    match extract_request_id(&buf[..len]) {
                        Some(id) if id == request_id => {
                            tracing::trace!(target: "usnmp::transport", peer = %self.peer, bytes = len, "UDP recv matched");
                            return Ok(Bytes::copy_from_slice(&buf[..len]));
                        }
                        Some(id) => {
                            tracing::debug!(target: "usnmp::transport", expected = request_id, actual = id, "dropping stale reply");
                            continue;
                        }
                        None => {
                            tracing::debug!(target: "usnmp::transport", %source, bytes = len, "dropping undecodable datagram");
                            continue;
                        }
                    }
                }
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

// ============================================================================
// Request ID extraction (correlation without full decode)
// ============================================================================

/// Extract the correlation ID from an SNMP datagram.
///
/// v1/v2c: the request-id inside the PDU. v3: the msgID in
/// msgGlobalData. Walks just enough BER to find the integer.
pub(crate) fn extract_request_id(data: &[u8]) -> Option<i32> {
    let mut pos = 0;

    // Outer SEQUENCE
    if data.get(pos) != Some(&0x30) {
        return None;
    }
    pos += 1;
    pos = skip_ber_length(data, pos)?;

    // version INTEGER
    if data.get(pos) != Some(&0x02) {
        return None;
    }
    pos += 1;
    let (new_pos, version_len) = read_ber_length(data, pos)?;
    pos = new_pos;
    if pos + version_len > data.len() {
        return None;
    }
    let mut version: i32 = 0;
    for &b in &data[pos..pos + version_len] {
        version = (version << 8) | (b as i32);
    }
    pos += version_len;

    match data.get(pos)? {
        0x30 if version == 3 => extract_v3_msg_id(data, pos),
        0x04 => extract_community_request_id(data, pos),
        _ => None,
    }
}

/// msgID: first INTEGER inside msgGlobalData.
fn extract_v3_msg_id(data: &[u8], mut pos: usize) -> Option<i32> {
    // msgGlobalData SEQUENCE
    pos += 1;
    pos = skip_ber_length(data, pos)?;

    if data.get(pos) != Some(&0x02) {
        return None;
    }
    pos += 1;
    let (new_pos, id_len) = read_ber_length(data, pos)?;
    pos = new_pos;
    if pos + id_len > data.len() {
        return None;
    }

    decode_ber_signed_integer(&data[pos..pos + id_len])
}

/// request-id: first INTEGER inside the PDU after the community string.
fn extract_community_request_id(data: &[u8], mut pos: usize) -> Option<i32> {
    // community OCTET STRING
    pos += 1;
    let (new_pos, community_len) = read_ber_length(data, pos)?;
    pos = new_pos + community_len;

    // PDU tag 0xA0..=0xA8
    let pdu_tag = *data.get(pos)?;
    if !(0xA0..=0xA8).contains(&pdu_tag) {
        return None;
    }
    pos += 1;
    pos = skip_ber_length(data, pos)?;

    if data.get(pos) != Some(&0x02) {
        return None;
    }
    pos += 1;
    let (new_pos, id_len) = read_ber_length(data, pos)?;
    pos = new_pos;
    if pos + id_len > data.len() {
        return None;
    }

    decode_ber_signed_integer(&data[pos..pos + id_len])
}

fn decode_ber_signed_integer(bytes: &[u8]) -> Option<i32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }

    let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in bytes {
        value = (value << 8) | (byte as i32);
    }
    Some(value)
}

fn skip_ber_length(data: &[u8], pos: usize) -> Option<usize> {
    let (new_pos, _) = read_ber_length(data, pos)?;
    Some(new_pos)
}

fn read_ber_length(data: &[u8], pos: usize) -> Option<(usize, usize)> {
    let first = *data.get(pos)?;

    if first < 0x80 {
        Some((pos + 1, first as usize))
    } else if first == 0x80 {
        None
    } else {
        let num_octets = (first & 0x7F) as usize;
        if pos + 1 + num_octets > data.len() {
            return None;
        }
        let mut length: usize = 0;
        for &b in &data[pos + 1..pos + 1 + num_octets] {
            length = (length << 8) | (b as usize);
        }
        Some((pos + 1 + num_octets, length))
    }
}

// ============================================================================
// Mock transport
// ============================================================================

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockResponse, MockTransport};

#[cfg(any(test, feature = "testing"))]
mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A scripted reaction to one send.
    pub enum MockResponse {
        /// Return these bytes verbatim.
        Data(Bytes),
        /// Compute the response from the request bytes.
        Reply(Box<dyn Fn(&[u8]) -> Bytes + Send>),
        /// Simulate a lost datagram: the receive runs into its deadline.
        Timeout,
        /// Simulate an IO failure of the given kind.
        IoError(std::io::ErrorKind),
    }

    struct MockInner {
        peer: SocketAddr,
        responses: VecDeque<MockResponse>,
        /// One queued reaction per recorded request, consumed in order.
        pending: VecDeque<MockResponse>,
        requests: Vec<Bytes>,
    }

    /// Programmable transport for engine tests: no sockets, scripted
    /// responses, recorded requests.
    #[derive(Clone)]
    pub struct MockTransport {
        inner: Arc<Mutex<MockInner>>,
    }

    impl MockTransport {
        /// Create a mock transport for the given nominal target.
        pub fn new(peer: SocketAddr) -> Self {
            Self {
                inner: Arc::new(Mutex::new(MockInner {
                    peer,
                    responses: VecDeque::new(),
                    pending: VecDeque::new(),
                    requests: Vec::new(),
                })),
            }
        }

        /// Queue raw response bytes.
        pub fn queue_data(&self, data: impl Into<Bytes>) {
            self.inner
                .lock()
                .unwrap()
                .responses
                .push_back(MockResponse::Data(data.into()));
        }

        /// Queue a computed response.
        pub fn queue_reply(&self, f: impl Fn(&[u8]) -> Bytes + Send + 'static) {
            self.inner
                .lock()
                .unwrap()
                .responses
                .push_back(MockResponse::Reply(Box::new(f)));
        }

        /// Queue a dropped datagram (receive times out).
        pub fn queue_timeout(&self) {
            self.inner
                .lock()
                .unwrap()
                .responses
                .push_back(MockResponse::Timeout);
        }

        /// Queue an IO error for the next send.
        pub fn queue_io_error(&self, kind: std::io::ErrorKind) {
            self.inner
                .lock()
                .unwrap()
                .responses
                .push_back(MockResponse::IoError(kind));
        }

        /// All requests recorded so far.
        pub fn requests(&self) -> Vec<Bytes> {
            self.inner.lock().unwrap().requests.clone()
        }

        /// Number of recorded sends.
        pub fn send_count(&self) -> usize {
            self.inner.lock().unwrap().requests.len()
        }
    }

    impl Transport for MockTransport {
        async fn send(&self, data: &[u8]) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(Bytes::copy_from_slice(data));

            let reaction = inner
                .responses
                .pop_front()
                .unwrap_or(MockResponse::Timeout);

            match reaction {
                MockResponse::IoError(kind) => {
                    let peer = inner.peer;
                    Err(Error::Io {
                        target: Some(peer),
                        source: std::io::Error::from(kind),
                    })
                }
                other => {
                    inner.pending.push_back(other);
                    Ok(())
                }
            }
        }

        async fn recv_matching(&self, request_id: i32, deadline: Instant) -> Result<Bytes> {
            let (reaction, peer) = {
                let mut inner = self.inner.lock().unwrap();
                let peer = inner.peer;
                (inner.pending.pop_front(), peer)
            };

            match reaction {
                Some(MockResponse::Data(data)) => Ok(data),
                Some(MockResponse::Reply(f)) => {
                    let request = {
                        let inner = self.inner.lock().unwrap();
                        inner.requests.last().cloned().unwrap_or_default()
                    };
                    Ok(f(&request))
                }
                Some(MockResponse::Timeout) | None => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
                    Err(Error::Timeout {
                        target: Some(peer),
                        elapsed: Duration::ZERO,
                        request_id,
                        retries: 0,
                    })
                }
                Some(MockResponse::IoError(kind)) => Err(Error::Io {
                    target: Some(peer),
                    source: std::io::Error::from(kind),
                }),
            }
        }

        fn peer_addr(&self) -> SocketAddr {
            self.inner.lock().unwrap().peer
        }
    }
}
