//! SNMP client: the typed request API over the transport engine.
//!
//! One [`Client`] per target. Requests go through a per-client async
//! mutex, so they complete in FIFO order and the engine never has two
//! datagrams in flight for the same target; independent clients are
//! fully concurrent.

mod auth;
mod builder;
mod v3;
mod walk;

pub use auth::{Auth, CommunityVersion, UsmAuth, UsmBuilder};
pub use builder::ClientBuilder;
pub use v3::V3SecurityConfig;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::message::CommunityMessage;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{Transport, UdpChannel};
use crate::v3::{EngineState, SaltCounter};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
/// Timeout clamp bounds.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);
pub const MAX_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default retry count (attempts = 1 + retries).
pub const DEFAULT_RETRIES: u32 = 2;
/// Retry clamp upper bound.
pub const MAX_RETRIES: u32 = 5;

/// Default maximum message size.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65535;

/// GETBULK defaults.
pub const DEFAULT_NON_REPEATERS: i32 = 0;
pub const DEFAULT_MAX_REPETITIONS: i32 = 50;

/// Default agent port.
pub const DEFAULT_AGENT_PORT: u16 = 161;

/// Client configuration.
///
/// Usually produced by [`ClientBuilder`]; constructing it directly is
/// fine, out-of-range values are clamped by [`Client::new`].
#[derive(Clone)]
pub struct ClientConfig {
    /// SNMP version (default: V2c)
    pub version: Version,
    /// Community string for v1/v2c (default: "public")
    pub community: bytes::Bytes,
    /// Per-attempt timeout (default 2 s, clamped to [100 ms, 10 s])
    pub timeout: Duration,
    /// Retry count (default 2, clamped to [0, 5])
    pub retries: u32,
    /// Maximum outgoing message size (default 65535)
    pub max_message_size: usize,
    /// SNMPv3 security configuration
    pub v3_security: Option<V3SecurityConfig>,
    /// GETBULK non-repeaters used by walks (default 0)
    pub non_repeaters: i32,
    /// GETBULK max-repetitions used by walks (default 50)
    pub max_repetitions: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: Version::V2c,
            community: bytes::Bytes::from_static(b"public"),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            v3_security: None,
            non_repeaters: DEFAULT_NON_REPEATERS,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        }
    }
}

impl ClientConfig {
    fn clamp(&mut self) {
        self.timeout = self.timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        self.retries = self.retries.min(MAX_RETRIES);
    }
}

/// SNMP client for a single target.
///
/// Cheap to clone; clones share the transport and engine state.
pub struct Client<T: Transport = UdpChannel> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub(crate) struct ClientInner<T: Transport> {
    pub(crate) transport: T,
    pub(crate) config: ClientConfig,
    /// Serializes requests: one in-flight datagram per target.
    request_lock: tokio::sync::Mutex<()>,
    /// Discovered engine state (v3).
    pub(crate) engine: Mutex<Option<EngineState>>,
    /// Localized keys for the current engine (v3).
    pub(crate) keys: Mutex<Option<v3::DerivedKeys>>,
    /// Privacy salt counter.
    pub(crate) salt_counter: SaltCounter,
}

impl Client<UdpChannel> {
    /// Create a client builder.
    ///
    /// ```no_run
    /// use usnmp::{Auth, Client};
    /// use std::time::Duration;
    ///
    /// # async fn example() -> usnmp::Result<()> {
    /// let client = Client::builder("192.0.2.1:161", Auth::v2c("public"))
    ///     .timeout(Duration::from_secs(1))
    ///     .connect()
    ///     .await?;
    ///
    /// let result = client.get(&[usnmp::oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder(target: impl Into<String>, auth: impl Into<Auth>) -> ClientBuilder {
        ClientBuilder::new(target, auth)
    }

    /// Close the underlying socket.
    ///
    /// Any in-flight request finishes with [`Error::Terminated`]; the
    /// client cannot be used afterwards.
    pub fn close(&self) {
        self.inner.transport.close();
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over an existing transport.
    ///
    /// Fails when the configuration is inconsistent (v3 privacy
    /// without authentication, v3 without credentials).
    pub fn new(transport: T, mut config: ClientConfig) -> Result<Self> {
        config.clamp();

        match (config.version, &config.v3_security) {
            (Version::V3, None) => {
                return Err(Error::Config(
                    "SNMPv3 requires USM credentials".to_string(),
                ));
            }
            (Version::V3, Some(security)) => {
                if security.privacy.is_some() && security.auth.is_none() {
                    return Err(Error::Config(
                        "unsupported noAuthPriv: privacy requires authentication".to_string(),
                    ));
                }
            }
            _ => {}
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                request_lock: tokio::sync::Mutex::new(()),
                engine: Mutex::new(None),
                keys: Mutex::new(None),
                salt_counter: SaltCounter::new(),
            }),
        })
    }

    /// The target address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.transport.peer_addr()
    }

    /// The configured SNMP version.
    pub fn version(&self) -> Version {
        self.inner.config.version
    }

    fn is_v3(&self) -> bool {
        self.inner.config.version == Version::V3
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// GET the given OIDs, returning OID -> value.
    pub async fn get(&self, oids: &[Oid]) -> Result<BTreeMap<Oid, Value>> {
        let mut pdu = Pdu::get_request(0, oids);
        pdu.ensure_request_id();
        let response = self.request(pdu).await?;
        Ok(varbinds_to_map(response.varbinds))
    }

    /// GETNEXT the given OIDs, returning successor OID -> value.
    pub async fn get_next(&self, oids: &[Oid]) -> Result<BTreeMap<Oid, Value>> {
        let mut pdu = Pdu::get_next_request(0, oids);
        pdu.ensure_request_id();
        let response = self.request(pdu).await?;
        Ok(varbinds_to_map(response.varbinds))
    }

    /// GETBULK (v2c/v3 only), returning OID -> value.
    ///
    /// The first `non_repeaters` OIDs get one successor each; the rest
    /// up to `max_repetitions` successors each.
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<BTreeMap<Oid, Value>> {
        let response = self
            .bulk_request(oids, non_repeaters, max_repetitions)
            .await?;
        Ok(varbinds_to_map(response.varbinds))
    }

    /// SET the given OID/value pairs, returning the agent's view.
    pub async fn set(&self, pairs: &[(Oid, Value)]) -> Result<BTreeMap<Oid, Value>> {
        let varbinds = pairs
            .iter()
            .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
            .collect();
        let mut pdu = Pdu::set_request(0, varbinds);
        pdu.ensure_request_id();
        let response = self.request(pdu).await?;
        Ok(varbinds_to_map(response.varbinds))
    }

    /// Walk the subtree under `root`, returning OID -> value.
    ///
    /// Uses repeated GETNEXT on v1 and GETBULK on v2c/v3. Stops at the
    /// end of the subtree, on an exception value, or on an error-status
    /// reply; fails if the agent changes a value's type mid-walk or
    /// returns non-increasing OIDs.
    pub async fn walk(&self, root: &Oid) -> Result<BTreeMap<Oid, Value>> {
        walk::walk(self, root).await
    }

    /// Run engine discovery now (v3 only).
    ///
    /// Discards any cached engine state first. Returns `true` when the
    /// exchange produced a usable engine identity.
    pub async fn discover(&self) -> Result<bool> {
        if !self.is_v3() {
            return Err(Error::Config(
                "discovery is an SNMPv3 operation".to_string(),
            ));
        }
        let _guard = self.inner.request_lock.lock().await;
        *self.inner.engine.lock().unwrap() = None;
        *self.inner.keys.lock().unwrap() = None;
        self.discover_engine().await?;
        Ok(self.inner.engine.lock().unwrap().is_some())
    }

    /// Raw GETBULK returning the response PDU.
    pub(crate) async fn bulk_request(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Pdu> {
        if !self.inner.config.version.supports_bulk() {
            return Err(Error::BulkNotSupported);
        }
        let mut pdu = Pdu::get_bulk_request(0, non_repeaters, max_repetitions, oids);
        pdu.ensure_request_id();
        self.request(pdu).await
    }

    /// Send a request PDU and return the validated response PDU.
    pub(crate) async fn request(&self, pdu: Pdu) -> Result<Pdu> {
        let _guard = self.inner.request_lock.lock().await;

        if self.is_v3() {
            self.send_v3(pdu).await
        } else {
            self.send_community(pdu).await
        }
    }

    /// v1/v2c request loop: exactly `1 + retries` send attempts.
    async fn send_community(&self, pdu: Pdu) -> Result<Pdu> {
        let config = &self.inner.config;
        let request_id = pdu.request_id;
        let message = CommunityMessage::new(config.version, config.community.clone(), pdu);
        let data = message.encode();

        if data.len() > config.max_message_size {
            return Err(Error::MessageTooLarge {
                size: data.len(),
                max: config.max_message_size,
            });
        }

        let started = Instant::now();
        let attempts = 1 + config.retries;

        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::debug!(target: "usnmp::client", peer = %self.peer_addr(), attempt, "retrying request");
            }

            self.inner.transport.send(&data).await?;

            let deadline = Instant::now() + config.timeout;
            match self.inner.transport.recv_matching(request_id, deadline).await {
                Ok(response_data) => {
                    let reply = CommunityMessage::decode(response_data)?;
                    reply.validate_reply(config.version, &config.community)?;
                    return self.validate_response_pdu(reply.pdu, request_id);
                }
                Err(Error::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(target: "usnmp::client", peer = %self.peer_addr(), request_id, "request timed out");
        Err(Error::Timeout {
            target: Some(self.peer_addr()),
            elapsed: started.elapsed(),
            request_id,
            retries: config.retries,
        })
    }

    /// Common response PDU validation: type, request-id, error-status.
    pub(crate) fn validate_response_pdu(&self, pdu: Pdu, expected_id: i32) -> Result<Pdu> {
        if pdu.pdu_type != PduType::Response {
            return Err(Error::UnexpectedPduType {
                tag: pdu.pdu_type.tag(),
            });
        }

        if pdu.request_id != expected_id {
            return Err(Error::RequestIdMismatch {
                expected: expected_id,
                actual: pdu.request_id,
            });
        }

        if pdu.is_error() {
            let status = pdu.error_status_enum();
            // error_index is 1-based; 0 means the error is about the PDU
            let oid = (pdu.error_index as usize)
                .checked_sub(1)
                .and_then(|idx| pdu.varbinds.get(idx))
                .map(|vb| vb.oid.clone());
            return Err(Error::Snmp {
                target: Some(self.peer_addr()),
                status,
                index: pdu.error_index.max(0) as u32,
                oid,
            });
        }

        Ok(pdu)
    }
}

/// Collect response varbinds into the map form the typed API returns.
fn varbinds_to_map(varbinds: Vec<VarBind>) -> BTreeMap<Oid, Value> {
    varbinds
        .into_iter()
        .map(|vb| (vb.oid, vb.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn mock_client(config: ClientConfig) -> (Client<MockTransport>, MockTransport) {
        let transport = MockTransport::new("192.0.2.1:161".parse().unwrap());
        let client = Client::new(transport.clone(), config).unwrap();
        (client, transport)
    }

    #[test]
    fn test_config_clamping() {
        let config = ClientConfig {
            timeout: Duration::from_millis(1),
            retries: 99,
            ..Default::default()
        };
        let (client, _) = mock_client(config);
        assert_eq!(client.inner.config.timeout, MIN_TIMEOUT);
        assert_eq!(client.inner.config.retries, MAX_RETRIES);

        let config = ClientConfig {
            timeout: Duration::from_secs(60),
            ..Default::default()
        };
        let (client, _) = mock_client(config);
        assert_eq!(client.inner.config.timeout, MAX_TIMEOUT);
    }

    #[test]
    fn test_v3_requires_credentials() {
        let transport = MockTransport::new("192.0.2.1:161".parse().unwrap());
        let config = ClientConfig {
            version: Version::V3,
            ..Default::default()
        };
        assert!(matches!(
            Client::new(transport, config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_rejected_on_v1() {
        let config = ClientConfig {
            version: Version::V1,
            ..Default::default()
        };
        let (client, _) = mock_client(config);
        let err = client
            .get_bulk(&[crate::oid!(1, 3, 6, 1)], 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BulkNotSupported));
    }
}
