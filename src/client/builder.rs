//! Client construction.
//!
//! [`ClientBuilder`] turns an [`Auth`] plus a target address into a
//! [`Client`], applying defaults and clamps: timeout 2 s in
//! [100 ms, 10 s], retries 2 in [0, 5], max message size 65535,
//! agent port 161 when the target omits one.

use std::net::SocketAddr;
use std::time::Duration;

use crate::client::{
    Auth, Client, ClientConfig, CommunityVersion, V3SecurityConfig, DEFAULT_AGENT_PORT,
};
use crate::error::{Error, Result};
use crate::transport::{Transport, UdpChannel};
use crate::version::Version;

/// Builder for [`Client`].
pub struct ClientBuilder {
    target: String,
    auth: Auth,
    timeout: Duration,
    retries: u32,
    max_message_size: usize,
    non_repeaters: i32,
    max_repetitions: i32,
    check_source: bool,
}

impl ClientBuilder {
    /// Create a builder for the given target and authentication.
    ///
    /// The target is a socket address; a bare IP gets the default
    /// agent port 161. Name resolution is the caller's concern.
    pub fn new(target: impl Into<String>, auth: impl Into<Auth>) -> Self {
        Self {
            target: target.into(),
            auth: auth.into(),
            timeout: super::DEFAULT_TIMEOUT,
            retries: super::DEFAULT_RETRIES,
            max_message_size: super::DEFAULT_MAX_MESSAGE_SIZE,
            non_repeaters: super::DEFAULT_NON_REPEATERS,
            max_repetitions: super::DEFAULT_MAX_REPETITIONS,
            check_source: true,
        }
    }

    /// Per-attempt timeout (default 2 s, clamped to [100 ms, 10 s]).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry count (default 2, clamped to [0, 5]).
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Maximum outgoing message size (default 65535).
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// GETBULK parameters used by walks (defaults 0 / 50).
    pub fn bulk_defaults(mut self, non_repeaters: i32, max_repetitions: i32) -> Self {
        self.non_repeaters = non_repeaters;
        self.max_repetitions = max_repetitions;
        self
    }

    /// Whether replies from a source other than the target are dropped
    /// (default true).
    pub fn check_source(mut self, check: bool) -> Self {
        self.check_source = check;
        self
    }

    fn parse_target(&self) -> Result<SocketAddr> {
        if let Ok(addr) = self.target.parse::<SocketAddr>() {
            return Ok(addr);
        }

        // Bare IP: add the default agent port
        if let Ok(ip) = self.target.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, DEFAULT_AGENT_PORT));
        }

        Err(Error::Config(format!(
            "invalid target address: {}",
            self.target
        )))
    }

    fn into_config(self) -> Result<(ClientConfig, SocketAddr, bool)> {
        let addr = self.parse_target()?;

        let mut config = ClientConfig {
            timeout: self.timeout,
            retries: self.retries,
            max_message_size: self.max_message_size,
            non_repeaters: self.non_repeaters,
            max_repetitions: self.max_repetitions,
            ..Default::default()
        };

        match self.auth {
            Auth::Community { version, community } => {
                config.version = match version {
                    CommunityVersion::V1 => Version::V1,
                    CommunityVersion::V2c => Version::V2c,
                };
                config.community = bytes::Bytes::from(community.into_bytes());
            }
            Auth::Usm(usm) => {
                config.version = Version::V3;
                let mut security = V3SecurityConfig::new(usm.username.into_bytes());
                if let Some((protocol, password)) = usm.auth {
                    security = security.auth(protocol, password);
                }
                if let Some((protocol, password)) = usm.privacy {
                    security = security.privacy(protocol, password);
                }
                security = security.context_name(usm.context_name);
                config.v3_security = Some(security);
            }
        }

        Ok((config, addr, self.check_source))
    }

    /// Bind a UDP socket for the target and build the client.
    pub async fn connect(self) -> Result<Client<UdpChannel>> {
        let (config, addr, check_source) = self.into_config()?;
        let transport = UdpChannel::connect_with(addr, check_source).await?;
        Client::new(transport, config)
    }

    /// Build over an existing transport (tests, custom channels).
    pub fn build_with<T: Transport>(self, transport: T) -> Result<Client<T>> {
        let (config, _addr, _check_source) = self.into_config()?;
        Client::new(transport, config)
    }
}
