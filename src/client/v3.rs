//! SNMPv3 client path: security configuration, key caching, engine
//! discovery, and the authenticated/encrypted request loop.

use bytes::Bytes;
use std::time::Instant;

use crate::error::{AuthErrorKind, CryptoErrorKind, EncodeErrorKind, Error, Result};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::util::HexBytes;
use crate::v3::{
    authenticate_message, is_not_in_time_window_report, is_unknown_engine_id_report,
    parse_discovery_response, verify_message, AuthProtocol, EngineState, LocalizedKey, PrivKey,
    PrivProtocol, UsmSecurityParams,
};

use super::Client;

/// SNMPv3 USM security configuration for one target.
#[derive(Clone)]
pub struct V3SecurityConfig {
    /// User name (securityName)
    pub username: Bytes,
    /// Authentication protocol and password
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    /// Privacy protocol and password
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
    /// Context name carried in the scoped PDU
    pub context_name: Bytes,
}

impl V3SecurityConfig {
    /// Create a noAuthNoPriv configuration.
    pub fn new(username: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
            context_name: Bytes::new(),
        }
    }

    /// Add authentication.
    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    /// Add privacy.
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    /// Set the context name.
    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.context_name = name.into();
        self
    }

    /// The security level implied by the configured credentials.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Derive and localize keys for the given engine ID.
    pub fn derive_keys(&self, engine_id: &Bytes) -> Result<DerivedKeys> {
        let auth_key = match &self.auth {
            Some((protocol, password)) => Some(LocalizedKey::from_password(
                *protocol, password, engine_id,
            )?),
            None => None,
        };

        let priv_key = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, priv_password))) => {
                Some(PrivKey::from_password(
                    *auth_protocol,
                    *priv_protocol,
                    priv_password,
                    engine_id,
                )?)
            }
            _ => None,
        };

        Ok(DerivedKeys {
            engine_id: engine_id.clone(),
            auth_key,
            priv_key,
        })
    }
}

impl std::fmt::Debug for V3SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3SecurityConfig")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

/// Localized keys cached for one engine ID.
#[derive(Debug)]
pub(crate) struct DerivedKeys {
    /// The engine the keys are bound to; a changed engineId invalidates them.
    pub engine_id: Bytes,
    pub auth_key: Option<LocalizedKey>,
    pub priv_key: Option<PrivKey>,
}

impl<T: Transport> Client<T> {
    fn security(&self) -> Result<&V3SecurityConfig> {
        self.inner
            .config
            .v3_security
            .as_ref()
            .ok_or(Error::Encode {
                kind: EncodeErrorKind::NoSecurityConfig,
            })
    }

    /// Make sure a fresh engine identity and matching keys exist.
    ///
    /// Runs discovery when nothing is cached or the cached state has
    /// aged past the validity window.
    pub(crate) async fn ensure_engine(&self) -> Result<()> {
        let fresh = self
            .inner
            .engine
            .lock()
            .unwrap()
            .as_ref()
            .map(|state| state.is_fresh())
            .unwrap_or(false);

        if fresh {
            return Ok(());
        }

        self.discover_engine().await
    }

    /// One discovery exchange: send the probe, expect a Report with
    /// usmStatsUnknownEngineIDs, return the engine state it carries.
    async fn discovery_exchange(&self) -> Result<EngineState> {
        let config = &self.inner.config;
        let local_max = config.max_message_size as u32;
        let started = Instant::now();
        let attempts = 1 + config.retries;
        let msg_id = crate::util::random_request_id();

        let probe = V3Message::discovery_request(msg_id, local_max as i32);
        let data = probe.encode();

        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::debug!(target: "usnmp::v3", peer = %self.peer_addr(), attempt, "retrying discovery");
            }

            self.inner.transport.send(&data).await?;

            let deadline = Instant::now() + config.timeout;
            match self.inner.transport.recv_matching(msg_id, deadline).await {
                Ok(response_data) => {
                    let response = V3Message::decode(response_data)?;

                    let scoped = response.scoped_pdu().ok_or(Error::Decode {
                        offset: 0,
                        kind: crate::error::DecodeErrorKind::UnexpectedEncryption,
                    })?;

                    if scoped.pdu.pdu_type != PduType::Report {
                        return Err(Error::UnexpectedPduType {
                            tag: scoped.pdu.pdu_type.tag(),
                        });
                    }
                    if !is_unknown_engine_id_report(&scoped.pdu) {
                        return Err(Error::Report {
                            target: Some(self.peer_addr()),
                            oid: scoped.pdu.varbinds.first().map(|vb| vb.oid.clone()),
                        });
                    }

                    let state = parse_discovery_response(
                        &response.security_params,
                        response.global_data.msg_max_size.max(0) as u32,
                        local_max,
                    )?;

                    tracing::debug!(
                        target: "usnmp::v3",
                        peer = %self.peer_addr(),
                        engine_id = %HexBytes(&state.engine_id),
                        engine_boots = state.engine_boots,
                        engine_time = state.engine_time,
                        "discovered engine"
                    );

                    return Ok(state);
                }
                Err(Error::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::Timeout {
            target: Some(self.peer_addr()),
            elapsed: started.elapsed(),
            request_id: msg_id,
            retries: config.retries,
        })
    }

    /// Full discovery: exchange, zero-clock re-probe, key derivation.
    pub(crate) async fn discover_engine(&self) -> Result<()> {
        let mut state = self.discovery_exchange().await?;

        // Some agents answer the first probe with boots = time = 0 and
        // only report real values on the second
        if state.engine_boots == 0 && state.engine_time == 0 {
            tracing::debug!(target: "usnmp::v3", peer = %self.peer_addr(), "discovery returned zero clock, probing again");
            if let Ok(second) = self.discovery_exchange().await {
                state = second;
            }
        }

        let security = self.security()?;

        // Reuse cached keys when the engine identity is unchanged
        let keys_valid = self
            .inner
            .keys
            .lock()
            .unwrap()
            .as_ref()
            .map(|keys| keys.engine_id == state.engine_id)
            .unwrap_or(false);

        if !keys_valid {
            let keys = security.derive_keys(&state.engine_id)?;
            *self.inner.keys.lock().unwrap() = Some(keys);
        }

        *self.inner.engine.lock().unwrap() = Some(state);
        Ok(())
    }

    /// Build, secure and encode one outgoing v3 message.
    fn build_v3_message(&self, pdu: &Pdu) -> Result<Vec<u8>> {
        let security = self.security()?;
        let security_level = security.security_level();

        let (engine_id, engine_boots, engine_time, msg_max_size) = {
            let engine = self.inner.engine.lock().unwrap();
            let state = engine.as_ref().ok_or(Error::Encode {
                kind: EncodeErrorKind::EngineNotDiscovered,
            })?;
            (
                state.engine_id.clone(),
                state.engine_boots,
                state.submitted_time(),
                state.msg_max_size,
            )
        };

        let msg_id = pdu.request_id;
        let scoped_pdu = ScopedPdu::new(
            engine_id.clone(),
            security.context_name.clone(),
            pdu.clone(),
        );

        // Encrypt first so the privacy parameters land in the USM header
        let (msg_data, priv_params) = if security_level.requires_priv() {
            let mut priv_key = {
                let keys = self.inner.keys.lock().unwrap();
                keys.as_ref()
                    .ok_or(Error::Encode {
                        kind: EncodeErrorKind::KeysNotDerived,
                    })?
                    .priv_key
                    .as_ref()
                    .ok_or(Error::Encode {
                        kind: EncodeErrorKind::NoPrivKey,
                    })?
                    .clone()
            };

            let plaintext = scoped_pdu.encode_to_bytes();
            let (ciphertext, salt) = priv_key.encrypt(
                &plaintext,
                engine_boots,
                engine_time,
                Some(&self.inner.salt_counter),
            )?;

            tracing::trace!(target: "usnmp::v3", plaintext_len = plaintext.len(), ciphertext_len = ciphertext.len(), "encrypted scoped PDU");

            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(scoped_pdu), Bytes::new())
        };

        let mut usm_params = UsmSecurityParams::new(
            engine_id,
            engine_boots,
            engine_time,
            security.username.clone(),
        );
        if security_level.requires_auth() {
            usm_params = usm_params.with_auth_placeholder(12);
        }
        if security_level.requires_priv() {
            usm_params = usm_params.with_priv_params(priv_params);
        }

        let msg_flags = MsgFlags::new(security_level, true);
        let global_data = MsgGlobalData::new(msg_id, msg_max_size as i32, msg_flags);

        let msg = match msg_data {
            V3MessageData::Plaintext(scoped) => {
                V3Message::new(global_data, usm_params.encode(), scoped)
            }
            V3MessageData::Encrypted(ciphertext) => {
                V3Message::new_encrypted(global_data, usm_params.encode(), ciphertext)
            }
        };

        let mut encoded = msg.encode().to_vec();

        if encoded.len() > msg_max_size as usize {
            return Err(Error::MessageTooLarge {
                size: encoded.len(),
                max: msg_max_size as usize,
            });
        }

        if security_level.requires_auth() {
            let keys = self.inner.keys.lock().unwrap();
            let auth_key = keys
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .ok_or(Error::Encode {
                    kind: EncodeErrorKind::MissingAuthKey,
                })?;

            let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).ok_or(
                Error::Encode {
                    kind: EncodeErrorKind::MissingAuthParams,
                },
            )?;
            authenticate_message(auth_key, &mut encoded, offset, len);
        }

        Ok(encoded)
    }

    /// v3 request loop: secure, send, verify, decrypt, classify.
    pub(crate) async fn send_v3(&self, pdu: Pdu) -> Result<Pdu> {
        self.ensure_engine().await?;

        let security_level = self.security()?.security_level();
        let config = &self.inner.config;
        let started = Instant::now();
        let attempts = 1 + config.retries;
        let request_id = pdu.request_id;

        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::debug!(target: "usnmp::v3", peer = %self.peer_addr(), attempt, "retrying v3 request");
            }

            // Rebuilt each attempt so the submitted engine time is fresh
            let data = self.build_v3_message(&pdu)?;

            self.inner.transport.send(&data).await?;

            let deadline = Instant::now() + config.timeout;
            let response_data = match self.inner.transport.recv_matching(request_id, deadline).await
            {
                Ok(data) => data,
                Err(Error::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            };

            let response = V3Message::decode(response_data.clone())?;

            // Verify the MAC whenever the reply claims authentication.
            // A reply below our security level is only acceptable as a
            // Report (RFC 3414 lets unknown-engine reports go out
            // noAuthNoPriv); anything else at a lower level is an
            // authentication failure.
            let reply_level = response.security_level();
            if reply_level.requires_auth() {
                self.verify_response_auth(&response_data)?;
            }

            let usm = UsmSecurityParams::decode(response.security_params.clone())?;

            let is_report = response
                .scoped_pdu()
                .map(|scoped| scoped.pdu.pdu_type == PduType::Report)
                .unwrap_or(false);

            if security_level.requires_auth() && !reply_level.requires_auth() && !is_report {
                return Err(Error::auth(
                    Some(self.peer_addr()),
                    AuthErrorKind::HmacMismatch,
                ));
            }

            // Reports arrive unencrypted even on authPriv conversations
            if let Some(scoped) = response.scoped_pdu() {
                if scoped.pdu.pdu_type == PduType::Report {
                    if is_not_in_time_window_report(&scoped.pdu) {
                        tracing::debug!(target: "usnmp::v3", peer = %self.peer_addr(), "not in time window, resyncing clock");
                        let mut engine = self.inner.engine.lock().unwrap();
                        if let Some(state) = engine.as_mut() {
                            // The agent's clock is authoritative here;
                            // take it wholesale rather than through the
                            // forward-only update rule
                            state.engine_boots = usm.engine_boots;
                            state.engine_time = usm.engine_time;
                            state.latest_received_engine_time = usm.engine_time;
                            state.synced_at = Instant::now();
                        }
                        continue;
                    }

                    if is_unknown_engine_id_report(&scoped.pdu) {
                        tracing::debug!(target: "usnmp::v3", peer = %self.peer_addr(), "agent reports unknown engine, rediscovering");
                        *self.inner.engine.lock().unwrap() = None;
                        self.discover_engine().await?;
                        continue;
                    }

                    return Err(Error::Report {
                        target: Some(self.peer_addr()),
                        oid: scoped.pdu.varbinds.first().map(|vb| vb.oid.clone()),
                    });
                }
            }

            // The reply must come from the engine and user we asked
            self.validate_reply_identity(&usm)?;

            let response_pdu = if security_level.requires_priv() {
                match response.data {
                    V3MessageData::Encrypted(ciphertext) => {
                        let plaintext = {
                            let keys = self.inner.keys.lock().unwrap();
                            let priv_key =
                                keys.as_ref().and_then(|k| k.priv_key.as_ref()).ok_or_else(
                                    || Error::decrypt(Some(self.peer_addr()), CryptoErrorKind::NoPrivKey),
                                )?;
                            priv_key.decrypt(
                                &ciphertext,
                                usm.engine_boots,
                                usm.engine_time,
                                &usm.priv_params,
                            )?
                        };

                        let mut decoder = crate::ber::Decoder::new(plaintext);
                        // Authentication passed, so an unparseable
                        // plaintext means the privacy key is wrong
                        let scoped = ScopedPdu::decode(&mut decoder).map_err(|_| {
                            Error::auth(
                                Some(self.peer_addr()),
                                AuthErrorKind::UndecryptablePayload,
                            )
                        })?;
                        scoped.pdu
                    }
                    V3MessageData::Plaintext(scoped) => scoped.pdu,
                }
            } else {
                match response.data {
                    V3MessageData::Plaintext(scoped) => scoped.pdu,
                    V3MessageData::Encrypted(_) => {
                        return Err(Error::Decode {
                            offset: 0,
                            kind: crate::error::DecodeErrorKind::UnexpectedEncryption,
                        });
                    }
                }
            };

            // Fold the agent's clock into the cache
            {
                let mut engine = self.inner.engine.lock().unwrap();
                if let Some(state) = engine.as_mut() {
                    state.update_time(usm.engine_boots, usm.engine_time);
                }
            }

            return self.validate_response_pdu(response_pdu, request_id);
        }

        Err(Error::Timeout {
            target: Some(self.peer_addr()),
            elapsed: started.elapsed(),
            request_id,
            retries: config.retries,
        })
    }

    /// Verify the HMAC on an incoming authenticated message.
    fn verify_response_auth(&self, response_data: &[u8]) -> Result<()> {
        let keys = self.inner.keys.lock().unwrap();
        let auth_key = keys
            .as_ref()
            .and_then(|k| k.auth_key.as_ref())
            .ok_or_else(|| Error::auth(Some(self.peer_addr()), AuthErrorKind::NoAuthKey))?;

        let (offset, len) =
            UsmSecurityParams::find_auth_params_offset(response_data).ok_or_else(|| {
                Error::auth(Some(self.peer_addr()), AuthErrorKind::AuthParamsNotFound)
            })?;

        if len != auth_key.mac_len() {
            return Err(Error::auth(
                Some(self.peer_addr()),
                AuthErrorKind::WrongMacLength {
                    expected: auth_key.mac_len(),
                    actual: len,
                },
            ));
        }

        if !verify_message(auth_key, response_data, offset, len) {
            return Err(Error::auth(
                Some(self.peer_addr()),
                AuthErrorKind::HmacMismatch,
            ));
        }

        Ok(())
    }

    /// Check the reply's engine ID and user name against the request's.
    fn validate_reply_identity(&self, usm: &UsmSecurityParams) -> Result<()> {
        let security = self.security()?;

        {
            let engine = self.inner.engine.lock().unwrap();
            if let Some(state) = engine.as_ref() {
                if !usm.engine_id.is_empty() && usm.engine_id != state.engine_id {
                    return Err(Error::SecurityNameMismatch {
                        target: Some(self.peer_addr()),
                    });
                }
            }
        }

        if !usm.username.is_empty() && usm.username != security.username {
            return Err(Error::SecurityNameMismatch {
                target: Some(self.peer_addr()),
            });
        }

        Ok(())
    }
}
