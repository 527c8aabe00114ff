//! Engine discovery state and time synchronization (RFC 3414 Section 4).
//!
//! Before authenticated traffic can flow, the manager must learn the
//! authoritative engine's ID, boot counter and clock. [`EngineState`]
//! is the per-agent cache of that exchange: populated by discovery,
//! refreshed by replies, and aged out after
//! [`DISCOVERY_VALIDITY_SECS`] so a long-idle target is re-probed
//! instead of trusted with stale clock values.

use std::time::Instant;

use bytes::Bytes;

use crate::error::{DecodeErrorKind, Error, Result};
use crate::v3::UsmSecurityParams;

/// How long a discovered engineTime stays usable, in seconds.
///
/// Deliberately 10x the RFC 3414 150-second receive window: within
/// this span the submitted time is extrapolated from the cached value,
/// beyond it the engine is re-discovered.
pub const DISCOVERY_VALIDITY_SECS: u64 = 1500;

/// Maximum snmpEngineTime value (RFC 3414 Section 2.2.1, 31-bit).
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// USM statistics OIDs carried in Report PDUs.
pub mod report_oids {
    use crate::oid::Oid;

    /// 1.3.6.1.6.3.15.1.1.1.0 - usmStatsUnsupportedSecLevels
    pub fn unsupported_sec_levels() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
    }

    /// 1.3.6.1.6.3.15.1.1.2.0 - usmStatsNotInTimeWindows
    pub fn not_in_time_windows() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
    }

    /// 1.3.6.1.6.3.15.1.1.3.0 - usmStatsUnknownUserNames
    pub fn unknown_user_names() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
    }

    /// 1.3.6.1.6.3.15.1.1.4.0 - usmStatsUnknownEngineIDs
    pub fn unknown_engine_ids() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
    }

    /// 1.3.6.1.6.3.15.1.1.5.0 - usmStatsWrongDigests
    pub fn wrong_digests() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
    }

    /// 1.3.6.1.6.3.15.1.1.6.0 - usmStatsDecryptionErrors
    pub fn decryption_errors() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
    }
}

/// Discovered per-agent engine state.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Authoritative engine ID
    pub engine_id: Bytes,
    /// Engine boot count
    pub engine_boots: u32,
    /// Engine time at the moment of sync
    pub engine_time: u32,
    /// Wall-clock instant when engine_time was observed
    pub synced_at: Instant,
    /// Highest engine time received (anti-replay, RFC 3414 Section 2.3)
    pub latest_received_engine_time: u32,
    /// Negotiated maximum message size: min(peer's, ours)
    pub msg_max_size: u32,
}

impl EngineState {
    /// Create new engine state stamped with the current instant.
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_engine_time: engine_time,
            msg_max_size: u16::MAX as u32,
        }
    }

    /// Create with the message size clamped to the smaller of the
    /// peer's advertised limit and our own.
    pub fn with_msg_max_size(
        engine_id: Bytes,
        engine_boots: u32,
        engine_time: u32,
        peer_max: u32,
        local_max: u32,
    ) -> Self {
        let mut state = Self::new(engine_id, engine_boots, engine_time);
        state.msg_max_size = peer_max.min(local_max);
        state
    }

    /// Whether the cached state is still within the validity window.
    pub fn is_fresh(&self) -> bool {
        self.synced_at.elapsed().as_secs() < DISCOVERY_VALIDITY_SECS
    }

    /// The engineTime to submit in an outgoing request.
    ///
    /// Cached time plus elapsed wall seconds plus one, the extra second
    /// covering transit so the agent's own clock has not run past the
    /// submitted value on arrival. Capped at [`MAX_ENGINE_TIME`].
    pub fn submitted_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs() as u32;
        self.engine_time
            .saturating_add(elapsed)
            .saturating_add(1)
            .min(MAX_ENGINE_TIME)
    }

    /// Fold a reply's boots/time into the cache.
    ///
    /// Accepts only forward progress (RFC 3414 Section 3.2 Step 7b):
    /// a higher boot count, or the same boot count with a time above
    /// the highest seen. Returns whether anything changed.
    pub fn update_time(&mut self, response_boots: u32, response_time: u32) -> bool {
        if response_boots > self.engine_boots {
            self.engine_boots = response_boots;
            self.engine_time = response_time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = response_time;
            true
        } else if response_boots == self.engine_boots
            && response_time > self.latest_received_engine_time
        {
            self.engine_time = response_time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = response_time;
            true
        } else {
            false
        }
    }
}

/// Extract engine state from a discovery Report's USM parameters.
pub fn parse_discovery_response(
    security_params: &Bytes,
    peer_max: u32,
    local_max: u32,
) -> Result<EngineState> {
    let usm = UsmSecurityParams::decode(security_params.clone())?;

    if usm.engine_id.is_empty() {
        return Err(Error::decode(0, DecodeErrorKind::EmptyEngineId));
    }

    Ok(EngineState::with_msg_max_size(
        usm.engine_id,
        usm.engine_boots,
        usm.engine_time,
        peer_max,
        local_max,
    ))
}

fn is_report_with(pdu: &crate::pdu::Pdu, oid: &crate::oid::Oid) -> bool {
    pdu.pdu_type == crate::pdu::PduType::Report && pdu.varbinds.iter().any(|vb| &vb.oid == oid)
}

/// Report carries usmStatsUnknownEngineIDs (discovery response).
pub fn is_unknown_engine_id_report(pdu: &crate::pdu::Pdu) -> bool {
    is_report_with(pdu, &report_oids::unknown_engine_ids())
}

/// Report carries usmStatsNotInTimeWindows (clock resync needed).
pub fn is_not_in_time_window_report(pdu: &crate::pdu::Pdu) -> bool {
    is_report_with(pdu, &report_oids::not_in_time_windows())
}

/// Report carries usmStatsWrongDigests (authentication rejected).
pub fn is_wrong_digest_report(pdu: &crate::pdu::Pdu) -> bool {
    is_report_with(pdu, &report_oids::wrong_digests())
}

/// Report carries usmStatsUnknownUserNames.
pub fn is_unknown_user_name_report(pdu: &crate::pdu::Pdu) -> bool {
    is_report_with(pdu, &report_oids::unknown_user_names())
}

/// Report carries usmStatsDecryptionErrors.
pub fn is_decryption_error_report(pdu: &crate::pdu::Pdu) -> bool {
    is_report_with(pdu, &report_oids::decryption_errors())
}
