//! SNMP message framing.
//!
//! [`CommunityMessage`] is the v1/v2c envelope; [`V3Message`] wraps a
//! scoped PDU in the RFC 3412 header with USM security parameters.
//! [`Message`] decodes either by peeking at the version field.

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, SecurityModel, V3Message, V3MessageData,
};

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::version::Version;
use bytes::Bytes;

/// Decoded SNMP message of any version.
#[derive(Debug)]
pub enum Message {
    /// SNMPv1 or SNMPv2c with a community string
    Community(CommunityMessage),
    /// SNMPv3 with USM security
    V3(V3Message),
}

impl Message {
    /// Get the SNMP version.
    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }

    /// Decode a message, detecting the version from the envelope.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num))
        })?;

        match version {
            Version::V1 | Version::V2c => {
                let msg = CommunityMessage::decode_from_sequence(&mut seq, version)?;
                Ok(Message::Community(msg))
            }
            Version::V3 => {
                let msg = V3Message::decode_from_sequence(&mut seq)?;
                Ok(Message::V3(msg))
            }
        }
    }
}

impl From<CommunityMessage> for Message {
    fn from(msg: CommunityMessage) -> Self {
        Message::Community(msg)
    }
}

impl From<V3Message> for Message {
    fn from(msg: V3Message) -> Self {
        Message::V3(msg)
    }
}
