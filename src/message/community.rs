//! Community-framed SNMP messages (v1/v2c).
//!
//! `SEQUENCE { version INTEGER, community OCTET STRING, pdu PDU }`.
//! v1 and v2c differ only in the version number.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// Community-based SNMP message (v1/v2c).
#[derive(Debug, Clone)]
pub struct CommunityMessage {
    /// SNMP version (V1 or V2c)
    pub version: Version,
    /// Community string
    pub community: Bytes,
    /// Protocol data unit
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a new community message.
    ///
    /// # Panics
    /// Panics if version is V3 (use `V3Message` instead).
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        assert!(
            matches!(version, Version::V1 | Version::V2c),
            "CommunityMessage only supports V1/V2c, not {:?}",
            version
        );
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Create a V1 message.
    pub fn v1(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V1, community, pdu)
    }

    /// Create a V2c message.
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });

        buf.finish()
    }

    /// Decode from BER.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num))
        })?;

        Self::decode_from_sequence(&mut seq, version)
    }

    /// Decode from a sequence decoder where the version was already read.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder, version: Version) -> Result<Self> {
        if version == Version::V3 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(3),
            ));
        }

        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;

        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }

    /// Validate a reply against the request's version and community.
    ///
    /// A community mismatch is treated as an authentication failure;
    /// a version mismatch means the reply belongs to someone else.
    pub fn validate_reply(&self, expected_version: Version, expected_community: &[u8]) -> Result<()> {
        if self.version != expected_version {
            return Err(Error::VersionMismatch {
                expected: expected_version,
                actual: self.version,
            });
        }
        if self.community != expected_community {
            return Err(Error::CommunityMismatch { target: None });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_v1_roundtrip() {
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = CommunityMessage::v1(b"public".as_slice(), pdu);

        let decoded = CommunityMessage::decode(msg.encode()).unwrap();
        assert_eq!(decoded.version, Version::V1);
        assert_eq!(decoded.community.as_ref(), b"public");
        assert_eq!(decoded.pdu.request_id, 42);
    }

    #[test]
    fn test_v2c_roundtrip() {
        let pdu = Pdu::get_request(123, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = CommunityMessage::v2c(b"private".as_slice(), pdu);

        let decoded = CommunityMessage::decode(msg.encode()).unwrap();
        assert_eq!(decoded.version, Version::V2c);
        assert_eq!(decoded.community.as_ref(), b"private");
    }

    #[test]
    fn test_validate_reply() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3)]);
        let msg = CommunityMessage::v2c(b"public".as_slice(), pdu);

        assert!(msg.validate_reply(Version::V2c, b"public").is_ok());
        assert!(matches!(
            msg.validate_reply(Version::V1, b"public"),
            Err(Error::VersionMismatch { .. })
        ));
        assert!(matches!(
            msg.validate_reply(Version::V2c, b"other"),
            Err(Error::CommunityMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(b"public");
            buf.push_integer(2); // SNMPv2u, never supported
        });
        assert!(CommunityMessage::decode(buf.finish()).is_err());
    }
}
