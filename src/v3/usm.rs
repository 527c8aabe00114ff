//! USM security parameters (RFC 3414).
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```
//!
//! Carried inside the v3 message as an OCTET STRING, so the MAC over
//! the whole message covers these fields too. That forces the
//! zero-then-patch dance: [`find_auth_params_offset`] locates the
//! authenticationParameters content within an encoded message so the
//! MAC can be patched (or zeroed for verification) in place.
//!
//! [`find_auth_params_offset`]: UsmSecurityParams::find_auth_params_offset

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};

/// USM security parameters.
#[derive(Debug, Clone)]
pub struct UsmSecurityParams {
    /// Authoritative engine ID
    pub engine_id: Bytes,
    /// Engine boot count
    pub engine_boots: u32,
    /// Engine time, seconds since last boot
    pub engine_time: u32,
    /// User name (securityName)
    pub username: Bytes,
    /// Authentication parameters (truncated HMAC, or empty)
    pub auth_params: Bytes,
    /// Privacy parameters (salt, or empty)
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    /// Create new USM security parameters.
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Create the all-empty parameters a discovery request carries.
    pub fn empty() -> Self {
        Self {
            engine_id: Bytes::new(),
            engine_boots: 0,
            engine_time: 0,
            username: Bytes::new(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Set authentication parameters.
    pub fn with_auth_params(mut self, auth_params: impl Into<Bytes>) -> Self {
        self.auth_params = auth_params.into();
        self
    }

    /// Set privacy parameters.
    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Fill the auth params with `mac_len` zero bytes for MAC computation.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    /// Encode to BER bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(crate::ber::tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(crate::ber::tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode from BER bytes.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;

        let raw_boots = seq.read_integer()?;
        if raw_boots < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidEngineBoots { value: raw_boots },
            ));
        }

        let raw_time = seq.read_integer()?;
        if raw_time < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidEngineTime { value: raw_time },
            ));
        }

        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots: raw_boots as u32,
            engine_time: raw_time as u32,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate the authenticationParameters content within an encoded
    /// v3 message.
    ///
    /// Returns `(offset, length)` of the MAC bytes, or `None` if the
    /// message does not have the expected shape. Walks the fixed
    /// structure: outer SEQUENCE, version, msgGlobalData, the
    /// security-parameters OCTET STRING, then the USM SEQUENCE fields
    /// up to authParams.
    pub fn find_auth_params_offset(encoded_msg: &[u8]) -> Option<(usize, usize)> {
        let mut offset = 0;

        // Outer SEQUENCE
        if encoded_msg.get(offset) != Some(&0x30) {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // version INTEGER
        if encoded_msg.get(offset) != Some(&0x02) {
            return None;
        }
        offset += 1;
        let (ver_len, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size + ver_len;

        // msgGlobalData SEQUENCE
        if encoded_msg.get(offset) != Some(&0x30) {
            return None;
        }
        offset += 1;
        let (global_len, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size + global_len;

        // msgSecurityParameters OCTET STRING wrapper
        if encoded_msg.get(offset) != Some(&0x04) {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // USM SEQUENCE
        if encoded_msg.get(offset) != Some(&0x30) {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // engineID, boots, time, username
        for _ in 0..4 {
            offset = skip_tlv(encoded_msg, offset)?;
        }

        // authParams OCTET STRING
        if encoded_msg.get(offset) != Some(&0x04) {
            return None;
        }
        offset += 1;
        let (auth_len, len_size) = parse_length(&encoded_msg[offset..])?;
        let auth_start = offset + len_size;
        if auth_start + auth_len > encoded_msg.len() {
            return None;
        }

        Some((auth_start, auth_len))
    }
}

/// Parse a BER length, returning (length, bytes consumed).
fn parse_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        Some((first as usize, 1))
    } else if first == 0x80 {
        None
    } else {
        let count = (first & 0x7F) as usize;
        if count > 4 || data.len() < 1 + count {
            return None;
        }
        let mut len = 0usize;
        for &b in &data[1..1 + count] {
            len = (len << 8) | (b as usize);
        }
        Some((len, 1 + count))
    }
}

/// Skip one TLV, returning the new offset.
fn skip_tlv(data: &[u8], offset: usize) -> Option<usize> {
    if offset >= data.len() {
        return None;
    }
    let mut pos = offset + 1;
    let (len, len_size) = parse_length(data.get(pos..)?)?;
    pos += len_size + len;
    if pos > data.len() {
        return None;
    }
    Some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roundtrip() {
        let decoded = UsmSecurityParams::decode(UsmSecurityParams::empty().encode()).unwrap();
        assert!(decoded.engine_id.is_empty());
        assert_eq!(decoded.engine_boots, 0);
        assert_eq!(decoded.engine_time, 0);
        assert!(decoded.username.is_empty());
        assert!(decoded.auth_params.is_empty());
        assert!(decoded.priv_params.is_empty());
    }

    #[test]
    fn test_full_roundtrip() {
        let params =
            UsmSecurityParams::new(b"engine-id".as_slice(), 1234, 5678, b"admin".as_slice())
                .with_auth_params(b"maca5678maca".as_slice())
                .with_priv_params(b"salt1234".as_slice());

        let decoded = UsmSecurityParams::decode(params.encode()).unwrap();
        assert_eq!(decoded.engine_id.as_ref(), b"engine-id");
        assert_eq!(decoded.engine_boots, 1234);
        assert_eq!(decoded.engine_time, 5678);
        assert_eq!(decoded.username.as_ref(), b"admin");
        assert_eq!(decoded.auth_params.as_ref(), b"maca5678maca");
        assert_eq!(decoded.priv_params.as_ref(), b"salt1234");
    }

    #[test]
    fn test_placeholder_is_zeroed() {
        let params =
            UsmSecurityParams::new(b"e".as_slice(), 1, 2, b"u".as_slice()).with_auth_placeholder(12);
        assert_eq!(params.auth_params.len(), 12);
        assert!(params.auth_params.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rejects_negative_boots_and_time() {
        for (boots, time) in [(-1, 100), (100, -1)] {
            let mut buf = EncodeBuf::new();
            buf.push_sequence(|buf| {
                buf.push_octet_string(&[]);
                buf.push_octet_string(&[]);
                buf.push_octet_string(&[]);
                buf.push_integer(time);
                buf.push_integer(boots);
                buf.push_octet_string(&[]);
            });
            assert!(UsmSecurityParams::decode(buf.finish()).is_err());
        }
    }

    #[test]
    fn test_accepts_max_values() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&[]);
            buf.push_octet_string(&[]);
            buf.push_octet_string(&[]);
            buf.push_integer(i32::MAX);
            buf.push_integer(i32::MAX);
            buf.push_octet_string(&[]);
        });
        let decoded = UsmSecurityParams::decode(buf.finish()).unwrap();
        assert_eq!(decoded.engine_boots, i32::MAX as u32);
        assert_eq!(decoded.engine_time, i32::MAX as u32);
    }

    #[test]
    fn test_find_auth_params_offset() {
        use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message};
        use crate::oid;
        use crate::pdu::Pdu;

        let global = MsgGlobalData::new(12345, 65535, MsgFlags::new(SecurityLevel::AuthNoPriv, true));
        let usm = UsmSecurityParams::new(b"engine123".as_slice(), 100, 200, b"testuser".as_slice())
            .with_auth_placeholder(12);
        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let msg = V3Message::new(global, usm.encode(), ScopedPdu::with_empty_context(pdu));

        let encoded = msg.encode();
        let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
        assert_eq!(len, 12);
        assert!(encoded[offset..offset + len].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_find_auth_params_rejects_garbage() {
        assert!(UsmSecurityParams::find_auth_params_offset(&[]).is_none());
        assert!(UsmSecurityParams::find_auth_params_offset(&[0x02, 0x01, 0x00]).is_none());
        assert!(UsmSecurityParams::find_auth_params_offset(&[0x30, 0x02, 0x05, 0x00]).is_none());
    }
}
