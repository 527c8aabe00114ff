//! Variable binding (VarBind): an OID paired with a value.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

/// Variable binding - an OID-value pair carried in a PDU.
///
/// Encoded as `SEQUENCE { oid, value }`. Equality is field-wise, so a
/// varbind list compares positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a VarBind with a NULL value (the form requests carry).
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encode a varbind list as a SEQUENCE of VarBind SEQUENCEs.
pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) {
    buf.push_sequence(|buf| {
        // Reverse buffer: last varbind first
        for vb in varbinds.iter().rev() {
            vb.encode(buf);
        }
    });
}

/// Decode a varbind list.
pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;

    // Typical varbinds run 20-50 bytes; a /16 estimate avoids most
    // reallocation without over-committing
    let mut varbinds = Vec::with_capacity((seq.remaining() / 16).max(1));

    while !seq.is_empty() {
        varbinds.push(VarBind::decode(&mut seq)?);
    }

    Ok(varbinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use bytes::Bytes;

    fn roundtrip_list(varbinds: &[VarBind]) -> Vec<VarBind> {
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, varbinds);
        let bytes = buf.finish();
        let mut decoder = Decoder::new(bytes);
        decode_varbind_list(&mut decoder).unwrap()
    }

    #[test]
    fn test_varbind_roundtrip() {
        let vb = VarBind::new(oid!(1, 3, 6, 1), Value::Integer(42));
        let mut buf = EncodeBuf::new();
        vb.encode(&mut buf);
        let bytes = buf.finish();
        let mut decoder = Decoder::new(bytes);
        assert_eq!(VarBind::decode(&mut decoder).unwrap(), vb);
    }

    #[test]
    fn test_list_roundtrip_preserves_order() {
        let varbinds = vec![
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("router1")),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(991)),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Null),
        ];
        assert_eq!(roundtrip_list(&varbinds), varbinds);
    }

    #[test]
    fn test_empty_list() {
        assert!(roundtrip_list(&[]).is_empty());
    }

    #[test]
    fn test_list_with_exceptions() {
        let varbinds = vec![
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::NoSuchObject),
            VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
                Value::OctetString(Bytes::from_static(b"ok")),
            ),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::EndOfMibView),
        ];
        let decoded = roundtrip_list(&varbinds);
        assert_eq!(decoded, varbinds);
        assert!(decoded[0].value.is_exception());
        assert!(!decoded[1].value.is_exception());
    }

    #[test]
    fn test_mixed_value_types() {
        let varbinds = vec![
            VarBind::new(oid!(1, 3, 6, 1, 1), Value::Integer(-5)),
            VarBind::new(oid!(1, 3, 6, 1, 2), Value::Counter32(1000)),
            VarBind::new(oid!(1, 3, 6, 1, 3), Value::Gauge32(500)),
            VarBind::new(oid!(1, 3, 6, 1, 4), Value::Counter64(u64::MAX)),
            VarBind::new(oid!(1, 3, 6, 1, 5), Value::IpAddress([10, 0, 0, 1])),
            VarBind::new(
                oid!(1, 3, 6, 1, 6),
                Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1)),
            ),
            VarBind::new(oid!(1, 3, 6, 1, 7), Value::Opaque(Bytes::from_static(b"o"))),
        ];
        assert_eq!(roundtrip_list(&varbinds), varbinds);
    }

    #[test]
    fn test_display() {
        let vb = VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Integer(42));
        assert_eq!(vb.to_string(), "1.3.6.1.2.1.1.1.0 = 42");
    }
}
