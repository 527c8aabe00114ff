//! BER decoding.
//!
//! [`Decoder`] is a `(Bytes, offset)` cursor. Every reader advances the
//! offset and reports failures as [`Error::Decode`] carrying the offset
//! where decoding went wrong. Sub-decoders slice the underlying
//! `Bytes` without copying.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// BER decoder cursor over a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
}

impl Decoder {
    /// Create a new decoder from bytes.
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Current offset into the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Remaining unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Check if the cursor reached the end.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        if self.offset >= self.data.len() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TruncatedData));
        }
        let byte = self.data[self.offset];
        self.offset += 1;
        Ok(byte)
    }

    /// Read a tag byte, rejecting the multi-byte tag form.
    pub fn read_tag(&mut self) -> Result<u8> {
        let t = self.read_byte()?;
        if tag::is_multibyte(t) {
            return Err(Error::decode(
                self.offset - 1,
                DecodeErrorKind::MultiByteTag { tag: t },
            ));
        }
        Ok(t)
    }

    /// Read a BER length.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset)?;
        self.offset += consumed;
        if len > self.remaining() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TruncatedData));
        }
        Ok(len)
    }

    /// Read raw content bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TruncatedData));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and expect a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let t = self.read_tag()?;
        if t != expected {
            return Err(Error::decode(
                self.offset - 1,
                DecodeErrorKind::UnexpectedTag {
                    expected,
                    actual: t,
                },
            ));
        }
        self.read_length()
    }

    /// Read a signed INTEGER TLV.
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read a signed integer value given its content length.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 4 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::IntegerTooLong { length: len, max: 4 },
            ));
        }

        let bytes = self.read_bytes(len)?;

        // Sign extend
        let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter() {
            value = (value << 8) | (byte as i32);
        }

        Ok(value)
    }

    /// Read an unsigned 32-bit value under the given tag.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Read an unsigned 32-bit value given its content length.
    ///
    /// Up to 5 content bytes: one 0x00 sign pad plus 4 value bytes.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 5 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::IntegerTooLong { length: len, max: 5 },
            ));
        }

        let bytes = self.read_bytes(len)?;
        if len == 5 && bytes[0] != 0 {
            return Err(Error::decode(
                self.offset - len,
                DecodeErrorKind::IntegerOverflow,
            ));
        }

        let mut value: u32 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | (byte as u32);
        }

        Ok(value)
    }

    /// Read an unsigned 64-bit value given its content length (Counter64).
    pub fn read_unsigned64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 9 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::IntegerTooLong { length: len, max: 9 },
            ));
        }

        let bytes = self.read_bytes(len)?;
        if len == 9 && bytes[0] != 0 {
            return Err(Error::decode(
                self.offset - len,
                DecodeErrorKind::IntegerOverflow,
            ));
        }

        let mut value: u64 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | (byte as u64);
        }

        Ok(value)
    }

    /// Read an OCTET STRING TLV.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL TLV.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER TLV.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read an OID given a pre-read content length.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes)
    }

    /// Read a SEQUENCE, returning a decoder over its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed TLV with the given tag, returning a decoder
    /// over its contents.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }

    /// Skip one TLV without parsing it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        let _tag = self.read_tag()?;
        let len = self.read_length()?;
        let new_offset = self.offset.saturating_add(len);
        if new_offset > self.data.len() {
            return Err(Error::decode(self.offset, DecodeErrorKind::TlvOverflow));
        }
        self.offset = new_offset;
        Ok(())
    }

    /// Create a sub-decoder for `len` bytes of the remaining data.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integer() {
        let cases: &[(&[u8], i32)] = &[
            (&[0x02, 0x01, 0x00], 0),
            (&[0x02, 0x01, 0x7F], 127),
            (&[0x02, 0x02, 0x00, 0x80], 128),
            (&[0x02, 0x02, 0x01, 0x2C], 300),
            (&[0x02, 0x01, 0xFF], -1),
            (&[0x02, 0x01, 0x80], -128),
        ];
        for (bytes, expected) in cases {
            let mut dec = Decoder::from_slice(bytes);
            assert_eq!(dec.read_integer().unwrap(), *expected);
        }
    }

    #[test]
    fn test_read_integer_rejects_oversized() {
        let mut dec = Decoder::from_slice(&[0x02, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert!(dec.read_integer().is_err());
    }

    #[test]
    fn test_read_integer_rejects_zero_length() {
        let mut dec = Decoder::from_slice(&[0x02, 0x00]);
        assert!(dec.read_integer().is_err());
    }

    #[test]
    fn test_read_unsigned32_with_sign_pad() {
        let mut dec = Decoder::from_slice(&[0x41, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            dec.read_unsigned32(super::tag::application::COUNTER32)
                .unwrap(),
            u32::MAX
        );
    }

    #[test]
    fn test_read_unsigned32_overflow() {
        // 5 bytes without the zero pad would exceed u32
        let mut dec = Decoder::from_slice(&[0x41, 0x05, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(dec
            .read_unsigned32(super::tag::application::COUNTER32)
            .is_err());
    }

    #[test]
    fn test_read_null() {
        let mut dec = Decoder::from_slice(&[0x05, 0x00]);
        dec.read_null().unwrap();

        let mut dec = Decoder::from_slice(&[0x05, 0x01, 0x00]);
        assert!(dec.read_null().is_err());
    }

    #[test]
    fn test_read_octet_string() {
        let mut dec = Decoder::from_slice(&[0x04, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(&dec.read_octet_string().unwrap()[..], b"hello");
    }

    #[test]
    fn test_read_oid() {
        let mut dec = Decoder::from_slice(&[0x06, 0x03, 0x2B, 0x06, 0x01]);
        assert_eq!(dec.read_oid().unwrap().arcs(), &[1, 3, 6, 1]);
    }

    #[test]
    fn test_read_sequence() {
        let mut dec = Decoder::from_slice(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_integer().unwrap(), 1);
        assert_eq!(seq.read_integer().unwrap(), 2);
        assert!(seq.is_empty());
    }

    #[test]
    fn test_multibyte_tag_rejected() {
        let mut dec = Decoder::from_slice(&[0x1F, 0x20, 0x01, 0x00]);
        assert!(dec.read_tag().is_err());
    }

    #[test]
    fn test_declared_length_past_end() {
        // OCTET STRING claiming 0x10 bytes with only 2 present
        let mut dec = Decoder::from_slice(&[0x04, 0x10, 0x01, 0x02]);
        assert!(dec.read_octet_string().is_err());
    }

    #[test]
    fn test_skip_tlv() {
        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x2A, 0x05, 0x00]);
        dec.skip_tlv().unwrap();
        dec.read_null().unwrap();
        assert!(dec.is_empty());
    }

    #[test]
    fn test_skip_tlv_overflow() {
        let mut dec = Decoder::from_slice(&[0x04, 0x82, 0x01, 0x00, 0xAA]);
        assert!(dec.skip_tlv().is_err());
    }

    #[test]
    fn test_non_minimal_integer_accepted() {
        // Redundant leading bytes tolerated on decode, never emitted
        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x01]);
        assert_eq!(dec.read_integer().unwrap(), 1);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0xFF, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);
    }
}
