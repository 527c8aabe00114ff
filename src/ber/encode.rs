//! BER encoding.
//!
//! BER headers carry the content length, which is only known after the
//! content is produced. Instead of encoding into a temporary and
//! prepending, [`EncodeBuf`] writes everything backwards: content
//! first, then length, then tag. `finish()` reverses once.

use super::length::encode_length;
use super::tag;
use bytes::Bytes;

/// Reverse-writing BER encode buffer.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create a new encode buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    /// Create a new encode buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Push a single byte.
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Push a run of bytes (stored reversed so the output reads forward).
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    /// Push a BER length for `len` content bytes.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, count) = encode_length(len);
        // encode_length already returns reversed bytes
        self.buf.extend_from_slice(&bytes[..count]);
    }

    /// Push a tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a constructed TLV: the closure writes the content (in
    /// reverse field order), then the length and tag are placed behind it.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.len();
        f(self);
        let content_len = self.len() - start;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Encode a signed INTEGER, minimum-length two's complement.
    pub fn push_integer(&mut self, value: i32) {
        let (arr, len) = integer_bytes(value);
        self.push_bytes(&arr[4 - len..]);
        self.push_length(len);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Encode an unsigned 32-bit value under the given application tag.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let (arr, len) = unsigned32_bytes(value);
        self.push_bytes(&arr[5 - len..]);
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Encode a Counter64.
    pub fn push_unsigned64(&mut self, tag: u8, value: u64) {
        let (arr, len) = unsigned64_bytes(value);
        self.push_bytes(&arr[9 - len..]);
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Encode a NULL.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Encode an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &crate::oid::Oid) {
        let ber = oid.to_ber();
        self.push_bytes(&ber);
        self.push_length(ber.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Encode an IpAddress (application tag, 4 bytes).
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Finalize and return the encoded bytes in forward order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }

    /// Finalize into a `Vec<u8>`.
    pub fn finish_vec(mut self) -> Vec<u8> {
        self.buf.reverse();
        self.buf
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum-length two's-complement form of a signed 32-bit integer.
///
/// The valid bytes sit at the end of the returned array. Leading 0x00
/// (positive) or 0xFF (negative) bytes that would be redundant given
/// the sign of the following bit are stripped.
#[inline]
fn integer_bytes(value: i32) -> ([u8; 4], usize) {
    let bytes = value.to_be_bytes();
    let mut start = 0;

    if value >= 0 {
        while start < 3 && bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0 {
            start += 1;
        }
    } else {
        while start < 3 && bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0 {
            start += 1;
        }
    }

    (bytes, 4 - start)
}

/// Unsigned 32-bit content bytes, with a 0x00 prefix when the top bit
/// of the first significant byte is set.
#[inline]
fn unsigned32_bytes(value: u32) -> ([u8; 5], usize) {
    if value == 0 {
        return ([0; 5], 1);
    }

    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 3 && bytes[start] == 0 {
        start += 1;
    }

    let mut result = [0u8; 5];
    result[1..].copy_from_slice(&bytes);
    if bytes[start] & 0x80 != 0 {
        (result, 5 - start)
    } else {
        (result, 4 - start)
    }
}

/// Unsigned 64-bit content bytes (Counter64).
#[inline]
fn unsigned64_bytes(value: u64) -> ([u8; 9], usize) {
    if value == 0 {
        return ([0; 9], 1);
    }

    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 && bytes[start] == 0 {
        start += 1;
    }

    let mut result = [0u8; 9];
    result[1..].copy_from_slice(&bytes);
    if bytes[start] & 0x80 != 0 {
        (result, 9 - start)
    } else {
        (result, 8 - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integer(value: i32) -> Vec<u8> {
        let (arr, len) = integer_bytes(value);
        arr[4 - len..].to_vec()
    }

    fn unsigned32(value: u32) -> Vec<u8> {
        let (arr, len) = unsigned32_bytes(value);
        arr[5 - len..].to_vec()
    }

    #[test]
    fn test_integer_minimal_form() {
        assert_eq!(integer(0), vec![0x00]);
        assert_eq!(integer(1), vec![0x01]);
        assert_eq!(integer(127), vec![0x7F]);
        assert_eq!(integer(128), vec![0x00, 0x80]);
        assert_eq!(integer(300), vec![0x01, 0x2C]);
        assert_eq!(integer(-1), vec![0xFF]);
        assert_eq!(integer(-128), vec![0x80]);
        assert_eq!(integer(-129), vec![0xFF, 0x7F]);
        assert_eq!(integer(i32::MIN), vec![0x80, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_unsigned32_sign_prefix() {
        assert_eq!(unsigned32(0), vec![0x00]);
        assert_eq!(unsigned32(127), vec![0x7F]);
        assert_eq!(unsigned32(128), vec![0x00, 0x80]);
        assert_eq!(unsigned32(300), vec![0x01, 0x2C]);
        assert_eq!(unsigned32(u32::MAX), vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_unsigned64_sign_prefix() {
        let (arr, len) = unsigned64_bytes(u64::MAX);
        assert_eq!(len, 9);
        assert_eq!(arr[0], 0x00);
    }

    #[test]
    fn test_encode_null() {
        let mut buf = EncodeBuf::new();
        buf.push_null();
        assert_eq!(&buf.finish()[..], &[0x05, 0x00]);
    }

    #[test]
    fn test_encode_integer_tlv() {
        let mut buf = EncodeBuf::new();
        buf.push_integer(42);
        assert_eq!(&buf.finish()[..], &[0x02, 0x01, 0x2A]);
    }

    #[test]
    fn test_encode_sequence() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            // reverse buffer: last field first
            buf.push_integer(2);
            buf.push_integer(1);
        });
        assert_eq!(
            &buf.finish()[..],
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn test_encode_octet_string() {
        let mut buf = EncodeBuf::new();
        buf.push_octet_string(b"public");
        assert_eq!(
            &buf.finish()[..],
            &[0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c']
        );
    }
}
