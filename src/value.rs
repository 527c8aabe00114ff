//! SMI value types.
//!
//! [`Value`] is the tagged union of everything that can appear on the
//! wire in a varbind: the SMIv2 application types, the v2 exception
//! markers, and the universal primitives. Dispatch is on the wire tag;
//! a tag outside the table is a hard decode error.

use crate::ber::{tag, Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::util::encode_hex;
use bytes::Bytes;

/// SNMP value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER (signed 32-bit, tag 0x02)
    Integer(i32),

    /// OCTET STRING (opaque bytes, tag 0x04)
    OctetString(Bytes),

    /// NULL (tag 0x05)
    Null,

    /// OBJECT IDENTIFIER (tag 0x06)
    ObjectIdentifier(Oid),

    /// IpAddress (exactly 4 bytes, network order, tag 0x40)
    IpAddress([u8; 4]),

    /// Counter32 (unsigned 32-bit, wraps at 2^32, tag 0x41)
    Counter32(u32),

    /// Gauge32 / Unsigned32 (unsigned 32-bit, latches at max, tag 0x42).
    ///
    /// The two SMI types share the wire tag, so they are a single
    /// variant here; any textual distinction must be carried
    /// out-of-band.
    Gauge32(u32),

    /// TimeTicks (hundredths of a second, tag 0x43)
    TimeTicks(u32),

    /// Opaque (arbitrary bytes, tag 0x44)
    Opaque(Bytes),

    /// Counter64 (unsigned 64-bit, wraps at 2^64, tag 0x46). v2c/v3 only.
    Counter64(u64),

    /// noSuchObject exception (tag 0x80, zero length)
    NoSuchObject,

    /// noSuchInstance exception (tag 0x81, zero length)
    NoSuchInstance,

    /// endOfMibView exception (tag 0x82, zero length)
    EndOfMibView,
}

impl Value {
    /// The wire tag of this value.
    pub fn wire_tag(&self) -> u8 {
        match self {
            Value::Integer(_) => tag::universal::INTEGER,
            Value::OctetString(_) => tag::universal::OCTET_STRING,
            Value::Null => tag::universal::NULL,
            Value::ObjectIdentifier(_) => tag::universal::OBJECT_IDENTIFIER,
            Value::IpAddress(_) => tag::application::IP_ADDRESS,
            Value::Counter32(_) => tag::application::COUNTER32,
            Value::Gauge32(_) => tag::application::GAUGE32,
            Value::TimeTicks(_) => tag::application::TIMETICKS,
            Value::Opaque(_) => tag::application::OPAQUE,
            Value::Counter64(_) => tag::application::COUNTER64,
            Value::NoSuchObject => tag::context::NO_SUCH_OBJECT,
            Value::NoSuchInstance => tag::context::NO_SUCH_INSTANCE,
            Value::EndOfMibView => tag::context::END_OF_MIB_VIEW,
        }
    }

    /// Try to get as i32 (Integer only).
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32 (Counter32, Gauge32, TimeTicks, or a
    /// non-negative Integer).
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) if *v >= 0 => Some(*v as u32),
            _ => None,
        }
    }

    /// Try to get as u64 (Counter64 or any unsigned 32-bit type).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            Value::Integer(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Try to get as bytes (OctetString or Opaque).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as a UTF-8 string (OctetString/Opaque with valid UTF-8).
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Try to get as an OID.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Try to get as an IPv4 address.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(std::net::Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// Check if this is one of the v2 exception values.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Counter difference with wraparound.
    ///
    /// For two samples of the same counter, `earlier.counter_diff(&later)`
    /// is `(later - earlier) mod 2^32` (or `mod 2^64` for Counter64).
    /// Returns `None` when the variants are not a matching counter pair.
    pub fn counter_diff(&self, later: &Value) -> Option<Value> {
        match (self, later) {
            (Value::Counter32(a), Value::Counter32(b)) => {
                Some(Value::Counter32(b.wrapping_sub(*a)))
            }
            (Value::Counter64(a), Value::Counter64(b)) => {
                Some(Value::Counter64(b.wrapping_sub(*a)))
            }
            _ => None,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::Counter64(v) => buf.push_unsigned64(tag::application::COUNTER64, *v),
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                buf.push_length(0);
                buf.push_tag(self.wire_tag());
            }
        }
    }

    /// Decode from BER.
    ///
    /// An unknown tag and an exception value with non-zero length are
    /// both hard errors.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let t = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match t {
            tag::universal::INTEGER => Ok(Value::Integer(decoder.read_integer_value(len)?)),
            tag::universal::OCTET_STRING => Ok(Value::OctetString(decoder.read_bytes(len)?)),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(decoder.offset(), DecodeErrorKind::InvalidNull));
                }
                Ok(Value::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(decoder.read_oid_value(len)?))
            }
            tag::application::IP_ADDRESS => {
                if len != 4 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::InvalidIpAddressLength { length: len },
                    ));
                }
                let data = decoder.read_bytes(4)?;
                Ok(Value::IpAddress([data[0], data[1], data[2], data[3]]))
            }
            tag::application::COUNTER32 => {
                Ok(Value::Counter32(decoder.read_unsigned32_value(len)?))
            }
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.read_unsigned32_value(len)?)),
            tag::application::TIMETICKS => {
                Ok(Value::TimeTicks(decoder.read_unsigned32_value(len)?))
            }
            tag::application::OPAQUE => Ok(Value::Opaque(decoder.read_bytes(len)?)),
            tag::application::COUNTER64 => {
                Ok(Value::Counter64(decoder.read_unsigned64_value(len)?))
            }
            tag::context::NO_SUCH_OBJECT
            | tag::context::NO_SUCH_INSTANCE
            | tag::context::END_OF_MIB_VIEW => {
                if len != 0 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::ExceptionWithContent { tag: t, length: len },
                    ));
                }
                Ok(match t {
                    tag::context::NO_SUCH_OBJECT => Value::NoSuchObject,
                    tag::context::NO_SUCH_INSTANCE => Value::NoSuchInstance,
                    _ => Value::EndOfMibView,
                })
            }
            other => Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::UnknownValueTag(other),
            )),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "0x{}", encode_hex(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(a) => write!(f, "{}.{}.{}.{}", a[0], a[1], a[2], a[3]),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                let days = secs / 86400;
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let s = secs % 60;
                write!(f, "{}d {}h {}m {}s", days, hours, mins, s)
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", encode_hex(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

/// IPv4 address arithmetic for IpAddress values.
///
/// Classful helpers plus mask/subnet/broadcast derivation, operating on
/// `Ipv4Addr` directly so they compose with [`Value::as_ip`].
pub mod ip {
    use std::net::Ipv4Addr;

    /// Classful address categories (historical, still used for display).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AddressClass {
        A,
        B,
        C,
        /// Multicast (224.0.0.0/4)
        D,
        /// Reserved (240.0.0.0/4)
        E,
    }

    /// Determine the classful category of an address.
    pub fn address_class(addr: Ipv4Addr) -> AddressClass {
        let first = addr.octets()[0];
        match first {
            0..=127 => AddressClass::A,
            128..=191 => AddressClass::B,
            192..=223 => AddressClass::C,
            224..=239 => AddressClass::D,
            _ => AddressClass::E,
        }
    }

    /// Build a netmask from a prefix length (0..=32).
    ///
    /// Returns `None` when the prefix length exceeds 32.
    pub fn mask_from_prefix(prefix: u8) -> Option<Ipv4Addr> {
        if prefix > 32 {
            return None;
        }
        let bits = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix as u32)
        };
        Some(Ipv4Addr::from(bits))
    }

    /// Network address of `addr` under `mask`.
    pub fn subnet(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(addr) & u32::from(mask))
    }

    /// Directed broadcast address of `addr` under `mask`.
    pub fn broadcast(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(addr) | !u32::from(mask))
    }
}
