//! BER (Basic Encoding Rules) codec.
//!
//! Everything on the SNMP wire is a TLV: tag, length, content. The
//! encoder writes backwards so headers land in front of content whose
//! length is only known afterwards; the decoder is an offset cursor
//! over a shared `Bytes` buffer.

mod decode;
mod encode;
pub mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{decode_length, encode_length, MAX_LENGTH};
