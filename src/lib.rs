// Allow large error types - the Error enum carries OIDs inline for
// diagnostics; boxing them would add allocations for a marginal size win.
#![allow(clippy::result_large_err)]

//! # usnmp
//!
//! Async manager-side SNMP for Rust: v1, v2c and v3 over UDP.
//!
//! The crate is the protocol engine end to end - BER/TLV codecs for
//! the SMI types, PDU and message framing, the SNMPv3 User-based
//! Security Model (HMAC-MD5/SHA-1 authentication; DES, 3DES and
//! AES-128/192/256 privacy) with engine discovery and time
//! synchronization, and a UDP request/retry/timeout engine exposing a
//! typed, map-valued API.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use usnmp::{oid, Auth, Client};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), usnmp::Error> {
//!     let client = Client::builder("192.168.1.1:161", Auth::v2c("public"))
//!         .timeout(Duration::from_secs(2))
//!         .connect()
//!         .await?;
//!
//!     let results = client.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await?;
//!     for (oid, value) in &results {
//!         println!("{} = {}", oid, value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## SNMPv3
//!
//! ```rust,no_run
//! use usnmp::{oid, Auth, AuthProtocol, Client, PrivProtocol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), usnmp::Error> {
//!     let client = Client::builder(
//!         "192.168.1.1:161",
//!         Auth::usm("admin")
//!             .auth(AuthProtocol::Sha1, "authpass123")
//!             .privacy(PrivProtocol::Aes128, "privpass123"),
//!     )
//!     .connect()
//!     .await?;
//!
//!     // Engine discovery runs implicitly before the first request
//!     let results = client.walk(&oid!(1, 3, 6, 1, 2, 1, 1)).await?;
//!     println!("{} objects", results.len());
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod client;
pub mod error;
pub mod message;
pub mod notification;
pub mod oid;
pub mod pdu;
pub mod transport;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

// Re-exports for convenience
pub use client::{Auth, Client, ClientBuilder, ClientConfig, CommunityVersion, V3SecurityConfig};
pub use error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus,
    OidErrorKind, Result,
};
pub use message::SecurityLevel;
pub use notification::{Notification, NotificationListener};
pub use oid::Oid;
pub use pdu::{GenericTrap, NotificationV2, Pdu, PduType, TrapV1Pdu};
pub use transport::{Transport, UdpChannel};
pub use v3::{AuthProtocol, EngineState, LocalizedKey, ParseProtocolError, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;

/// Testing utilities exposed via the `testing` feature.
#[cfg(feature = "testing")]
pub mod testing {
    pub use crate::transport::{MockResponse, MockTransport};
    pub use crate::util::{decode_hex, encode_hex};
}
