//! Error types.
//!
//! The crate has a single [`Error`] enum covering decode, encode,
//! protocol, USM, transport and agent-reported failures, plus
//! [`ErrorStatus`] for the RFC 3416 status codes an agent can return.
//!
//! Decode and USM errors are fatal to the current operation. Timeouts
//! are retried up to the configured cap; connection-refused and
//! host-unreachable conditions fail immediately. Agent error-status
//! replies surface as [`Error::Snmp`] with both code and index so the
//! caller can decide whether to treat them as data.

use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error kinds (SNMPv3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No authentication key available.
    NoAuthKey,
    /// HMAC verification failed.
    HmacMismatch,
    /// Authentication passed but the decrypted payload was not a
    /// scoped PDU (wrong privacy key or corrupted ciphertext).
    UndecryptablePayload,
    /// Authentication parameters wrong length.
    WrongMacLength { expected: usize, actual: usize },
    /// Could not locate auth params in the encoded message.
    AuthParamsNotFound,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthKey => write!(f, "no authentication key available"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::UndecryptablePayload => {
                write!(f, "decrypted payload is not a valid scoped PDU")
            }
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
        }
    }
}

/// Cryptographic error kinds (encryption/decryption).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// No privacy key available.
    NoPrivKey,
    /// Invalid key length for cipher.
    InvalidKeyLength,
    /// Cipher operation failed.
    CipherError,
    /// Unsupported privacy protocol.
    UnsupportedProtocol,
    /// Invalid privParameters length.
    InvalidPrivParamsLength { expected: usize, actual: usize },
    /// Ciphertext length not a multiple of the block size.
    InvalidCiphertextLength { length: usize, block_size: usize },
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPrivKey => write!(f, "no privacy key available"),
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::CipherError => write!(f, "cipher operation failed"),
            Self::UnsupportedProtocol => write!(f, "unsupported privacy protocol"),
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(
                    f,
                    "invalid privParameters length: expected {}, got {}",
                    expected, actual
                )
            }
            Self::InvalidCiphertextLength { length, block_size } => {
                write!(
                    f,
                    "ciphertext length {} not multiple of block size {}",
                    length, block_size
                )
            }
        }
    }
}

/// BER decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Expected a different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data truncated unexpectedly (short buffer).
    TruncatedData,
    /// Invalid BER length encoding.
    InvalidLength,
    /// Indefinite length not supported.
    IndefiniteLength,
    /// Length field uses too many octets.
    LengthTooLong { octets: usize },
    /// Length exceeds the sanity cap.
    LengthExceedsMax { length: usize, max: usize },
    /// Multi-byte tag form (low 5 bits all set) - not used by SNMP.
    MultiByteTag { tag: u8 },
    /// Zero-length integer.
    ZeroLengthInteger,
    /// Integer content longer than the type allows.
    IntegerTooLong { length: usize, max: usize },
    /// Integer value overflow.
    IntegerOverflow,
    /// Invalid OID subidentifier encoding.
    InvalidOidEncoding,
    /// OID has more arcs than allowed.
    OidTooLong { count: usize, max: usize },
    /// NULL with non-zero length.
    InvalidNull,
    /// Exception value (noSuchObject etc.) with non-zero length.
    ExceptionWithContent { tag: u8, length: usize },
    /// Tag byte is not a known SMI value type.
    UnknownValueTag(u8),
    /// Unknown SNMP version.
    UnknownVersion(i32),
    /// Unknown PDU type.
    UnknownPduType(u8),
    /// Invalid msgFlags (privacy without authentication).
    InvalidMsgFlags,
    /// Unknown security model (anything other than USM/3).
    UnknownSecurityModel(i32),
    /// msgMaxSize below the RFC 3412 minimum (484 octets).
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
    /// engineBoots outside 0..2^31-1.
    InvalidEngineBoots { value: i32 },
    /// engineTime outside 0..2^31-1.
    InvalidEngineTime { value: i32 },
    /// IP address content is not exactly 4 bytes.
    InvalidIpAddressLength { length: usize },
    /// Expected plaintext scoped PDU, got ciphertext.
    UnexpectedEncryption,
    /// Missing PDU in message.
    MissingPdu,
    /// Empty response where varbinds were expected.
    EmptyResponse,
    /// TLV extends past the end of the data.
    TlvOverflow,
    /// Discovery response carried an empty engine ID.
    EmptyEngineId,
    /// V2 notification without the sysUpTime.0 / snmpTrapOID.0 header varbinds.
    MissingNotificationHeader,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::MultiByteTag { tag } => {
                write!(f, "multi-byte tag form 0x{:02X} not supported", tag)
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerTooLong { length, max } => {
                write!(f, "integer content {} bytes exceeds maximum {}", length, max)
            }
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::InvalidOidEncoding => write!(f, "invalid OID encoding"),
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::ExceptionWithContent { tag, length } => {
                write!(
                    f,
                    "exception value 0x{:02X} with non-zero length {}",
                    tag, length
                )
            }
            Self::UnknownValueTag(t) => write!(f, "invalid ASN.1 type: 0x{:02X}", t),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::InvalidMsgFlags => {
                write!(f, "unsupported noAuthPriv: privacy without authentication")
            }
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model: {}", m),
            Self::MsgMaxSizeTooSmall { value, minimum } => {
                write!(f, "msgMaxSize {} below RFC 3412 minimum {}", value, minimum)
            }
            Self::InvalidEngineBoots { value } => write!(f, "invalid engineBoots: {}", value),
            Self::InvalidEngineTime { value } => write!(f, "invalid engineTime: {}", value),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::UnexpectedEncryption => write!(f, "expected plaintext scoped PDU"),
            Self::MissingPdu => write!(f, "missing PDU in message"),
            Self::EmptyResponse => write!(f, "empty response"),
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::EmptyEngineId => write!(f, "discovery response carried empty engine ID"),
            Self::MissingNotificationHeader => {
                write!(f, "notification missing sysUpTime.0/snmpTrapOID.0 varbinds")
            }
        }
    }
}

/// BER encode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// V3 security not configured.
    NoSecurityConfig,
    /// Engine not discovered.
    EngineNotDiscovered,
    /// Keys not derived for the current engine.
    KeysNotDerived,
    /// Auth key not available for encoding.
    MissingAuthKey,
    /// Privacy key not available.
    NoPrivKey,
    /// Could not locate auth params position in the encoded message.
    MissingAuthParams,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSecurityConfig => write!(f, "V3 security config not set"),
            Self::EngineNotDiscovered => write!(f, "engine not discovered"),
            Self::KeysNotDerived => write!(f, "keys not derived"),
            Self::MissingAuthKey => write!(f, "auth key not available for encoding"),
            Self::NoPrivKey => write!(f, "privacy key not available"),
            Self::MissingAuthParams => {
                write!(f, "could not find auth params position in encoded message")
            }
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Invalid arc value.
    InvalidArc,
    /// First arc must be 0, 1, or 2.
    InvalidFirstArc(u32),
    /// Second arc too large for first arc value.
    InvalidSecondArc { first: u32, second: u32 },
    /// OID has too many arcs.
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1, or 2, got {}", v),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {} too large for first arc {}", second, first)
            }
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

/// SNMP protocol error status codes (RFC 3416).
///
/// Returned by agents in the errorStatus field of a Response PDU,
/// together with a 1-based errorIndex naming the offending varbind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    /// Operation completed successfully (0).
    NoError,
    /// Response would be too large for transport (1).
    TooBig,
    /// Requested OID not found (2). SNMPv1 only; v2c+ uses exception values.
    NoSuchName,
    /// Invalid value provided in SET request (3).
    BadValue,
    /// Attempted to SET a read-only object (4).
    ReadOnly,
    /// Unspecified error (5).
    GenErr,
    /// Object exists but access is denied (6).
    NoAccess,
    /// SET value has wrong ASN.1 type (7).
    WrongType,
    /// SET value has incorrect length (8).
    WrongLength,
    /// SET value uses wrong encoding (9).
    WrongEncoding,
    /// SET value is out of range or otherwise invalid (10).
    WrongValue,
    /// Object does not support row creation (11).
    NoCreation,
    /// Value is inconsistent with other managed objects (12).
    InconsistentValue,
    /// Resource required for SET is unavailable (13).
    ResourceUnavailable,
    /// SET commit phase failed (14).
    CommitFailed,
    /// SET undo phase failed (15).
    UndoFailed,
    /// Access denied (16).
    AuthorizationError,
    /// Object does not support modification (17).
    NotWritable,
    /// Named object cannot be created (18).
    InconsistentName,
    /// Unknown or future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// The main error type for all usnmp operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out after all attempts.
    #[error("request timed out after {elapsed:?}{} (request_id={request_id}, retries={retries})", target.map(|t| format!(" waiting for {}", t)).unwrap_or_default())]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        request_id: i32,
        retries: u32,
    },

    /// The channel was closed while a request was in flight.
    #[error("socket terminated{}", target.map(|t| format!(" for {}", t)).unwrap_or_default())]
    Terminated { target: Option<SocketAddr> },

    /// Outgoing message exceeds the negotiated maximum size.
    #[error("message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// SNMP protocol error returned by the agent.
    #[error("SNMP error{}: {status} at index {index}", target.map(|t| format!(" from {}", t)).unwrap_or_default())]
    Snmp {
        target: Option<SocketAddr>,
        status: ErrorStatus,
        index: u32,
        oid: Option<crate::oid::Oid>,
    },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>, // Only allocated when parsing string input
    },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// BER encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Response request ID doesn't match the outstanding request.
    #[error("request ID mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch { expected: i32, actual: i32 },

    /// Response version doesn't match the request.
    #[error("version mismatch: expected {expected:?}, got {actual:?}")]
    VersionMismatch {
        expected: crate::version::Version,
        actual: crate::version::Version,
    },

    /// Reply PDU type unexpected in this context.
    #[error("unexpected PDU type 0x{tag:02X}")]
    UnexpectedPduType { tag: u8 },

    /// Reply carried a different community than the request.
    #[error("community mismatch")]
    CommunityMismatch { target: Option<SocketAddr> },

    /// Reply carried a different securityName or engine ID than the request.
    #[error("securityName mismatch")]
    SecurityNameMismatch { target: Option<SocketAddr> },

    /// Unknown engine ID (SNMPv3).
    #[error("unknown engine ID")]
    UnknownEngineId { target: Option<SocketAddr> },

    /// Message outside the time window (SNMPv3).
    #[error("message not in time window")]
    NotInTimeWindow { target: Option<SocketAddr> },

    /// Authentication failed (SNMPv3).
    #[error("authentication failed: {kind}")]
    AuthenticationFailed {
        target: Option<SocketAddr>,
        kind: AuthErrorKind,
    },

    /// Decryption failed (SNMPv3).
    #[error("decryption failed: {kind}")]
    DecryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Encryption failed (SNMPv3).
    #[error("encryption failed: {kind}")]
    EncryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// USM password shorter than the RFC 3414 minimum of 8 bytes.
    #[error("secret too short: {length} bytes, minimum {minimum}")]
    SecretTooShort { length: usize, minimum: usize },

    /// Agent returned a Report PDU that is not part of discovery.
    #[error("report received{}", oid.as_ref().map(|o| format!(": {}", o)).unwrap_or_default())]
    Report {
        target: Option<SocketAddr>,
        oid: Option<crate::oid::Oid>,
    },

    /// GETBULK requested on an SNMPv1 target.
    #[error("GETBULK is not supported in SNMPv1")]
    BulkNotSupported,

    /// Walk received an OID not lexicographically after the previous one.
    ///
    /// Indicates a non-conformant agent; aborting prevents an infinite loop.
    #[error("walk detected non-increasing OID: {previous} >= {current}")]
    NonIncreasingOid {
        previous: crate::oid::Oid,
        current: crate::oid::Oid,
    },

    /// Walk saw the same OID twice with different value types.
    #[error("value type changed for {oid} during walk")]
    ValueTypeChanged { oid: crate::oid::Oid },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create an authentication error.
    pub fn auth(target: Option<SocketAddr>, kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailed { target, kind }
    }

    /// Create a decryption error.
    pub fn decrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { target, kind }
    }

    /// Create an encryption error.
    pub fn encrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::EncryptionFailed { target, kind }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Whether this error is a fatal network condition that must not be retried.
    pub fn is_fatal_io(&self) -> bool {
        match self {
            Self::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::HostUnreachable
                    | std::io::ErrorKind::NetworkUnreachable
                    | std::io::ErrorKind::NetworkDown
            ),
            _ => false,
        }
    }

    /// Get the target address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. } => *target,
            Self::Timeout { target, .. } => *target,
            Self::Terminated { target } => *target,
            Self::Snmp { target, .. } => *target,
            Self::CommunityMismatch { target } => *target,
            Self::SecurityNameMismatch { target } => *target,
            Self::UnknownEngineId { target } => *target,
            Self::NotInTimeWindow { target } => *target,
            Self::AuthenticationFailed { target, .. } => *target,
            Self::DecryptionFailed { target, .. } => *target,
            Self::EncryptionFailed { target, .. } => *target,
            Self::Report { target, .. } => *target,
            _ => None,
        }
    }
}
