//! SNMPv3 User-based Security Model (RFC 3414).
//!
//! - USM security parameter encoding/decoding
//! - Password-to-key derivation and key localization
//! - HMAC-MD5-96 and HMAC-SHA1-96 authentication
//! - DES-CBC, 3DES-CBC and AES-CFB-128/192/256 privacy
//! - Engine discovery state and time synchronization

pub mod auth;
mod engine;
mod privacy;
mod usm;

pub use auth::{authenticate_message, extend_key, verify_message, LocalizedKey, MIN_SECRET_LENGTH};
pub use engine::{
    is_decryption_error_report, is_not_in_time_window_report, is_unknown_engine_id_report,
    is_unknown_user_name_report, is_wrong_digest_report, parse_discovery_response, report_oids,
    EngineState, DISCOVERY_VALIDITY_SECS, MAX_ENGINE_TIME,
};
pub use privacy::{PrivKey, SaltCounter};
pub use usm::UsmSecurityParams;

/// Error returned when parsing a protocol name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProtocolError {
    input: String,
    kind: ProtocolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtocolKind {
    Auth,
    Priv,
}

impl std::fmt::Display for ParseProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ProtocolKind::Auth => write!(
                f,
                "unknown authentication protocol '{}'; expected MD5 or SHA",
                self.input
            ),
            ProtocolKind::Priv => write!(
                f,
                "unknown privacy protocol '{}'; expected one of: DES, 3DES, AES, AES-192, AES-256",
                self.input
            ),
        }
    }
}

impl std::error::Error for ParseProtocolError {}

/// Authentication protocol identifiers (RFC 3414).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    /// HMAC-MD5-96
    Md5,
    /// HMAC-SHA1-96
    Sha1,
}

impl AuthProtocol {
    /// Digest output length in bytes.
    ///
    /// Also the localized key length produced by RFC 3414 key
    /// derivation, which privacy keys are cut (or extended) from.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
        }
    }

    /// Truncated MAC length carried in msgAuthenticationParameters.
    ///
    /// Both RFC 3414 protocols truncate to 96 bits.
    pub fn mac_len(self) -> usize {
        12
    }
}

impl std::fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha1 => write!(f, "SHA"),
        }
    }
}

impl std::str::FromStr for AuthProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA" | "SHA1" | "SHA-1" => Ok(Self::Sha1),
            _ => Err(ParseProtocolError {
                input: s.to_string(),
                kind: ProtocolKind::Auth,
            }),
        }
    }
}

/// Privacy protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    /// DES-CBC (RFC 3414)
    Des,
    /// 3DES-EDE-CBC (Reeder draft)
    TripleDes,
    /// AES-128-CFB (RFC 3826)
    Aes128,
    /// AES-192-CFB (RFC 3826 extension)
    Aes192,
    /// AES-256-CFB (RFC 3826 extension)
    Aes256,
}

impl PrivProtocol {
    /// Localized key material required, in bytes.
    ///
    /// CBC protocols need a pre-IV behind the cipher key; CFB
    /// protocols derive the IV from boots/time/salt instead.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des => 16,       // 8 key + 8 pre-IV
            Self::TripleDes => 32, // 24 key + 8 pre-IV
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// privParameters length on the wire.
    ///
    /// 8 bytes for every protocol (the deployed convention).
    pub fn salt_len(self) -> usize {
        8
    }
}

impl std::fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Des => write!(f, "DES"),
            Self::TripleDes => write!(f, "3DES"),
            Self::Aes128 => write!(f, "AES"),
            Self::Aes192 => write!(f, "AES-192"),
            Self::Aes256 => write!(f, "AES-256"),
        }
    }
}

impl std::str::FromStr for PrivProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DES" => Ok(Self::Des),
            "3DES" | "TRIPLEDES" | "3DES-EDE" => Ok(Self::TripleDes),
            "AES" | "AES128" | "AES-128" => Ok(Self::Aes128),
            "AES192" | "AES-192" => Ok(Self::Aes192),
            "AES256" | "AES-256" => Ok(Self::Aes256),
            _ => Err(ParseProtocolError {
                input: s.to_string(),
                kind: ProtocolKind::Priv,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_protocol_lengths() {
        assert_eq!(AuthProtocol::Md5.digest_len(), 16);
        assert_eq!(AuthProtocol::Sha1.digest_len(), 20);
        assert_eq!(AuthProtocol::Md5.mac_len(), 12);
        assert_eq!(AuthProtocol::Sha1.mac_len(), 12);
    }

    #[test]
    fn test_priv_protocol_lengths() {
        assert_eq!(PrivProtocol::Des.key_len(), 16);
        assert_eq!(PrivProtocol::TripleDes.key_len(), 32);
        assert_eq!(PrivProtocol::Aes128.key_len(), 16);
        assert_eq!(PrivProtocol::Aes192.key_len(), 24);
        assert_eq!(PrivProtocol::Aes256.key_len(), 32);
        for p in [
            PrivProtocol::Des,
            PrivProtocol::TripleDes,
            PrivProtocol::Aes128,
            PrivProtocol::Aes192,
            PrivProtocol::Aes256,
        ] {
            assert_eq!(p.salt_len(), 8);
        }
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("md5".parse::<AuthProtocol>().unwrap(), AuthProtocol::Md5);
        assert_eq!("SHA-1".parse::<AuthProtocol>().unwrap(), AuthProtocol::Sha1);
        assert!("sha256".parse::<AuthProtocol>().is_err());

        assert_eq!("des".parse::<PrivProtocol>().unwrap(), PrivProtocol::Des);
        assert_eq!(
            "3des".parse::<PrivProtocol>().unwrap(),
            PrivProtocol::TripleDes
        );
        assert_eq!(
            "AES-256".parse::<PrivProtocol>().unwrap(),
            PrivProtocol::Aes256
        );
        assert!("blowfish".parse::<PrivProtocol>().is_err());
    }

    #[test]
    fn test_parse_error_display() {
        let err = "bogus".parse::<AuthProtocol>().unwrap_err();
        assert!(err.to_string().contains("bogus"));
        assert!(err.to_string().contains("authentication"));
    }
}
