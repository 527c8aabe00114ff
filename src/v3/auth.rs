//! Authentication key derivation and HMAC operations (RFC 3414).
//!
//! - Password-to-key: the password is cycled into a 1 MiB stream and
//!   hashed to get the master key Ku.
//! - Localization: Kul = H(Ku || engineId || Ku) binds the key to one
//!   authoritative engine.
//! - Message authentication: HMAC over the whole encoded message with
//!   the authenticationParameters field zeroed, truncated to 96 bits.

use digest::{Digest, KeyInit, Mac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;
use crate::error::{Error, Result};

/// Minimum USM password length (RFC 3414 Section 11.2).
pub const MIN_SECRET_LENGTH: usize = 8;

/// RFC 3414 A.2 password expansion size (1 MiB).
const EXPANSION_SIZE: usize = 1_048_576;

/// A localized authentication key: derived from a password and bound
/// to a specific engine ID.
///
/// Key material is zeroed from memory on drop and redacted from
/// `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Derive a localized key from a password and engine ID.
    ///
    /// Fails with [`Error::SecretTooShort`] when the password is
    /// shorter than [`MIN_SECRET_LENGTH`].
    pub fn from_password(
        protocol: AuthProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Result<Self> {
        if password.len() < MIN_SECRET_LENGTH {
            return Err(Error::SecretTooShort {
                length: password.len(),
                minimum: MIN_SECRET_LENGTH,
            });
        }
        let mut master = password_to_key(protocol, password);
        let localized = localize_key(protocol, &master, engine_id);
        master.zeroize();
        Ok(Self {
            key: localized,
            protocol,
        })
    }

    /// Wrap an already-localized key (e.g. from configuration).
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    /// The protocol this key is for.
    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// The raw localized key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// The truncated MAC length for this key's protocol (12 bytes).
    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Compute the truncated HMAC of `data`.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        match self.protocol {
            AuthProtocol::Md5 => hmac_md5_96(&self.key, data),
            AuthProtocol::Sha1 => hmac_sha1_96(&self.key, data),
        }
    }

    /// Verify a truncated HMAC in constant time.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        if computed.len() != expected.len() {
            return false;
        }
        computed.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Password to master key (RFC 3414 A.2.1).
///
/// Cycles the password into a 1 MiB stream, hashed in 64-byte chunks.
fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => password_to_key_impl::<md5::Md5>(password),
        AuthProtocol::Sha1 => password_to_key_impl::<sha1::Sha1>(password),
    }
}

fn password_to_key_impl<D: Digest>(password: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();

    let mut buf = [0u8; 64];
    let mut password_index = 0;
    let mut count = 0;

    while count < EXPANSION_SIZE {
        for byte in &mut buf {
            *byte = password[password_index];
            password_index = (password_index + 1) % password.len();
        }
        hasher.update(buf);
        count += 64;
    }

    hasher.finalize().to_vec()
}

/// Key localization (RFC 3414 A.2.2): Kul = H(Ku || engineId || Ku).
fn localize_key(protocol: AuthProtocol, master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => localize_key_impl::<md5::Md5>(master_key, engine_id),
        AuthProtocol::Sha1 => localize_key_impl::<sha1::Sha1>(master_key, engine_id),
    }
}

fn localize_key_impl<D: Digest>(master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(master_key);
    hasher.update(engine_id);
    hasher.update(master_key);
    hasher.finalize().to_vec()
}

/// Extend a localized key for a privacy protocol that needs more
/// material than the auth digest provides (3DES, AES-192/256).
///
/// Appends `H(key || engineId || key)` of the running key until
/// `needed` bytes are collected, then truncates.
pub fn extend_key(
    protocol: AuthProtocol,
    localized: &[u8],
    engine_id: &[u8],
    needed: usize,
) -> Vec<u8> {
    let mut key = localized.to_vec();
    while key.len() < needed {
        let chunk = localize_key(protocol, &key, engine_id);
        key.extend_from_slice(&chunk);
    }
    key.truncate(needed);
    key
}

/// HMAC-MD5 truncated to 96 bits.
fn hmac_md5_96(key: &[u8], data: &[u8]) -> Vec<u8> {
    type HmacMd5 = hmac::Hmac<md5::Md5>;
    let mut mac = <HmacMd5 as KeyInit>::new_from_slice(key).expect("HMAC accepts any key size");
    Mac::update(&mut mac, data);
    let result = mac.finalize().into_bytes();
    result[..12].to_vec()
}

/// HMAC-SHA1 truncated to 96 bits.
fn hmac_sha1_96(key: &[u8], data: &[u8]) -> Vec<u8> {
    type HmacSha1 = hmac::Hmac<sha1::Sha1>;
    let mut mac = <HmacSha1 as KeyInit>::new_from_slice(key).expect("HMAC accepts any key size");
    Mac::update(&mut mac, data);
    let result = mac.finalize().into_bytes();
    result[..12].to_vec()
}

/// Authenticate an outgoing message in place.
///
/// The auth params field must already hold placeholder zeros; the HMAC
/// is computed over the full message and patched into position.
pub fn authenticate_message(
    key: &LocalizedKey,
    message: &mut [u8],
    auth_offset: usize,
    auth_len: usize,
) {
    let mac = key.compute_hmac(message);
    message[auth_offset..auth_offset + auth_len].copy_from_slice(&mac);
}

/// Verify the authentication of an incoming message.
///
/// Extracts the received MAC, recomputes over a zeroed copy and
/// compares in constant time.
pub fn verify_message(
    key: &LocalizedKey,
    message: &[u8],
    auth_offset: usize,
    auth_len: usize,
) -> bool {
    let received_mac = &message[auth_offset..auth_offset + auth_len];

    let mut msg_copy = message.to_vec();
    msg_copy[auth_offset..auth_offset + auth_len].fill(0);

    key.verify_hmac(&msg_copy, received_mac)
}
