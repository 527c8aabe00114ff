//! Privacy (encryption) protocols for SNMPv3.
//!
//! - DES-CBC (RFC 3414 Section 8)
//! - 3DES-EDE-CBC (Reeder draft)
//! - AES-CFB-128/192/256 (RFC 3826 and its extensions)
//!
//! # Salt and IV derivation
//!
//! CBC protocols (DES, 3DES): privParameters = engineBoots (4 bytes BE)
//! || salt counter (4 bytes BE); IV = pre-IV XOR privParameters, where
//! the pre-IV is the 8 bytes of localized key behind the cipher key.
//!
//! CFB protocols (AES): privParameters = 8-byte salt; IV = engineBoots
//! (4 BE) || engineTime (4 BE) || salt - concatenation, not XOR - and
//! no padding since CFB is a stream mode.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{extend_key, AuthProtocol, LocalizedKey, PrivProtocol};
use crate::error::{CryptoErrorKind, Error, Result};
use crate::util::random_nonzero_u64;

/// Monotonically increasing salt counter.
///
/// Seeded from the OS random source; zero is skipped on wraparound so
/// an all-zero salt never appears on the wire.
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    /// Create a counter seeded from cryptographic randomness.
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    /// Create a counter starting at a specific value (tests).
    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Take the next salt value.
    pub fn next(&self) -> u64 {
        let val = self.0.fetch_add(1, Ordering::SeqCst);
        if val == 0 {
            self.0.fetch_add(1, Ordering::SeqCst)
        } else {
            val
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Privacy key for one engine.
///
/// Holds the localized (and, where necessary, extended) key material
/// for the selected protocol. Zeroed on drop, redacted from `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
    #[zeroize(skip)]
    salt_counter: u64,
}

impl PrivKey {
    /// Derive a privacy key from a password and engine ID.
    ///
    /// The derivation runs the authentication protocol's password-to-key
    /// and localization over the privacy password, then extends the
    /// result when the protocol needs more material than the digest
    /// provides (3DES always; AES-192/256 over MD5/SHA-1).
    pub fn from_password(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Result<Self> {
        let localized = LocalizedKey::from_password(auth_protocol, password, engine_id)?;
        Ok(Self::from_localized(
            auth_protocol,
            priv_protocol,
            localized.as_bytes(),
            engine_id,
        ))
    }

    /// Build from an already-localized key, extending it as needed.
    pub fn from_localized(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        localized: &[u8],
        engine_id: &[u8],
    ) -> Self {
        let needed = priv_protocol.key_len();
        let key = if localized.len() < needed {
            extend_key(auth_protocol, localized, engine_id, needed)
        } else {
            localized[..needed].to_vec()
        };

        Self {
            key,
            protocol: priv_protocol,
            salt_counter: random_nonzero_u64(),
        }
    }

    /// Wrap raw key material of the exact protocol length.
    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
            salt_counter: random_nonzero_u64(),
        }
    }

    /// The privacy protocol.
    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    fn next_salt(&mut self, shared: Option<&SaltCounter>) -> u64 {
        match shared {
            Some(counter) => counter.next(),
            None => {
                let mut s = self.salt_counter;
                self.salt_counter = self.salt_counter.wrapping_add(1);
                if s == 0 {
                    s = self.salt_counter;
                    self.salt_counter = self.salt_counter.wrapping_add(1);
                }
                s
            }
        }
    }

    /// Encrypt a scoped-PDU encoding, returning (ciphertext, privParameters).
    pub fn encrypt(
        &mut self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt_counter: Option<&SaltCounter>,
    ) -> Result<(Bytes, Bytes)> {
        let salt = self.next_salt(salt_counter);

        match self.protocol {
            PrivProtocol::Des => self.encrypt_cbc(plaintext, engine_boots, salt, 8),
            PrivProtocol::TripleDes => self.encrypt_cbc(plaintext, engine_boots, salt, 24),
            PrivProtocol::Aes128 => self.encrypt_cfb(plaintext, engine_boots, engine_time, salt, 16),
            PrivProtocol::Aes192 => self.encrypt_cfb(plaintext, engine_boots, engine_time, salt, 24),
            PrivProtocol::Aes256 => self.encrypt_cfb(plaintext, engine_boots, engine_time, salt, 32),
        }
    }

    /// Decrypt using the privParameters from the message.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        if priv_params.len() != self.protocol.salt_len() {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: self.protocol.salt_len(),
                    actual: priv_params.len(),
                },
            ));
        }

        match self.protocol {
            PrivProtocol::Des => self.decrypt_cbc(ciphertext, priv_params, 8),
            PrivProtocol::TripleDes => self.decrypt_cbc(ciphertext, priv_params, 24),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                self.decrypt_cfb(ciphertext, engine_boots, engine_time, priv_params)
            }
        }
    }

    /// CBC IV: pre-IV (key bytes behind the cipher key) XOR salt field.
    fn cbc_iv(&self, key_len: usize, salt: &[u8; 8]) -> [u8; 8] {
        let pre_iv = &self.key[key_len..key_len + 8];
        let mut iv = [0u8; 8];
        for i in 0..8 {
            iv[i] = pre_iv[i] ^ salt[i];
        }
        iv
    }

    /// DES/3DES encryption (CBC, zero-padded to the block size).
    fn encrypt_cbc(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        salt_int: u64,
        key_len: usize,
    ) -> Result<(Bytes, Bytes)> {
        use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};

        // privParameters = engineBoots (4 BE) || counter (4 BE)
        let mut salt = [0u8; 8];
        salt[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt[4..].copy_from_slice(&(salt_int as u32).to_be_bytes());

        let iv = self.cbc_iv(key_len, &salt);
        let key = &self.key[..key_len];

        // Pad to an 8-byte boundary; pad content is arbitrary, zeros here
        let padded_len = plaintext.len().div_ceil(8) * 8;
        let mut buffer = vec![0u8; padded_len];
        buffer[..plaintext.len()].copy_from_slice(plaintext);

        match self.protocol {
            PrivProtocol::Des => {
                type DesCbc = cbc::Encryptor<des::Des>;
                let cipher = DesCbc::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher
                    .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::CipherError))?;
            }
            PrivProtocol::TripleDes => {
                type TdesCbc = cbc::Encryptor<des::TdesEde3>;
                let cipher = TdesCbc::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher
                    .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::CipherError))?;
            }
            _ => return Err(Error::encrypt(None, CryptoErrorKind::UnsupportedProtocol)),
        }

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt)))
    }

    /// DES/3DES decryption.
    fn decrypt_cbc(&self, ciphertext: &[u8], priv_params: &[u8], key_len: usize) -> Result<Bytes> {
        use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};

        if ciphertext.len() % 8 != 0 {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block_size: 8,
                },
            ));
        }

        let mut salt = [0u8; 8];
        salt.copy_from_slice(priv_params);
        let iv = self.cbc_iv(key_len, &salt);
        let key = &self.key[..key_len];

        let mut buffer = ciphertext.to_vec();

        match self.protocol {
            PrivProtocol::Des => {
                type DesCbc = cbc::Decryptor<des::Des>;
                let cipher = DesCbc::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher
                    .decrypt_padded_mut::<NoPadding>(&mut buffer)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;
            }
            PrivProtocol::TripleDes => {
                type TdesCbc = cbc::Decryptor<des::TdesEde3>;
                let cipher = TdesCbc::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher
                    .decrypt_padded_mut::<NoPadding>(&mut buffer)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;
            }
            _ => return Err(Error::decrypt(None, CryptoErrorKind::UnsupportedProtocol)),
        }

        Ok(Bytes::from(buffer))
    }

    /// AES-CFB encryption (RFC 3826 Section 3.1).
    fn encrypt_cfb(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
        key_len: usize,
    ) -> Result<(Bytes, Bytes)> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let key = &self.key[..key_len];
        let salt_bytes = salt.to_be_bytes();

        // IV = engineBoots || engineTime || salt (concatenated)
        let mut iv = [0u8; 16];
        iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
        iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
        iv[8..].copy_from_slice(&salt_bytes);

        let mut buffer = plaintext.to_vec();

        match key_len {
            16 => {
                type Aes128Cfb = cfb_mode::Encryptor<aes::Aes128>;
                let cipher = Aes128Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            24 => {
                type Aes192Cfb = cfb_mode::Encryptor<aes::Aes192>;
                let cipher = Aes192Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            32 => {
                type Aes256Cfb = cfb_mode::Encryptor<aes::Aes256>;
                let cipher = Aes256Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            _ => return Err(Error::encrypt(None, CryptoErrorKind::UnsupportedProtocol)),
        }

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    /// AES-CFB decryption (RFC 3826 Section 3.1.4).
    fn decrypt_cfb(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let key_len = match self.protocol {
            PrivProtocol::Aes128 => 16,
            PrivProtocol::Aes192 => 24,
            PrivProtocol::Aes256 => 32,
            _ => unreachable!(),
        };
        let key = &self.key[..key_len];

        let mut iv = [0u8; 16];
        iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
        iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
        iv[8..].copy_from_slice(priv_params);

        let mut buffer = ciphertext.to_vec();

        match key_len {
            16 => {
                type Aes128Cfb = cfb_mode::Decryptor<aes::Aes128>;
                let cipher = Aes128Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            24 => {
                type Aes192Cfb = cfb_mode::Decryptor<aes::Aes192>;
                let cipher = Aes192Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            32 => {
                type Aes256Cfb = cfb_mode::Decryptor<aes::Aes256>;
                let cipher = Aes256Cfb::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            _ => unreachable!(),
        }

        Ok(Bytes::from(buffer))
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
