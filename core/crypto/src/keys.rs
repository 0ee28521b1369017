//! Key material and per-operation options.
//!
//! Sealing needs an Ed25519 signing key, unsealing the matching verifying
//! key. Both sides share a KDF secret and salt out of band.

use ed25519_dalek::{SigningKey, VerifyingKey, KEYPAIR_LENGTH, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

use sealbox_common::{Error, Result, SensitiveBytes};

/// Immutable `(key, secret, salt)` triple for one sealer or unsealer.
///
/// The same secret and salt must be used in both directions; a mismatch
/// surfaces only as a failed signature check.
#[derive(Clone)]
pub struct Options<K> {
    key: K,
    secret: SensitiveBytes,
    salt: Vec<u8>,
}

/// Options for sealing.
pub type SealOptions = Options<SigningKey>;

/// Options for unsealing.
pub type UnsealOptions = Options<VerifyingKey>;

impl<K> Options<K> {
    /// Create options from a key and the shared KDF inputs.
    pub fn new(key: K, secret: impl Into<SensitiveBytes>, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            secret: secret.into(),
            salt: salt.into(),
        }
    }

    /// The asymmetric key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The shared KDF secret.
    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    /// The shared KDF salt.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

impl SealOptions {
    /// Options that unseal what these options seal.
    pub fn to_unseal_options(&self) -> UnsealOptions {
        Options {
            key: self.key.verifying_key(),
            secret: self.secret.clone(),
            salt: self.salt.clone(),
        }
    }
}

impl<K> fmt::Debug for Options<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("key", &"[REDACTED]")
            .field("secret", &self.secret)
            .field("salt_len", &self.salt.len())
            .finish()
    }
}

/// Fill `buf` from the operating system CSPRNG.
///
/// # Errors
/// - `Error::Randomness` if the entropy source fails
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::Randomness(e.to_string()))
}

/// Generate a random Ed25519 signing key.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Parse a signing key.
///
/// Accepts either the 32-byte secret seed or the 64-byte `seed || public`
/// keypair encoding; the latter is checked for consistency.
///
/// # Errors
/// - `Error::InvalidInput` on any other length or an inconsistent keypair
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey> {
    match bytes.len() {
        SECRET_KEY_LENGTH => {
            let mut seed = [0u8; SECRET_KEY_LENGTH];
            seed.copy_from_slice(bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        KEYPAIR_LENGTH => {
            let mut pair = [0u8; KEYPAIR_LENGTH];
            pair.copy_from_slice(bytes);
            SigningKey::from_keypair_bytes(&pair)
                .map_err(|e| Error::InvalidInput(format!("Invalid keypair: {}", e)))
        }
        other => Err(Error::InvalidInput(format!(
            "Invalid signing key length: expected {} or {}, got {}",
            SECRET_KEY_LENGTH, KEYPAIR_LENGTH, other
        ))),
    }
}

/// Parse a 32-byte verifying key.
///
/// # Errors
/// - `Error::InvalidInput` on a wrong length or a point off the curve
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
    let raw: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
        Error::InvalidInput(format!(
            "Invalid verifying key length: expected {}, got {}",
            PUBLIC_KEY_LENGTH,
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(&raw).map_err(|e| Error::InvalidInput(format!("Invalid verifying key: {}", e)))
}
