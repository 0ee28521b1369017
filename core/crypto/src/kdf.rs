//! Key derivation using HKDF-SHA-512.
//!
//! Every container carries a random seed. The seed is the HKDF input keying
//! material; the shared secret is the extract salt and the shared salt is the
//! expand info. The 48-byte output is split into an AES-256 key and a CTR IV.

use aes::cipher::KeyIvInit;
use hkdf::Hkdf;
use sha2::Sha512;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::stream::Keystream;
use sealbox_common::{Error, Result};

/// Length of the AES-256 cipher key in bytes.
pub const CIPHER_KEY_LENGTH: usize = 32;

/// AES block size, which is also the CTR IV length.
pub const BLOCK_SIZE: usize = 16;

/// Total bytes drawn from the KDF per container.
pub const DERIVED_LENGTH: usize = CIPHER_KEY_LENGTH + BLOCK_SIZE;

/// Per-container cipher key and IV.
///
/// Never persisted; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; CIPHER_KEY_LENGTH],
    iv: [u8; BLOCK_SIZE],
}

impl DerivedKey {
    /// The AES-256 key.
    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_LENGTH] {
        &self.key
    }

    /// The initial CTR counter block.
    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }

    /// Build the AES-256-CTR keystream for this key material.
    ///
    /// # Errors
    /// - `Error::CipherInit` if the cipher rejects the key or IV
    pub fn keystream(&self) -> Result<Keystream> {
        Keystream::new_from_slices(&self.key, &self.iv)
            .map_err(|e| Error::CipherInit(e.to_string()))
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Derive the cipher key and IV for one container.
///
/// # Preconditions
/// - `seed` is the container's random seed (non-empty)
/// - `secret` and `salt` are the values shared between sealer and unsealer
///
/// # Postconditions
/// - Deterministic given the same three inputs
///
/// # Errors
/// - `Error::KeyDerivation` if HKDF cannot produce the requested length
pub fn derive_key(seed: &[u8], secret: &[u8], salt: &[u8]) -> Result<DerivedKey> {
    let hk = Hkdf::<Sha512>::new(Some(secret), seed);

    let mut okm = [0u8; DERIVED_LENGTH];
    hk.expand(salt, &mut okm)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    let mut derived = DerivedKey {
        key: [0u8; CIPHER_KEY_LENGTH],
        iv: [0u8; BLOCK_SIZE],
    };
    derived.key.copy_from_slice(&okm[..CIPHER_KEY_LENGTH]);
    derived.iv.copy_from_slice(&okm[CIPHER_KEY_LENGTH..]);
    okm.zeroize();

    Ok(derived)
}
