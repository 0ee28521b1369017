//! Key file configuration.
//!
//! A key file is a JSON document with base64 fields:
//!
//! ```json
//! {
//!   "signing_key": "...",
//!   "verifying_key": "...",
//!   "secret": "...",
//!   "salt": "..."
//! }
//! ```
//!
//! `signing_key` is only needed for sealing and may be omitted from key
//! files handed to recipients.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use sealbox_common::{Error, Result};
use sealbox_crypto::{
    fill_random, generate_signing_key, signing_key_from_bytes, verifying_key_from_bytes,
    SealOptions, UnsealOptions,
};

/// Length of the secret and salt created by [`KeyFile::generate`].
pub const GENERATED_SHARED_LENGTH: usize = 32;

/// On-disk key material for sealing and unsealing.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyFile {
    /// Ed25519 signing key (32-byte seed or 64-byte keypair).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    /// Ed25519 verifying key.
    pub verifying_key: String,
    /// KDF secret shared by sealer and unsealer.
    pub secret: String,
    /// KDF salt shared by sealer and unsealer.
    pub salt: String,
}

impl KeyFile {
    /// Create a key file with a fresh keypair, secret and salt.
    ///
    /// # Errors
    /// - `Error::Randomness` if the entropy source fails
    pub fn generate() -> Result<Self> {
        let signing = generate_signing_key();
        let mut secret = Zeroizing::new([0u8; GENERATED_SHARED_LENGTH]);
        let mut salt = [0u8; GENERATED_SHARED_LENGTH];
        fill_random(&mut secret[..])?;
        fill_random(&mut salt)?;

        Ok(Self {
            signing_key: Some(STANDARD.encode(Zeroizing::new(signing.to_bytes()))),
            verifying_key: STANDARD.encode(signing.verifying_key().as_bytes()),
            secret: STANDARD.encode(&secret[..]),
            salt: STANDARD.encode(salt),
        })
    }

    /// Copy of this key file without the signing key.
    pub fn public(&self) -> Self {
        Self {
            signing_key: None,
            verifying_key: self.verifying_key.clone(),
            secret: self.secret.clone(),
            salt: self.salt.clone(),
        }
    }

    /// Parse a key file from JSON.
    ///
    /// # Errors
    /// - `Error::InvalidInput` on malformed JSON or missing fields
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidInput(format!("Invalid key file: {}", e)))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<Zeroizing<String>> {
        serde_json::to_string_pretty(self)
            .map(Zeroizing::new)
            .map_err(|e| Error::InvalidInput(format!("Cannot serialize key file: {}", e)))
    }

    /// Load a key file from disk.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if the file cannot be read or does not parse
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map(Zeroizing::new).map_err(|e| {
            Error::InvalidInput(format!("Cannot read key file {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Write the key file to a path that must not exist yet.
    ///
    /// # Errors
    /// - `Error::Io` if the file exists or cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }

    /// Options for sealing.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if the signing key is absent, malformed or
    ///   does not match the verifying key
    pub fn seal_options(&self) -> Result<SealOptions> {
        let encoded = self
            .signing_key
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("Key file has no signing_key".to_string()))?;

        let signing = signing_key_from_bytes(&decode("signing_key", encoded)?)?;
        let verifying = verifying_key_from_bytes(&decode("verifying_key", &self.verifying_key)?)?;
        if signing.verifying_key() != verifying {
            return Err(Error::InvalidInput(
                "signing_key does not match verifying_key".to_string(),
            ));
        }

        Ok(SealOptions::new(
            signing,
            decode("secret", &self.secret)?,
            decode("salt", &self.salt)?.to_vec(),
        ))
    }

    /// Options for unsealing.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if a field is malformed
    pub fn unseal_options(&self) -> Result<UnsealOptions> {
        let verifying = verifying_key_from_bytes(&decode("verifying_key", &self.verifying_key)?)?;

        Ok(UnsealOptions::new(
            verifying,
            decode("secret", &self.secret)?,
            decode("salt", &self.salt)?.to_vec(),
        ))
    }
}

impl fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFile")
            .field("signing_key", &self.signing_key.as_ref().map(|_| "[REDACTED]"))
            .field("verifying_key", &self.verifying_key)
            .field("secret", &"[REDACTED]")
            .field("salt", &self.salt)
            .finish()
    }
}

fn decode(field: &str, value: &str) -> Result<Zeroizing<Vec<u8>>> {
    STANDARD
        .decode(value.trim())
        .map(Zeroizing::new)
        .map_err(|e| Error::InvalidInput(format!("Invalid base64 in {}: {}", field, e)))
}
