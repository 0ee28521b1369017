//! Common error types for SealBox.

use std::io;

use thiserror::Error;

/// Top-level error type for seal and unseal operations.
///
/// Every variant aborts the running operation; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The header's signature buffer does not match the signature scheme.
    #[error("Invalid signature size: expected {expected}, got {actual}")]
    InvalidSignatureSize { expected: usize, actual: usize },

    /// The header's seed buffer is empty.
    #[error("Invalid seed size: seed buffer must hold at least one byte")]
    InvalidSeedSize,

    /// The entropy source failed to produce seed bytes.
    #[error("Randomness failure: {0}")]
    Randomness(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// The stream cipher rejected the derived key material.
    #[error("Cipher initialization failed: {0}")]
    CipherInit(String),

    /// Writing the header to the output failed.
    #[error("Failed to marshal header: {0}")]
    HeaderMarshal(#[source] io::Error),

    /// Reading the header from the input failed.
    #[error("Failed to unmarshal header: {0}")]
    HeaderUnmarshal(#[source] io::Error),

    /// Payload I/O failed, including short writes.
    #[error("I/O error after {written} bytes: {source}")]
    Io {
        written: u64,
        #[source]
        source: io::Error,
    },

    /// The cancellation signal fired between two chunks.
    #[error("Operation cancelled after {written} bytes")]
    Cancelled { written: u64 },

    /// The payload digest does not match the header signature.
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Invalid input provided (keys, configuration).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Number of payload bytes written before the failure, if tracked.
    pub fn bytes_written(&self) -> Option<u64> {
        match self {
            Self::Io { written, .. } | Self::Cancelled { written } => Some(*written),
            _ => None,
        }
    }

    /// Whether this error stems from cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Self::Io { written: 0, source }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
