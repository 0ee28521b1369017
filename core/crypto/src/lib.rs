//! Cryptographic primitives for SealBox.
//!
//! This module provides:
//! - Per-container key derivation using HKDF-SHA-512
//! - AES-256-CTR and SHA-512 stream adapters for single-pass sealing
//! - Ed25519 hash-then-sign over the plaintext digest
//! - Option and key types with redacted `Debug` and zeroization
//!
//! # Security Guarantees
//! - Derived key material is zeroized on drop
//! - No key material is ever logged

pub mod kdf;
pub mod keys;
pub mod sign;
pub mod stream;

pub use kdf::{derive_key, DerivedKey, BLOCK_SIZE, CIPHER_KEY_LENGTH};
pub use keys::{
    fill_random, generate_signing_key, signing_key_from_bytes, verifying_key_from_bytes, Options,
    SealOptions, UnsealOptions,
};
pub use sign::{sign_digest, verify_digest, SIGNATURE_LENGTH};
pub use stream::{DecryptingReader, EncryptingWriter, HashingReader, Keystream, DIGEST_LENGTH};

pub use ed25519_dalek::{SigningKey, VerifyingKey};
