//! Sealed containers for SealBox.
//!
//! A container is a header followed by the AES-256-CTR encrypted payload.
//! The header carries the random seed the payload key is derived from and
//! an Ed25519 signature over the SHA-512 digest of the plaintext.
//!
//! Sealing and unsealing each stream the payload exactly once.

pub mod header;
pub mod seal;
pub mod unseal;

pub use header::{Header, StandardHeader, DEFAULT_SEED_LEN, MAGIC};
pub use seal::Sealer;
pub use unseal::{UnsealError, Unsealer};
