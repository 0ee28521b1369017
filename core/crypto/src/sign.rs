//! Hash-then-sign with Ed25519.
//!
//! The message signed is the 64-byte SHA-512 digest of the plaintext.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use sealbox_common::{Error, Result};

/// Length of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Sign a payload digest.
pub fn sign_digest(key: &SigningKey, digest: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    key.sign(digest).to_bytes()
}

/// Verify a payload digest against signature bytes taken from a header.
///
/// # Errors
/// - `Error::SignatureVerification` if the bytes are not a signature or do not verify
pub fn verify_digest(key: &VerifyingKey, digest: &[u8], signature: &[u8]) -> Result<()> {
    let signature = Signature::try_from(signature).map_err(|_| Error::SignatureVerification)?;
    key.verify(digest, &signature)
        .map_err(|_| Error::SignatureVerification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_signing_key;

    #[test]
    fn test_sign_verify() {
        let key = generate_signing_key();
        let digest = [0x11u8; 64];

        let sig = sign_digest(&key, &digest);
        assert!(verify_digest(&key.verifying_key(), &digest, &sig).is_ok());
    }

    #[test]
    fn test_wrong_digest_fails() {
        let key = generate_signing_key();
        let sig = sign_digest(&key, &[0x11u8; 64]);

        let result = verify_digest(&key.verifying_key(), &[0x12u8; 64], &sig);
        assert!(matches!(result, Err(Error::SignatureVerification)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let digest = [0x11u8; 64];
        let sig = sign_digest(&generate_signing_key(), &digest);

        let other = generate_signing_key().verifying_key();
        assert!(verify_digest(&other, &digest, &sig).is_err());
    }

    #[test]
    fn test_zero_signature_fails() {
        let key = generate_signing_key();
        let result = verify_digest(&key.verifying_key(), &[0u8; 64], &[0u8; SIGNATURE_LENGTH]);
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_signature_fails() {
        let key = generate_signing_key();
        let sig = sign_digest(&key, &[1u8; 64]);
        assert!(verify_digest(&key.verifying_key(), &[1u8; 64], &sig[..63]).is_err());
    }
}
