//! Unsealing pipeline.

use std::fmt;
use std::io::{Read, Write};

use tracing::{debug, info, warn};

use crate::header::{check_buffers, Header};
use sealbox_common::{copy_with_cancel, CancelSignal, Error, Result};
use sealbox_crypto::{derive_key, verify_digest, DecryptingReader, HashingReader, UnsealOptions};

/// Failure of [`Unsealer::unseal`].
///
/// Carries whatever header state was reached, so callers can still inspect
/// the seed and signature of a container that failed to verify.
pub struct UnsealError<H> {
    pub header: H,
    pub error: Error,
}

impl<H> UnsealError<H> {
    /// Drop the header and keep the error.
    pub fn into_error(self) -> Error {
        self.error
    }
}

impl<H: fmt::Debug> fmt::Debug for UnsealError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsealError")
            .field("header", &self.header)
            .field("error", &self.error)
            .finish()
    }
}

impl<H> fmt::Display for UnsealError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<H: fmt::Debug> std::error::Error for UnsealError<H> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

impl<H> From<UnsealError<H>> for Error {
    fn from(err: UnsealError<H>) -> Self {
        err.error
    }
}

/// Unseals containers produced by a [`crate::Sealer`] with matching options.
pub struct Unsealer<H> {
    options: UnsealOptions,
    allocator: Box<dyn Fn() -> H + Send + Sync>,
}

impl<H: Header> Unsealer<H> {
    /// Create an unsealer.
    ///
    /// `allocator` produces an empty header shaped like the sealer's.
    pub fn new(options: UnsealOptions, allocator: impl Fn() -> H + Send + Sync + 'static) -> Self {
        Self {
            options,
            allocator: Box::new(allocator),
        }
    }

    /// The options this unsealer verifies with.
    pub fn options(&self) -> &UnsealOptions {
        &self.options
    }

    /// Unseal `input` into `output` and verify it.
    ///
    /// Plaintext is streamed to `output` before the signature can be checked.
    /// A verification failure therefore leaves unauthenticated bytes behind;
    /// callers that need all-or-nothing semantics must write to a staging
    /// sink and commit only on success.
    ///
    /// # Errors
    /// - `Error::InvalidSignatureSize` / `Error::InvalidSeedSize`
    /// - `Error::HeaderUnmarshal` if the header cannot be read
    /// - `Error::KeyDerivation`, `Error::CipherInit`
    /// - `Error::Io` / `Error::Cancelled` from the payload copy
    /// - `Error::SignatureVerification` if the payload does not match
    pub fn unseal<C, R, W>(&self, cancel: &C, input: R, output: W) -> std::result::Result<H, UnsealError<H>>
    where
        C: CancelSignal + ?Sized,
        R: Read,
        W: Write,
    {
        let mut header = (self.allocator)();
        match self.unseal_into(&mut header, cancel, input, output) {
            Ok(()) => Ok(header),
            Err(error) => Err(UnsealError { header, error }),
        }
    }

    fn unseal_into<C, R, W>(&self, header: &mut H, cancel: &C, mut input: R, mut output: W) -> Result<()>
    where
        C: CancelSignal + ?Sized,
        R: Read,
        W: Write,
    {
        check_buffers(&*header)?;
        header
            .unmarshal_from(&mut input)
            .map_err(Error::HeaderUnmarshal)?;
        debug!(seed_len = header.seed().len(), "Header read");

        let derived = derive_key(header.seed(), self.options.secret(), self.options.salt())?;
        let mut reader = HashingReader::new(DecryptingReader::new(input, derived.keystream()?));
        drop(derived);

        let written = copy_with_cancel(cancel, &mut reader, &mut output).inspect_err(|e| {
            if e.is_cancelled() {
                warn!(written = e.bytes_written(), "Unsealing cancelled");
            }
        })?;
        output
            .flush()
            .map_err(|source| Error::Io { written, source })?;

        if let Err(e) = verify_digest(self.options.key(), &reader.digest(), header.signature()) {
            warn!(bytes = written, "Signature verification failed");
            return Err(e);
        }

        info!(bytes = written, "Container unsealed");
        Ok(())
    }
}
