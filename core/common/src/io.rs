//! Cancellable buffered copy between a reader and a writer.

use std::io::{self, Read, Write};

use tracing::trace;

use crate::cancel::CancelSignal;
use crate::{Error, Result};

/// Chunk size used by [`copy_with_cancel`] (32 KiB).
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Copy `reader` into `writer` until end of stream.
///
/// The cancellation signal is polled before every read. Each chunk that was
/// read is handed to the writer in a single `write` call; accepting fewer
/// bytes is a short write and fails the copy.
///
/// # Returns
/// - Number of bytes written on success.
///
/// # Errors
/// - `Error::Cancelled` when the signal fired, with the bytes written so far
/// - `Error::Io` on read/write failure or short write, with the bytes written so far
pub fn copy_with_cancel<C, R, W>(cancel: &C, reader: &mut R, writer: &mut W) -> Result<u64>
where
    C: CancelSignal + ?Sized,
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        if cancel.is_cancelled() {
            trace!(written, "Copy cancelled");
            return Err(Error::Cancelled { written });
        }

        let read = match reader.read(&mut buf) {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(Error::Io { written, source }),
        };

        let accepted = writer
            .write(&buf[..read])
            .map_err(|source| Error::Io { written, source })?;
        written += accepted as u64;

        if accepted != read {
            return Err(Error::Io {
                written,
                source: io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes accepted", accepted, read),
                ),
            });
        }
    }
}
