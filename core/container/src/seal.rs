//! Sealing pipeline.
//!
//! A container is written in one pass: a placeholder header with a zeroed
//! signature, then the ciphertext. Once the payload digest is known the
//! header is signed and rewritten over the placeholder.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use tracing::{debug, info, warn};

use crate::header::{check_buffers, Header};
use sealbox_common::{copy_with_cancel, CancelSignal, Error, Result};
use sealbox_crypto::{derive_key, fill_random, sign_digest, EncryptingWriter, HashingReader, SealOptions};

/// Seals payloads into containers.
///
/// Holds no per-call state, so one sealer can serve concurrent calls.
pub struct Sealer<H> {
    options: SealOptions,
    allocator: Box<dyn Fn() -> H + Send + Sync>,
}

impl<H: Header> Sealer<H> {
    /// Create a sealer.
    ///
    /// `allocator` produces a fresh, empty header for every call.
    pub fn new(options: SealOptions, allocator: impl Fn() -> H + Send + Sync + 'static) -> Self {
        Self {
            options,
            allocator: Box::new(allocator),
        }
    }

    /// The options this sealer signs with.
    pub fn options(&self) -> &SealOptions {
        &self.options
    }

    /// Seal `input` into `output`.
    ///
    /// The container starts at the output's current position. On success the
    /// output is left positioned after the last payload byte.
    ///
    /// # Preconditions
    /// - The allocated header has a 64-byte signature and non-empty seed buffer
    ///
    /// # Postconditions
    /// - `output` holds `marshal(header) || ciphertext`
    /// - The returned header carries the seed and the signature
    ///
    /// # Errors
    /// - `Error::InvalidSignatureSize` / `Error::InvalidSeedSize` before any I/O
    /// - `Error::Randomness`, `Error::KeyDerivation`, `Error::CipherInit`
    /// - `Error::HeaderMarshal` if writing, seeking or resizing the header fails
    /// - `Error::Io` / `Error::Cancelled` from the payload copy
    pub fn seal<C, R, W>(&self, cancel: &C, input: R, mut output: W) -> Result<H>
    where
        C: CancelSignal + ?Sized,
        R: Read,
        W: Write + Seek,
    {
        let mut header = (self.allocator)();
        check_buffers(&header)?;

        fill_random(header.seed_mut())?;
        debug!(seed_len = header.seed().len(), "Seed generated");

        let derived = derive_key(header.seed(), self.options.secret(), self.options.salt())?;
        let keystream = derived.keystream()?;
        drop(derived);

        let start = output.stream_position().map_err(Error::HeaderMarshal)?;
        header.signature_mut().fill(0);
        header.marshal_to(&mut output).map_err(Error::HeaderMarshal)?;
        let header_len = header_extent(&mut output, start)?;
        debug!(start, header_len, "Placeholder header written");

        let mut reader = HashingReader::new(input);
        let written = {
            let mut writer = EncryptingWriter::new(&mut output, keystream);
            let written = copy_with_cancel(cancel, &mut reader, &mut writer).inspect_err(|e| {
                if e.is_cancelled() {
                    warn!(written = e.bytes_written(), "Sealing cancelled");
                }
            })?;
            writer
                .flush()
                .map_err(|source| Error::Io { written, source })?;
            written
        };

        let signature = sign_digest(self.options.key(), &reader.digest());
        header.signature_mut().copy_from_slice(&signature);

        let end = output
            .stream_position()
            .map_err(|source| Error::Io { written, source })?;
        output
            .seek(SeekFrom::Start(start))
            .map_err(Error::HeaderMarshal)?;
        header.marshal_to(&mut output).map_err(Error::HeaderMarshal)?;

        let final_len = header_extent(&mut output, start)?;
        if final_len != header_len {
            return Err(Error::HeaderMarshal(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "header size changed after signing: {} then {} bytes",
                    header_len, final_len
                ),
            )));
        }

        output
            .seek(SeekFrom::Start(end))
            .map_err(Error::HeaderMarshal)?;
        output.flush().map_err(Error::HeaderMarshal)?;
        debug!(header_len, "Header finalized");

        info!(bytes = written, total = end.saturating_sub(start), "Container sealed");
        Ok(header)
    }

    /// Seal into a sink that cannot seek.
    ///
    /// The container is assembled in memory and written out once complete,
    /// so nothing reaches `output` unless sealing succeeds.
    ///
    /// # Errors
    /// - Everything [`Sealer::seal`] returns
    /// - `Error::Io` if writing the finished container fails, with the
    ///   number of container bytes the sink accepted
    pub fn seal_buffered<C, R, W>(&self, cancel: &C, input: R, mut output: W) -> Result<H>
    where
        C: CancelSignal + ?Sized,
        R: Read,
        W: Write,
    {
        let mut buffer = Cursor::new(Vec::new());
        let header = self.seal(cancel, input, &mut buffer)?;

        let container = buffer.into_inner();
        let mut written = 0usize;
        while written < container.len() {
            match output.write(&container[written..]) {
                Ok(0) => {
                    return Err(Error::Io {
                        written: written as u64,
                        source: io::Error::new(
                            io::ErrorKind::WriteZero,
                            "sink stopped accepting the container",
                        ),
                    })
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Error::Io {
                        written: written as u64,
                        source,
                    })
                }
            }
        }
        output.flush().map_err(|source| Error::Io {
            written: written as u64,
            source,
        })?;

        debug!(bytes = container.len(), "Buffered container written");
        Ok(header)
    }
}

/// Bytes between `start` and the current position of `output`.
fn header_extent<S: Seek>(output: &mut S, start: u64) -> Result<u64> {
    let position = output.stream_position().map_err(Error::HeaderMarshal)?;
    position.checked_sub(start).ok_or_else(|| {
        Error::HeaderMarshal(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("output moved backwards: {} before start {}", position, start),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{StandardHeader, DEFAULT_SEED_LEN};
    use sealbox_common::{CancellationToken, Deadline, Never};
    use sealbox_crypto::generate_signing_key;
    use std::time::{Duration, Instant};

    fn sealer() -> Sealer<StandardHeader> {
        let options = SealOptions::new(generate_signing_key(), vec![1u8; 32], vec![2u8; 32]);
        Sealer::new(options, StandardHeader::default)
    }

    /// Header with caller-chosen buffer sizes.
    struct RawHeader {
        signature: Vec<u8>,
        seed: Vec<u8>,
    }

    impl Header for RawHeader {
        fn marshal_to(&self, writer: &mut dyn Write) -> io::Result<()> {
            writer.write_all(&self.seed)?;
            writer.write_all(&self.signature)
        }

        fn unmarshal_from(&mut self, reader: &mut dyn Read) -> io::Result<()> {
            reader.read_exact(&mut self.seed)?;
            reader.read_exact(&mut self.signature)
        }

        fn signature(&self) -> &[u8] {
            &self.signature
        }

        fn signature_mut(&mut self) -> &mut [u8] {
            &mut self.signature
        }

        fn seed(&self) -> &[u8] {
            &self.seed
        }

        fn seed_mut(&mut self) -> &mut [u8] {
            &mut self.seed
        }
    }

    /// Header that drops trailing zero bytes of its signature when marshalling.
    struct ShrinkingHeader(RawHeader);

    impl Header for ShrinkingHeader {
        fn marshal_to(&self, writer: &mut dyn Write) -> io::Result<()> {
            let sig = &self.0.signature;
            let used = sig.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            writer.write_all(&self.0.seed)?;
            writer.write_all(&sig[..used])
        }

        fn unmarshal_from(&mut self, reader: &mut dyn Read) -> io::Result<()> {
            self.0.unmarshal_from(reader)
        }

        fn signature(&self) -> &[u8] {
            self.0.signature()
        }

        fn signature_mut(&mut self) -> &mut [u8] {
            self.0.signature_mut()
        }

        fn seed(&self) -> &[u8] {
            self.0.seed()
        }

        fn seed_mut(&mut self) -> &mut [u8] {
            self.0.seed_mut()
        }
    }

    fn raw_sealer(signature: usize, seed: usize) -> Sealer<RawHeader> {
        let options = SealOptions::new(generate_signing_key(), vec![1u8; 32], vec![2u8; 32]);
        Sealer::new(options, move || RawHeader {
            signature: vec![0u8; signature],
            seed: vec![0u8; seed],
        })
    }

    #[test]
    fn test_seal_layout() {
        let payload = b"hello, sealed world".to_vec();
        let mut output = Cursor::new(Vec::new());

        let header = sealer().seal(&Never, payload.as_slice(), &mut output).unwrap();
        let bytes = output.into_inner();

        let header_len = header.encoded_len();
        assert_eq!(header_len, 70 + usize::from(DEFAULT_SEED_LEN));
        assert_eq!(bytes.len(), header_len + payload.len());
        assert_ne!(&bytes[header_len..], payload.as_slice());
        assert!(header.seed().iter().any(|&b| b != 0));
        assert!(header.signature().iter().any(|&b| b != 0));

        // The stored header is the signed one, not the placeholder.
        let stored = StandardHeader::read_any(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(stored, header);
    }

    #[test]
    fn test_seal_leaves_output_at_end() {
        let mut output = Cursor::new(Vec::new());
        sealer().seal(&Never, &[5u8; 1000][..], &mut output).unwrap();

        let len = output.get_ref().len() as u64;
        assert_eq!(output.position(), len);
    }

    #[test]
    fn test_seal_at_offset() {
        let mut output = Cursor::new(b"prefix".to_vec());
        output.seek(SeekFrom::End(0)).unwrap();

        let header = sealer().seal(&Never, &b"data"[..], &mut output).unwrap();
        let bytes = output.into_inner();

        assert_eq!(&bytes[..6], b"prefix");
        let stored = StandardHeader::read_any(&mut Cursor::new(&bytes[6..])).unwrap();
        assert_eq!(stored, header);
    }

    #[test]
    fn test_seeds_are_fresh() {
        let sealer = sealer();
        let mut a = Cursor::new(Vec::new());
        let mut b = Cursor::new(Vec::new());

        let ha = sealer.seal(&Never, &b"same"[..], &mut a).unwrap();
        let hb = sealer.seal(&Never, &b"same"[..], &mut b).unwrap();

        assert_ne!(ha.seed(), hb.seed());
        assert_ne!(a.into_inner(), b.into_inner());
    }

    #[test]
    fn test_invalid_signature_size() {
        let mut output = Cursor::new(Vec::new());
        let result = raw_sealer(32, 16).seal(&Never, &b"data"[..], &mut output);

        assert!(matches!(
            result,
            Err(Error::InvalidSignatureSize {
                expected: 64,
                actual: 32
            })
        ));
        assert!(output.get_ref().is_empty());
    }

    #[test]
    fn test_invalid_seed_size() {
        let mut output = Cursor::new(Vec::new());
        let result = raw_sealer(64, 0).seal(&Never, &b"data"[..], &mut output);

        assert!(matches!(result, Err(Error::InvalidSeedSize)));
        assert!(output.get_ref().is_empty());
    }

    #[test]
    fn test_one_byte_seed() {
        let mut output = Cursor::new(Vec::new());
        let header = raw_sealer(64, 1).seal(&Never, &b"data"[..], &mut output).unwrap();

        assert_eq!(header.seed().len(), 1);
        assert_eq!(output.into_inner().len(), 1 + 64 + 4);
    }

    #[test]
    fn test_header_size_change_detected() {
        let options = SealOptions::new(generate_signing_key(), vec![1u8; 32], vec![2u8; 32]);
        let sealer = Sealer::new(options, || {
            ShrinkingHeader(RawHeader {
                signature: vec![0u8; 64],
                seed: vec![0u8; 16],
            })
        });

        let result = sealer.seal(&Never, &b"data"[..], Cursor::new(Vec::new()));
        assert!(matches!(result, Err(Error::HeaderMarshal(_))));
    }

    #[test]
    fn test_cancelled_before_payload() {
        let token = CancellationToken::new();
        token.cancel();

        let result = sealer().seal(&token, &[0u8; 100][..], Cursor::new(Vec::new()));
        assert!(matches!(result, Err(Error::Cancelled { written: 0 })));
    }

    #[test]
    fn test_expired_deadline() {
        let deadline = Deadline::at(Instant::now() - Duration::from_secs(1));

        let result = sealer().seal(&deadline, &[0u8; 100][..], Cursor::new(Vec::new()));
        assert!(result.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_buffered_matches_layout() {
        let payload = vec![0x33u8; 50_000];
        let mut sink = Vec::new();

        let header = sealer().seal_buffered(&Never, payload.as_slice(), &mut sink).unwrap();

        assert_eq!(sink.len(), header.encoded_len() + payload.len());
        let stored = StandardHeader::read_any(&mut Cursor::new(&sink)).unwrap();
        assert_eq!(stored, header);
    }

    /// Sink that accepts `capacity` bytes, then fails.
    struct Leaky {
        capacity: usize,
        out: Vec<u8>,
    }

    impl Write for Leaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity - self.out.len();
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "full"));
            }
            let n = buf.len().min(room).min(1000);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Seekable output whose position runs backwards after the first write.
    struct Rewinding {
        inner: Cursor<Vec<u8>>,
        wrote: bool,
    }

    impl Write for Rewinding {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.wrote = true;
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for Rewinding {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if self.wrote && pos == SeekFrom::Current(0) {
                return Ok(0);
            }
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_backwards_position_is_header_error() {
        let mut output = Rewinding {
            inner: Cursor::new(b"prefix".to_vec()),
            wrote: false,
        };
        output.seek(SeekFrom::End(0)).unwrap();

        let result = sealer().seal(&Never, &b"data"[..], &mut output);
        assert!(matches!(result, Err(Error::HeaderMarshal(ref e)) if e.kind() == io::ErrorKind::InvalidData));
    }

    #[test]
    fn test_buffered_partial_write_counts_bytes() {
        let mut sink = Leaky {
            capacity: 2500,
            out: Vec::new(),
        };

        let err = sealer()
            .seal_buffered(&Never, &[0x44u8; 10_000][..], &mut sink)
            .unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.bytes_written(), Some(2500));
        assert_eq!(sink.out.len(), 2500);
    }

    #[test]
    fn test_buffered_writes_nothing_on_failure() {
        let mut sink = Vec::new();
        let result = raw_sealer(64, 0).seal_buffered(&Never, &b"data"[..], &mut sink);

        assert!(result.is_err());
        assert!(sink.is_empty());
    }
}
