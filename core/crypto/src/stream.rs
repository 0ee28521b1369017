//! Pass-through stream adapters for single-pass sealing.
//!
//! The adapters are composed, never combined: sealing wraps the plaintext
//! input in a [`HashingReader`] and the output in an [`EncryptingWriter`];
//! unsealing wraps the input in a [`DecryptingReader`] and that in a
//! [`HashingReader`]. Both directions therefore hash plaintext.

use std::io::{self, Read, Write};

use aes::cipher::{StreamCipher, StreamCipherSeek};
use sha2::{Digest, Sha512};

/// AES-256 in CTR mode with a 128-bit big-endian counter.
pub type Keystream = ctr::Ctr128BE<aes::Aes256>;

/// Length of the SHA-512 payload digest.
pub const DIGEST_LENGTH: usize = 64;

/// Reader that feeds every byte it returns into a running SHA-512.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha512,
    hashed: u64,
}

impl<R: Read> HashingReader<R> {
    /// Wrap `inner`, starting from an empty digest.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha512::new(),
            hashed: 0,
        }
    }

    /// Digest of everything read so far.
    pub fn digest(&self) -> [u8; DIGEST_LENGTH] {
        let mut out = [0u8; DIGEST_LENGTH];
        out.copy_from_slice(&self.hasher.clone().finalize());
        out
    }

    /// Number of bytes hashed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.hashed
    }

    /// Recover the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.hashed += n as u64;
        }
        Ok(n)
    }
}

/// Writer that XORs outgoing bytes with the keystream.
///
/// `Write::write` only borrows the caller's buffer, so the XOR happens in
/// a scratch buffer. When the sink takes fewer bytes than offered, the
/// keystream is rewound to the accepted length.
pub struct EncryptingWriter<W> {
    inner: W,
    keystream: Keystream,
    scratch: Vec<u8>,
}

impl<W: Write> EncryptingWriter<W> {
    /// Wrap `inner` with the given keystream.
    pub fn new(inner: W, keystream: Keystream) -> Self {
        Self {
            inner,
            keystream,
            scratch: Vec::new(),
        }
    }

    /// Get a mutable reference to the wrapped writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Recover the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let start: u64 = self.keystream.current_pos();
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keystream.apply_keystream(&mut self.scratch);

        match self.inner.write(&self.scratch) {
            Ok(n) => {
                if n < buf.len() {
                    self.keystream.seek(start + n as u64);
                }
                Ok(n)
            }
            Err(e) => {
                self.keystream.seek(start);
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that XORs incoming bytes with the keystream in place.
pub struct DecryptingReader<R> {
    inner: R,
    keystream: Keystream,
}

impl<R: Read> DecryptingReader<R> {
    /// Wrap `inner` with the given keystream.
    pub fn new(inner: R, keystream: Keystream) -> Self {
        Self { inner, keystream }
    }

    /// Recover the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.keystream.apply_keystream(&mut buf[..n]);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::KeyIvInit;
    use std::io::Cursor;

    fn keystream() -> Keystream {
        Keystream::new(&[7u8; 32].into(), &[3u8; 16].into())
    }

    /// Sink that accepts at most `limit` bytes per call.
    struct Stingy {
        limit: usize,
        out: Vec<u8>,
    }

    impl Write for Stingy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_hashing_reader_matches_sha512() {
        let data = b"The quick brown fox jumps over the lazy dog".to_vec();
        let mut reader = HashingReader::new(Cursor::new(data.clone()));

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, data);
        assert_eq!(reader.bytes_hashed(), data.len() as u64);
        assert_eq!(reader.digest().as_slice(), Sha512::digest(&data).as_slice());
    }

    #[test]
    fn test_hashing_reader_empty() {
        let reader = HashingReader::new(io::empty());
        assert_eq!(reader.digest().as_slice(), Sha512::digest(b"").as_slice());
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut writer = EncryptingWriter::new(Vec::new(), keystream());
        writer.write_all(&plaintext).unwrap();
        let ciphertext = writer.into_inner();

        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(ciphertext, plaintext);

        let mut reader = DecryptingReader::new(Cursor::new(ciphertext), keystream());
        let mut decrypted = Vec::new();
        reader.read_to_end(&mut decrypted).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_writer_does_not_touch_caller_buffer() {
        let plaintext = vec![0x42u8; 64];
        let mut writer = EncryptingWriter::new(Vec::new(), keystream());
        writer.write_all(&plaintext).unwrap();
        assert!(plaintext.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn test_short_write_keeps_keystream_in_sync() {
        let plaintext: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();

        let mut reference = EncryptingWriter::new(Vec::new(), keystream());
        reference.write_all(&plaintext).unwrap();

        // write_all retries the unaccepted tail; the output must be identical.
        let mut stingy = EncryptingWriter::new(Stingy { limit: 7, out: Vec::new() }, keystream());
        stingy.write_all(&plaintext).unwrap();

        assert_eq!(stingy.into_inner().out, reference.into_inner());
    }

    #[test]
    fn test_chunking_does_not_matter() {
        let plaintext = vec![0xA5u8; 4096];

        let mut whole = Vec::new();
        DecryptingReader::new(Cursor::new(plaintext.clone()), keystream())
            .read_to_end(&mut whole)
            .unwrap();

        let mut pieces = Vec::new();
        let mut reader = DecryptingReader::new(Cursor::new(plaintext), keystream());
        let mut buf = [0u8; 13];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            pieces.extend_from_slice(&buf[..n]);
        }

        assert_eq!(whole, pieces);
    }
}
