//! Container header capability and the reference header format.

use std::io::{self, Read, Write};

use sealbox_common::{Error, Result};
use sealbox_crypto::SIGNATURE_LENGTH;

/// Header of a sealed container.
///
/// A header owns two buffers the pipelines fill in: the seed, from which the
/// per-container key is derived, and the signature over the payload digest.
/// Everything else it serializes is opaque to the pipelines.
///
/// # Invariants
/// - `marshal_to` emits the same number of bytes whatever the buffer contents,
///   because sealing overwrites the placeholder header in place
/// - `signature()` is exactly 64 bytes and `seed()` at least one byte
pub trait Header {
    /// Serialize the header.
    fn marshal_to(&self, writer: &mut dyn Write) -> io::Result<()>;

    /// Populate the header from its serialized form.
    fn unmarshal_from(&mut self, reader: &mut dyn Read) -> io::Result<()>;

    /// The signature buffer.
    fn signature(&self) -> &[u8];

    /// The signature buffer, writable.
    fn signature_mut(&mut self) -> &mut [u8];

    /// The seed buffer.
    fn seed(&self) -> &[u8];

    /// The seed buffer, writable.
    fn seed_mut(&mut self) -> &mut [u8];
}

/// Reject headers whose buffers cannot hold a signature or a seed.
pub(crate) fn check_buffers<H: Header + ?Sized>(header: &H) -> Result<()> {
    let actual = header.signature().len();
    if actual != SIGNATURE_LENGTH {
        return Err(Error::InvalidSignatureSize {
            expected: SIGNATURE_LENGTH,
            actual,
        });
    }
    if header.seed().is_empty() {
        return Err(Error::InvalidSeedSize);
    }
    Ok(())
}

/// Magic bytes that open every [`StandardHeader`].
pub const MAGIC: [u8; 4] = *b"SBX1";

/// Seed length used when none is configured.
pub const DEFAULT_SEED_LEN: u16 = 16;

/// Reference header.
///
/// Wire layout: `magic (4) | seed_len u16 LE (2) | seed | signature (64)`.
/// The seed length is fixed at allocation, so the encoded size is always
/// `70 + seed_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardHeader {
    seed: Vec<u8>,
    signature: [u8; SIGNATURE_LENGTH],
}

impl StandardHeader {
    /// Allocate an empty header for `seed_len` seed bytes.
    pub fn new(seed_len: u16) -> Self {
        Self {
            seed: vec![0u8; usize::from(seed_len)],
            signature: [0u8; SIGNATURE_LENGTH],
        }
    }

    /// Read a header of whatever seed length the stream announces.
    pub fn read_any(reader: &mut dyn Read) -> io::Result<Self> {
        let seed_len = read_prefix(reader)?;
        let mut header = Self::new(seed_len);
        reader.read_exact(&mut header.seed)?;
        reader.read_exact(&mut header.signature)?;
        Ok(header)
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        MAGIC.len() + 2 + self.seed.len() + SIGNATURE_LENGTH
    }
}

impl Default for StandardHeader {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_LEN)
    }
}

fn read_prefix(reader: &mut dyn Read) -> io::Result<u16> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not a sealed container (bad magic)",
        ));
    }

    let mut len = [0u8; 2];
    reader.read_exact(&mut len)?;
    Ok(u16::from_le_bytes(len))
}

impl Header for StandardHeader {
    fn marshal_to(&self, writer: &mut dyn Write) -> io::Result<()> {
        let seed_len = u16::try_from(self.seed.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seed too long"))?;

        writer.write_all(&MAGIC)?;
        writer.write_all(&seed_len.to_le_bytes())?;
        writer.write_all(&self.seed)?;
        writer.write_all(&self.signature)
    }

    fn unmarshal_from(&mut self, reader: &mut dyn Read) -> io::Result<()> {
        let seed_len = usize::from(read_prefix(reader)?);
        if seed_len != self.seed.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "seed length mismatch: expected {}, found {}",
                    self.seed.len(),
                    seed_len
                ),
            ));
        }

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
