//! Owned key material.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Bytes that are wiped when the last owner drops them.
///
/// Holds the shared KDF secret. `Debug` shows the length only.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SensitiveBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for SensitiveBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SensitiveBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Takes the buffer over without leaving a copy behind.
impl From<Zeroizing<Vec<u8>>> for SensitiveBytes {
    fn from(mut bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(std::mem::take(&mut *bytes))
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SensitiveBytes")
            .field(&format_args!("<{} bytes>", self.0.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_contents() {
        let secret = SensitiveBytes::from(&b"hunter2"[..]);
        let shown = format!("{:?}", secret);
        assert_eq!(shown, "SensitiveBytes(<7 bytes>)");
    }

    #[test]
    fn test_from_zeroizing_moves_buffer() {
        let source = Zeroizing::new(vec![4u8, 5, 6]);
        let secret = SensitiveBytes::from(source);

        assert_eq!(secret.as_bytes(), &[4, 5, 6]);
        assert_eq!(secret.as_ref().len(), 3);
        assert!(SensitiveBytes::default().is_empty());
    }
}
