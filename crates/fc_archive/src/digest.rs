//! 160-bit content addresses.
//!
//! The digest is the row-level representation of every variable-length
//! value: 20 bytes wide so it can double as a five-word index, produced by
//! BLAKE3 with a 20-byte extended output.

use std::fmt;

/// Digest width in bytes (160 bits).
pub const DIGEST_LEN: usize = 20;

/// A 160-bit content hash. The all-zero digest is reserved for unwritten
/// slots in fixed-width digest arrays.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Reinterpret the digest as five little-endian 32-bit words, the
    /// form used when a digest addresses a multi-dimensional store.
    pub fn words(&self) -> [u32; 5] {
        let mut words = [0u32; 5];
        for (i, word) in words.iter_mut().enumerate() {
            let b = &self.0[i * 4..i * 4 + 4];
            *word = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        }
        words
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Digest> {
        let array: [u8; DIGEST_LEN] = bytes.try_into().ok()?;
        Some(Digest(array))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LEN]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// Hash a side-store payload. Deterministic across runs and platforms.
pub fn digest_of(payload: &[u8]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(payload);
    let mut out = [0u8; DIGEST_LEN];
    hasher.finalize_xof().fill(&mut out);
    Digest(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
