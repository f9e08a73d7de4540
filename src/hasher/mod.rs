pub mod content;

pub use content::{fingerprint_file, fingerprint_reader, HASH_CHUNK_SIZE};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded BLAKE3 digest of a file's full content. The sole identity key
/// for dedup: path and file name play no part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const HEX_LEN: usize = 64;

    /// Accepts a stored key, rejecting anything that is not a 64 char hex digest.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() == Self::HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Fingerprint(hex.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines.
    pub fn prefix(&self) -> &str {
        &self.0[..12]
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Fingerprint(hash.to_hex().to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_validates() {
        let hex = "ab".repeat(32);
        let fp = Fingerprint::from_hex(&hex).unwrap();
        assert_eq!(fp.as_str(), hex);
        assert_eq!(fp.prefix(), "abababababab");

        assert!(Fingerprint::from_hex("abc").is_none());
        assert!(Fingerprint::from_hex(&"zz".repeat(32)).is_none());
    }

    #[test]
    fn test_from_hex_lowercases() {
        let fp = Fingerprint::from_hex(&"AB".repeat(32)).unwrap();
        assert_eq!(fp.as_str(), "ab".repeat(32));
    }
}
