//! SHA-256 digests.

use bytes::{Buf, BufMut};
use commoncoin_codec::{Error as CodecError, FixedSize, Read, Write};
use sha2::{Digest as _, Sha256 as ISha256};
use std::{
    fmt::{Debug, Display},
    ops::Deref,
};

const DIGEST_LENGTH: usize = 32;

/// Hashes the given bytes using SHA-256.
pub fn hash(message: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.finalize()
}

/// Incremental SHA-256 hasher.
#[derive(Clone, Default)]
pub struct Sha256 {
    hasher: ISha256,
}

impl Sha256 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` to the data being hashed.
    pub fn update(&mut self, message: &[u8]) {
        self.hasher.update(message);
    }

    /// Returns the digest of all data appended since the last call and resets the hasher.
    pub fn finalize(&mut self) -> Digest {
        let finalized = self.hasher.finalize_reset();
        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(finalized.as_slice());
        Digest(digest)
    }
}

/// A SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl Write for Digest {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }
}

impl Read for Digest {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        if buf.remaining() < DIGEST_LENGTH {
            return Err(CodecError::EndOfBuffer);
        }
        let mut digest = [0u8; DIGEST_LENGTH];
        buf.copy_to_slice(&mut digest);
        Ok(Self(digest))
    }
}

impl FixedSize for Digest {
    const SIZE: usize = DIGEST_LENGTH;
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Digest {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::utils::hex(&self.0))
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::utils::hex(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hex;
    use commoncoin_codec::{DecodeExt, Encode};

    #[test]
    fn test_sha256() {
        let message = b"hello world";

        // Generate initial hash
        let mut hasher = Sha256::new();
        hasher.update(message);
        let digest = hasher.finalize();
        assert_eq!(
            hex(&digest),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        // Reuse hasher
        hasher.update(message);
        assert_eq!(hasher.finalize(), digest);
        assert_eq!(hash(message), digest);
    }

    #[test]
    fn test_codec() {
        let digest = hash(b"hello world");
        let encoded = digest.encode();
        assert_eq!(encoded.len(), Digest::SIZE);
        assert_eq!(Digest::decode(encoded).unwrap(), digest);
    }
}
