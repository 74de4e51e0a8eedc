//! Derive a coin from a combined signature.

use commoncoin_codec::Encode;
use commoncoin_cryptography::sha256;

/// Returns the coin encoded by a combined signature: the parity of the first byte of
/// the SHA-256 digest of its encoding.
pub fn derive<S: Encode>(signature: &S) -> bool {
    from_bytes(&signature.encode())
}

/// Returns the coin encoded by the bytes of a combined signature.
pub fn from_bytes(signature: &[u8]) -> bool {
    sha256::hash(signature)[0] % 2 == 1
}
