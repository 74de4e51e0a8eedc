//! Utility functions for cryptographic primitives.

use commoncoin_codec::varint;

/// Converts bytes to a hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Computes a length-delimited union of a namespace and a message.
///
/// Prefixing the namespace length ensures `(namespace, message)` pairs map to unique
/// payloads (i.e. `("ab", "c")` and `("a", "bc")` do not collide).
pub fn union_unique(namespace: &[u8], message: &[u8]) -> Vec<u8> {
    let len = namespace.len() as u64;
    let mut result = Vec::with_capacity(varint::size(len) + namespace.len() + message.len());
    varint::write(len, &mut result);
    result.extend_from_slice(namespace);
    result.extend_from_slice(message);
    result
}

/// Computes the maximum number of faults `f` tolerated by `n` participants (`n >= 3f + 1`).
pub fn max_faults(n: u32) -> u32 {
    n.saturating_sub(1) / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[]), "");
        assert_eq!(hex(&[0x01, 0xab, 0xff]), "01abff");
    }

    #[test]
    fn test_union_unique() {
        assert_ne!(union_unique(b"ab", b"c"), union_unique(b"a", b"bc"));
        assert_eq!(union_unique(b"ns", b"m"), vec![2, b'n', b's', b'm']);
    }

    #[test]
    fn test_max_faults() {
        assert_eq!(max_faults(0), 0);
        assert_eq!(max_faults(1), 0);
        assert_eq!(max_faults(4), 1);
        assert_eq!(max_faults(6), 1);
        assert_eq!(max_faults(7), 2);
    }
}
