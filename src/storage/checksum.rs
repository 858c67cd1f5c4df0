//! CRC32 checksums over stored record bodies
//!
//! Every fetch re-verifies the checksum computed at write time.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = br#"{"a":1,"c":7}"#;
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_checksum_detects_bit_flip() {
        let mut body = br#"{"b":1,"c":3}"#.to_vec();
        let original = compute_checksum(&body);
        body[5] ^= 0x01;
        assert!(!verify_checksum(&body, original));
    }
}
