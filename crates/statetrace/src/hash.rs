//! Content identity hash.
//!
//! The output format is content-addressed: two uploads with the same handle
//! and payload bytes must map to the same dense id across runs and across
//! implementations. The hash is therefore fixed (djb2, 64-bit wrapping) and
//! not swappable for a faster or stronger one.

/// Hash a `(handle, payload)` pair.
///
/// Covers the first four bytes of the little-endian handle, then every
/// payload byte. A missing payload yields a handle-only hash, which is how
/// bind-style calls with no data get distinct identities per handle.
pub fn compute_hash(handle: u64, payload: Option<&[u8]>) -> u64 {
    let mut h: u64 = 5381;
    for &b in &handle.to_le_bytes()[..4] {
        h = (h << 5).wrapping_add(h).wrapping_add(b as u64);
    }
    if let Some(data) = payload {
        for &b in data {
            h = (h << 5).wrapping_add(h).wrapping_add(b as u64);
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        // 5381 folded over four zero bytes: 5381 * 33^4.
        assert_eq!(compute_hash(0, None), 6_381_440_901);
        assert_eq!(compute_hash(0, Some(&[1])), 6_381_440_901 * 33 + 1);
    }

    #[test]
    fn deterministic() {
        let payload = [7u8; 128];
        let a = compute_hash(0xdead_beef, Some(&payload));
        let b = compute_hash(0xdead_beef, Some(&payload));
        assert_eq!(a, b);
    }

    #[test]
    fn handle_bytes_participate() {
        let payload = [0u8; 16];
        assert_ne!(
            compute_hash(10, Some(&payload)),
            compute_hash(11, Some(&payload))
        );
    }

    #[test]
    fn only_low_four_handle_bytes_participate() {
        assert_eq!(
            compute_hash(0x1111_0000_0000_00ff, None),
            compute_hash(0x2222_0000_0000_00ff, None)
        );
        assert_ne!(compute_hash(0xff, None), compute_hash(0xfe, None));
    }

    #[test]
    fn empty_payload_equals_missing_payload() {
        assert_eq!(compute_hash(42, Some(&[])), compute_hash(42, None));
    }
}
