//! Property suites for the content-identity machinery: hash determinism,
//! dense-id monotonicity and stability, and binary round-tripping.

use proptest::prelude::*;

use statetrace::{
    compute_hash, parse_records, BinState, ChangeKind, Record, StateBin, NUM_BINS,
};

fn payloads() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..32)
}

proptest! {
    #[test]
    fn hash_is_deterministic(handle in any::<u64>(), payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        prop_assert_eq!(
            compute_hash(handle, Some(&payload)),
            compute_hash(handle, Some(&payload))
        );
    }

    #[test]
    fn hash_ignores_high_handle_bytes(low in any::<u32>(), hi_a in any::<u32>(), hi_b in any::<u32>()) {
        let a = (hi_a as u64) << 32 | low as u64;
        let b = (hi_b as u64) << 32 | low as u64;
        prop_assert_eq!(compute_hash(a, None), compute_hash(b, None));
    }

    #[test]
    fn ids_are_dense_and_gapless(hashes in proptest::collection::vec(any::<u64>(), 1..64)) {
        let mut bin = StateBin::default();
        let mut max_id = -1;
        for &hash in &hashes {
            let id = bin.assign_id(hash);
            // A fresh hash takes exactly the next id; a repeat takes an
            // already-issued one.
            prop_assert!(id <= max_id + 1);
            prop_assert!(id >= 0);
            max_id = max_id.max(id);
        }
        prop_assert_eq!(max_id as usize + 1, bin.distinct_values());
    }

    #[test]
    fn ids_are_stable_per_content(contents in payloads(), handle in any::<u64>()) {
        let mut bin = StateBin::default();
        let first: Vec<i32> = contents
            .iter()
            .map(|p| bin.assign_id(compute_hash(handle, Some(p))))
            .collect();
        let second: Vec<i32> = contents
            .iter()
            .map(|p| bin.assign_id(compute_hash(handle, Some(p))))
            .collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn call_records_round_trip(
        name_id in any::<u8>(),
        bin in 0i32..=26,
        size in any::<i32>(),
        valid in any::<i32>(),
        object in any::<u64>(),
    ) {
        let record = Record::Call { name_id, bin, size, valid, object };
        let parsed = parse_records(&record.encode()).unwrap();
        prop_assert_eq!(parsed, vec![record]);
    }

    #[test]
    fn draw_records_round_trip(
        name_id in any::<u8>(),
        ids in proptest::collection::vec(-1i32..1000, NUM_BINS),
        changes in proptest::collection::vec(0u8..=4, NUM_BINS),
        prim_count in any::<i32>(),
    ) {
        let mut bins = [BinState { id: 0, change: ChangeKind::Undef, bytes: 0 }; NUM_BINS];
        for n in 0..NUM_BINS {
            bins[n] = BinState {
                id: ids[n],
                change: ChangeKind::from_u8(changes[n]).unwrap(),
                bytes: ids[n].wrapping_mul(3),
            };
        }
        let draw_bytes: i32 = bins.iter().map(|b| b.bytes).fold(0, i32::wrapping_add);
        let record = Record::Draw { name_id, bins, prim_count, draw_bytes };
        let parsed = parse_records(&record.encode()).unwrap();
        prop_assert_eq!(parsed, vec![record]);
    }
}
