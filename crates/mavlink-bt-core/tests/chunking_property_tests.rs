//! Property-based tests for fragmenting outbound buffers
//!
//! These verify that fragments reassemble to the original buffer, respect the
//! payload size and only the final fragment is short.

use mavlink_bt_core::{chunk, fragment_count, Mtu, WriteQueue};
use proptest::prelude::*;

/// Payload sizes a BLE link can end up with
fn arb_mtu() -> impl Strategy<Value = Mtu> {
    prop_oneof![
        Just(Mtu::DEFAULT),
        Just(Mtu::fallback(true)),
        (23u16..=517).prop_map(Mtu::from_granted),
        (1usize..64).prop_map(Mtu::new),
    ]
}

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

proptest! {
    #[test]
    fn prop_fragments_concatenate_to_payload(payload in arb_payload(), mtu in arb_mtu()) {
        let joined: Vec<u8> = chunk(&payload, mtu).flat_map(|f| f.into_vec()).collect();
        prop_assert_eq!(joined, payload);
    }

    #[test]
    fn prop_only_last_fragment_is_short(payload in arb_payload(), mtu in arb_mtu()) {
        let lens: Vec<usize> = chunk(&payload, mtu).map(|f| f.len()).collect();

        prop_assert_eq!(lens.len(), fragment_count(payload.len(), mtu));
        if let Some((last, rest)) = lens.split_last() {
            prop_assert!(rest.iter().all(|&len| len == mtu.get()));
            prop_assert!(*last >= 1 && *last <= mtu.get());
        }
    }

    #[test]
    fn prop_queue_preserves_byte_order(
        buffers in prop::collection::vec(arb_payload(), 1..8),
        mtu in arb_mtu(),
    ) {
        let mut queue = WriteQueue::new();
        for buffer in &buffers {
            queue.enqueue(buffer, mtu);
        }

        let mut sent = Vec::new();
        while let Some(fragment) = queue.next_for_dispatch() {
            prop_assert!(queue.in_flight());
            sent.extend_from_slice(fragment.as_bytes());
        }

        prop_assert!(!queue.in_flight());
        prop_assert_eq!(sent, buffers.concat());
    }
}
