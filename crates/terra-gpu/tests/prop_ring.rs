use proptest::prelude::*;
use terra_gpu::{FrameRing, GpuDevice, HeadlessDevice, RecordingSink};

proptest! {
    // Staged bytes reach the sink unchanged and never overrun the slot
    #[test]
    fn staged_bytes_round_trip(cap in 1usize..256, parts in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..64), 0..12)) {
        let mut dev = HeadlessDevice::new();
        let mut ring = FrameRing::new(2, cap);
        let mut expected = Vec::new();
        for p in &parts {
            let Some(r) = ring.current_mut().reserve(p.len()) else { continue };
            let buf = dev.create_device_buffer(p.len(), "part").unwrap();
            ring.current_mut().fill(r, &[(p.as_slice(), &buf)]);
            expected.push((buf, p.clone()));
            prop_assert!(ring.current().used() <= cap);
        }
        let mut sink = RecordingSink::default();
        prop_assert_eq!(ring.submit_copies(&mut sink), expected.len());
        for (copy, (buf, data)) in sink.copies.iter().zip(&expected) {
            prop_assert_eq!(&copy.dst, buf);
            prop_assert_eq!(&copy.data, data);
        }
    }

    // A deferred buffer survives exactly frames_in_flight - 1 advances
    #[test]
    fn deferred_lifetime_matches_ring_depth(frames in 1usize..6) {
        let mut dev = HeadlessDevice::new();
        let mut ring = FrameRing::new(frames, 8);
        let b = dev.create_device_buffer(8, "victim").unwrap();
        ring.defer_destroy(b);
        for _ in 0..frames - 1 {
            ring.advance(&mut dev);
            prop_assert!(dev.is_live(&b));
        }
        ring.advance(&mut dev);
        prop_assert!(!dev.is_live(&b));
        prop_assert_eq!(ring.pending_destroys(), 0);
    }
}
