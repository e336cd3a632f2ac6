use proptest::prelude::*;
use srpack_core::bitplane::{deinterleave, interleave};
use srpack_core::{BitPlanes, ChannelMap, Metadata};

fn blob_strategy() -> impl Strategy<Value = (usize, Vec<u8>)> {
    (1usize..=2).prop_flat_map(|unitsize| {
        (0usize..64).prop_flat_map(move |groups| {
            (
                Just(unitsize),
                prop::collection::vec(any::<u8>(), groups * 8 * unitsize),
            )
        })
    })
}

proptest! {
    #[test]
    fn roundtrip_whole_groups((unitsize, blob) in blob_strategy()) {
        let all: Vec<usize> = (1..=unitsize * 8).collect();
        let planes = deinterleave(&blob, unitsize, &all).unwrap();
        prop_assert_eq!(interleave(&planes, unitsize).unwrap(), blob);
    }

    #[test]
    fn streams_share_length(
        unitsize in 1usize..=2,
        blob in prop::collection::vec(any::<u8>(), 0..300),
    ) {
        let all: Vec<usize> = (1..=unitsize * 8).collect();
        let planes = deinterleave(&blob, unitsize, &all).unwrap();
        let expected = blob.len().div_ceil(8 * unitsize);
        for stream in planes.values() {
            prop_assert_eq!(stream.len(), expected);
        }
    }

    #[test]
    fn padding_matches_explicit_zero_fill(
        unitsize in 1usize..=2,
        blob in prop::collection::vec(any::<u8>(), 1..200),
    ) {
        let group = 8 * unitsize;
        let mut padded = blob.clone();
        padded.resize(blob.len().div_ceil(group) * group, 0);

        let all: Vec<usize> = (1..=unitsize * 8).collect();
        prop_assert_eq!(
            deinterleave(&blob, unitsize, &all).unwrap(),
            deinterleave(&padded, unitsize, &all).unwrap()
        );
        prop_assert_eq!(interleave(&deinterleave(&blob, unitsize, &all).unwrap(), unitsize).unwrap(), padded);
    }

    #[test]
    fn packed_map_keeps_stream_data(
        mask in 1u16..,
        blob in prop::collection::vec(any::<u8>(), 0..160),
    ) {
        let mut text = String::from("[global]\n[device 1]\ncapturefile=logic-1\nunitsize=2\n");
        for bit in 0..16 {
            if mask & (1 << bit) != 0 {
                text.push_str(&format!("probe{}=P{}\n", bit + 1, bit + 1));
            }
        }
        let meta = Metadata::parse(&text).unwrap();
        let identity = ChannelMap::identity(&meta).unwrap();
        let (packed, packed_meta) = ChannelMap::packed(&meta).unwrap();

        let active = identity.source_indices();
        let planes = deinterleave(&blob, 2, &active).unwrap();

        // Same probes, same data; only the slot changes.
        prop_assert_eq!(packed.source_indices(), active.clone());
        let positions: Vec<usize> = packed.active().map(|(pos, _)| pos).collect();
        prop_assert_eq!(positions, (1..=active.len()).collect::<Vec<_>>());
        let mut by_slot = BitPlanes::new();
        for (pos, probe) in packed.active() {
            prop_assert_eq!(packed_meta.probe(pos), Some(probe.name.as_str()));
            by_slot.insert(pos, planes[&probe.index].clone());
        }

        let repacked = interleave(&by_slot, packed.unitsize()).unwrap();
        let slots: Vec<usize> = by_slot.keys().copied().collect();
        let again = deinterleave(&repacked, packed.unitsize(), &slots).unwrap();
        for (pos, probe) in packed.active() {
            prop_assert_eq!(&again[&pos], &planes[&probe.index]);
        }
    }
}
