//! Bit-plane transpose between interleaved sample words and per-channel streams.
//!
//! A capture stores one `unitsize`-byte little-endian word per sample
//! instant; bit `i - 1` of a word is the level of channel `i`. A bit-plane
//! stream stores one channel only, eight samples per byte.
//!
//! Both directions work on groups of eight consecutive words, which form an
//! 8x8 bit matrix per word byte. Sample 0 of a group lands in the most
//! significant bit of the stream byte and sample 7 in the least significant
//! one:
//!
//! ```text
//! words   0x01 0x02 0x04 0x08 0x10 0x20 0x40 0x80
//! bit 1   1    0    0    0    0    0    0    0     -> 0x80
//! bit 8   0    0    0    0    0    0    0    1     -> 0x01
//! ```
//!
//! The transpose itself is the closed-form [`transpose8x8`]. Loading the
//! eight words big-endian into the matrix makes its output come out in the
//! MSB-first order above, so the same function serves both directions.

use crate::channel_map::ChannelMap;
use crate::error::{Result, SrpackError};
use crate::metadata::MAX_UNITSIZE;
use std::collections::BTreeMap;
use std::ops::Deref;
use tracing::debug;

/// Samples packed into one stream byte.
pub const SAMPLES_PER_BYTE: usize = 8;

/// One channel's samples, eight per byte, first sample in bit 7.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitStream(Vec<u8>);

impl BitStream {
    /// Wrap raw stream bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Number of samples the stream can hold.
    pub fn sample_capacity(&self) -> usize {
        self.0.len() * SAMPLES_PER_BYTE
    }

    /// Unwrap into the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for BitStream {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for BitStream {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Bit-plane streams keyed by 1-based bit position.
pub type BitPlanes = BTreeMap<usize, BitStream>;

/// Transpose an 8x8 bit matrix held in a `u64`.
///
/// Bit `8 * r + c` moves to bit `8 * c + r`; the diagonal stays put.
#[inline]
pub fn transpose8x8(x: u64) -> u64 {
    (x & 0x8040_2010_0804_0201)
        | ((x & 0x0080_4020_1008_0402) << 7)
        | ((x & 0x0000_8040_2010_0804) << 14)
        | ((x & 0x0000_0080_4020_1008) << 21)
        | ((x & 0x0000_0000_8040_2010) << 28)
        | ((x & 0x0000_0000_0080_4020) << 35)
        | ((x & 0x0000_0000_0000_8040) << 42)
        | ((x & 0x0000_0000_0000_0080) << 49)
        | ((x >> 7) & 0x0080_4020_1008_0402)
        | ((x >> 14) & 0x0000_8040_2010_0804)
        | ((x >> 21) & 0x0000_0080_4020_1008)
        | ((x >> 28) & 0x0000_0000_8040_2010)
        | ((x >> 35) & 0x0000_0000_0080_4020)
        | ((x >> 42) & 0x0000_0000_0000_8040)
        | ((x >> 49) & 0x0000_0000_0000_0080)
}

/// Validate a sample word width.
pub fn check_unitsize(unitsize: usize) -> Result<usize> {
    if unitsize == 0 {
        return Err(SrpackError::format("unitsize must be at least 1"));
    }
    if unitsize > MAX_UNITSIZE {
        return Err(SrpackError::unsupported_width(unitsize));
    }
    Ok(unitsize)
}

fn check_position(position: usize, unitsize: usize) -> Result<()> {
    if position == 0 || position > unitsize * 8 {
        return Err(SrpackError::probe_range(position, unitsize));
    }
    Ok(())
}

/// Eight byte lanes of one word byte, sample 0 first, into eight plane bytes.
#[inline]
fn planes_of(lane: [u8; 8]) -> [u8; 8] {
    transpose8x8(u64::from_be_bytes(lane)).to_le_bytes()
}

/// Eight plane bytes, bit position 1 first, into eight word bytes.
#[inline]
fn lane_of(planes: [u8; 8]) -> [u8; 8] {
    transpose8x8(u64::from_le_bytes(planes)).to_be_bytes()
}

/// Transpose one group of eight words into `unitsize * 8` plane bytes.
fn split_group(group: &[u8; 16], unitsize: usize) -> [u8; 16] {
    let mut out = [0u8; 16];
    for byte in 0..unitsize {
        let lane: [u8; 8] = std::array::from_fn(|w| group[w * unitsize + byte]);
        out[byte * 8..byte * 8 + 8].copy_from_slice(&planes_of(lane));
    }
    out
}

/// Transpose `unitsize * 8` plane bytes back into one group of eight words.
fn merge_group(planes: &[u8; 16], unitsize: usize) -> [u8; 16] {
    let mut out = [0u8; 16];
    for byte in 0..unitsize {
        let mut lane_planes = [0u8; 8];
        lane_planes.copy_from_slice(&planes[byte * 8..byte * 8 + 8]);
        for (w, value) in lane_of(lane_planes).into_iter().enumerate() {
            out[w * unitsize + byte] = value;
        }
    }
    out
}

/// Split an interleaved blob into one stream per active bit position.
///
/// A trailing partial group is zero-padded, so every stream has
/// `ceil(blob.len() / (8 * unitsize))` bytes.
pub fn deinterleave(blob: &[u8], unitsize: usize, active: &[usize]) -> Result<BitPlanes> {
    let unitsize = check_unitsize(unitsize)?;
    for &position in active {
        check_position(position, unitsize)?;
    }

    let group_len = SAMPLES_PER_BYTE * unitsize;
    let groups = blob.len().div_ceil(group_len);
    let mut streams: BTreeMap<usize, Vec<u8>> = active
        .iter()
        .map(|&position| (position, Vec::with_capacity(groups)))
        .collect();

    let mut group = [0u8; 16];
    for chunk in blob.chunks(group_len) {
        group[..chunk.len()].copy_from_slice(chunk);
        group[chunk.len()..].fill(0);
        let planes = split_group(&group, unitsize);
        for (&position, stream) in streams.iter_mut() {
            stream.push(planes[position - 1]);
        }
    }

    if blob.len() % group_len != 0 {
        debug!(
            len = blob.len(),
            group_len, "zero-padded trailing partial sample group"
        );
    }

    Ok(streams
        .into_iter()
        .map(|(position, bytes)| (position, BitStream(bytes)))
        .collect())
}

/// Rebuild an interleaved blob from streams keyed by bit position.
///
/// Missing positions and exhausted streams contribute zero bits. The
/// output holds `8 * unitsize` bytes per byte of the longest stream.
pub fn interleave(planes: &BitPlanes, unitsize: usize) -> Result<Vec<u8>> {
    let unitsize = check_unitsize(unitsize)?;
    for &position in planes.keys() {
        check_position(position, unitsize)?;
    }

    let len = planes.values().map(|s| s.len()).max().unwrap_or(0);
    let group_len = SAMPLES_PER_BYTE * unitsize;
    let mut out = Vec::with_capacity(len * group_len);

    let mut column = [0u8; 16];
    for p in 0..len {
        column.fill(0);
        for (&position, stream) in planes {
            if let Some(&byte) = stream.get(p) {
                column[position - 1] = byte;
            }
        }
        out.extend_from_slice(&merge_group(&column, unitsize)[..group_len]);
    }

    Ok(out)
}

/// Rebuild a blob placing streams into the slots of `map`.
///
/// `planes` is keyed by slot position; streams at dummy slots are ignored.
pub fn interleave_mapped(planes: &BitPlanes, map: &ChannelMap) -> Result<Vec<u8>> {
    let mut active = BitPlanes::new();
    for (&position, stream) in planes {
        match map.slot(position) {
            Some(slot) if slot.probe().is_some() => {
                active.insert(position, stream.clone());
            }
            Some(_) => debug!(position, "ignoring stream at dummy slot"),
            None => return Err(SrpackError::probe_range(position, map.unitsize())),
        }
    }
    interleave(&active, map.unitsize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;

    /// Bit-by-bit extraction straight from the word definition.
    fn reference_deinterleave(blob: &[u8], unitsize: usize, position: usize) -> Vec<u8> {
        let mask = 1u16 << (position - 1);
        let group_len = 8 * unitsize;
        let mut out = Vec::new();
        for chunk in blob.chunks(group_len) {
            let mut padded = chunk.to_vec();
            padded.resize(group_len, 0);
            let mut byte = 0u8;
            for w in 0..8 {
                let word = if unitsize == 1 {
                    padded[w] as u16
                } else {
                    u16::from_le_bytes([padded[2 * w], padded[2 * w + 1]])
                };
                if word & mask != 0 {
                    byte |= 0x80 >> w;
                }
            }
            out.push(byte);
        }
        out
    }

    fn sample_blob(len: usize) -> Vec<u8> {
        let mut state = 0x1234_5678u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn test_transpose_identity_and_involution() {
        assert_eq!(transpose8x8(0), 0);
        assert_eq!(transpose8x8(u64::MAX), u64::MAX);
        assert_eq!(transpose8x8(0x8040_2010_0804_0201), 0x8040_2010_0804_0201);
        // Row 0 becomes column 0.
        assert_eq!(transpose8x8(0xFF), 0x0101_0101_0101_0101);

        let x = 0x0123_4567_89AB_CDEF;
        assert_eq!(transpose8x8(transpose8x8(x)), x);
    }

    #[test]
    fn test_bit_order_example() {
        let words = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];
        let planes = deinterleave(&words, 1, &[1, 8]).unwrap();
        assert_eq!(&planes[&1][..], &[0x80]);
        assert_eq!(&planes[&8][..], &[0x01]);
    }

    #[test]
    fn test_matches_reference_one_byte() {
        let blob = sample_blob(8 * 37);
        let all: Vec<usize> = (1..=8).collect();
        let planes = deinterleave(&blob, 1, &all).unwrap();
        for position in all {
            assert_eq!(
                &planes[&position][..],
                reference_deinterleave(&blob, 1, position).as_slice(),
                "bit {position}"
            );
        }
    }

    #[test]
    fn test_matches_reference_two_bytes() {
        let blob = sample_blob(16 * 21 + 5);
        let all: Vec<usize> = (1..=16).collect();
        let planes = deinterleave(&blob, 2, &all).unwrap();
        for position in all {
            assert_eq!(
                &planes[&position][..],
                reference_deinterleave(&blob, 2, position).as_slice(),
                "bit {position}"
            );
        }
    }

    #[test]
    fn test_two_byte_high_channel() {
        // Only channel 9 (bit 0 of the high byte) high, in sample 1.
        let mut blob = vec![0u8; 16];
        blob[3] = 0x01;
        let planes = deinterleave(&blob, 2, &[1, 9]).unwrap();
        assert_eq!(&planes[&1][..], &[0x00]);
        assert_eq!(&planes[&9][..], &[0x40]);
    }

    #[test]
    fn test_only_active_positions_returned() {
        let planes = deinterleave(&sample_blob(64), 1, &[2, 5]).unwrap();
        assert_eq!(planes.keys().copied().collect::<Vec<_>>(), [2, 5]);
    }

    #[test]
    fn test_partial_group_padding() {
        let blob = [0xFFu8; 11];
        let planes = deinterleave(&blob, 1, &[1, 3]).unwrap();
        assert_eq!(&planes[&1][..], &[0xFF, 0xE0]);
        assert_eq!(&planes[&3][..], &[0xFF, 0xE0]);

        let planes = deinterleave(&blob, 2, &[1, 16]).unwrap();
        // 5 whole words plus one low byte.
        assert_eq!(&planes[&1][..], &[0xFC]);
        assert_eq!(&planes[&16][..], &[0xF8]);
    }

    #[test]
    fn test_empty_blob() {
        let planes = deinterleave(&[], 1, &[1]).unwrap();
        assert!(planes[&1].is_empty());
        assert!(interleave(&planes, 1).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip() {
        for unitsize in [1, 2] {
            let blob = sample_blob(8 * unitsize * 50);
            let all: Vec<usize> = (1..=unitsize * 8).collect();
            let planes = deinterleave(&blob, unitsize, &all).unwrap();
            assert_eq!(interleave(&planes, unitsize).unwrap(), blob);
        }
    }

    #[test]
    fn test_interleave_missing_positions_are_zero() {
        let mut planes = BitPlanes::new();
        planes.insert(1, BitStream::new(vec![0x80]));
        let blob = interleave(&planes, 1).unwrap();
        assert_eq!(blob, [0x01, 0, 0, 0, 0, 0, 0, 0]);

        let blob = interleave(&planes, 2).unwrap();
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[..2], &[0x01, 0x00]);
        assert!(blob[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_interleave_short_streams_exhaust_to_zero() {
        let mut planes = BitPlanes::new();
        planes.insert(1, BitStream::new(vec![0xFF, 0xFF]));
        planes.insert(2, BitStream::new(vec![0xFF]));
        let blob = interleave(&planes, 1).unwrap();
        assert_eq!(blob.len(), 16);
        assert!(blob[..8].iter().all(|&b| b == 0x03));
        assert!(blob[8..].iter().all(|&b| b == 0x01));
    }

    #[test]
    fn test_unsupported_width() {
        assert!(matches!(
            deinterleave(&[0; 24], 3, &[1]).unwrap_err(),
            SrpackError::UnsupportedWidth { unitsize: 3 }
        ));
        assert!(matches!(
            interleave(&BitPlanes::new(), 4).unwrap_err(),
            SrpackError::UnsupportedWidth { unitsize: 4 }
        ));
    }

    #[test]
    fn test_position_out_of_range() {
        assert!(matches!(
            deinterleave(&[0; 8], 1, &[9]).unwrap_err(),
            SrpackError::ProbeRange { index: 9, .. }
        ));
        let mut planes = BitPlanes::new();
        planes.insert(0, BitStream::default());
        assert!(interleave(&planes, 1).is_err());
    }

    #[test]
    fn test_interleave_mapped_ignores_dummy_slots() {
        let meta = Metadata::parse("[device 1]\ncapturefile=c\nunitsize=1\nprobe1=A\n").unwrap();
        let map = ChannelMap::identity(&meta).unwrap();

        let mut planes = BitPlanes::new();
        planes.insert(1, BitStream::new(vec![0x80]));
        planes.insert(2, BitStream::new(vec![0xFF]));
        let blob = interleave_mapped(&planes, &map).unwrap();
        assert_eq!(blob, [0x01, 0, 0, 0, 0, 0, 0, 0]);
    }
}
