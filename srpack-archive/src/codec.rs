//! Entry codecs.
//!
//! Each codec maps to a ZIP compression method and produces the entry
//! payload exactly as it is stored in the container. LZMA entries use the
//! PKWARE method 14 framing:
//!
//! ```text
//! +---------+---------+------------+-----------------+-------------+
//! | ver maj | ver min | props size | props (5 bytes) | raw stream  |
//! | 1 byte  | 1 byte  | u16 LE = 5 | lc/lp/pb, dict  | ...         |
//! +---------+---------+------------+-----------------+-------------+
//! ```
//!
//! The uncompressed size is known from the container, so streams are
//! written without an end marker. Streams that carry one (general purpose
//! flag bit 1) decode the same way.

use bzip2::Compression as Bzip2Level;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use lzma_rs::{compress, decompress};
use srpack_core::error::{Result, SrpackError};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// ZIP method id: stored.
pub const METHOD_STORED: u16 = 0;
/// ZIP method id: deflate.
pub const METHOD_DEFLATE: u16 = 8;
/// ZIP method id: bzip2.
pub const METHOD_BZIP2: u16 = 12;
/// ZIP method id: LZMA.
pub const METHOD_LZMA: u16 = 14;

/// LZMA SDK version recorded in method 14 headers.
const LZMA_SDK_VERSION: [u8; 2] = [16, 4];

/// Size of the LZMA properties block (props byte + dictionary size).
const LZMA_PROPS_SIZE: usize = 5;

/// Size of the `.lzma` header produced by the encoder (props, dict, length).
const LZMA_ALONE_HEADER: usize = 13;

/// Deflate level used for entries.
const DEFLATE_LEVEL: u8 = 6;

/// Upper bound for output buffers sized from untrusted headers.
const PREALLOC_LIMIT: u64 = 16 * 1024 * 1024;

fn output_buffer(size: u64) -> Vec<u8> {
    Vec::with_capacity(size.min(PREALLOC_LIMIT) as usize)
}

/// Compression algorithm for one archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// No compression.
    Store,
    /// DEFLATE (method 8).
    Deflate,
    /// BZip2 (method 12).
    Bzip2,
    /// LZMA (method 14).
    Lzma,
}

impl Codec {
    /// Every codec, in order of increasing effort.
    pub const ALL: [Codec; 4] = [Self::Store, Self::Deflate, Self::Bzip2, Self::Lzma];

    /// ZIP compression method id.
    pub fn zip_method(self) -> u16 {
        match self {
            Self::Store => METHOD_STORED,
            Self::Deflate => METHOD_DEFLATE,
            Self::Bzip2 => METHOD_BZIP2,
            Self::Lzma => METHOD_LZMA,
        }
    }

    /// Codec for a ZIP compression method id.
    pub fn from_zip_method(method: u16) -> Option<Self> {
        match method {
            METHOD_STORED => Some(Self::Store),
            METHOD_DEFLATE => Some(Self::Deflate),
            METHOD_BZIP2 => Some(Self::Bzip2),
            METHOD_LZMA => Some(Self::Lzma),
            _ => None,
        }
    }

    /// Minimum ZIP version needed to extract entries of this codec.
    pub fn version_needed(self) -> u16 {
        match self {
            Self::Store => 10,
            Self::Deflate => 20,
            Self::Bzip2 => 46,
            Self::Lzma => 63,
        }
    }

    /// Codec name as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Deflate => "deflate",
            Self::Bzip2 => "bzip2",
            Self::Lzma => "lzma",
        }
    }

    /// Tag used in output archive file names.
    pub fn archive_tag(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Deflate => "zip",
            Self::Bzip2 => "bz2",
            Self::Lzma => "lzma",
        }
    }

    /// Compress `data` into an entry payload.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Store => Ok(data.to_vec()),
            Self::Deflate => Ok(oxiarc_deflate::deflate(data, DEFLATE_LEVEL)?),
            Self::Bzip2 => {
                let buffer = output_buffer(data.len() as u64 / 2);
                let mut encoder = BzEncoder::new(buffer, Bzip2Level::best());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            Self::Lzma => {
                let mut input = data;
                let mut alone = output_buffer(data.len() as u64 / 2);
                let options = compress::Options {
                    unpacked_size: compress::UnpackedSize::WriteToHeader(Some(data.len() as u64)),
                };
                lzma_rs::lzma_compress_with_options(&mut input, &mut alone, &options)?;
                if alone.len() < LZMA_ALONE_HEADER {
                    return Err(SrpackError::invalid_header("LZMA encoder output too short"));
                }
                let mut out = Vec::with_capacity(alone.len() - 4);
                out.extend_from_slice(&LZMA_SDK_VERSION);
                out.extend_from_slice(&(LZMA_PROPS_SIZE as u16).to_le_bytes());
                out.extend_from_slice(&alone[..LZMA_PROPS_SIZE]);
                out.extend_from_slice(&alone[LZMA_ALONE_HEADER..]);
                Ok(out)
            }
        }
    }

    /// Decompress an entry payload of known uncompressed size.
    pub fn decompress(self, payload: &[u8], size: u64) -> Result<Vec<u8>> {
        match self {
            Self::Store => Ok(payload.to_vec()),
            Self::Deflate => Ok(oxiarc_deflate::inflate(payload)?),
            Self::Bzip2 => {
                let mut out = output_buffer(size);
                BzDecoder::new(payload).read_to_end(&mut out)?;
                Ok(out)
            }
            Self::Lzma => {
                if payload.len() < 4 {
                    return Err(SrpackError::invalid_header("LZMA entry header truncated"));
                }
                let props_size = u16::from_le_bytes([payload[2], payload[3]]) as usize;
                if props_size < LZMA_PROPS_SIZE || payload.len() < 4 + props_size {
                    return Err(SrpackError::invalid_header("LZMA properties truncated"));
                }
                // props byte and dictionary size, then the raw stream
                let props = &payload[4..4 + LZMA_PROPS_SIZE];
                let mut input = props.chain(&payload[4 + props_size..]);
                let options = decompress::Options {
                    unpacked_size: decompress::UnpackedSize::UseProvided(Some(size)),
                    ..Default::default()
                };
                let mut out = output_buffer(size);
                lzma_rs::lzma_decompress_with_options(&mut input, &mut out, &options)
                    .map_err(|err| SrpackError::format(format!("corrupt LZMA stream: {}", err)))?;
                Ok(out)
            }
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = SrpackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "store" | "stored" | "none" => Ok(Self::Store),
            "deflate" | "zip" => Ok(Self::Deflate),
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            "lzma" => Ok(Self::Lzma),
            other => Err(SrpackError::unsupported_method(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_like(len: usize) -> Vec<u8> {
        (0..len).map(|i| if (i / 37) % 2 == 0 { 0xFF } else { 0x00 }).collect()
    }

    /// `b"logic-1-1 "` twelve times, as the reference encoders write it.
    fn reference_text() -> Vec<u8> {
        b"logic-1-1 ".repeat(12)
    }

    /// libbzip2 stream, block size 900k.
    const REFERENCE_BZIP2: [u8; 53] = [
        0x42, 0x5A, 0x68, 0x39, 0x31, 0x41, 0x59, 0x26, 0x53, 0x59, 0xBA, 0x0E,
        0x99, 0xDF, 0x00, 0x00, 0x35, 0x99, 0x00, 0x40, 0x02, 0x20, 0x00, 0x08,
        0xA4, 0xA0, 0x00, 0x31, 0x0C, 0x08, 0x0A, 0x54, 0x01, 0x91, 0x68, 0xB4,
        0x2E, 0x17, 0x8B, 0xA5, 0xD2, 0xF1, 0x7C, 0x5D, 0xC9, 0x14, 0xE1, 0x42,
        0x42, 0xE8, 0x3A, 0x67, 0x7C,
    ];

    /// liblzma raw LZMA1 stream in method 14 framing, with an end marker.
    const REFERENCE_LZMA: [u8; 32] = [
        0x09, 0x04, 0x05, 0x00, 0x5D, 0x00, 0x00, 0x01, 0x00, 0x00, 0x36, 0x1B,
        0xC9, 0x19, 0xDF, 0x08, 0x1C, 0xF5, 0x05, 0xB5, 0x1A, 0xA8, 0x11, 0x0D,
        0xE6, 0xCB, 0xFF, 0xFF, 0x8F, 0x70, 0x80, 0x00,
    ];

    #[test]
    fn test_method_ids() {
        for codec in Codec::ALL {
            assert_eq!(Codec::from_zip_method(codec.zip_method()), Some(codec));
        }
        assert_eq!(Codec::from_zip_method(99), None);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("deflate".parse::<Codec>().unwrap(), Codec::Deflate);
        assert_eq!("BZ2".parse::<Codec>().unwrap(), Codec::Bzip2);
        assert_eq!("lzma".parse::<Codec>().unwrap(), Codec::Lzma);
        assert_eq!("none".parse::<Codec>().unwrap(), Codec::Store);
        assert!("zstd".parse::<Codec>().is_err());
        assert_eq!(Codec::Bzip2.to_string(), "bzip2");
        assert_eq!(Codec::Deflate.archive_tag(), "zip");
    }

    #[test]
    fn test_codec_roundtrip() {
        let data = capture_like(4096);
        for codec in Codec::ALL {
            let payload = codec.compress(&data).unwrap();
            let restored = codec.decompress(&payload, data.len() as u64).unwrap();
            assert_eq!(restored, data, "{codec}");
        }
    }

    #[test]
    fn test_decode_reference_streams() {
        let text = reference_text();
        assert_eq!(Codec::Bzip2.decompress(&REFERENCE_BZIP2, 120).unwrap(), text);
        assert_eq!(Codec::Lzma.decompress(&REFERENCE_LZMA, 120).unwrap(), text);
    }

    #[test]
    fn test_written_streams_are_standard() {
        let data = capture_like(4096);

        let payload = Codec::Bzip2.compress(&data).unwrap();
        assert_eq!(&payload[..4], b"BZh9");
        let mut restored = Vec::new();
        BzDecoder::new(payload.as_slice())
            .read_to_end(&mut restored)
            .unwrap();
        assert_eq!(restored, data);

        // Rebuild a `.lzma` file around the raw stream and decode it from
        // its own header.
        let payload = Codec::Lzma.compress(&data).unwrap();
        let mut alone = payload[4..4 + LZMA_PROPS_SIZE].to_vec();
        alone.extend_from_slice(&(data.len() as u64).to_le_bytes());
        alone.extend_from_slice(&payload[4 + LZMA_PROPS_SIZE..]);
        let mut restored = Vec::new();
        lzma_rs::lzma_decompress(&mut alone.as_slice(), &mut restored).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_corrupt_streams_rejected() {
        let mut bzip2 = REFERENCE_BZIP2;
        bzip2[20] ^= 0x55;
        assert!(Codec::Bzip2.decompress(&bzip2, 120).is_err());
        assert!(Codec::Lzma.decompress(&REFERENCE_LZMA[..12], 120).is_err());
    }

    #[test]
    fn test_lzma_framing() {
        let payload = Codec::Lzma.compress(&capture_like(1024)).unwrap();
        assert_eq!(&payload[..2], &LZMA_SDK_VERSION);
        assert_eq!(u16::from_le_bytes([payload[2], payload[3]]), 5);
    }

    #[test]
    fn test_lzma_truncated_header() {
        assert!(Codec::Lzma.decompress(&[16, 4, 5], 10).is_err());
        assert!(Codec::Lzma.decompress(&[16, 4, 5, 0, 0x5D], 10).is_err());
    }
}
