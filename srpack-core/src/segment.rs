//! Grouping of archive entries into logical capture segments.
//!
//! Capture data lives in entries named after the `capturefile` base name:
//!
//! - interleaved layout (format version 2): `<capturefile>-<segment>`, one
//!   blob of sample words per segment;
//! - split layout (format version 3): `<capturefile>-<segment>-<stream>`,
//!   one bit-plane stream per entry.
//!
//! Stream indices name probes of the archive's own metadata; they are
//! translated through the active [`ChannelMap`] into the slot the stream
//! occupies in the layout being produced.

use crate::channel_map::ChannelMap;
use crate::error::{Result, SrpackError};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Format version of archives with one interleaved blob per segment.
pub const INTERLEAVED_VERSION: u32 = 2;

/// Format version of archives with one stream per probe and segment.
pub const SPLIT_VERSION: u32 = 3;

/// Storage layout of capture entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `<capturefile>-<segment>` holding sample words.
    Interleaved,
    /// `<capturefile>-<segment>-<stream>` holding one bit-plane each.
    Split,
}

impl Layout {
    /// Layout declared by a format version.
    pub fn from_version(version: u32) -> Result<Self> {
        match version {
            INTERLEAVED_VERSION => Ok(Self::Interleaved),
            SPLIT_VERSION => Ok(Self::Split),
            other => Err(SrpackError::format(format!(
                "unsupported format version {}",
                other
            ))),
        }
    }

    /// Parse the contents of a `version` entry.
    pub fn from_version_entry(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| SrpackError::format("version entry is not ASCII"))?;
        let version = text
            .trim()
            .parse::<u32>()
            .map_err(|_| SrpackError::format(format!("invalid version '{}'", text.trim())))?;
        Self::from_version(version)
    }

    /// Format version written for this layout.
    pub fn version(self) -> u32 {
        match self {
            Self::Interleaved => INTERLEAVED_VERSION,
            Self::Split => SPLIT_VERSION,
        }
    }

    /// The other layout.
    pub fn opposite(self) -> Self {
        match self {
            Self::Interleaved => Self::Split,
            Self::Split => Self::Interleaved,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interleaved => write!(f, "interleaved (v{})", INTERLEAVED_VERSION),
            Self::Split => write!(f, "split (v{})", SPLIT_VERSION),
        }
    }
}

/// Parsed capture entry name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryName {
    /// Segment id.
    pub segment: u64,
    /// Stream index, split layout only.
    pub stream: Option<usize>,
}

impl EntryName {
    /// Parse `name` against the grammar of `layout`.
    ///
    /// Returns `Ok(None)` for entries that do not start with `capturefile`.
    pub fn parse(name: &str, capturefile: &str, layout: Layout) -> Result<Option<Self>> {
        let Some(rest) = name.strip_prefix(capturefile) else {
            return Ok(None);
        };

        let mut parts = rest
            .strip_prefix('-')
            .map(|r| r.split('-').collect::<Vec<_>>())
            .unwrap_or_default();

        let expected = match layout {
            Layout::Interleaved => "expected <capturefile>-<segment>",
            Layout::Split => "expected <capturefile>-<segment>-<stream>",
        };
        let arity = match layout {
            Layout::Interleaved => 1,
            Layout::Split => 2,
        };
        if parts.len() != arity {
            return Err(SrpackError::malformed_entry(name, expected));
        }

        let stream = if layout == Layout::Split {
            let raw = parts.pop().unwrap_or_default();
            let stream: usize =
                parse_number(raw).ok_or_else(|| SrpackError::malformed_entry(name, expected))?;
            if stream == 0 {
                return Err(SrpackError::malformed_entry(name, "stream indices start at 1"));
            }
            Some(stream)
        } else {
            None
        };

        let segment =
            parse_number(parts[0]).ok_or_else(|| SrpackError::malformed_entry(name, expected))?;

        Ok(Some(Self { segment, stream }))
    }
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Name of an interleaved segment entry.
pub fn segment_entry_name(capturefile: &str, segment: u64) -> String {
    format!("{}-{}", capturefile, segment)
}

/// Name of a split stream entry.
pub fn stream_entry_name(capturefile: &str, segment: u64, stream: usize) -> String {
    format!("{}-{}-{}", capturefile, segment, stream)
}

/// Where the data of a segment is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentSource {
    /// A single entry of sample words.
    Interleaved(String),
    /// Stream entries keyed by the slot they occupy in the output layout.
    Split(BTreeMap<usize, String>),
}

/// A logical capture segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment id from the entry name.
    pub id: u64,
    /// Entries holding the data.
    pub source: SegmentSource,
}

impl Segment {
    /// Names of all entries backing this segment.
    pub fn entry_names(&self) -> Vec<&str> {
        match &self.source {
            SegmentSource::Interleaved(name) => vec![name.as_str()],
            SegmentSource::Split(streams) => streams.values().map(String::as_str).collect(),
        }
    }
}

/// Groups capture entries into segments.
#[derive(Debug, Clone, Copy)]
pub struct SegmentAssembler<'a> {
    capturefile: &'a str,
    layout: Layout,
    map: &'a ChannelMap,
}

impl<'a> SegmentAssembler<'a> {
    /// Create an assembler for archives of `layout`.
    pub fn new(capturefile: &'a str, layout: Layout, map: &'a ChannelMap) -> Self {
        Self {
            capturefile,
            layout,
            map,
        }
    }

    /// Build segments from entry names, ordered by segment id.
    ///
    /// Entries not starting with the capture file name are ignored. Split
    /// streams whose index names no active probe are skipped.
    pub fn assemble<'n, I>(&self, names: I) -> Result<Vec<Segment>>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let mut segments: BTreeMap<u64, SegmentSource> = BTreeMap::new();

        for name in names {
            let Some(parsed) = EntryName::parse(name, self.capturefile, self.layout)? else {
                continue;
            };

            match parsed.stream {
                None => {
                    debug!(name, segment = parsed.segment, "capture segment");
                    if segments
                        .insert(parsed.segment, SegmentSource::Interleaved(name.to_string()))
                        .is_some()
                    {
                        return Err(SrpackError::malformed_entry(name, "duplicate segment"));
                    }
                }
                Some(stream) => {
                    let Some(slot) = self.map.position_of(stream) else {
                        warn!(name, stream, "stream has no active probe, skipping");
                        continue;
                    };
                    debug!(name, segment = parsed.segment, stream, slot, "capture stream");

                    let source = segments
                        .entry(parsed.segment)
                        .or_insert_with(|| SegmentSource::Split(BTreeMap::new()));
                    if let SegmentSource::Split(streams) = source {
                        if streams.insert(slot, name.to_string()).is_some() {
                            return Err(SrpackError::malformed_entry(name, "duplicate stream"));
                        }
                    }
                }
            }
        }

        Ok(segments
            .into_iter()
            .map(|(id, source)| Segment { id, source })
            .collect())
    }
}
