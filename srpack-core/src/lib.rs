//! # srpack Core
//!
//! Core components for repacking logic-analyzer capture archives.
//!
//! - [`metadata`]: the archive's INI-like capture description
//! - [`channel_map`]: slot to probe correspondence, identity or packed
//! - [`bitplane`]: transpose between sample words and per-channel streams
//! - [`segment`]: grouping of archive entries into capture segments
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ Metadata     │──▶│ ChannelMap   │──▶│ SegmentAssembler │
//! │ (metadata)   │   │ identity /   │   │ entry names ──▶  │
//! └──────────────┘   │ packed       │   │ segments         │
//!                    └──────┬───────┘   └────────┬─────────┘
//!                           ▼                    ▼
//!                    ┌──────────────────────────────────┐
//!                    │ bitplane: deinterleave/interleave │
//!                    └──────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use srpack_core::bitplane::{deinterleave, interleave};
//!
//! let words = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];
//! let planes = deinterleave(&words, 1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
//! assert_eq!(&planes[&1][..], &[0x80]);
//! assert_eq!(&planes[&8][..], &[0x01]);
//!
//! assert_eq!(interleave(&planes, 1).unwrap(), words);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitplane;
pub mod channel_map;
pub mod error;
pub mod metadata;
pub mod segment;

// Re-exports for convenience
pub use bitplane::{BitPlanes, BitStream, deinterleave, interleave, interleave_mapped};
pub use channel_map::{ChannelMap, Slot};
pub use error::{Result, SrpackError};
pub use metadata::{Metadata, MetadataLine, Probe, Section};
pub use segment::{EntryName, Layout, Segment, SegmentAssembler, SegmentSource};
