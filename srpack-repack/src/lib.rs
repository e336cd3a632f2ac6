//! # srpack Repack
//!
//! Converts logic-analyzer capture archives between the interleaved layout
//! (format version 2, one blob of sample words per segment) and the split
//! layout (format version 3, one bit-plane stream per probe and segment).
//!
//! The direction is chosen by the input's `version` entry. Output is one
//! sibling archive per codec, or plain `.raw` files.
//!
//! ## Example
//!
//! ```rust,no_run
//! use srpack_archive::Codec;
//! use srpack_repack::{RepackEngine, RepackOptions};
//! use std::path::Path;
//!
//! let options = RepackOptions::new().remap(true).codecs([Codec::Lzma]);
//! let report = RepackEngine::new(options).run(Path::new("capture.sr")).unwrap();
//! println!("{}", report);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod options;
pub mod output;
pub mod report;

// Re-exports
pub use engine::{Direction, Plan, Progress, RepackEngine, SegmentInput, Stage};
pub use options::RepackOptions;
pub use output::{ArchiveOutputs, OutputWriter, RawOutputs, SegmentData, TransformedSegment};
pub use report::{OutputReport, Report};
