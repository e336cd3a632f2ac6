//! # srpack Archive
//!
//! The archive store used by srpack: named byte blobs in a ZIP container,
//! each entry compressed with its own codec.
//!
//! - [`codec`]: store, deflate, bzip2 and LZMA entry codecs
//! - [`store`]: the [`ArchiveSource`] / [`ArchiveSink`] traits and an
//!   in-memory source
//! - [`zip`]: ZIP reader and writer
//!
//! ## Example
//!
//! ```rust
//! use srpack_archive::{ArchiveSink, ArchiveSource, Codec, ZipReader, ZipWriter};
//! use std::io::Cursor;
//!
//! let mut output = Vec::new();
//! {
//!     let mut zip = ZipWriter::new(&mut output);
//!     zip.add_entry("version", b"3", Codec::Store).unwrap();
//!     zip.add_entry("logic-1-1-1", &[0xAA; 512], Codec::Bzip2).unwrap();
//!     zip.finish().unwrap();
//! }
//!
//! let mut zip = ZipReader::new(Cursor::new(output)).unwrap();
//! assert_eq!(zip.read_entry("version").unwrap(), b"3");
//! assert_eq!(zip.read_entry("logic-1-1-1").unwrap(), vec![0xAA; 512]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod store;
pub mod zip;

// Re-exports
pub use codec::Codec;
pub use store::{ArchiveSink, ArchiveSource, ArchiveSummary, EntryInfo, MemoryArchive};
pub use zip::{ZipReader, ZipWriter};
