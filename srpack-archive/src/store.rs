//! Archive store abstraction.

use crate::codec::Codec;
use oxiarc_core::Crc32;
use srpack_core::error::{Result, SrpackError};

/// Metadata of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry name.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Stored (compressed) size in bytes.
    pub compressed_size: u64,
    /// ZIP compression method id.
    pub method: u16,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
}

impl EntryInfo {
    /// Codec of this entry, if supported.
    pub fn codec(&self) -> Option<Codec> {
        Codec::from_zip_method(self.method)
    }

    /// Space savings as a percentage.
    pub fn space_savings(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            (1.0 - self.compressed_size as f64 / self.size as f64) * 100.0
        }
    }
}

/// Totals of a finished archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of entries written.
    pub entries: usize,
    /// Sum of uncompressed entry sizes.
    pub size: u64,
    /// Sum of stored entry sizes.
    pub compressed_size: u64,
}

impl ArchiveSummary {
    /// Account for one more entry.
    pub fn add(&mut self, entry: &EntryInfo) {
        self.entries += 1;
        self.size += entry.size;
        self.compressed_size += entry.compressed_size;
    }
}

/// Random-access source of named entries.
pub trait ArchiveSource {
    /// All entries in storage order.
    fn entries(&self) -> &[EntryInfo];

    /// Read and decompress an entry by name.
    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Look up an entry by name.
    fn entry(&self, name: &str) -> Option<&EntryInfo> {
        self.entries().iter().find(|e| e.name == name)
    }

    /// Sum of the stored sizes of all entries.
    fn compressed_size(&self) -> u64 {
        self.entries().iter().map(|e| e.compressed_size).sum()
    }
}

/// Append-only destination for named entries.
pub trait ArchiveSink {
    /// Compress and append an entry.
    fn add_entry(&mut self, name: &str, data: &[u8], codec: Codec) -> Result<EntryInfo>;

    /// Write trailing structures. Further calls return the same summary.
    fn finish(&mut self) -> Result<ArchiveSummary>;
}

/// An in-memory archive of stored entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<EntryInfo>,
    data: Vec<Vec<u8>>,
}

impl MemoryArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style.
    pub fn with_entry(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        let info = EntryInfo {
            size: data.len() as u64,
            compressed_size: data.len() as u64,
            method: Codec::Store.zip_method(),
            crc32: Crc32::compute(&data),
            name,
        };
        match self.entries.iter().position(|e| e.name == info.name) {
            Some(i) => {
                self.entries[i] = info;
                self.data[i] = data;
            }
            None => {
                self.entries.push(info);
                self.data.push(data);
            }
        }
    }
}

impl ArchiveSource for MemoryArchive {
    fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(|i| self.data[i].clone())
            .ok_or_else(|| SrpackError::entry_not_found(name))
    }
}
