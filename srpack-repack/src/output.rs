//! Output writers.
//!
//! Each run opens its outputs once, before the first segment, and appends
//! to them segment by segment:
//!
//! - [`ArchiveOutputs`]: one ZIP container per codec, starting with the
//!   `version` and `metadata` entries (both stored);
//! - [`RawOutputs`]: plain files, one per output slot when splitting or a
//!   single concatenated file when merging.

use crate::engine::Direction;
use crate::report::OutputReport;
use srpack_archive::{ArchiveSink, ArchiveSummary, Codec, ZipWriter};
use srpack_core::bitplane::BitStream;
use srpack_core::error::{Result, SrpackError};
use srpack_core::segment::{segment_entry_name, stream_entry_name};
use srpack_core::{ChannelMap, Metadata};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Data of one segment after transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentData {
    /// One bit-plane per output slot, in slot order.
    Streams(Vec<(usize, BitStream)>),
    /// Interleaved sample words.
    Interleaved(Vec<u8>),
}

/// A transformed segment ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedSegment {
    /// Segment id.
    pub id: u64,
    /// Output data.
    pub data: SegmentData,
}

impl TransformedSegment {
    /// Total payload bytes.
    pub fn len(&self) -> usize {
        match &self.data {
            SegmentData::Streams(streams) => streams.iter().map(|(_, s)| s.len()).sum(),
            SegmentData::Interleaved(blob) => blob.len(),
        }
    }

    /// Whether the segment carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Destination of transformed segments.
pub trait OutputWriter {
    /// Append one segment.
    fn write_segment(&mut self, segment: &TransformedSegment) -> Result<()>;

    /// Flush and close all outputs.
    fn finish(&mut self) -> Result<Vec<OutputReport>>;

    /// Close and delete all outputs after a failed run.
    fn abort(&mut self) -> Result<()>;
}

/// Append `.suffix` to a path without touching its extension.
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Delete an output file, ignoring one that is already gone.
fn remove_output(path: &Path) -> Result<()> {
    warn!(path = %path.display(), "removing unfinished output");
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Archive path for `codec`: `<base>.<tag>.<ext>`.
pub fn archive_path(base: &Path, codec: Codec, direction: Direction) -> PathBuf {
    with_suffix(
        base,
        &format!(".{}.{}", codec.archive_tag(), direction.archive_extension()),
    )
}

/// Raw file path for an output slot (`<base>-<slot>.raw`) or for the
/// merged stream (`<base>.raw`).
pub fn raw_path(base: &Path, slot: Option<usize>) -> PathBuf {
    match slot {
        Some(slot) => with_suffix(base, &format!("-{}.raw", slot)),
        None => with_suffix(base, ".raw"),
    }
}

struct ArchiveVariant {
    codec: Codec,
    path: PathBuf,
    writer: ZipWriter<BufWriter<File>>,
}

impl ArchiveVariant {
    fn write(&mut self, capturefile: &str, segment: &TransformedSegment) -> Result<()> {
        match &segment.data {
            SegmentData::Streams(streams) => {
                for (slot, stream) in streams {
                    let name = stream_entry_name(capturefile, segment.id, *slot);
                    self.writer.add_entry(&name, stream, self.codec)?;
                }
            }
            SegmentData::Interleaved(blob) => {
                let name = segment_entry_name(capturefile, segment.id);
                self.writer.add_entry(&name, blob, self.codec)?;
            }
        }
        Ok(())
    }
}

/// One archive per codec.
pub struct ArchiveOutputs {
    capturefile: String,
    variants: Vec<ArchiveVariant>,
    parallel: bool,
}

impl ArchiveOutputs {
    /// Create the archives and write their `version` and `metadata` entries.
    pub fn create(
        base: &Path,
        direction: Direction,
        codecs: &[Codec],
        metadata: &Metadata,
        parallel: bool,
    ) -> Result<Self> {
        let capturefile = metadata.capturefile()?.to_string();
        let version = direction.output_layout().version().to_string();
        let metadata_text = metadata.serialize();

        let mut outputs = Self {
            capturefile,
            variants: Vec::with_capacity(codecs.len()),
            parallel,
        };
        for &codec in codecs {
            let path = archive_path(base, codec, direction);
            if let Err(err) = outputs.open_variant(codec, path, &version, &metadata_text) {
                outputs.abort()?;
                return Err(err);
            }
        }
        Ok(outputs)
    }

    fn open_variant(
        &mut self,
        codec: Codec,
        path: PathBuf,
        version: &str,
        metadata_text: &str,
    ) -> Result<()> {
        info!(path = %path.display(), %codec, "creating output archive");
        let writer = ZipWriter::create(&path)?;
        let variant = self.variants.len();
        self.variants.push(ArchiveVariant {
            codec,
            path,
            writer,
        });
        let writer = &mut self.variants[variant].writer;
        writer.add_entry("version", version.as_bytes(), Codec::Store)?;
        writer.add_entry("metadata", metadata_text.as_bytes(), Codec::Store)?;
        Ok(())
    }

    /// Paths of the archives being written, in codec order.
    pub fn paths(&self) -> Vec<&Path> {
        self.variants.iter().map(|v| v.path.as_path()).collect()
    }
}

impl OutputWriter for ArchiveOutputs {
    fn write_segment(&mut self, segment: &TransformedSegment) -> Result<()> {
        let capturefile = self.capturefile.as_str();

        #[cfg(feature = "parallel")]
        {
            if self.parallel {
                return self
                    .variants
                    .par_iter_mut()
                    .try_for_each(|variant| variant.write(capturefile, segment));
            }
        }

        debug!(segment = segment.id, parallel = self.parallel, "writing segment");
        for variant in &mut self.variants {
            variant.write(capturefile, segment)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<OutputReport>> {
        let mut reports = Vec::with_capacity(self.variants.len());
        for variant in &mut self.variants {
            let summary = variant.writer.finish()?;
            info!(
                path = %variant.path.display(),
                entries = summary.entries,
                compressed = summary.compressed_size,
                "finished output archive"
            );
            reports.push(OutputReport::new(
                variant.codec.name(),
                variant.path.clone(),
                summary,
            ));
        }
        Ok(reports)
    }

    fn abort(&mut self) -> Result<()> {
        let mut result = Ok(());
        for variant in self.variants.drain(..) {
            let ArchiveVariant {
                path, mut writer, ..
            } = variant;
            writer.abort();
            drop(writer);
            result = result.and(remove_output(&path));
        }
        result
    }
}

struct RawFile {
    path: PathBuf,
    writer: BufWriter<File>,
    summary: ArchiveSummary,
}

impl RawFile {
    fn create(path: PathBuf) -> Result<Self> {
        info!(path = %path.display(), "creating raw output");
        Ok(Self {
            writer: BufWriter::new(File::create(&path)?),
            path,
            summary: ArchiveSummary::default(),
        })
    }

    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.summary.entries += 1;
        self.summary.size += data.len() as u64;
        self.summary.compressed_size += data.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<OutputReport> {
        self.writer.flush()?;
        Ok(OutputReport::new("raw", self.path.clone(), self.summary))
    }
}

/// Plain concatenated output files.
pub struct RawOutputs {
    streams: BTreeMap<usize, RawFile>,
    merged: Option<RawFile>,
}

impl RawOutputs {
    /// Create (truncate) the raw files for a run.
    ///
    /// Splitting creates one file per active slot of `map`; merging
    /// creates a single file.
    pub fn create(base: &Path, direction: Direction, map: &ChannelMap) -> Result<Self> {
        match direction {
            Direction::Split => {
                let mut outputs = Self {
                    streams: BTreeMap::new(),
                    merged: None,
                };
                for (slot, probe) in map.active() {
                    debug!(slot, probe = %probe.name, "raw stream output");
                    match RawFile::create(raw_path(base, Some(slot))) {
                        Ok(file) => {
                            outputs.streams.insert(slot, file);
                        }
                        Err(err) => {
                            outputs.abort()?;
                            return Err(err);
                        }
                    }
                }
                Ok(outputs)
            }
            Direction::Merge => Ok(Self {
                streams: BTreeMap::new(),
                merged: Some(RawFile::create(raw_path(base, None))?),
            }),
        }
    }
}

impl OutputWriter for RawOutputs {
    fn write_segment(&mut self, segment: &TransformedSegment) -> Result<()> {
        match &segment.data {
            SegmentData::Streams(streams) => {
                for (slot, stream) in streams {
                    let file = self.streams.get_mut(slot).ok_or_else(|| {
                        SrpackError::format(format!("no raw output for slot {}", slot))
                    })?;
                    file.append(stream)?;
                }
            }
            SegmentData::Interleaved(blob) => {
                let file = self
                    .merged
                    .as_mut()
                    .ok_or_else(|| SrpackError::format("no raw output for merged segments"))?;
                file.append(blob)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<OutputReport>> {
        let mut reports = Vec::with_capacity(self.streams.len() + 1);
        for file in self.streams.values_mut().chain(self.merged.as_mut()) {
            reports.push(file.finish()?);
        }
        Ok(reports)
    }

    fn abort(&mut self) -> Result<()> {
        let files = std::mem::take(&mut self.streams)
            .into_values()
            .chain(self.merged.take());
        let mut result = Ok(());
        for RawFile { path, writer, .. } in files {
            drop(writer);
            result = result.and(remove_output(&path));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srpack_archive::{ArchiveSource, ZipReader};

    fn metadata() -> Metadata {
        Metadata::parse("[global]\n\n[device 1]\ncapturefile=logic-1\nunitsize=1\nprobe1=A\nprobe3=C\n")
            .unwrap()
    }

    #[test]
    fn test_output_names() {
        let base = Path::new("dir/run.sr");
        assert_eq!(
            archive_path(base, Codec::Bzip2, Direction::Split),
            Path::new("dir/run.sr.bz2.sr2")
        );
        assert_eq!(
            archive_path(base, Codec::Deflate, Direction::Merge),
            Path::new("dir/run.sr.zip.sr")
        );
        assert_eq!(raw_path(base, Some(3)), Path::new("dir/run.sr-3.raw"));
        assert_eq!(raw_path(base, None), Path::new("dir/run.sr.raw"));
    }

    #[test]
    fn test_archive_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.sr");
        let meta = metadata();

        let mut outputs = ArchiveOutputs::create(
            &base,
            Direction::Split,
            &[Codec::Deflate, Codec::Lzma],
            &meta,
            false,
        )
        .unwrap();
        let segment = TransformedSegment {
            id: 1,
            data: SegmentData::Streams(vec![
                (1, BitStream::new(vec![0xF0; 64])),
                (3, BitStream::new(vec![0x0F; 64])),
            ]),
        };
        assert_eq!(segment.len(), 128);
        outputs.write_segment(&segment).unwrap();
        let reports = outputs.finish().unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "deflate");
        assert_eq!(reports[0].entries, 4);

        let mut zip = ZipReader::open(&reports[1].path).unwrap();
        assert_eq!(zip.read_entry("version").unwrap(), b"3");
        assert_eq!(zip.read_entry("metadata").unwrap(), meta.serialize().as_bytes());
        assert_eq!(zip.read_entry("logic-1-1-3").unwrap(), vec![0x0F; 64]);
        assert_eq!(zip.entry("version").unwrap().codec(), Some(Codec::Store));
    }

    #[test]
    fn test_raw_outputs_split() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.sr");
        let map = ChannelMap::identity(&metadata()).unwrap();

        let mut outputs = RawOutputs::create(&base, Direction::Split, &map).unwrap();
        for id in 1..=2 {
            let segment = TransformedSegment {
                id,
                data: SegmentData::Streams(vec![
                    (1, BitStream::new(vec![id as u8; 4])),
                    (3, BitStream::new(vec![0xAA; 2])),
                ]),
            };
            outputs.write_segment(&segment).unwrap();
        }
        let reports = outputs.finish().unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(
            std::fs::read(raw_path(&base, Some(1))).unwrap(),
            [1, 1, 1, 1, 2, 2, 2, 2]
        );
        assert_eq!(std::fs::read(raw_path(&base, Some(3))).unwrap(), [0xAA; 4]);
        assert_eq!(reports[1].size, 4);

        let stray = TransformedSegment {
            id: 3,
            data: SegmentData::Interleaved(vec![0]),
        };
        assert!(outputs.write_segment(&stray).is_err());
    }

    #[test]
    fn test_raw_outputs_merge() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.sr");
        let map = ChannelMap::identity(&metadata()).unwrap();

        let mut outputs = RawOutputs::create(&base, Direction::Merge, &map).unwrap();
        for id in 1..=3u8 {
            let segment = TransformedSegment {
                id: id as u64,
                data: SegmentData::Interleaved(vec![id; 8]),
            };
            outputs.write_segment(&segment).unwrap();
        }
        let reports = outputs.finish().unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].entries, 3);
        assert_eq!(std::fs::read(raw_path(&base, None)).unwrap().len(), 24);
    }

    #[test]
    fn test_abort_removes_archives() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.sr");
        let meta = metadata();

        let mut outputs = ArchiveOutputs::create(
            &base,
            Direction::Split,
            &[Codec::Deflate, Codec::Bzip2],
            &meta,
            false,
        )
        .unwrap();
        let paths: Vec<PathBuf> = outputs.paths().into_iter().map(Path::to_path_buf).collect();
        assert!(paths.iter().all(|p| p.is_file()));

        let segment = TransformedSegment {
            id: 1,
            data: SegmentData::Streams(vec![(1, BitStream::new(vec![0x3C; 32]))]),
        };
        outputs.write_segment(&segment).unwrap();
        outputs.abort().unwrap();

        assert!(paths.iter().all(|p| !p.exists()));
        assert!(outputs.finish().unwrap().is_empty());
    }

    #[test]
    fn test_abort_removes_raw_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("run.sr");
        let map = ChannelMap::identity(&metadata()).unwrap();

        let mut outputs = RawOutputs::create(&base, Direction::Split, &map).unwrap();
        let segment = TransformedSegment {
            id: 1,
            data: SegmentData::Streams(vec![(1, BitStream::new(vec![1; 4]))]),
        };
        outputs.write_segment(&segment).unwrap();
        outputs.abort().unwrap();

        assert!(!raw_path(&base, Some(1)).exists());
        assert!(!raw_path(&base, Some(3)).exists());
    }
}
