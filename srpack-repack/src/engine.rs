//! The repack state machine.
//!
//! A run walks through these stages:
//!
//! ```text
//! ReadMetadata -> [Remap] -> ResolveVersion -> ForEachSegment -> WriteOutputs -> Report
//! ```
//!
//! The first three stages build an immutable [`Plan`]: parsed metadata, the
//! channel map and the segment list. Segments are then read, transformed
//! and appended to the outputs one at a time (or one batch at a time with
//! the `parallel` feature). Any error aborts the run.

use crate::options::RepackOptions;
use crate::output::{ArchiveOutputs, OutputWriter, RawOutputs, SegmentData, TransformedSegment};
use crate::report::{OutputReport, Report};
use serde::Serialize;
use srpack_archive::{ArchiveSource, Codec, ZipReader};
use srpack_core::bitplane::{BitPlanes, BitStream, deinterleave, interleave_mapped};
use srpack_core::error::{Result, SrpackError};
use srpack_core::segment::{Layout, Segment, SegmentAssembler, SegmentSource};
use srpack_core::{ChannelMap, Metadata};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Name of the format version entry.
pub const VERSION_ENTRY: &str = "version";

/// Name of the metadata entry.
pub const METADATA_ENTRY: &str = "metadata";

/// Conversion performed by a run, decided by the input's format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Interleaved (version 2) to split bit-planes (version 3).
    Split,
    /// Split bit-planes (version 3) back to interleaved (version 2).
    Merge,
}

impl Direction {
    /// Direction converting archives of `layout`.
    pub fn from_layout(layout: Layout) -> Self {
        match layout {
            Layout::Interleaved => Self::Split,
            Layout::Split => Self::Merge,
        }
    }

    /// Layout of the input archive.
    pub fn input_layout(self) -> Layout {
        match self {
            Self::Split => Layout::Interleaved,
            Self::Merge => Layout::Split,
        }
    }

    /// Layout of the written archives.
    pub fn output_layout(self) -> Layout {
        self.input_layout().opposite()
    }

    /// File extension of written archives.
    pub fn archive_extension(self) -> &'static str {
        match self {
            Self::Split => "sr2",
            Self::Merge => "sr",
        }
    }

    /// Codecs written when none are configured.
    pub fn default_codecs(self) -> &'static [Codec] {
        match self {
            Self::Split => &[Codec::Deflate, Codec::Bzip2, Codec::Lzma],
            Self::Merge => &[Codec::Deflate],
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Split => "split",
            Self::Merge => "merge",
        };
        write!(
            f,
            "{} (v{} -> v{})",
            name,
            self.input_layout().version(),
            self.output_layout().version()
        )
    }
}

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parse the `metadata` entry.
    ReadMetadata,
    /// Renumber probes into a packed channel map.
    Remap,
    /// Read the `version` entry and group capture entries.
    ResolveVersion,
    /// Transform and write every segment.
    ForEachSegment,
    /// Close the outputs.
    WriteOutputs,
    /// Summarise sizes.
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadMetadata => "reading metadata",
            Self::Remap => "remapping probes",
            Self::ResolveVersion => "resolving version",
            Self::ForEachSegment => "processing segments",
            Self::WriteOutputs => "writing outputs",
            Self::Report => "reporting",
        })
    }
}

/// Progress event passed to [`RepackEngine::run_with_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A stage was entered.
    Stage(Stage),
    /// The segment at `index` (0-based, of `total`) was written.
    SegmentDone {
        /// Segment id.
        id: u64,
        /// Position in processing order.
        index: usize,
        /// Number of segments in the run.
        total: usize,
    },
}

/// Everything a run needs once the input has been inspected.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Conversion to perform.
    pub direction: Direction,
    /// Capture entry base name.
    pub capturefile: String,
    /// Word width of the input's interleaved data.
    pub source_unitsize: usize,
    /// Slot assignment of the output layout.
    pub map: ChannelMap,
    /// Metadata written to output archives.
    pub metadata: Metadata,
    /// Segments in id order.
    pub segments: Vec<Segment>,
}

/// Input of one segment as read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentInput {
    /// Sample words of an interleaved segment.
    Interleaved(Vec<u8>),
    /// Streams of a split segment keyed by output slot.
    Split(BitPlanes),
}

impl Plan {
    /// Read the entries backing `segment`.
    pub fn read_segment<S: ArchiveSource>(
        &self,
        source: &mut S,
        segment: &Segment,
    ) -> Result<SegmentInput> {
        match &segment.source {
            SegmentSource::Interleaved(name) => {
                Ok(SegmentInput::Interleaved(source.read_entry(name)?))
            }
            SegmentSource::Split(streams) => {
                let mut planes = BitPlanes::new();
                for (&slot, name) in streams {
                    planes.insert(slot, BitStream::from(source.read_entry(name)?));
                }
                Ok(SegmentInput::Split(planes))
            }
        }
    }

    /// Transform one segment into the output layout.
    pub fn transform(&self, id: u64, input: SegmentInput) -> Result<TransformedSegment> {
        let data = match input {
            SegmentInput::Interleaved(blob) => {
                let mut planes =
                    deinterleave(&blob, self.source_unitsize, &self.map.source_indices())?;
                let streams: Vec<(usize, BitStream)> = self
                    .map
                    .active()
                    .filter_map(|(slot, probe)| {
                        let stream = planes.remove(&probe.index)?;
                        debug!(
                            segment = id,
                            slot,
                            probe = %probe.name,
                            bytes = stream.len(),
                            "extracted probe"
                        );
                        Some((slot, stream))
                    })
                    .collect();
                SegmentData::Streams(streams)
            }
            SegmentInput::Split(planes) => {
                let blob = interleave_mapped(&planes, &self.map)?;
                debug!(
                    segment = id,
                    streams = planes.len(),
                    bytes = blob.len(),
                    "merged streams"
                );
                SegmentData::Interleaved(blob)
            }
        };
        Ok(TransformedSegment { id, data })
    }
}

/// Converts capture archives between interleaved and split layouts.
#[derive(Debug, Clone, Default)]
pub struct RepackEngine {
    options: RepackOptions,
}

impl RepackEngine {
    /// Create an engine.
    pub fn new(options: RepackOptions) -> Self {
        Self { options }
    }

    /// Options of this engine.
    pub fn options(&self) -> &RepackOptions {
        &self.options
    }

    /// Repack the archive at `input`.
    pub fn run(&self, input: &Path) -> Result<Report> {
        self.run_with_progress(input, |_| {})
    }

    /// Repack the archive at `input`, reporting progress to `progress`.
    pub fn run_with_progress<F>(&self, input: &Path, progress: F) -> Result<Report>
    where
        F: FnMut(Progress),
    {
        info!(input = %input.display(), "opening capture archive");
        let mut source = ZipReader::open(input)?;
        self.repack(&mut source, input, progress)
    }

    /// Repack `source`, naming outputs after `input`.
    pub fn repack<S, F>(&self, source: &mut S, input: &Path, mut progress: F) -> Result<Report>
    where
        S: ArchiveSource,
        F: FnMut(Progress),
    {
        let plan = self.plan(source, &mut progress)?;

        progress(Progress::Stage(Stage::ForEachSegment));
        let base = self.options.output_base(input);
        if let Some(dir) = &self.options.output_dir {
            std::fs::create_dir_all(dir)?;
        }
        let mut outputs = self.open_outputs(&base, &plan)?;
        let written = match self.write_outputs(source, &plan, outputs.as_mut(), &mut progress) {
            Ok(written) => written,
            Err(err) => {
                warn!(error = %err, "run failed, discarding outputs");
                if let Err(cleanup) = outputs.abort() {
                    warn!(error = %cleanup, "could not remove every output");
                }
                return Err(err);
            }
        };

        progress(Progress::Stage(Stage::Report));
        let report = Report::new(
            input,
            plan.direction,
            self.options.remap,
            plan.segments.len(),
            source.compressed_size(),
            written,
        );
        for output in &report.outputs {
            info!(
                variant = %output.name,
                compressed = output.compressed_size,
                original = report.original_compressed_size,
                "output size"
            );
        }
        Ok(report)
    }

    /// Run the inspection stages and build the plan.
    pub fn plan<S, F>(&self, source: &mut S, progress: &mut F) -> Result<Plan>
    where
        S: ArchiveSource,
        F: FnMut(Progress),
    {
        progress(Progress::Stage(Stage::ReadMetadata));
        let metadata = read_metadata(source)?;
        let capturefile = metadata.capturefile()?.to_string();
        let source_unitsize = metadata.unitsize()?;
        info!(
            capturefile = %capturefile,
            unitsize = source_unitsize,
            probes = metadata.probe_count(),
            "read metadata"
        );

        let (map, metadata) = if self.options.remap {
            progress(Progress::Stage(Stage::Remap));
            let (map, packed) = ChannelMap::packed(&metadata)?;
            info!(
                unitsize = map.unitsize(),
                probes = ?map.source_indices(),
                "remapped probes"
            );
            (map, packed)
        } else {
            (ChannelMap::identity(&metadata)?, metadata)
        };

        progress(Progress::Stage(Stage::ResolveVersion));
        let layout = Layout::from_version_entry(&source.read_entry(VERSION_ENTRY)?)?;
        let direction = Direction::from_layout(layout);
        info!(%layout, %direction, "resolved format version");

        let names: Vec<String> = source.entries().iter().map(|e| e.name.clone()).collect();
        let segments = SegmentAssembler::new(&capturefile, layout, &map)
            .assemble(names.iter().map(String::as_str))?;
        if segments.is_empty() {
            warn!(capturefile = %capturefile, "archive holds no capture segments");
        }

        Ok(Plan {
            direction,
            capturefile,
            source_unitsize,
            map,
            metadata,
            segments,
        })
    }

    fn open_outputs(&self, base: &Path, plan: &Plan) -> Result<Box<dyn OutputWriter>> {
        if self.options.raw {
            return Ok(Box::new(RawOutputs::create(base, plan.direction, &plan.map)?));
        }
        let codecs = match &self.options.codecs {
            Some(codecs) => codecs.as_slice(),
            None => plan.direction.default_codecs(),
        };
        Ok(Box::new(ArchiveOutputs::create(
            base,
            plan.direction,
            codecs,
            &plan.metadata,
            self.options.use_parallel(),
        )?))
    }

    fn write_outputs<S, F>(
        &self,
        source: &mut S,
        plan: &Plan,
        outputs: &mut dyn OutputWriter,
        progress: &mut F,
    ) -> Result<Vec<OutputReport>>
    where
        S: ArchiveSource,
        F: FnMut(Progress),
    {
        self.process_segments(source, plan, outputs, progress)?;
        progress(Progress::Stage(Stage::WriteOutputs));
        outputs.finish()
    }

    fn batch_size(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            if self.options.use_parallel() {
                return rayon::current_num_threads().max(1);
            }
        }
        1
    }

    fn process_segments<S, F>(
        &self,
        source: &mut S,
        plan: &Plan,
        outputs: &mut dyn OutputWriter,
        progress: &mut F,
    ) -> Result<()>
    where
        S: ArchiveSource,
        F: FnMut(Progress),
    {
        let total = plan.segments.len();
        let batch_size = self.batch_size();

        for (batch_index, batch) in plan.segments.chunks(batch_size).enumerate() {
            let mut inputs = Vec::with_capacity(batch.len());
            for segment in batch {
                inputs.push((segment.id, plan.read_segment(source, segment)?));
            }

            for (offset, segment) in self.transform_batch(plan, inputs)?.iter().enumerate() {
                outputs.write_segment(segment)?;
                let index = batch_index * batch_size + offset;
                info!(
                    segment = segment.id,
                    bytes = segment.len(),
                    "segment {}/{} done",
                    index + 1,
                    total
                );
                progress(Progress::SegmentDone {
                    id: segment.id,
                    index,
                    total,
                });
            }
        }
        Ok(())
    }

    fn transform_batch(
        &self,
        plan: &Plan,
        inputs: Vec<(u64, SegmentInput)>,
    ) -> Result<Vec<TransformedSegment>> {
        #[cfg(feature = "parallel")]
        {
            if self.options.use_parallel() {
                return inputs
                    .into_par_iter()
                    .map(|(id, input)| plan.transform(id, input))
                    .collect();
            }
        }
        inputs
            .into_iter()
            .map(|(id, input)| plan.transform(id, input))
            .collect()
    }
}

/// Read and validate the `metadata` entry.
pub fn read_metadata<S: ArchiveSource>(source: &mut S) -> Result<Metadata> {
    let bytes = source.read_entry(METADATA_ENTRY)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| SrpackError::format("metadata entry is not valid UTF-8"))?;
    let metadata = Metadata::parse(&text)?;
    metadata.validate()?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use srpack_archive::MemoryArchive;
    use srpack_core::interleave;

    const METADATA: &str = "[global]\nsigrok version=0.5.2\n\n[device 1]\ncapturefile=logic-1\n\
                            total probes=8\nsamplerate=1 MHz\nprobe1=CLK\nprobe3=DATA\nunitsize=1\n";

    fn words(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8 & 0b0000_0101).collect()
    }

    fn interleaved_archive() -> MemoryArchive {
        MemoryArchive::new()
            .with_entry("version", "2")
            .with_entry("metadata", METADATA)
            .with_entry("logic-1-2", words(40))
            .with_entry("logic-1-1", words(64))
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::from_layout(Layout::Interleaved), Direction::Split);
        assert_eq!(Direction::Split.output_layout(), Layout::Split);
        assert_eq!(Direction::Merge.output_layout(), Layout::Interleaved);
        assert_eq!(Direction::Split.to_string(), "split (v2 -> v3)");
        assert_eq!(Direction::Merge.default_codecs(), &[Codec::Deflate]);
    }

    #[test]
    fn test_plan_interleaved() {
        let mut source = interleaved_archive();
        let plan = RepackEngine::default()
            .plan(&mut source, &mut |_| {})
            .unwrap();

        assert_eq!(plan.direction, Direction::Split);
        assert_eq!(plan.capturefile, "logic-1");
        let ids: Vec<u64> = plan.segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, [1, 2]);
        assert!(plan.map.is_identity());
    }

    #[test]
    fn test_transform_split_keeps_slots() {
        let mut source = interleaved_archive();
        let plan = RepackEngine::default()
            .plan(&mut source, &mut |_| {})
            .unwrap();

        let input = plan.read_segment(&mut source, &plan.segments[1]).unwrap();
        let out = plan.transform(2, input).unwrap();
        let SegmentData::Streams(streams) = out.data else {
            panic!("expected streams");
        };
        let slots: Vec<usize> = streams.iter().map(|(slot, _)| *slot).collect();
        assert_eq!(slots, [1, 3]);
        // 40 words -> 5 bytes per probe
        assert!(streams.iter().all(|(_, s)| s.len() == 5));
    }

    #[test]
    fn test_transform_remapped_split_then_merge() {
        let mut source = interleaved_archive();
        let engine = RepackEngine::new(RepackOptions::new().remap(true));
        let plan = engine.plan(&mut source, &mut |_| {}).unwrap();
        assert_eq!(plan.map.source_indices(), [1, 3]);
        assert_eq!(plan.metadata.probe(2), Some("DATA"));

        let input = plan.read_segment(&mut source, &plan.segments[0]).unwrap();
        let out = plan.transform(1, input).unwrap();
        let SegmentData::Streams(streams) = out.data else {
            panic!("expected streams");
        };
        assert_eq!(streams[1].0, 2);

        // The DATA stream is bit 3 of the original words.
        let original = deinterleave(&words(64), 1, &[3]).unwrap();
        assert_eq!(streams[1].1, original[&3]);

        // Merging the packed streams places DATA at bit 2.
        let planes: BitPlanes = streams.into_iter().collect();
        let merged = interleave(&planes, 1).unwrap();
        let expected: Vec<u8> = words(64)
            .iter()
            .map(|w| (w & 0b0001) | ((w & 0b0100) >> 1))
            .collect();
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_stages_reported_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = interleaved_archive();
        let engine = RepackEngine::new(
            RepackOptions::new()
                .remap(true)
                .codecs([Codec::Store])
                .output_dir(dir.path()),
        );

        let mut events = Vec::new();
        let report = engine
            .repack(&mut source, Path::new("capture.sr"), |e| events.push(e))
            .unwrap();

        let stages: Vec<Stage> = events
            .iter()
            .filter_map(|e| match e {
                Progress::Stage(stage) => Some(*stage),
                Progress::SegmentDone { .. } => None,
            })
            .collect();
        assert_eq!(
            stages,
            [
                Stage::ReadMetadata,
                Stage::Remap,
                Stage::ResolveVersion,
                Stage::ForEachSegment,
                Stage::WriteOutputs,
                Stage::Report,
            ]
        );
        assert!(events.contains(&Progress::SegmentDone {
            id: 2,
            index: 1,
            total: 2
        }));
        assert_eq!(report.segments, 2);
        assert_eq!(report.outputs.len(), 1);
        assert!(dir.path().join("capture.sr.store.sr2").is_file());
    }

    /// Source whose reads of one entry fail.
    struct FailingSource {
        inner: MemoryArchive,
        failing: &'static str,
    }

    impl ArchiveSource for FailingSource {
        fn entries(&self) -> &[srpack_archive::EntryInfo] {
            self.inner.entries()
        }

        fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
            if name == self.failing {
                return Err(SrpackError::crc_mismatch(name, 1, 2));
            }
            self.inner.read_entry(name)
        }
    }

    #[test]
    fn test_failed_run_removes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FailingSource {
            inner: interleaved_archive(),
            failing: "logic-1-2",
        };

        for raw in [false, true] {
            let engine = RepackEngine::new(
                RepackOptions::new()
                    .raw(raw)
                    .codecs([Codec::Deflate, Codec::Store])
                    .output_dir(dir.path()),
            );
            let mut done = Vec::new();
            let err = engine
                .repack(&mut source, Path::new("capture.sr"), |e| {
                    if let Progress::SegmentDone { id, .. } = e {
                        done.push(id);
                    }
                })
                .unwrap_err();

            assert!(matches!(err, SrpackError::CrcMismatch { .. }));
            // segment 1 was written before segment 2 failed
            assert_eq!(done, [1]);
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        }
    }

    #[test]
    fn test_missing_metadata() {
        let mut source = MemoryArchive::new().with_entry("version", "2");
        let err = RepackEngine::default()
            .plan(&mut source, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, SrpackError::EntryNotFound { .. }));
    }

    #[test]
    fn test_unknown_version() {
        let mut source = interleaved_archive();
        source.insert("version", "7");
        let err = RepackEngine::default()
            .plan(&mut source, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, SrpackError::Format { .. }));
    }

    #[test]
    fn test_malformed_entry_aborts() {
        let mut source = interleaved_archive();
        source.insert("logic-1-3-1", vec![0u8; 8]);
        let err = RepackEngine::default()
            .plan(&mut source, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, SrpackError::MalformedEntryName { .. }));
    }
}
