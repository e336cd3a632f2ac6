//! Compression report of a repack run.

use crate::engine::Direction;
use serde::Serialize;
use srpack_archive::ArchiveSummary;
use std::fmt;
use std::path::PathBuf;

/// One written output variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputReport {
    /// Codec name, or `raw`.
    pub name: String,
    /// Written file.
    pub path: PathBuf,
    /// Number of entries (archives) or appended chunks (raw files).
    pub entries: usize,
    /// Uncompressed payload bytes.
    pub size: u64,
    /// Bytes as stored.
    pub compressed_size: u64,
    /// `compressed_size` relative to the source archive's compressed size.
    pub ratio: Option<f64>,
}

impl OutputReport {
    /// Report for a finished output.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, summary: ArchiveSummary) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            entries: summary.entries,
            size: summary.size,
            compressed_size: summary.compressed_size,
            ratio: None,
        }
    }
}

/// Summary of a repack run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Source archive.
    pub input: PathBuf,
    /// Conversion performed.
    pub direction: Direction,
    /// Whether probes were renumbered.
    pub remapped: bool,
    /// Number of segments processed.
    pub segments: usize,
    /// Sum of the stored sizes of all source entries.
    pub original_compressed_size: u64,
    /// Written variants.
    pub outputs: Vec<OutputReport>,
}

impl Report {
    /// Build a report, filling in each output's ratio.
    pub fn new(
        input: impl Into<PathBuf>,
        direction: Direction,
        remapped: bool,
        segments: usize,
        original_compressed_size: u64,
        mut outputs: Vec<OutputReport>,
    ) -> Self {
        for output in &mut outputs {
            output.ratio = (original_compressed_size > 0)
                .then(|| output.compressed_size as f64 / original_compressed_size as f64);
        }
        Self {
            input: input.into(),
            direction,
            remapped,
            segments,
            original_compressed_size,
            outputs,
        }
    }

    /// The output with the smallest stored size.
    pub fn best(&self) -> Option<&OutputReport> {
        self.outputs.iter().min_by_key(|o| o.compressed_size)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repack Report")?;
        writeln!(f, "=============")?;
        writeln!(f, "Input: {}", self.input.display())?;
        writeln!(f, "Direction: {}", self.direction)?;
        if self.remapped {
            writeln!(f, "Probes: remapped")?;
        }
        writeln!(f, "Segments: {}", self.segments)?;
        writeln!(
            f,
            "Original compressed size: {} bytes",
            self.original_compressed_size
        )?;

        writeln!(f)?;
        writeln!(
            f,
            "  {:<8} {:>8} {:>12} {:>12} {:>8}  Path",
            "Variant", "Entries", "Size", "Stored", "Ratio"
        )?;
        for output in &self.outputs {
            let ratio = match output.ratio {
                Some(r) => format!("{:.1}%", r * 100.0),
                None => "-".to_string(),
            };
            writeln!(
                f,
                "  {:<8} {:>8} {:>12} {:>12} {:>8}  {}",
                output.name,
                output.entries,
                output.size,
                output.compressed_size,
                ratio,
                output.path.display()
            )?;
        }
        Ok(())
    }
}
