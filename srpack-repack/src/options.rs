//! Repack configuration.

use srpack_archive::Codec;
use std::path::{Path, PathBuf};

/// Options controlling a repack run.
///
/// `Default` reproduces the plain behaviour: identity channel map, one
/// archive per default codec next to the input file, sequential processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepackOptions {
    /// Renumber active probes contiguously before writing.
    pub remap: bool,
    /// Write plain `.raw` files instead of archives.
    pub raw: bool,
    /// Codecs to write, overriding the per-direction default.
    pub codecs: Option<Vec<Codec>>,
    /// Directory for outputs; defaults to the input's directory.
    pub output_dir: Option<PathBuf>,
    /// Transform segments and write codec variants on the rayon pool.
    ///
    /// Ignored unless built with the `parallel` feature.
    pub parallel: bool,
}

impl RepackOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable probe remapping.
    pub fn remap(mut self, remap: bool) -> Self {
        self.remap = remap;
        self
    }

    /// Enable or disable raw output.
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Write exactly these codecs. An empty list restores the default.
    pub fn codecs(mut self, codecs: impl IntoIterator<Item = Codec>) -> Self {
        let mut list: Vec<Codec> = Vec::new();
        for codec in codecs {
            if !list.contains(&codec) {
                list.push(codec);
            }
        }
        self.codecs = (!list.is_empty()).then_some(list);
        self
    }

    /// Write outputs into `dir`.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Enable or disable parallel processing.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether parallel processing is both requested and compiled in.
    pub fn use_parallel(&self) -> bool {
        cfg!(feature = "parallel") && self.parallel
    }

    /// Base path output names are derived from.
    ///
    /// This is the input path itself, or its file name inside
    /// [`output_dir`](Self::output_dir).
    pub fn output_base(&self, input: &Path) -> PathBuf {
        match (&self.output_dir, input.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => input.to_path_buf(),
        }
    }
}
