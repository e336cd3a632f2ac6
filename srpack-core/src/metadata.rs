//! Capture metadata model.
//!
//! The `metadata` entry of a capture archive is a small INI-like text:
//!
//! ```text
//! [global]
//! sigrok version=0.5.2
//!
//! [device 1]
//! capturefile=logic-1
//! total probes=16
//! samplerate=24 MHz
//! probe1=CLK
//! probe3=DATA
//! unitsize=2
//! ```
//!
//! Every line is classified by [`MetadataLine::classify`]. Recognized keys
//! (`capturefile`, `unitsize`, `probe<N>`) are lifted into typed fields while
//! also being kept, in insertion order, in the section that holds them so
//! that re-serialization reproduces the key set. Lines matching nothing are
//! reported as warnings and do not abort parsing.

use crate::bitplane::check_unitsize;
use crate::error::{Result, SrpackError};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Name of the global section.
pub const GLOBAL_SECTION: &str = "global";

/// Name of the (single) device section.
pub const DEVICE_SECTION: &str = "device 1";

/// Largest supported sample word, in bytes.
pub const MAX_UNITSIZE: usize = 2;

/// A named logical channel of the capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Probe {
    /// 1-based channel index.
    pub index: usize,
    /// Display name.
    pub name: String,
}

impl Probe {
    /// Create a new probe.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    /// Metadata key naming this probe (`probe<N>`).
    pub fn key(&self) -> String {
        format!("probe{}", self.index)
    }
}

/// Classification of a single metadata line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLine<'a> {
    /// Empty line.
    Blank,
    /// `capturefile=<name>`.
    CaptureFile(&'a str),
    /// `unitsize=<int>`.
    UnitSize(&'a str),
    /// `probe<N>=<name>`.
    Probe {
        /// Probe index as written.
        index: usize,
        /// Probe name.
        name: &'a str,
    },
    /// Any other `key=value` line.
    KeyValue {
        /// Key (text before the first `=`).
        key: &'a str,
        /// Value (text after the first `=`).
        value: &'a str,
    },
    /// `[name]` section header.
    Section(&'a str),
    /// Line matching none of the above.
    Unrecognized,
}

impl<'a> MetadataLine<'a> {
    /// Classify a line of metadata text.
    pub fn classify(line: &'a str) -> Self {
        if line.trim().is_empty() {
            return Self::Blank;
        }

        if let Some((key, value)) = line.split_once('=') {
            return match key {
                "capturefile" => Self::CaptureFile(value),
                "unitsize" => Self::UnitSize(value),
                _ => match parse_probe_key(key) {
                    Some(index) => Self::Probe { index, name: value },
                    None => Self::KeyValue { key, value },
                },
            };
        }

        if let Some(rest) = line.strip_prefix('[') {
            if let Some(end) = rest.find(']') {
                return Self::Section(&rest[..end]);
            }
        }

        Self::Unrecognized
    }
}

/// Parse the index out of a `probe<N>` key.
fn parse_probe_key(key: &str) -> Option<usize> {
    let digits = key.strip_prefix("probe")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// An ordered key/value section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Create an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Section name (without brackets).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a value. An existing key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Keep only the entries for which `f` returns true.
    pub fn retain(&mut self, mut f: impl FnMut(&str, &str) -> bool) {
        self.entries.retain(|(k, v)| f(k, v));
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the section holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed capture metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    sections: Vec<Section>,
    capturefile: Option<String>,
    unitsize: Option<usize>,
    probes: BTreeMap<usize, String>,
    unrecognized: Vec<String>,
}

impl Metadata {
    /// Parse metadata text.
    ///
    /// Fails only on a second `capturefile` definition or a non-numeric
    /// `unitsize`; use [`Metadata::validate`] for the structural checks.
    pub fn parse(text: &str) -> Result<Self> {
        let mut meta = Self::default();
        // Keys before any header land in an unnamed section that is never serialized.
        let mut current = String::new();

        for line in text.lines() {
            let classified = MetadataLine::classify(line);
            match classified {
                MetadataLine::Blank => continue,
                MetadataLine::Section(name) => {
                    current = name.to_string();
                    meta.section_mut_or_insert(&current);
                    continue;
                }
                MetadataLine::Unrecognized => {
                    warn!(line, "unrecognized metadata line");
                    meta.unrecognized.push(line.to_string());
                    continue;
                }
                MetadataLine::CaptureFile(name) => {
                    if meta.capturefile.is_some() {
                        return Err(SrpackError::format("capturefile already set"));
                    }
                    meta.capturefile = Some(name.to_string());
                }
                MetadataLine::UnitSize(value) => {
                    let unitsize = value.trim().parse::<usize>().map_err(|_| {
                        SrpackError::format(format!("invalid unitsize '{}'", value))
                    })?;
                    meta.unitsize = Some(unitsize);
                }
                MetadataLine::Probe { index, name } => {
                    meta.probes.insert(index, name.to_string());
                }
                MetadataLine::KeyValue { .. } => {}
            }

            if let Some((key, value)) = line.split_once('=') {
                meta.section_mut_or_insert(&current).set(key, value);
            }
        }

        Ok(meta)
    }

    /// Serialize to text: `[global]` then `[device 1]`, one blank line after each.
    ///
    /// Other sections are not reproduced.
    pub fn serialize(&self) -> String {
        for section in &self.sections {
            let name = section.name();
            if !name.is_empty() && name != GLOBAL_SECTION && name != DEVICE_SECTION {
                warn!(section = name, "metadata section dropped on serialization");
            }
        }

        let mut out = String::new();
        for name in [GLOBAL_SECTION, DEVICE_SECTION] {
            out.push('[');
            out.push_str(name);
            out.push_str("]\n");
            if let Some(section) = self.section(name) {
                for (key, value) in section.iter() {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        // Sections are separated by one blank line; the document ends with a single newline.
        out.pop();
        out
    }

    /// Check the invariants the transform relies on.
    pub fn validate(&self) -> Result<()> {
        self.capturefile()?;
        let unitsize = check_unitsize(self.unitsize()?)?;
        if let Some(&index) = self.probes.keys().find(|&&i| i == 0) {
            return Err(SrpackError::probe_range(index, unitsize));
        }
        if let Some(&last) = self.probes.keys().next_back() {
            if last > unitsize * 8 {
                return Err(SrpackError::probe_range(last, unitsize));
            }
        }
        Ok(())
    }

    /// Capture file base name.
    pub fn capturefile(&self) -> Result<&str> {
        self.capturefile
            .as_deref()
            .ok_or_else(|| SrpackError::format("capturefile not set"))
    }

    /// Sample word width in bytes.
    pub fn unitsize(&self) -> Result<usize> {
        self.unitsize
            .ok_or_else(|| SrpackError::format("unitsize not set"))
    }

    /// Active probes in ascending index order.
    pub fn probes(&self) -> impl Iterator<Item = Probe> + '_ {
        self.probes
            .iter()
            .map(|(&index, name)| Probe::new(index, name.clone()))
    }

    /// Name of the probe at `index`, if active.
    pub fn probe(&self, index: usize) -> Option<&str> {
        self.probes.get(&index).map(String::as_str)
    }

    /// Number of active probes.
    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Lines that matched no rule during parsing.
    pub fn unrecognized_lines(&self) -> &[String] {
        &self.unrecognized
    }

    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name() == name)
    }

    /// All sections in document order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Copy of this metadata with the probe table replaced.
    ///
    /// All `probe<N>` keys are dropped from `[device 1]`, `unitsize` is set
    /// and the new probes are appended in order.
    pub fn with_probe_table(&self, unitsize: usize, probes: &[Probe]) -> Result<Self> {
        let mut meta = self.clone();
        let device = meta
            .sections
            .iter_mut()
            .find(|s| s.name() == DEVICE_SECTION)
            .ok_or_else(|| SrpackError::format("missing [device 1] section"))?;

        device.retain(|key, _| parse_probe_key(key).is_none());
        device.set("unitsize", unitsize.to_string());
        for probe in probes {
            device.set(probe.key(), probe.name.clone());
        }

        meta.unitsize = Some(unitsize);
        meta.probes = probes
            .iter()
            .map(|p| (p.index, p.name.clone()))
            .collect();
        Ok(meta)
    }

    fn section_mut_or_insert(&mut self, name: &str) -> &mut Section {
        let pos = match self.sections.iter().position(|s| s.name() == name) {
            Some(pos) => pos,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[pos]
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}
