//! Physical slot to probe correspondence.
//!
//! A [`ChannelMap`] has exactly `unitsize * 8` slots. Slot `s` (1-based) is
//! the bit position `s - 1` of a sample word in the layout being produced;
//! it holds either the probe whose data goes there or a dummy marker.
//!
//! Probes stored in slots always carry their *source* index, i.e. the index
//! they have in the metadata the map was derived from. For the identity map
//! slot and source index coincide; for the packed map they differ and
//! [`ChannelMap::position_of`] translates a source index into its slot.

use crate::bitplane::check_unitsize;
use crate::error::Result;
use crate::metadata::{Metadata, Probe};

/// One slot of a channel map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Slot carries the data of this probe.
    Active(Probe),
    /// Slot carries no probe; its bits are zero.
    Dummy,
}

impl Slot {
    /// The probe in this slot, if any.
    pub fn probe(&self) -> Option<&Probe> {
        match self {
            Self::Active(probe) => Some(probe),
            Self::Dummy => None,
        }
    }
}

/// Ordered mapping between slots and probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    unitsize: usize,
    slots: Vec<Slot>,
}

impl ChannelMap {
    /// Slot `i` maps to probe `i` when that probe is active.
    pub fn identity(metadata: &Metadata) -> Result<Self> {
        let unitsize = check_unitsize(metadata.unitsize()?)?;
        metadata.validate()?;

        let slots = (1..=unitsize * 8)
            .map(|i| match metadata.probe(i) {
                Some(name) => Slot::Active(Probe::new(i, name)),
                None => Slot::Dummy,
            })
            .collect();

        Ok(Self { unitsize, slots })
    }

    /// Renumber active probes contiguously from slot 1.
    ///
    /// Returns the packed map together with metadata describing the new
    /// layout: `unitsize` shrinks to 1 when at most 8 probes are active and
    /// the probe table is rewritten with the new indices.
    pub fn packed(metadata: &Metadata) -> Result<(Self, Metadata)> {
        check_unitsize(metadata.unitsize()?)?;
        metadata.validate()?;

        let active: Vec<Probe> = metadata.probes().collect();
        let unitsize = if active.len() <= 8 { 1 } else { 2 };

        let renumbered: Vec<Probe> = active
            .iter()
            .enumerate()
            .map(|(i, probe)| Probe::new(i + 1, probe.name.clone()))
            .collect();
        let packed_meta = metadata.with_probe_table(unitsize, &renumbered)?;

        let mut slots: Vec<Slot> = active.into_iter().map(Slot::Active).collect();
        slots.resize(unitsize * 8, Slot::Dummy);

        Ok((Self { unitsize, slots }, packed_meta))
    }

    /// Sample word width in bytes.
    pub fn unitsize(&self) -> usize {
        self.unitsize
    }

    /// Number of slots (`unitsize * 8`).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the map has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots, slot 1 first.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot at 1-based `position`.
    pub fn slot(&self, position: usize) -> Option<&Slot> {
        position.checked_sub(1).and_then(|i| self.slots.get(i))
    }

    /// Slot holding the probe with the given source index.
    pub fn position_of(&self, source_index: usize) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.probe().is_some_and(|p| p.index == source_index))
            .map(|i| i + 1)
    }

    /// Active slots as `(position, probe)` pairs in slot order.
    pub fn active(&self) -> impl Iterator<Item = (usize, &Probe)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.probe().map(|p| (i + 1, p)))
    }

    /// Source indices of the active probes, in slot order.
    pub fn source_indices(&self) -> Vec<usize> {
        self.active().map(|(_, p)| p.index).collect()
    }

    /// Whether every active probe sits in the slot matching its source index.
    pub fn is_identity(&self) -> bool {
        self.active().all(|(pos, p)| pos == p.index)
    }
}
