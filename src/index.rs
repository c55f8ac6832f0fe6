//! Per-unit map from constant pool slot to the tracked method it references.

use std::collections::BTreeMap;

use crate::classfile::{self, ClassUnit, UnitError};
use crate::report::MethodTuple;
use crate::surface::{TargetSurface, TrackedSurfaces};

#[derive(Debug, Clone, Copy)]
pub struct IndexEntry<'t> {
    /// The surface that declares the method, which may be a super type of
    /// the referenced owner.
    pub surface: &'t TargetSurface,
    pub tuple: &'t MethodTuple,
}

/// Slot numbers are local to the unit the index was built from.
#[derive(Debug, Default)]
pub struct SymbolIndex<'t> {
    slots: BTreeMap<u16, IndexEntry<'t>>,
}

impl<'t> SymbolIndex<'t> {
    pub fn get(&self, slot: u16) -> Option<IndexEntry<'t>> {
        self.slots.get(&slot).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, IndexEntry<'t>)> + '_ {
        self.slots.iter().map(|(slot, entry)| (*slot, *entry))
    }
}

/// Match every method and interface-method reference in `unit` against the
/// tracked surfaces.
pub fn build_index<'t>(unit: &ClassUnit, tracked: &'t TrackedSurfaces) -> SymbolIndex<'t> {
    let slots = unit
        .symbol_table()
        .filter_map(|(slot, entry)| {
            let member = entry.member()?;
            let (surface, tuple) = tracked.lookup(&member.owner, &member.name, &member.descriptor)?;
            Some((slot, IndexEntry { surface, tuple }))
        })
        .collect();
    SymbolIndex { slots }
}

/// Parse `bytes` and index the resulting unit. The index borrows only from
/// `tracked`, so the unit is handed back alongside it.
pub fn index_bytes<'t>(
    bytes: &[u8],
    tracked: &'t TrackedSurfaces,
) -> Result<(ClassUnit, SymbolIndex<'t>), UnitError> {
    let unit = classfile::open_unit(bytes)?;
    let index = build_index(&unit, tracked);
    Ok((unit, index))
}
