//! Topology cache: per-structure relay inventories.
//!
//! Each entry holds an immutable snapshot of a structure's relay units and
//! the fingerprint of the structure it was built from. A lookup whose
//! fingerprint no longer matches the live structure rebuilds the entry before
//! returning. Rebuilds always produce a fresh `Rc<[RelayUnit]>` and swap it
//! in, so a list handed out earlier (for example one a resolver is still
//! iterating) is never mutated underneath its holder.

use crate::id::{StructureId, UnitId};
use crate::scene::{Scene, StructuralChange};
use crate::unit::RelayUnit;
use slotmap::SecondaryMap;
use std::rc::Rc;

/// Structural fingerprint used to detect stale entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub component_count: usize,
    pub loaded: bool,
}

impl Fingerprint {
    /// Fingerprint of the live structure, or `None` if it does not exist.
    pub fn of(scene: &Scene, structure: StructureId) -> Option<Self> {
        scene.structure(structure).map(|s| Fingerprint {
            component_count: s.component_count(),
            loaded: s.loaded,
        })
    }
}

/// Cached relay inventory of one structure.
#[derive(Debug, Clone)]
pub struct StructureEntry {
    units: Rc<[RelayUnit]>,
    best_unit: Option<usize>,
    fingerprint: Fingerprint,
    generation: u64,
}

impl StructureEntry {
    pub fn units(&self) -> &Rc<[RelayUnit]> {
        &self.units
    }

    pub fn best_unit(&self) -> Option<&RelayUnit> {
        self.best_unit.map(|i| &self.units[i])
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Monotonic rebuild counter; every rebuild gets a new generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Per-structure relay inventories keyed by [`StructureId`].
#[derive(Debug, Default)]
pub struct RelayDatabase {
    entries: SecondaryMap<StructureId, StructureEntry>,
    next_generation: u64,
    rebuilds: u64,
}

impl RelayDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current relay units of a structure, rebuilding the entry if it is
    /// missing or stale. Unknown structures yield an empty list and drop any
    /// leftover entry.
    pub fn lookup(&mut self, scene: &Scene, structure: StructureId) -> Rc<[RelayUnit]> {
        self.fresh_entry(scene, structure)
            .map(|entry| Rc::clone(&entry.units))
            .unwrap_or_else(|| Rc::from(Vec::new()))
    }

    /// The structure's most capable unit, whether or not it can currently
    /// transmit.
    pub fn best_unit(&mut self, scene: &Scene, structure: StructureId) -> Option<RelayUnit> {
        self.fresh_entry(scene, structure)
            .and_then(|entry| entry.best_unit().cloned())
    }

    /// Find one unit by id.
    pub fn unit(&mut self, scene: &Scene, id: UnitId) -> Option<RelayUnit> {
        self.lookup(scene, id.structure)
            .iter()
            .find(|u| u.id() == id)
            .cloned()
    }

    /// Peek at a cached entry without freshness checks.
    pub fn entry(&self, structure: StructureId) -> Option<&StructureEntry> {
        self.entries.get(structure)
    }

    /// Drop a structure's entry. Returns `true` if one existed.
    pub fn invalidate(&mut self, structure: StructureId) -> bool {
        let removed = self.entries.remove(structure).is_some();
        if removed {
            log::debug!("relay cache: invalidated {structure:?}");
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("relay cache: cleared {} entries", self.entries.len());
        }
        self.entries.clear();
    }

    /// Map a structural change onto invalidation.
    pub fn apply(&mut self, change: &StructuralChange) {
        match *change {
            StructuralChange::Modified(id)
            | StructuralChange::Destroyed(id)
            | StructuralChange::LoadStateChanged(id) => {
                self.invalidate(id);
            }
            StructuralChange::Coupled { from, into } => {
                self.invalidate(from);
                self.invalidate(into);
            }
            StructuralChange::Decoupled { original, split } => {
                self.invalidate(original);
                self.invalidate(split);
            }
            StructuralChange::SceneReset | StructuralChange::GameStateLoaded => self.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rebuilds performed since construction.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn fresh_entry(&mut self, scene: &Scene, structure: StructureId) -> Option<&StructureEntry> {
        let Some(fingerprint) = Fingerprint::of(scene, structure) else {
            self.entries.remove(structure);
            return None;
        };

        let stale = self
            .entries
            .get(structure)
            .is_none_or(|entry| entry.fingerprint != fingerprint);
        if stale {
            let entry = self.rebuild(scene, structure, fingerprint);
            self.entries.insert(structure, entry);
        }
        self.entries.get(structure)
    }

    fn rebuild(&mut self, scene: &Scene, structure: StructureId, fingerprint: Fingerprint) -> StructureEntry {
        let mut units = Vec::new();
        for (component_id, component) in scene.components_of(structure) {
            // At most one relay per component: the first antenna facet.
            let Some(spec) = component.facets.iter().find_map(|f| f.relay_spec()) else {
                continue;
            };
            if let Err(e) = spec.validate() {
                log::warn!(
                    "relay cache: skipping '{}' on {structure:?}: {e}",
                    component.name
                );
                continue;
            }
            units.push(RelayUnit::new(
                UnitId::new(structure, component_id),
                component.name.clone(),
                spec.clone(),
            ));
        }

        let best_unit = units
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.capability_cmp(b))
            .map(|(i, _)| i);

        self.next_generation += 1;
        self.rebuilds += 1;
        log::debug!(
            "relay cache: rebuilt {structure:?} with {} relay units (generation {})",
            units.len(),
            self.next_generation
        );

        StructureEntry {
            units: Rc::from(units),
            best_unit,
            fingerprint,
            generation: self.next_generation,
        }
    }
}
