use crate::geometry::{PositionSource, Vec3};
use crate::id::{ComponentId, StructureId};
use crate::unit::Facet;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during scene mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("structure not found: {0:?}")]
    StructureNotFound(StructureId),
    #[error("component not found: {0:?}")]
    ComponentNotFound(ComponentId),
    #[error("component {component:?} is not mounted on {structure:?}")]
    ComponentNotOnStructure {
        structure: StructureId,
        component: ComponentId,
    },
    #[error("cannot couple {0:?} to itself")]
    SelfCoupling(StructureId),
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// What a structure is. Only some kinds take part in relaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Ship,
    Probe,
    Station,
    Lander,
    Rover,
    Base,
    Relay,
    Debris,
    Flag,
    Eva,
    Unknown,
}

impl StructureKind {
    pub fn is_relay_capable(&self) -> bool {
        !matches!(
            self,
            StructureKind::Debris | StructureKind::Flag | StructureKind::Eva | StructureKind::Unknown
        )
    }
}

/// A component mounted on a structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub facets: Vec<Facet>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            facets: Vec::new(),
        }
    }

    pub fn with_facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    pub fn crew(&self) -> u32 {
        self.facets
            .iter()
            .map(|f| match f {
                Facet::CommandSeat { crew } => *crew,
                _ => 0,
            })
            .sum()
    }
}

/// A mobile structure: a named collection of components at one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub kind: StructureKind,
    pub position: Vec3,
    /// Whether the structure is fully simulated or on rails.
    pub loaded: bool,
    components: Vec<ComponentId>,
}

impl Structure {
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// A discrete structural change, fed to the topology cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralChange {
    /// Components were added or removed.
    Modified(StructureId),
    Destroyed(StructureId),
    /// `from` merged into `into`; `from` no longer exists.
    Coupled { from: StructureId, into: StructureId },
    /// `split` was separated from `original` as a new structure.
    Decoupled {
        original: StructureId,
        split: StructureId,
    },
    /// The structure moved between loaded and on-rails simulation.
    LoadStateChanged(StructureId),
    SceneReset,
    GameStateLoaded,
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// The live set of structures and their components.
///
/// Every mutation records a [`StructuralChange`]; the host drains them with
/// [`Scene::drain_changes`] and forwards them to the relay network.
#[derive(Debug, Default)]
pub struct Scene {
    structures: SlotMap<StructureId, Structure>,
    components: SlotMap<ComponentId, Component>,
    pending_changes: Vec<StructuralChange>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Mutations --

    /// Add an empty, loaded structure.
    pub fn spawn(&mut self, name: impl Into<String>, kind: StructureKind, position: Vec3) -> StructureId {
        self.structures.insert(Structure {
            name: name.into(),
            kind,
            position,
            loaded: true,
            components: Vec::new(),
        })
    }

    pub fn add_component(
        &mut self,
        structure: StructureId,
        component: Component,
    ) -> Result<ComponentId, SceneError> {
        if !self.structures.contains_key(structure) {
            return Err(SceneError::StructureNotFound(structure));
        }
        let id = self.components.insert(component);
        if let Some(s) = self.structures.get_mut(structure) {
            s.components.push(id);
        }
        self.pending_changes.push(StructuralChange::Modified(structure));
        Ok(id)
    }

    pub fn remove_component(
        &mut self,
        structure: StructureId,
        component: ComponentId,
    ) -> Result<Component, SceneError> {
        let s = self
            .structures
            .get_mut(structure)
            .ok_or(SceneError::StructureNotFound(structure))?;
        let index = s
            .components
            .iter()
            .position(|c| *c == component)
            .ok_or(SceneError::ComponentNotOnStructure {
                structure,
                component,
            })?;
        s.components.remove(index);
        let removed = self
            .components
            .remove(component)
            .ok_or(SceneError::ComponentNotFound(component))?;
        self.pending_changes.push(StructuralChange::Modified(structure));
        Ok(removed)
    }

    /// Remove a structure and all of its components.
    pub fn destroy(&mut self, structure: StructureId) -> Result<Structure, SceneError> {
        let removed = self
            .structures
            .remove(structure)
            .ok_or(SceneError::StructureNotFound(structure))?;
        for component in &removed.components {
            self.components.remove(*component);
        }
        self.pending_changes.push(StructuralChange::Destroyed(structure));
        Ok(removed)
    }

    /// Merge `from` into `into`. `from` stops existing.
    pub fn couple(&mut self, from: StructureId, into: StructureId) -> Result<(), SceneError> {
        if from == into {
            return Err(SceneError::SelfCoupling(from));
        }
        if !self.structures.contains_key(into) {
            return Err(SceneError::StructureNotFound(into));
        }
        let donor = self
            .structures
            .remove(from)
            .ok_or(SceneError::StructureNotFound(from))?;
        if let Some(target) = self.structures.get_mut(into) {
            target.components.extend(donor.components);
        }
        self.pending_changes
            .push(StructuralChange::Coupled { from, into });
        Ok(())
    }

    /// Split `components` off `original` into a new structure at the same
    /// position.
    pub fn decouple(
        &mut self,
        original: StructureId,
        components: &[ComponentId],
        name: impl Into<String>,
        kind: StructureKind,
    ) -> Result<StructureId, SceneError> {
        let source = self
            .structures
            .get(original)
            .ok_or(SceneError::StructureNotFound(original))?;
        if let Some(missing) = components.iter().find(|c| !source.components.contains(c)) {
            return Err(SceneError::ComponentNotOnStructure {
                structure: original,
                component: *missing,
            });
        }
        let position = source.position;
        let loaded = source.loaded;

        if let Some(source) = self.structures.get_mut(original) {
            source.components.retain(|c| !components.contains(c));
        }
        let split = self.structures.insert(Structure {
            name: name.into(),
            kind,
            position,
            loaded,
            components: components.to_vec(),
        });
        self.pending_changes
            .push(StructuralChange::Decoupled { original, split });
        Ok(split)
    }

    pub fn set_loaded(&mut self, structure: StructureId, loaded: bool) -> Result<(), SceneError> {
        let s = self
            .structures
            .get_mut(structure)
            .ok_or(SceneError::StructureNotFound(structure))?;
        if s.loaded != loaded {
            s.loaded = loaded;
            self.pending_changes
                .push(StructuralChange::LoadStateChanged(structure));
        }
        Ok(())
    }

    /// Move a structure. Movement is not a structural change.
    pub fn set_position(&mut self, structure: StructureId, position: Vec3) -> Result<(), SceneError> {
        let s = self
            .structures
            .get_mut(structure)
            .ok_or(SceneError::StructureNotFound(structure))?;
        s.position = position;
        Ok(())
    }

    /// Drop every structure and component.
    pub fn reset(&mut self) {
        self.structures.clear();
        self.components.clear();
        self.pending_changes.clear();
        self.pending_changes.push(StructuralChange::SceneReset);
    }

    /// Take all changes recorded since the last drain.
    pub fn drain_changes(&mut self) -> Vec<StructuralChange> {
        std::mem::take(&mut self.pending_changes)
    }

    // -- Queries --

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(id)
    }

    pub fn contains(&self, id: StructureId) -> bool {
        self.structures.contains_key(id)
    }

    pub fn structures(&self) -> impl Iterator<Item = (StructureId, &Structure)> {
        self.structures.iter()
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    /// Components mounted on a structure, in mount order. Empty for unknown
    /// structures.
    pub fn components_of(&self, id: StructureId) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.structures
            .get(id)
            .map(|s| s.components.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|c| self.components.get(*c).map(|comp| (*c, comp)))
    }

    pub fn is_crewed(&self, id: StructureId) -> bool {
        self.components_of(id).any(|(_, c)| c.crew() > 0)
    }
}

impl PositionSource for Scene {
    fn world_position(&self, structure: StructureId) -> Option<Vec3> {
        self.structures.get(structure).map(|s| s.position)
    }
}
