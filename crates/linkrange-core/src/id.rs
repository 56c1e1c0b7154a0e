use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a structure (vessel, station, probe) in the scene.
    pub struct StructureId;

    /// Identifies a single component mounted on a structure.
    pub struct ComponentId;
}

/// Identifies a celestial body that can occlude a line of sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// Identifies one relay-capable transmitter: the component that carries it
/// and the structure that component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub structure: StructureId,
    pub component: ComponentId,
}

impl UnitId {
    pub fn new(structure: StructureId, component: ComponentId) -> Self {
        Self {
            structure,
            component,
        }
    }
}
