//! Connection summaries and advisory events.

use crate::Ticks;
use crate::id::{BodyId, StructureId, UnitId};
use serde::{Deserialize, Serialize};

/// Summary of a structure's reachability, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No unit can reach the ground station.
    #[default]
    None,
    /// Connected, but the first hop is past nominal range.
    Suboptimal,
    /// Connected within nominal range.
    Optimal,
}

impl ConnectionStatus {
    /// Classify a resolved first hop.
    pub fn classify(can_transmit: bool, transmit_distance: f64, nominal_range: f64) -> Self {
        if !can_transmit {
            ConnectionStatus::None
        } else if transmit_distance <= nominal_range {
            ConnectionStatus::Optimal
        } else {
            ConnectionStatus::Suboptimal
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionStatus::None)
    }
}

/// Advisory events emitted by [`crate::network::RelayNetwork::tick`].
///
/// Like the status itself these are informational: they fire only on
/// transitions and never interrupt the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A structure lost its last path to the ground station.
    ConnectionLost { structure: StructureId, tick: Ticks },
    /// A disconnected structure found a path again.
    ConnectionRestored {
        structure: StructureId,
        status: ConnectionStatus,
        tick: Ticks,
    },
    /// Optimal to suboptimal.
    ConnectionDegraded { structure: StructureId, tick: Ticks },
    /// Suboptimal to optimal.
    ConnectionImproved { structure: StructureId, tick: Ticks },
    /// A unit's direct line to the ground station became obstructed.
    LineOfSightBlocked {
        unit: UnitId,
        body: BodyId,
        tick: Ticks,
    },
}

impl NetworkEvent {
    /// Event for a status transition, if the transition is reportable.
    pub fn for_transition(
        structure: StructureId,
        previous: Option<ConnectionStatus>,
        current: ConnectionStatus,
        tick: Ticks,
    ) -> Option<NetworkEvent> {
        match (previous, current) {
            (Some(ConnectionStatus::None), ConnectionStatus::None) => None,
            (_, ConnectionStatus::None) => Some(NetworkEvent::ConnectionLost { structure, tick }),
            (Some(ConnectionStatus::None), status) => Some(NetworkEvent::ConnectionRestored {
                structure,
                status,
                tick,
            }),
            (Some(ConnectionStatus::Optimal), ConnectionStatus::Suboptimal) => {
                Some(NetworkEvent::ConnectionDegraded { structure, tick })
            }
            (Some(ConnectionStatus::Suboptimal), ConnectionStatus::Optimal) => {
                Some(NetworkEvent::ConnectionImproved { structure, tick })
            }
            _ => None,
        }
    }
}
