//! Relay-capable transmitters and the component facets that expose them.
//!
//! A component carries a list of [`Facet`]s. Relay capability is decided once,
//! when the topology cache rebuilds a structure's entry: the first
//! [`Facet::Antenna`] of a component becomes a [`RelayUnit`], any further
//! antenna facets on the same component are ignored.

use crate::config::PowerCostMode;
use crate::cost::LinkCost;
use crate::id::UnitId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Transmitter specification
// ---------------------------------------------------------------------------

/// Errors from transmitter specification validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error("nominal range must be finite and non-negative, got {0}")]
    InvalidNominalRange(f64),
    #[error("max power factor must be at least 1, got {0}")]
    InvalidPowerFactor(f64),
    #[error("max data factor must be at least 1, got {0}")]
    InvalidDataFactor(f64),
    #[error("packet cost and size must be finite and non-negative")]
    InvalidPacket,
}

/// Static transmission characteristics of an antenna.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmitterSpec {
    /// Distance at which the base packet cost and size apply.
    pub nominal_range: f64,
    /// How far cost may scale past nominal. Max range is
    /// `nominal_range * sqrt(max_power_factor)`.
    pub max_power_factor: f64,
    /// Cap on payload growth when transmitting inside nominal range.
    pub max_data_factor: f64,
    /// Resource spent per packet at nominal range.
    pub packet_cost: f64,
    /// Payload per packet at nominal range.
    pub packet_size: f64,
}

impl TransmitterSpec {
    pub fn new(nominal_range: f64, max_power_factor: f64, max_data_factor: f64) -> Self {
        Self {
            nominal_range,
            max_power_factor,
            max_data_factor,
            packet_cost: 10.0,
            packet_size: 2.0,
        }
    }

    pub fn with_packet(mut self, packet_cost: f64, packet_size: f64) -> Self {
        self.packet_cost = packet_cost;
        self.packet_size = packet_size;
        self
    }

    pub fn validate(&self) -> Result<(), UnitError> {
        if !self.nominal_range.is_finite() || self.nominal_range < 0.0 {
            return Err(UnitError::InvalidNominalRange(self.nominal_range));
        }
        if self.max_power_factor.is_nan() || self.max_power_factor < 1.0 {
            return Err(UnitError::InvalidPowerFactor(self.max_power_factor));
        }
        if self.max_data_factor.is_nan() || self.max_data_factor < 1.0 {
            return Err(UnitError::InvalidDataFactor(self.max_data_factor));
        }
        let packet_ok = |v: f64| v.is_finite() && v >= 0.0;
        if !packet_ok(self.packet_cost) || !packet_ok(self.packet_size) {
            return Err(UnitError::InvalidPacket);
        }
        Ok(())
    }

    /// Hard cutoff beyond which this antenna cannot transmit.
    pub fn max_range(&self) -> f64 {
        self.nominal_range * self.max_power_factor.sqrt()
    }

    /// Base economics at nominal range.
    pub fn base_cost(&self) -> LinkCost {
        LinkCost::new(self.packet_cost, self.packet_size)
    }

    /// Economics of one hop over `distance`.
    ///
    /// Inside nominal range the payload grows with `(nominal / d)^2`, capped
    /// by the data factor. Past nominal range either the cost grows with
    /// `(d / nominal)^2` ([`PowerCostMode::Scaling`]) or the cost stays fixed
    /// and the payload keeps shrinking ([`PowerCostMode::Fixed`]).
    pub fn hop_cost(&self, distance: f64, mode: PowerCostMode) -> LinkCost {
        let capped_size = || {
            let factor = inverse_range_factor(self.nominal_range, distance);
            (self.packet_size * factor).min(self.packet_size * self.max_data_factor)
        };

        match mode {
            PowerCostMode::Fixed => LinkCost::new(self.packet_cost, capped_size()),
            PowerCostMode::Scaling => {
                let cost = if distance <= self.nominal_range {
                    self.packet_cost
                } else {
                    let factor = distance / self.nominal_range;
                    self.packet_cost * factor * factor
                };
                let size = if distance >= self.nominal_range {
                    self.packet_size
                } else {
                    capped_size()
                };
                LinkCost::new(cost, size)
            }
        }
    }
}

// (nominal / d)^2, infinite at zero distance.
fn inverse_range_factor(nominal: f64, distance: f64) -> f64 {
    if distance <= 0.0 {
        return f64::INFINITY;
    }
    let factor = nominal / distance;
    factor * factor
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

/// One capability exposed by a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Facet {
    /// A relay-capable antenna.
    Antenna(TransmitterSpec),
    /// Seats for crew; crewed structures may be controlled without a link.
    CommandSeat { crew: u32 },
    /// Remote guidance unit.
    ProbeCore,
    /// Anything else (tanks, struts, engines).
    Structural,
}

impl Facet {
    pub fn relay_spec(&self) -> Option<&TransmitterSpec> {
        match self {
            Facet::Antenna(spec) => Some(spec),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayUnit
// ---------------------------------------------------------------------------

/// One relay-capable transmitter on a structure.
///
/// Units are immutable snapshots taken when the topology cache rebuilds a
/// structure. Position is not stored; it is the owning structure's position
/// as reported by the position source.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayUnit {
    id: UnitId,
    name: String,
    spec: TransmitterSpec,
    max_range: f64,
}

impl RelayUnit {
    pub fn new(id: UnitId, name: impl Into<String>, spec: TransmitterSpec) -> Self {
        let max_range = spec.max_range();
        Self {
            id,
            name: name.into(),
            spec,
            max_range,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Name of the component carrying this unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &TransmitterSpec {
        &self.spec
    }

    pub fn nominal_range(&self) -> f64 {
        self.spec.nominal_range
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    pub fn hop_cost(&self, distance: f64, mode: PowerCostMode) -> LinkCost {
        self.spec.hop_cost(distance, mode)
    }

    /// Capability ranking used to pick a structure's best unit: longer max
    /// range first, then cheaper base cost per payload unit.
    pub fn capability_cmp(&self, other: &RelayUnit) -> Ordering {
        other
            .max_range
            .partial_cmp(&self.max_range)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.spec.base_cost().compare(&other.spec.base_cost()))
    }
}
