//! Network-wide configuration.
//!
//! Owned by the host. Every field has a default, so partial configuration
//! files deserialize cleanly. Call [`NetworkConfig::validate`] after loading.

use crate::Ticks;
use serde::{Deserialize, Serialize};

/// How transmission cost reacts to distance beyond the nominal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerCostMode {
    /// Cost grows with the square of distance past nominal range.
    #[default]
    Scaling,
    /// Cost stays at base; payload shrinks with distance instead.
    Fixed,
}

/// How the reach of a link between two transmitters is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeModel {
    /// A link is in range when it is within the sender's max range.
    #[default]
    Standard,
    /// A link is in range when it is within the geometric mean of both ends'
    /// max ranges.
    Additive,
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("grace ratio must be in [0, 1), got {0}")]
    GraceRatioOutOfRange(f64),
    #[error("ground station needs at least one range tier")]
    NoGroundStationTiers,
    #[error("ground station tier {index} has invalid range {range}")]
    InvalidTier { index: usize, range: f64 },
    #[error("ground station tiers must be non-decreasing (tier {index})")]
    TiersNotOrdered { index: usize },
}

/// Configuration consumed by the resolver and the ground station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Reject links whose line of sight is blocked by a body.
    pub require_line_of_sight: bool,
    /// Fraction by which body radii shrink for occlusion tests.
    pub grace_ratio: f64,
    pub power_cost_mode: PowerCostMode,
    /// Ticks during which a unit's resolution is reused without searching.
    pub debounce_ticks: Ticks,
    pub range_model: RangeModel,
    /// Compare every capable unit of a candidate structure instead of taking
    /// the first one that can transmit.
    pub exhaustive_candidates: bool,
    /// Uncrewed structures need a connected relay to accept control input.
    pub require_connection_for_control: bool,
    /// Ground station max range per upgrade level, lowest level first.
    pub ground_station_tiers: Vec<f64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            require_line_of_sight: true,
            grace_ratio: 0.05,
            power_cost_mode: PowerCostMode::Scaling,
            debounce_ticks: 4,
            range_model: RangeModel::Standard,
            exhaustive_candidates: false,
            require_connection_for_control: false,
            ground_station_tiers: vec![2.0e9, 5.0e10, 2.5e11],
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.grace_ratio) {
            return Err(ConfigError::GraceRatioOutOfRange(self.grace_ratio));
        }
        if self.ground_station_tiers.is_empty() {
            return Err(ConfigError::NoGroundStationTiers);
        }
        for (index, &range) in self.ground_station_tiers.iter().enumerate() {
            if range.is_nan() || range <= 0.0 {
                return Err(ConfigError::InvalidTier { index, range });
            }
            if index > 0 && range < self.ground_station_tiers[index - 1] {
                return Err(ConfigError::TiersNotOrdered { index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(NetworkConfig::default().validate().is_ok());
    }

    #[test]
    fn grace_ratio_out_of_range_rejected() {
        let config = NetworkConfig {
            grace_ratio: 1.0,
            ..NetworkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::GraceRatioOutOfRange(1.0)));
    }

    #[test]
    fn empty_tiers_rejected() {
        let config = NetworkConfig {
            ground_station_tiers: vec![],
            ..NetworkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoGroundStationTiers));
    }

    #[test]
    fn negative_tier_rejected() {
        let config = NetworkConfig {
            ground_station_tiers: vec![1.0, -5.0],
            ..NetworkConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTier { index: 1, .. })
        ));
    }

    #[test]
    fn descending_tiers_rejected() {
        let config = NetworkConfig {
            ground_station_tiers: vec![10.0, 5.0],
            ..NetworkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::TiersNotOrdered { index: 1 }));
    }

    #[test]
    fn error_messages_name_the_problem() {
        let e = ConfigError::InvalidTier {
            index: 2,
            range: -1.0,
        };
        let msg = format!("{e}");
        assert!(msg.contains("tier 2"));
        assert!(msg.contains("-1"));
    }
}
