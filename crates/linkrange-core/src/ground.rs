//! The ground station: the fixed terminal every chain ends at.

use crate::config::NetworkConfig;
use crate::geometry::Vec3;
use crate::id::BodyId;
use serde::{Deserialize, Serialize};

/// Fixed terminal endpoint with a tiered max range.
///
/// The station never searches for a next hop and can always transmit. Its
/// range is taken from `tiers[level]` and only changes when the host reports
/// an upgrade through [`GroundStation::set_upgrade_level`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundStation {
    position: Vec3,
    /// The body the station sits on; ignored by its own occlusion tests.
    host_body: Option<BodyId>,
    tiers: Vec<f64>,
    level: usize,
    max_range: f64,
}

impl GroundStation {
    /// Create a station at the lowest upgrade level. An empty tier list
    /// leaves the station with unbounded range.
    pub fn new(position: Vec3, tiers: Vec<f64>) -> Self {
        let max_range = tiers.first().copied().unwrap_or(f64::INFINITY);
        Self {
            position,
            host_body: None,
            tiers,
            level: 0,
            max_range,
        }
    }

    /// Station using the configured tier table.
    pub fn from_config(config: &NetworkConfig, position: Vec3) -> Self {
        Self::new(position, config.ground_station_tiers.clone())
    }

    pub fn with_host_body(mut self, body: BodyId) -> Self {
        self.host_body = Some(body);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the station (it rides on a rotating body).
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn host_body(&self) -> Option<BodyId> {
        self.host_body
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn tiers(&self) -> &[f64] {
        &self.tiers
    }

    /// The station is terminal: it can always transmit.
    pub fn can_transmit(&self) -> bool {
        true
    }

    /// Apply an upgrade notification. Levels past the last tier clamp to it.
    /// Returns the new max range.
    pub fn set_upgrade_level(&mut self, level: usize) -> f64 {
        let clamped = level.min(self.tiers.len().saturating_sub(1));
        if clamped != self.level || self.tier_range(clamped) != self.max_range {
            self.level = clamped;
            self.max_range = self.tier_range(clamped);
            log::info!(
                "ground station: upgrade level {clamped}, max range {}",
                self.max_range
            );
        }
        self.max_range
    }

    /// Replace the tier table, keeping the current level where possible.
    pub fn set_tiers(&mut self, tiers: Vec<f64>) -> f64 {
        self.tiers = tiers;
        let level = self.level;
        self.set_upgrade_level(level)
    }

    fn tier_range(&self, level: usize) -> f64 {
        self.tiers.get(level).copied().unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station() -> GroundStation {
        GroundStation::new(Vec3::ZERO, vec![100.0, 1000.0, 10000.0])
    }

    #[test]
    fn starts_at_lowest_tier() {
        let gs = station();
        assert_eq!(gs.level(), 0);
        assert_eq!(gs.max_range(), 100.0);
        assert!(gs.can_transmit());
    }

    #[test]
    fn upgrade_selects_tier() {
        let mut gs = station();
        assert_eq!(gs.set_upgrade_level(2), 10000.0);
        assert_eq!(gs.level(), 2);
        assert_eq!(gs.set_upgrade_level(1), 1000.0);
    }

    #[test]
    fn upgrade_past_last_tier_clamps() {
        let mut gs = station();
        assert_eq!(gs.set_upgrade_level(99), 10000.0);
        assert_eq!(gs.level(), 2);
    }

    #[test]
    fn empty_tiers_mean_unbounded_range() {
        let mut gs = GroundStation::new(Vec3::ZERO, vec![]);
        assert_eq!(gs.max_range(), f64::INFINITY);
        assert_eq!(gs.set_upgrade_level(3), f64::INFINITY);
    }

    #[test]
    fn set_tiers_reevaluates_range() {
        let mut gs = station();
        gs.set_upgrade_level(1);
        assert_eq!(gs.set_tiers(vec![5.0, 50.0]), 50.0);
        assert_eq!(gs.set_tiers(vec![7.0]), 7.0);
        assert_eq!(gs.level(), 0);
    }

    #[test]
    fn host_body_recorded() {
        let gs = station().with_host_body(BodyId(1));
        assert_eq!(gs.host_body(), Some(BodyId(1)));
    }
}
