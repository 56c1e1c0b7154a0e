//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::NetworkConfig;
use crate::geometry::Vec3;
use crate::ground::GroundStation;
use crate::id::{StructureId, UnitId};
use crate::network::RelayNetwork;
use crate::scene::{Component, Scene, StructureKind};
use crate::unit::{Facet, TransmitterSpec};
use std::collections::HashSet;

// ===========================================================================
// Positions
// ===========================================================================

/// A point on the x axis.
pub fn at(x: f64) -> Vec3 {
    Vec3::new(x, 0.0, 0.0)
}

// ===========================================================================
// Component constructors
// ===========================================================================

/// Antenna whose max range equals its nominal range.
pub fn antenna(range: f64) -> Component {
    antenna_with(TransmitterSpec::new(range, 1.0, 2.0))
}

pub fn antenna_with(spec: TransmitterSpec) -> Component {
    Component::new("antenna").with_facet(Facet::Antenna(spec))
}

pub fn command_seat(crew: u32) -> Component {
    Component::new("command seat").with_facet(Facet::CommandSeat { crew })
}

// ===========================================================================
// Scene builders
// ===========================================================================

/// Spawn a probe with a single antenna. Returns the antenna's unit id.
pub fn spawn_relay(scene: &mut Scene, name: &str, position: Vec3, range: f64) -> UnitId {
    spawn_relay_with(scene, name, position, TransmitterSpec::new(range, 1.0, 2.0))
}

pub fn spawn_relay_with(scene: &mut Scene, name: &str, position: Vec3, spec: TransmitterSpec) -> UnitId {
    let structure = scene.spawn(name, StructureKind::Probe, position);
    add_antenna(scene, structure, spec)
}

pub fn add_antenna(scene: &mut Scene, structure: StructureId, spec: TransmitterSpec) -> UnitId {
    let component = scene
        .add_component(structure, antenna_with(spec))
        .expect("structure exists");
    UnitId::new(structure, component)
}

/// Three single-antenna probes on the x axis sharing one range, with the
/// change feed already drained.
pub struct ThreeNode {
    pub scene: Scene,
    pub a: UnitId,
    pub b: UnitId,
    pub c: UnitId,
}

pub fn three_node(a: f64, b: f64, c: f64, range: f64) -> ThreeNode {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", at(a), range);
    let b = spawn_relay(&mut scene, "B", at(b), range);
    let c = spawn_relay(&mut scene, "C", at(c), range);
    scene.drain_changes();
    ThreeNode { scene, a, b, c }
}

// ===========================================================================
// Network constructors
// ===========================================================================

/// Configuration with debouncing off and a single ground tier.
pub fn test_config(ground_range: f64) -> NetworkConfig {
    NetworkConfig {
        debounce_ticks: 0,
        ground_station_tiers: vec![ground_range],
        ..NetworkConfig::default()
    }
}

/// Network with its ground station at the origin.
pub fn network(config: NetworkConfig) -> RelayNetwork {
    let ground = GroundStation::from_config(&config, Vec3::ZERO);
    RelayNetwork::new(config, ground).expect("valid test config")
}

// ===========================================================================
// Brute-force reference
// ===========================================================================

/// Exhaustive reachability over a flat list of single-antenna nodes, used to
/// check the resolver on small graphs.
///
/// Only the standard range model without occlusion is modelled: `u -> v`
/// exists when `d(u, v) <= u.range`.
#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    pub nodes: Vec<(Vec3, f64)>,
    pub ground: Vec3,
}

impl ReferenceGraph {
    pub fn new(ground: Vec3) -> Self {
        Self {
            nodes: Vec::new(),
            ground,
        }
    }

    pub fn add(&mut self, position: Vec3, range: f64) -> usize {
        self.nodes.push((position, range));
        self.nodes.len() - 1
    }

    pub fn distance(&self, a: usize, b: usize) -> f64 {
        self.nodes[a].0.distance(self.nodes[b].0)
    }

    pub fn ground_distance(&self, node: usize) -> f64 {
        self.nodes[node].0.distance(self.ground)
    }

    pub fn reaches_ground_directly(&self, node: usize) -> bool {
        self.ground_distance(node) <= self.nodes[node].1
    }

    /// Whether `from` has a path to the ground that never enters `avoiding`.
    pub fn reaches_ground(&self, from: usize, avoiding: &HashSet<usize>) -> bool {
        let mut seen: HashSet<usize> = avoiding.clone();
        let mut stack = vec![from];
        seen.insert(from);
        while let Some(node) = stack.pop() {
            if self.reaches_ground_directly(node) {
                return true;
            }
            for next in 0..self.nodes.len() {
                if !seen.contains(&next) && self.distance(node, next) <= self.nodes[node].1 {
                    seen.insert(next);
                    stack.push(next);
                }
            }
        }
        false
    }

    /// The relay a top-level resolution of `from` should pick: the nearest
    /// in-range node that reaches the ground without passing back through
    /// `from`, provided it is no farther than a usable ground link.
    pub fn expected_relay(&self, from: usize) -> Option<usize> {
        let bound = if self.reaches_ground_directly(from) {
            self.ground_distance(from)
        } else {
            self.nodes[from].1
        };
        let avoiding = HashSet::from([from]);
        (0..self.nodes.len())
            .filter(|&n| n != from)
            .filter(|&n| self.distance(from, n) <= bound)
            .filter(|&n| self.reaches_ground(n, &avoiding))
            .min_by(|&a, &b| self.distance(from, a).total_cmp(&self.distance(from, b)))
    }
}
