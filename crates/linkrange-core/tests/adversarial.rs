//! Adversarial input tests for the relay network.
//!
//! Tests edge cases that should either return errors or be handled gracefully
//! without panics.

use linkrange_core::config::{ConfigError, NetworkConfig};
use linkrange_core::geometry::{OpenSpace, PositionSource, Vec3};
use linkrange_core::ground::GroundStation;
use linkrange_core::id::{StructureId, UnitId};
use linkrange_core::network::{LinkTarget, RelayNetwork, ResolveContext};
use linkrange_core::scene::{Component, Scene, SceneError, StructureKind};
use linkrange_core::test_utils::*;
use linkrange_core::unit::TransmitterSpec;
use std::collections::HashSet;

/// Position source that hides some structures, as during a scene transition.
struct Partial<'a> {
    scene: &'a Scene,
    hidden: HashSet<StructureId>,
}

impl PositionSource for Partial<'_> {
    fn world_position(&self, structure: StructureId) -> Option<Vec3> {
        if self.hidden.contains(&structure) {
            None
        } else {
            self.scene.world_position(structure)
        }
    }
}

/// Missing position for the origin is "unreachable", not an error.
#[test]
fn origin_without_position_is_unreachable() {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", at(10.0), 100.0);
    let positions = Partial {
        scene: &scene,
        hidden: HashSet::from([a.structure]),
    };
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0).with_positions(&positions);

    let r = net.resolve(&ctx, a).unwrap();
    assert!(!r.can_transmit);
    assert_eq!(r.transmit_distance, f64::INFINITY);
}

/// Candidates without positions are skipped.
#[test]
fn candidate_without_position_is_skipped() {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", at(130.0), 100.0);
    let b = spawn_relay(&mut scene, "B", at(80.0), 100.0);
    let positions = Partial {
        scene: &scene,
        hidden: HashSet::from([b.structure]),
    };
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0).with_positions(&positions);

    assert!(!net.can_transmit(&ctx, a));
}

/// Resolving a unit id that never existed.
#[test]
fn unknown_unit_resolves_to_none() {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", at(10.0), 100.0);
    let b = spawn_relay(&mut scene, "B", at(20.0), 100.0);
    let bogus = UnitId::new(a.structure, b.component);
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

    assert!(net.resolve(&ctx, bogus).is_none());
    assert!(!net.can_transmit(&ctx, bogus));
    assert!(net.estimate_transmission(&ctx, bogus, 1.0).is_none());
}

/// A zero-range antenna can never transmit, even at zero distance.
#[test]
fn zero_range_antenna() {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", at(1.0), 0.0);
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);
    assert!(!net.can_transmit(&ctx, a));
}

/// A unit sitting exactly on the ground station.
#[test]
fn unit_on_top_of_ground_station() {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", Vec3::ZERO, 100.0);
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

    let r = net.resolve(&ctx, a).unwrap();
    assert!(r.can_transmit);
    assert_eq!(r.transmit_distance, 0.0);
    assert!(r.hop_cost.payload_size.is_finite());
}

/// Two structures at the same position.
#[test]
fn coincident_structures() {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", at(150.0), 100.0);
    let b = spawn_relay(&mut scene, "B", at(150.0), 100.0);
    spawn_relay(&mut scene, "C", at(60.0), 100.0);
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

    // Zero-distance hops are legal; each picks the other as its relay.
    assert!(net.can_transmit(&ctx, a));
    assert!(net.can_transmit(&ctx, b));
    assert_eq!(net.resolution(b).unwrap().transmit_distance, 0.0);
    assert_eq!(net.chain(b).last(), Some(&LinkTarget::GroundStation));
}

/// Structures whose relay components are all gone count as unreachable.
#[test]
fn structure_stripped_of_relays() {
    let mut scene = Scene::new();
    let a = spawn_relay(&mut scene, "A", at(50.0), 100.0);
    scene
        .add_component(a.structure, Component::new("tank"))
        .unwrap();
    scene.remove_component(a.structure, a.component).unwrap();
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

    assert!(net.relay_units(&scene, a.structure).is_empty());
    assert!(!net.has_connected_relay(&ctx, a.structure));
    assert!(net.tick(&ctx).is_empty());
}

/// Invalid antenna specs are skipped rather than failing the rebuild.
#[test]
fn invalid_spec_is_ignored() {
    let mut scene = Scene::new();
    let broken = TransmitterSpec::new(f64::NAN, 1.0, 1.0);
    let a = spawn_relay_with(&mut scene, "A", at(10.0), broken);
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

    assert!(net.resolve(&ctx, a).is_none());
}

/// Many relays in one long line still terminate with bounded recursion.
#[test]
fn long_chain() {
    let mut scene = Scene::new();
    let units: Vec<UnitId> = (1..=60)
        .map(|i| spawn_relay(&mut scene, "relay", at(i as f64 * 90.0), 100.0))
        .collect();
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

    let last = units[units.len() - 1];
    assert!(net.can_transmit(&ctx, last));
    assert_eq!(net.chain(last).len(), 60);
}

/// Dense cluster with no exit: every pair is in range, nobody reaches ground.
/// The search explores every simple path here, so keep it small.
#[test]
fn dense_cluster_without_exit() {
    let mut scene = Scene::new();
    let units: Vec<UnitId> = (0..6)
        .map(|i| spawn_relay(&mut scene, "relay", Vec3::new(10_000.0, i as f64, 0.0), 100.0))
        .collect();
    let mut net = network(test_config(f64::INFINITY));
    let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

    for unit in units {
        assert!(!net.can_transmit(&ctx, unit));
    }
}

/// Bad configurations are rejected at construction and on replacement.
#[test]
fn invalid_configuration() {
    let bad = NetworkConfig {
        grace_ratio: 1.5,
        ..NetworkConfig::default()
    };
    let ground = GroundStation::new(Vec3::ZERO, vec![100.0]);
    assert!(matches!(
        RelayNetwork::new(bad.clone(), ground),
        Err(ConfigError::GraceRatioOutOfRange(_))
    ));

    let mut net = network(test_config(100.0));
    assert!(net.set_config(bad).is_err());
    assert_eq!(net.config().ground_station_tiers, vec![100.0]);
}

/// Scene mutations on missing structures report errors.
#[test]
fn scene_errors() {
    let mut scene = Scene::new();
    let a = scene.spawn("A", StructureKind::Probe, Vec3::ZERO);
    scene.destroy(a).unwrap();

    assert_eq!(scene.destroy(a), Err(SceneError::StructureNotFound(a)));
    assert_eq!(
        scene.add_component(a, antenna(10.0)),
        Err(SceneError::StructureNotFound(a))
    );
    assert_eq!(scene.set_loaded(a, false), Err(SceneError::StructureNotFound(a)));

    let b = scene.spawn("B", StructureKind::Probe, Vec3::ZERO);
    assert_eq!(scene.couple(b, b), Err(SceneError::SelfCoupling(b)));
}

/// Destroying every structure mid-session leaves a consistent network.
#[test]
fn everything_destroyed() {
    let t = three_node(50.0, 60.0, 70.0, 100.0);
    let mut scene = t.scene;
    let mut net = network(test_config(f64::INFINITY));
    net.tick(&ResolveContext::new(&scene, &OpenSpace, 0));

    for unit in [t.a, t.b, t.c] {
        scene.destroy(unit.structure).unwrap();
    }
    net.apply_changes(scene.drain_changes());

    let ctx = ResolveContext::new(&scene, &OpenSpace, 1);
    assert!(net.tick(&ctx).is_empty());
    assert!(net.database().is_empty());
}
