//! Recursive nearest-relay search.
//!
//! A unit resolves its next hop by scanning every other relay-capable
//! structure in range, nearest first in effect, and recursively resolving the
//! candidate's own units. A candidate is viable only if one of its units can
//! itself reach the ground station, so the search finds the nearest relay
//! that actually leads somewhere. When no relay qualifies the unit aims at
//! the ground station directly.
//!
//! Cycles are broken by the search's in-progress set: a structure being
//! resolved further up the call stack is never a candidate. The set lives in
//! the per-call [`Search`] value, so it is empty again once the top-level
//! call returns, on every exit path.
//!
//! Resolutions are cached per unit. A cached result is reused while it is
//! younger than `debounce_ticks`, as long as the caller is at least as
//! restricted as the search that produced it and its chain does not pass
//! through a structure that is currently in progress. A unit that looks
//! unreachable from inside another unit's search may well be reachable once
//! that structure is free again, so such results are never handed to a
//! top-level caller.

use crate::config::RangeModel;
use crate::cost::LinkCost;
use crate::geometry::{Sightline, Vec3};
use crate::id::{StructureId, UnitId};
use crate::network::{RelayNetwork, ResolveContext, Resolution};
use crate::unit::RelayUnit;
use std::collections::HashSet;
use std::rc::Rc;

/// Per-call search state.
#[derive(Debug, Default)]
pub(crate) struct Search {
    in_progress: HashSet<StructureId>,
}

impl Search {
    pub(crate) fn is_idle(&self) -> bool {
        self.in_progress.is_empty()
    }
}

// Best relay found so far.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    unit: UnitId,
    distance: f64,
    chain_cost: LinkCost,
}

impl RelayNetwork {
    /// Resolve one unit, reusing a fresh cached result when that is safe.
    pub(crate) fn resolve_unit(
        &mut self,
        ctx: &ResolveContext<'_>,
        unit: &RelayUnit,
        search: &mut Search,
    ) -> Resolution {
        let debounce = self.config.debounce_ticks;
        let cached = self
            .resolutions
            .get(&unit.id())
            .filter(|r| r.is_fresh(ctx.tick, debounce) && r.holds_under(&search.in_progress))
            .cloned();
        if let Some(cached) = cached {
            if self.chain_avoids(&cached, &search.in_progress) {
                self.stats.cache_hits += 1;
                return cached;
            }
        }

        let resolution = self.search_from(ctx, unit, search);
        // A restricted result never displaces a current unrestricted one.
        let keep_existing = !resolution.is_unconstrained()
            && self.resolutions.get(&unit.id()).is_some_and(|r| {
                r.is_unconstrained() && (r.resolved_at == ctx.tick || r.is_fresh(ctx.tick, debounce))
            });
        if !keep_existing {
            self.resolutions.insert(unit.id(), resolution.clone());
        }
        resolution
    }

    // Whether the cached chain starting at `resolution` reaches the ground
    // station while staying clear of every in-progress structure.
    fn chain_avoids(&self, resolution: &Resolution, in_progress: &HashSet<StructureId>) -> bool {
        if !resolution.can_transmit {
            return true;
        }
        let mut next = resolution.nearest_relay;
        let mut steps = 0;
        while let Some(relay) = next {
            if in_progress.contains(&relay.structure) {
                return false;
            }
            steps += 1;
            if steps > self.resolutions.len() {
                // A loop among cached results.
                return false;
            }
            // A missing or broken link downstream cannot vouch for the chain.
            let Some(hop) = self.resolutions.get(&relay).filter(|r| r.can_transmit) else {
                return false;
            };
            next = hop.nearest_relay;
        }
        true
    }

    fn search_from(&mut self, ctx: &ResolveContext<'_>, unit: &RelayUnit, search: &mut Search) -> Resolution {
        self.stats.searches += 1;
        let origin = unit.id().structure;
        let Some(origin_pos) = ctx.positions.world_position(origin) else {
            log::debug!("resolver: {:?} has no position", unit.id());
            return Resolution::unreachable(unit, ctx.tick);
        };

        // Ground link first: when it is usable it bounds the relay search.
        let ground_pos = self.ground.position();
        let ground_distance = origin_pos.distance(ground_pos);
        let ground_in_range = self.link_in_range(unit.max_range(), self.ground.max_range(), ground_distance);
        let ground_sight = if ground_in_range && self.config.require_line_of_sight {
            let host = self.ground.host_body();
            ctx.occluder
                .line_of_sight(origin_pos, ground_pos, host.as_slice(), self.config.grace_ratio)
        } else {
            Sightline::Clear
        };
        let ground_usable = ground_in_range && ground_sight.is_clear();
        let ground_bound = if ground_usable {
            ground_distance
        } else {
            f64::INFINITY
        };

        let excluded: Vec<StructureId> = search.in_progress.iter().copied().collect();
        search.in_progress.insert(origin);
        let relay = self.nearest_candidate(ctx, unit, origin_pos, ground_bound, search);
        search.in_progress.remove(&origin);

        let mode = self.config.power_cost_mode;
        match relay {
            Some(found) => Resolution {
                unit: unit.id(),
                nearest_relay: Some(found.unit),
                transmit_distance: found.distance,
                nominal_range: unit.nominal_range(),
                can_transmit: true,
                obstruction: None,
                hop_cost: unit.hop_cost(found.distance, mode),
                chain_cost: Some(found.chain_cost),
                resolved_at: ctx.tick,
                excluded,
            },
            None => {
                let hop_cost = unit.hop_cost(ground_distance, mode);
                Resolution {
                    unit: unit.id(),
                    nearest_relay: None,
                    transmit_distance: ground_distance,
                    nominal_range: unit.nominal_range(),
                    can_transmit: ground_usable,
                    obstruction: ground_sight.obstruction(),
                    hop_cost,
                    chain_cost: ground_usable.then_some(hop_cost),
                    resolved_at: ctx.tick,
                    excluded,
                }
            }
        }
    }

    fn nearest_candidate(
        &mut self,
        ctx: &ResolveContext<'_>,
        origin: &RelayUnit,
        origin_pos: Vec3,
        ground_bound: f64,
        search: &mut Search,
    ) -> Option<Candidate> {
        let range_bound = if self.link_bounded_by_origin() {
            origin.max_range()
        } else {
            f64::INFINITY
        };

        let mut best: Option<Candidate> = None;
        for (id, structure) in ctx.scene.structures() {
            if !structure.kind.is_relay_capable() || search.in_progress.contains(&id) {
                continue;
            }
            let Some(pos) = ctx.positions.world_position(id) else {
                continue;
            };

            let distance = origin_pos.distance(pos);
            let bound = ground_bound.min(range_bound);
            let not_closer = best.is_some_and(|b| distance >= b.distance);
            if distance > bound || not_closer {
                self.stats.candidates_pruned += 1;
                log::trace!(
                    "resolver: pruned {id:?} for {:?} at distance {distance}",
                    origin.id()
                );
                continue;
            }

            let units = self.database.lookup(ctx.scene, id);
            if units.is_empty() {
                continue;
            }
            self.stats.candidates_examined += 1;

            if self.config.require_line_of_sight
                && !ctx
                    .occluder
                    .line_of_sight(origin_pos, pos, &[], self.config.grace_ratio)
                    .is_clear()
            {
                continue;
            }

            if let Some(found) = self.viable_unit(ctx, origin, &units, distance, search) {
                best = Some(found);
            }
        }
        best
    }

    // A unit of the candidate structure that can carry the link onward.
    fn viable_unit(
        &mut self,
        ctx: &ResolveContext<'_>,
        origin: &RelayUnit,
        units: &Rc<[RelayUnit]>,
        distance: f64,
        search: &mut Search,
    ) -> Option<Candidate> {
        let hop = origin.hop_cost(distance, self.config.power_cost_mode);
        let mut chosen: Option<Candidate> = None;

        for unit in units.iter() {
            if !self.link_in_range(origin.max_range(), unit.max_range(), distance) {
                continue;
            }
            let resolution = self.resolve_unit(ctx, unit, search);
            let Some(downstream) = resolution.chain_cost.filter(|_| resolution.can_transmit) else {
                continue;
            };

            let found = Candidate {
                unit: unit.id(),
                distance,
                chain_cost: hop.merge(downstream),
            };
            if !self.config.exhaustive_candidates {
                return Some(found);
            }
            if chosen.is_none_or(|c| found.chain_cost.is_cheaper_than(&c.chain_cost)) {
                chosen = Some(found);
            }
        }
        chosen
    }

    fn link_bounded_by_origin(&self) -> bool {
        self.config.range_model == RangeModel::Standard
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{NetworkConfig, PowerCostMode, RangeModel};
    use crate::geometry::{Body, BodyField, OpenSpace, Vec3};
    use crate::ground::GroundStation;
    use crate::id::{BodyId, StructureId, UnitId};
    use crate::network::{LinkTarget, RelayNetwork, ResolveContext};
    use crate::scene::{Component, Scene, StructureKind};
    use crate::unit::{Facet, TransmitterSpec};

    fn config() -> NetworkConfig {
        NetworkConfig {
            debounce_ticks: 0,
            ground_station_tiers: vec![1_000.0],
            ..NetworkConfig::default()
        }
    }

    fn network(config: NetworkConfig) -> RelayNetwork {
        let ground = GroundStation::from_config(&config, Vec3::ZERO);
        RelayNetwork::new(config, ground).unwrap()
    }

    fn relay(scene: &mut Scene, name: &str, x: f64, range: f64) -> (StructureId, UnitId) {
        let id = scene.spawn(name, StructureKind::Probe, Vec3::new(x, 0.0, 0.0));
        let comp = scene
            .add_component(
                id,
                Component::new("antenna").with_facet(Facet::Antenna(TransmitterSpec::new(range, 1.0, 1.0))),
            )
            .unwrap();
        (id, UnitId::new(id, comp))
    }

    #[test]
    fn direct_ground_link_when_no_relays() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 50.0, 100.0);
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        let r = net.resolve(&ctx, a).unwrap();
        assert!(r.can_transmit);
        assert_eq!(r.nearest_relay, None);
        assert_eq!(r.transmit_distance, 50.0);
        assert_eq!(r.target(), Some(LinkTarget::GroundStation));
    }

    #[test]
    fn relay_is_used_when_ground_out_of_range() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 150.0, 100.0);
        let (_, b) = relay(&mut scene, "b", 80.0, 100.0);
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        let r = net.resolve(&ctx, a).unwrap();
        assert!(r.can_transmit);
        assert_eq!(r.nearest_relay, Some(b));
        assert_eq!(r.transmit_distance, 70.0);
    }

    #[test]
    fn ground_is_preferred_when_closer_than_any_relay() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 50.0, 100.0);
        relay(&mut scene, "b", 110.0, 100.0);
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        assert_eq!(net.find_nearest_relay(&ctx, a), None);
        assert!(net.can_transmit(&ctx, a));
    }

    #[test]
    fn dead_end_relay_is_skipped() {
        let mut scene = Scene::new();
        // b is near a but cannot reach anything; c leads to the ground.
        let (_, a) = relay(&mut scene, "a", 250.0, 100.0);
        let (_, c) = relay(&mut scene, "c", 170.0, 200.0);
        let (b_id, _) = relay(&mut scene, "b", 300.0, 10.0);
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        let r = net.resolve(&ctx, a).unwrap();
        assert_eq!(r.nearest_relay, Some(c));
        assert!(r.nearest_relay.unwrap().structure != b_id);
    }

    #[test]
    fn isolated_unit_cannot_transmit() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 5_000.0, 100.0);
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        let r = net.resolve(&ctx, a).unwrap();
        assert!(!r.can_transmit);
        assert_eq!(r.target(), None);
        assert_eq!(r.chain_cost, None);
    }

    #[test]
    fn mutual_relays_without_ground_do_not_loop() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 5_000.0, 100.0);
        let (_, b) = relay(&mut scene, "b", 5_050.0, 100.0);
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        assert!(!net.can_transmit(&ctx, a));
        assert!(!net.can_transmit(&ctx, b));
    }

    #[test]
    fn blocked_ground_link_records_obstruction() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 100.0, 200.0);
        let field = BodyField::new().with_body(Body {
            id: BodyId(3),
            center: Vec3::new(50.0, 0.0, 0.0),
            radius: 10.0,
        });
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &field, 0);

        let r = net.resolve(&ctx, a).unwrap();
        assert!(!r.can_transmit);
        assert_eq!(r.obstruction, Some(BodyId(3)));
        assert_eq!(net.obstruction(a), Some(BodyId(3)));
    }

    #[test]
    fn host_body_does_not_block_ground_link() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 100.0, 200.0);
        let field = BodyField::new().with_body(Body {
            id: BodyId(1),
            center: Vec3::new(-5.0, 0.0, 0.0),
            radius: 6.0,
        });
        let cfg = config();
        let ground = GroundStation::from_config(&cfg, Vec3::ZERO).with_host_body(BodyId(1));
        let mut net = RelayNetwork::new(cfg, ground).unwrap();
        let ctx = ResolveContext::new(&scene, &field, 0);

        assert!(net.can_transmit(&ctx, a));
    }

    #[test]
    fn line_of_sight_can_be_disabled() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 100.0, 200.0);
        let field = BodyField::new().with_body(Body {
            id: BodyId(3),
            center: Vec3::new(50.0, 0.0, 0.0),
            radius: 10.0,
        });
        let mut net = network(NetworkConfig {
            require_line_of_sight: false,
            ..config()
        });
        let ctx = ResolveContext::new(&scene, &field, 0);

        assert!(net.can_transmit(&ctx, a));
    }

    #[test]
    fn additive_model_extends_pairwise_range() {
        let mut scene = Scene::new();
        // 400 apart: beyond a's own 100 but within sqrt(100 * 2500).
        let (_, a) = relay(&mut scene, "a", 1_300.0, 100.0);
        let (_, b) = relay(&mut scene, "b", 900.0, 2_500.0);
        let mut net = network(NetworkConfig {
            range_model: RangeModel::Additive,
            ..config()
        });
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        assert_eq!(net.find_nearest_relay(&ctx, a), Some(b));
    }

    #[test]
    fn fixed_mode_keeps_base_cost_past_nominal() {
        let mut scene = Scene::new();
        let id = scene.spawn("a", StructureKind::Probe, Vec3::new(150.0, 0.0, 0.0));
        let spec = TransmitterSpec::new(100.0, 4.0, 2.0);
        let comp = scene
            .add_component(id, Component::new("dish").with_facet(Facet::Antenna(spec)))
            .unwrap();
        let a = UnitId::new(id, comp);
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        let mut fixed = network(NetworkConfig {
            power_cost_mode: PowerCostMode::Fixed,
            ..config()
        });
        let r = fixed.resolve(&ctx, a).unwrap();
        assert!(r.can_transmit);
        assert_eq!(r.hop_cost.resource_cost, 10.0);
        assert!(r.hop_cost.payload_size < 2.0);

        let mut scaling = network(config());
        let r = scaling.resolve(&ctx, a).unwrap();
        assert!((r.hop_cost.resource_cost - 22.5).abs() < 1e-9);
        assert_eq!(r.hop_cost.payload_size, 2.0);
    }

    #[test]
    fn in_progress_set_is_empty_after_every_call() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 150.0, 100.0);
        relay(&mut scene, "b", 80.0, 100.0);
        relay(&mut scene, "c", 5_000.0, 100.0);
        let mut net = network(config());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        let mut search = super::Search::default();
        let unit = net.database.unit(&scene, a).unwrap();
        net.resolve_unit(&ctx, &unit, &mut search);
        assert!(search.is_idle());
    }

    // -----------------------------------------------------------------------
    // Debounced reuse
    // -----------------------------------------------------------------------

    fn debounced() -> NetworkConfig {
        NetworkConfig {
            debounce_ticks: 4,
            ..config()
        }
    }

    #[test]
    fn restricted_unreachable_result_is_not_reused_at_top_level() {
        // b can only reach the ground through a.
        let mut scene = Scene::new();
        let (a_id, a) = relay(&mut scene, "a", 90.0, 100.0);
        let (_, b) = relay(&mut scene, "b", 150.0, 100.0);
        let mut net = network(debounced());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        // Resolving a visits b while a is in progress.
        assert!(net.can_transmit(&ctx, a));
        let nested = net.resolution(b).unwrap();
        assert!(!nested.can_transmit);
        assert_eq!(nested.excluded, vec![a_id]);

        assert!(net.can_transmit(&ctx, b));
        let top = net.resolution(b).unwrap();
        assert!(top.is_unconstrained());
        assert_eq!(top.nearest_relay, Some(a));
    }

    #[test]
    fn restricted_result_does_not_displace_current_one() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 90.0, 100.0);
        let (_, b) = relay(&mut scene, "b", 150.0, 100.0);
        let mut net = network(debounced());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        assert_eq!(net.find_nearest_relay(&ctx, b), Some(a));
        // a's cached entry was computed inside b's search, so a searches
        // again and revisits b with a in progress.
        assert!(net.can_transmit(&ctx, a));
        assert!(net.resolution(a).unwrap().is_unconstrained());

        let kept = net.resolution(b).unwrap();
        assert!(kept.is_unconstrained());
        assert!(kept.can_transmit);
        assert_eq!(kept.nearest_relay, Some(a));
    }

    #[test]
    fn unconstrained_result_serves_nested_callers() {
        let mut scene = Scene::new();
        let (_, a) = relay(&mut scene, "a", 90.0, 100.0);
        let (_, b) = relay(&mut scene, "b", 150.0, 100.0);
        let mut net = network(debounced());
        let ctx = ResolveContext::new(&scene, &OpenSpace, 0);

        assert!(net.can_transmit(&ctx, a));
        let hits = net.stats().cache_hits;
        // b's search reuses a's top-level result instead of searching again.
        assert!(net.can_transmit(&ctx, b));
        assert_eq!(net.stats().cache_hits, hits + 1);
        assert_eq!(net.stats().searches, 3);
    }
}
