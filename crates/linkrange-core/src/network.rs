//! The relay network service.
//!
//! [`RelayNetwork`] owns the topology cache, the ground station, and the
//! per-unit resolution cache for one session. Construct it when a session
//! starts, forward structural changes to it, call [`RelayNetwork::tick`] once
//! per simulation tick, and drop it when the session ends.
//!
//! The recursive search itself lives in [`crate::resolver`].

use crate::Ticks;
use crate::config::{ConfigError, NetworkConfig, RangeModel};
use crate::cost::LinkCost;
use crate::database::RelayDatabase;
use crate::geometry::{Occluder, PositionSource, Vec3};
use crate::ground::GroundStation;
use crate::id::{BodyId, StructureId, UnitId};
use crate::resolver::Search;
use crate::scene::{Scene, StructuralChange};
use crate::status::{ConnectionStatus, NetworkEvent};
use crate::unit::RelayUnit;
use slotmap::SecondaryMap;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Resolution context
// ---------------------------------------------------------------------------

/// Everything a resolution reads from the outside world.
///
/// The scene and position source are borrowed immutably for the whole call,
/// so positions cannot move while a resolution is in flight.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub scene: &'a Scene,
    pub positions: &'a dyn PositionSource,
    pub occluder: &'a dyn Occluder,
    /// The current simulation tick.
    pub tick: Ticks,
}

impl<'a> ResolveContext<'a> {
    /// Context using the scene's own positions.
    pub fn new(scene: &'a Scene, occluder: &'a dyn Occluder, tick: Ticks) -> Self {
        Self {
            scene,
            positions: scene,
            occluder,
            tick,
        }
    }

    pub fn with_positions(mut self, positions: &'a dyn PositionSource) -> Self {
        self.positions = positions;
        self
    }
}

// ---------------------------------------------------------------------------
// Resolution results
// ---------------------------------------------------------------------------

/// Where a unit's first hop goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTarget {
    Relay(UnitId),
    GroundStation,
}

/// Outcome of resolving one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub unit: UnitId,
    /// Next hop relay, or `None` when the unit aims at the ground station.
    pub nearest_relay: Option<UnitId>,
    /// Distance of the first hop. Infinite when the unit has no position.
    pub transmit_distance: f64,
    pub nominal_range: f64,
    pub can_transmit: bool,
    /// First body blocking the line to the ground station, if any.
    pub obstruction: Option<BodyId>,
    /// Economics of the first hop.
    pub hop_cost: LinkCost,
    /// Merged economics of the whole chain, when connected.
    pub chain_cost: Option<LinkCost>,
    pub resolved_at: Ticks,
    /// Structures that were being resolved further up the search when this
    /// result was computed, and so could not serve as relays. Empty for a
    /// top-level search.
    pub excluded: Vec<StructureId>,
}

impl Resolution {
    pub(crate) fn unreachable(unit: &RelayUnit, tick: Ticks) -> Self {
        Self {
            unit: unit.id(),
            nearest_relay: None,
            transmit_distance: f64::INFINITY,
            nominal_range: unit.nominal_range(),
            can_transmit: false,
            obstruction: None,
            hop_cost: LinkCost::new(f64::INFINITY, 0.0),
            chain_cost: None,
            resolved_at: tick,
            excluded: Vec::new(),
        }
    }

    pub fn target(&self) -> Option<LinkTarget> {
        if !self.can_transmit {
            return None;
        }
        Some(match self.nearest_relay {
            Some(relay) => LinkTarget::Relay(relay),
            None => LinkTarget::GroundStation,
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::classify(self.can_transmit, self.transmit_distance, self.nominal_range)
    }

    /// Whether this result may be reused at `tick`.
    pub fn is_fresh(&self, tick: Ticks, debounce: Ticks) -> bool {
        tick >= self.resolved_at && tick - self.resolved_at < debounce
    }

    /// Computed by a top-level search, with every structure available.
    pub fn is_unconstrained(&self) -> bool {
        self.excluded.is_empty()
    }

    /// Whether a caller that cannot use the structures in `in_progress` sees
    /// at least the same restrictions this result was computed under.
    pub fn holds_under(&self, in_progress: &HashSet<StructureId>) -> bool {
        self.excluded.iter().all(|s| in_progress.contains(s))
    }
}

/// Cost of sending a block of data over a unit's first hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionEstimate {
    pub packets: u64,
    pub packet: LinkCost,
    pub total_resource: f64,
}

/// Cumulative resolver counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Searches actually performed (debounce misses).
    pub searches: u64,
    /// Resolutions served from the debounce cache.
    pub cache_hits: u64,
    /// Candidate structures that survived pruning and were examined.
    pub candidates_examined: u64,
    /// Candidate structures cut by the distance bound.
    pub candidates_pruned: u64,
    /// Topology cache rebuilds.
    pub rebuilds: u64,
}

// ---------------------------------------------------------------------------
// RelayNetwork
// ---------------------------------------------------------------------------

/// Session-scoped relay resolution service.
#[derive(Debug)]
pub struct RelayNetwork {
    pub(crate) config: NetworkConfig,
    pub(crate) database: RelayDatabase,
    pub(crate) ground: GroundStation,
    pub(crate) resolutions: HashMap<UnitId, Resolution>,
    pub(crate) stats: ResolverStats,
    statuses: SecondaryMap<StructureId, ConnectionStatus>,
    reported_obstructions: HashMap<UnitId, BodyId>,
}

impl RelayNetwork {
    pub fn new(config: NetworkConfig, ground: GroundStation) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            database: RelayDatabase::new(),
            ground,
            resolutions: HashMap::new(),
            stats: ResolverStats::default(),
            statuses: SecondaryMap::new(),
            reported_obstructions: HashMap::new(),
        })
    }

    // -- Configuration and lifecycle --

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Replace the configuration. Cached resolutions are discarded.
    pub fn set_config(&mut self, config: NetworkConfig) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            log::warn!("relay network: rejected configuration: {e}");
            return Err(e);
        }
        self.ground.set_tiers(config.ground_station_tiers.clone());
        self.config = config;
        self.resolutions.clear();
        Ok(())
    }

    pub fn ground_station(&self) -> &GroundStation {
        &self.ground
    }

    /// Move the ground station. Cached resolutions are discarded.
    pub fn move_ground_station(&mut self, position: Vec3) {
        self.ground.set_position(position);
        self.resolutions.clear();
    }

    pub fn database(&self) -> &RelayDatabase {
        &self.database
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            rebuilds: self.database.rebuild_count(),
            ..self.stats
        }
    }

    /// Ground station upgrade notification. Returns the new max range.
    pub fn on_upgrade(&mut self, level: usize) -> f64 {
        let range = self.ground.set_upgrade_level(level);
        self.resolutions.clear();
        range
    }

    /// Feed one structural change to the caches.
    pub fn on_structural_change(&mut self, change: &StructuralChange) {
        self.database.apply(change);
        match *change {
            StructuralChange::Modified(id)
            | StructuralChange::Destroyed(id)
            | StructuralChange::LoadStateChanged(id) => self.forget_structure(id),
            StructuralChange::Coupled { from, into } => {
                self.forget_structure(from);
                self.forget_structure(into);
            }
            StructuralChange::Decoupled { original, split } => {
                self.forget_structure(original);
                self.forget_structure(split);
            }
            StructuralChange::SceneReset | StructuralChange::GameStateLoaded => self.reset(),
        }
    }

    pub fn apply_changes(&mut self, changes: impl IntoIterator<Item = StructuralChange>) {
        for change in changes {
            self.on_structural_change(&change);
        }
    }

    /// Drop every cached inventory, resolution and status.
    pub fn reset(&mut self) {
        self.database.clear();
        self.resolutions.clear();
        self.statuses.clear();
        self.reported_obstructions.clear();
    }

    // Drop resolutions of the structure's units and those pointing at them.
    fn forget_structure(&mut self, id: StructureId) {
        self.resolutions.retain(|unit, resolution| {
            unit.structure != id && resolution.nearest_relay.is_none_or(|r| r.structure != id)
        });
        self.reported_obstructions.retain(|unit, _| unit.structure != id);
    }

    // -- Topology queries --

    pub fn relay_units(&mut self, scene: &Scene, structure: StructureId) -> Rc<[RelayUnit]> {
        self.database.lookup(scene, structure)
    }

    pub fn best_unit(&mut self, scene: &Scene, structure: StructureId) -> Option<RelayUnit> {
        self.database.best_unit(scene, structure)
    }

    // -- Resolution --

    /// Resolve a unit's next hop and transmit capability.
    ///
    /// Returns `None` if the unit no longer exists.
    pub fn resolve(&mut self, ctx: &ResolveContext<'_>, unit: UnitId) -> Option<Resolution> {
        let Some(relay) = self.database.unit(ctx.scene, unit) else {
            self.resolutions.remove(&unit);
            return None;
        };
        Some(self.resolve_top_level(ctx, &relay))
    }

    /// The relay a unit transmits through, or `None` when it aims at the
    /// ground station or cannot transmit at all.
    pub fn find_nearest_relay(&mut self, ctx: &ResolveContext<'_>, unit: UnitId) -> Option<UnitId> {
        self.resolve(ctx, unit)
            .filter(|r| r.can_transmit)
            .and_then(|r| r.nearest_relay)
    }

    pub fn can_transmit(&mut self, ctx: &ResolveContext<'_>, unit: UnitId) -> bool {
        self.resolve(ctx, unit).is_some_and(|r| r.can_transmit)
    }

    /// Last cached resolution of a unit, without resolving. It may have
    /// been computed inside another unit's search; see
    /// [`Resolution::excluded`].
    pub fn resolution(&self, unit: UnitId) -> Option<&Resolution> {
        self.resolutions.get(&unit)
    }

    /// Body recorded as obstructing the unit's line to the ground station.
    pub fn obstruction(&self, unit: UnitId) -> Option<BodyId> {
        self.resolutions.get(&unit).and_then(|r| r.obstruction)
    }

    pub fn has_connected_relay(&mut self, ctx: &ResolveContext<'_>, structure: StructureId) -> bool {
        let units = self.database.lookup(ctx.scene, structure);
        units
            .iter()
            .any(|unit| self.resolve_top_level(ctx, unit).can_transmit)
    }

    /// Best status over all of the structure's units.
    pub fn connection_status(&mut self, ctx: &ResolveContext<'_>, structure: StructureId) -> ConnectionStatus {
        let units = self.database.lookup(ctx.scene, structure);
        units
            .iter()
            .map(|unit| self.resolve_top_level(ctx, unit).status())
            .max()
            .unwrap_or_default()
    }

    /// Whether the structure accepts control input.
    pub fn control_permitted(&mut self, ctx: &ResolveContext<'_>, structure: StructureId) -> bool {
        if !self.config.require_connection_for_control {
            return true;
        }
        if !ctx.scene.contains(structure) {
            return false;
        }
        ctx.scene.is_crewed(structure) || self.has_connected_relay(ctx, structure)
    }

    /// Walk cached resolutions from `unit` to the end of its chain.
    ///
    /// The result lists every hop target in order and ends with
    /// [`LinkTarget::GroundStation`] when the chain is complete. Empty when
    /// the unit has no connected resolution.
    pub fn chain(&self, unit: UnitId) -> Vec<LinkTarget> {
        let mut hops = Vec::new();
        let mut seen = HashSet::from([unit]);
        let mut current = unit;
        while let Some(target) = self.resolutions.get(&current).and_then(Resolution::target) {
            hops.push(target);
            match target {
                LinkTarget::GroundStation => break,
                LinkTarget::Relay(next) => {
                    if !seen.insert(next) {
                        break;
                    }
                    current = next;
                }
            }
        }
        hops
    }

    /// Packets and resource needed to send `data` over the unit's first hop.
    pub fn estimate_transmission(
        &mut self,
        ctx: &ResolveContext<'_>,
        unit: UnitId,
        data: f64,
    ) -> Option<TransmissionEstimate> {
        let resolution = self.resolve(ctx, unit)?;
        if !resolution.can_transmit || resolution.hop_cost.payload_size <= 0.0 {
            return None;
        }
        let packet = resolution.hop_cost;
        let packets = (data.max(0.0) / packet.payload_size).ceil() as u64;
        Some(TransmissionEstimate {
            packets,
            packet,
            total_resource: packets as f64 * packet.resource_cost,
        })
    }

    /// Whether a link of length `distance` between two transmitters is within
    /// reach under the configured range model.
    pub fn link_in_range(&self, origin_max: f64, target_max: f64, distance: f64) -> bool {
        match self.config.range_model {
            RangeModel::Standard => distance <= origin_max,
            RangeModel::Additive => distance <= (origin_max * target_max).sqrt(),
        }
    }

    // -- Per-tick update --

    /// Resolve every relay unit of every loaded, relay-capable structure and
    /// report status transitions.
    pub fn tick(&mut self, ctx: &ResolveContext<'_>) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        let tracked: HashSet<StructureId> = ctx
            .scene
            .structures()
            .filter(|(_, s)| s.loaded && s.kind.is_relay_capable())
            .map(|(id, _)| id)
            .collect();
        self.statuses.retain(|id, _| tracked.contains(&id));

        for (id, _) in ctx.scene.structures() {
            if !tracked.contains(&id) {
                continue;
            }
            let units = self.database.lookup(ctx.scene, id);
            if units.is_empty() {
                self.statuses.remove(id);
                continue;
            }

            let mut status = ConnectionStatus::None;
            for unit in units.iter() {
                let resolution = self.resolve_top_level(ctx, unit);
                status = status.max(resolution.status());
                self.report_obstruction(&resolution, ctx.tick, &mut events);
            }

            let previous = self.statuses.insert(id, status);
            if let Some(event) = NetworkEvent::for_transition(id, previous, status, ctx.tick) {
                log::info!("relay network: {event:?}");
                events.push(event);
            }
        }
        events
    }

    fn report_obstruction(&mut self, resolution: &Resolution, tick: Ticks, events: &mut Vec<NetworkEvent>) {
        match resolution.obstruction {
            Some(body) => {
                if self.reported_obstructions.insert(resolution.unit, body) != Some(body) {
                    events.push(NetworkEvent::LineOfSightBlocked {
                        unit: resolution.unit,
                        body,
                        tick,
                    });
                }
            }
            None => {
                self.reported_obstructions.remove(&resolution.unit);
            }
        }
    }

    fn resolve_top_level(&mut self, ctx: &ResolveContext<'_>, unit: &RelayUnit) -> Resolution {
        let mut search = Search::default();
        let resolution = self.resolve_unit(ctx, unit, &mut search);
        debug_assert!(search.is_idle());
        resolution
    }
}
