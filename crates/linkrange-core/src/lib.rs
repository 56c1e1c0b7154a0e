//! Linkrange Core -- relay-chain resolution for simulated communication
//! networks.
//!
//! Spacecraft and other structures carry transmitters. Each transmitter
//! reaches the ground station either directly or through a chain of relays,
//! and this crate decides, per transmitter, which next hop to use and whether
//! the chain reaches the ground at all.
//!
//! # Resolution
//!
//! [`network::RelayNetwork::resolve`] runs a depth-first search over the
//! other relay-capable structures:
//!
//! 1. Measure the ground link. If it is in range and unobstructed its
//!    distance becomes the search bound.
//! 2. Mark the origin structure in progress so no cycle can form.
//! 3. Visit every candidate inside the bound, check line of sight, and
//!    recursively resolve its units. The nearest candidate that can itself
//!    transmit wins.
//! 4. Fall back to the ground station when no relay qualifies.
//!
//! Results are cached per unit and reused for `debounce_ticks` ticks.
//!
//! # Key Types
//!
//! - [`scene::Scene`] -- Structures and their components, plus the
//!   structural change feed.
//! - [`database::RelayDatabase`] -- Per-structure relay inventories with
//!   fingerprint-based staleness detection.
//! - [`network::RelayNetwork`] -- The session-scoped resolution service.
//! - [`cost::LinkCost`] -- Per-hop economics with a chain merge.
//! - [`geometry::Occluder`] -- Line-of-sight seam, with
//!   [`geometry::BodyField`] as the spherical-body implementation.
//! - [`ground::GroundStation`] -- The tiered terminal endpoint.

pub mod config;
pub mod cost;
pub mod database;
pub mod geometry;
pub mod ground;
pub mod id;
pub mod network;
pub mod resolver;
pub mod scene;
pub mod status;
pub mod unit;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Simulation tick counter.
pub type Ticks = u64;
