//! World-space geometry: positions, distances, and line-of-sight occlusion.
//!
//! The position source and the occlusion test are owned by the host
//! simulation. The core only consumes them through [`PositionSource`] and
//! [`Occluder`]. [`BodyField`] is a ready-made occluder for spherical bodies.

use crate::id::{BodyId, StructureId};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

// ---------------------------------------------------------------------------
// Vec3
// ---------------------------------------------------------------------------

/// A world-space coordinate in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared Euclidean distance. Prefer this for range comparisons.
    pub fn distance_squared(self, other: Vec3) -> f64 {
        let d = self - other;
        d.dot(d)
    }

    pub fn distance(self, other: Vec3) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ---------------------------------------------------------------------------
// External collaborator seams
// ---------------------------------------------------------------------------

/// Supplies world positions for structures.
///
/// Returning `None` (structure unknown, or not positioned yet during a scene
/// transition) makes the structure unreachable for the current resolution.
pub trait PositionSource {
    fn world_position(&self, structure: StructureId) -> Option<Vec3>;
}

/// Outcome of a line-of-sight test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sightline {
    Clear,
    /// The first body found obstructing the segment.
    Blocked(BodyId),
}

impl Sightline {
    pub fn is_clear(&self) -> bool {
        matches!(self, Sightline::Clear)
    }

    pub fn obstruction(&self) -> Option<BodyId> {
        match self {
            Sightline::Clear => None,
            Sightline::Blocked(body) => Some(*body),
        }
    }
}

/// Line-of-sight test between two world positions.
pub trait Occluder {
    /// Test the segment `from -> to`, ignoring the bodies in `excluding`.
    ///
    /// `grace_ratio` is the configured fraction by which occluders shrink so
    /// that links grazing a horizon are not cut off.
    fn line_of_sight(&self, from: Vec3, to: Vec3, excluding: &[BodyId], grace_ratio: f64) -> Sightline;
}

/// An occluder with nothing in the way.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSpace;

impl Occluder for OpenSpace {
    fn line_of_sight(&self, _from: Vec3, _to: Vec3, _excluding: &[BodyId], _grace_ratio: f64) -> Sightline {
        Sightline::Clear
    }
}

// ---------------------------------------------------------------------------
// Spherical bodies
// ---------------------------------------------------------------------------

/// A spherical body that blocks transmissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub id: BodyId,
    pub center: Vec3,
    pub radius: f64,
}

/// A set of spherical bodies used as an [`Occluder`].
///
/// Effective radii are shrunk by `1 - grace_ratio`, with the ratio supplied
/// per test from the network configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodyField {
    bodies: Vec<Body>,
}

impl BodyField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.bodies.push(body);
        self
    }

    pub fn add_body(&mut self, body: Body) {
        self.bodies.push(body);
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }
}

impl Occluder for BodyField {
    fn line_of_sight(&self, from: Vec3, to: Vec3, excluding: &[BodyId], grace_ratio: f64) -> Sightline {
        let shrink = 1.0 - grace_ratio.clamp(0.0, 1.0);
        self.bodies
            .iter()
            .filter(|body| !excluding.contains(&body.id))
            .find(|body| segment_intersects_sphere(from, to, body.center, body.radius * shrink))
            .map_or(Sightline::Clear, |body| Sightline::Blocked(body.id))
    }
}

/// Closest-point test between the segment `a -> b` and a sphere.
///
/// A degenerate segment is treated as a point-in-sphere test.
pub fn segment_intersects_sphere(a: Vec3, b: Vec3, center: Vec3, radius: f64) -> bool {
    if radius <= 0.0 {
        return false;
    }
    let r2 = radius * radius;
    let ab = b - a;
    let len2 = ab.dot(ab);
    if len2 == 0.0 {
        return a.distance_squared(center) < r2;
    }
    let t = ((center - a).dot(ab) / len2).clamp(0.0, 1.0);
    let closest = a + ab * t;
    closest.distance_squared(center) < r2
}
