//! Transmission cost algebra.
//!
//! A [`LinkCost`] describes one hop's economics: how much resource a packet
//! costs and how much payload it carries. Links are chained with
//! [`LinkCost::merge`] and ranked with [`LinkCost::compare`], which looks only
//! at the cost per unit of payload.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, Neg, Sub};

/// Resource cost and payload size of one transmission link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkCost {
    /// Resource spent per packet.
    pub resource_cost: f64,
    /// Payload units carried per packet.
    pub payload_size: f64,
}

impl LinkCost {
    pub fn new(resource_cost: f64, payload_size: f64) -> Self {
        Self {
            resource_cost,
            payload_size,
        }
    }

    /// Resource per payload unit. Infinite when nothing is carried or the
    /// cost itself is infinite.
    pub fn cost_per_unit_payload(&self) -> f64 {
        if self.payload_size == 0.0 || self.resource_cost.is_infinite() {
            return f64::INFINITY;
        }
        self.resource_cost / self.payload_size
    }

    /// Combine a link with the next hop into one equivalent link.
    ///
    /// Both links are normalized to the smaller payload, their costs scaled
    /// by the same ratio, then costs and payloads are summed. The merged
    /// throughput is limited by the weaker link.
    pub fn merge(self, next: LinkCost) -> LinkCost {
        let (smaller, bigger) = if self.payload_size > next.payload_size {
            (next, self)
        } else {
            (self, next)
        };

        if bigger.payload_size == 0.0 {
            return LinkCost::new(smaller.resource_cost + bigger.resource_cost, 0.0);
        }

        let ratio = smaller.payload_size / bigger.payload_size;
        LinkCost::new(
            smaller.resource_cost + scale(bigger.resource_cost, ratio),
            smaller.payload_size + bigger.payload_size * ratio,
        )
    }

    /// Total order on cost per unit payload, lower first.
    ///
    /// Two zero-payload links compare equal, and NaN never panics.
    pub fn compare(&self, other: &LinkCost) -> Ordering {
        if self.payload_size == 0.0 && other.payload_size == 0.0 {
            return Ordering::Equal;
        }
        self.cost_per_unit_payload()
            .partial_cmp(&other.cost_per_unit_payload())
            .unwrap_or(Ordering::Equal)
    }

    /// Returns `true` if this link is strictly cheaper per payload unit.
    pub fn is_cheaper_than(&self, other: &LinkCost) -> bool {
        self.compare(other) == Ordering::Less
    }
}

// `inf * 0` must stay at zero so a zero-capacity hop does not poison the sum.
fn scale(cost: f64, ratio: f64) -> f64 {
    if ratio == 0.0 { 0.0 } else { cost * ratio }
}

impl Add for LinkCost {
    type Output = LinkCost;

    fn add(self, rhs: LinkCost) -> LinkCost {
        self.merge(rhs)
    }
}

/// Negation flips the resource sign only, so `a - b` has a negative per-unit
/// score exactly when `a` is the cheaper link.
impl Neg for LinkCost {
    type Output = LinkCost;

    fn neg(self) -> LinkCost {
        LinkCost::new(-self.resource_cost, self.payload_size)
    }
}

impl Sub for LinkCost {
    type Output = LinkCost;

    fn sub(self, rhs: LinkCost) -> LinkCost {
        self.merge(-rhs)
    }
}
