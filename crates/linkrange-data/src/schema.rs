//! Serde data file structs for transmitter catalogs.
//!
//! These structs define the on-disk format for transmitter definitions and
//! part definitions. They are deserialized from RON, JSON, or TOML data
//! files and then resolved into core types by the loader.

use serde::Deserialize;

// ===========================================================================
// Transmitters
// ===========================================================================

/// A named transmitter definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct TransmitterData {
    pub name: String,
    pub nominal_range: f64,
    #[serde(default = "default_factor")]
    pub max_power_factor: f64,
    #[serde(default = "default_factor")]
    pub max_data_factor: f64,
    #[serde(default = "default_packet_cost")]
    pub packet_cost: f64,
    #[serde(default = "default_packet_size")]
    pub packet_size: f64,
}

fn default_factor() -> f64 {
    1.0
}

fn default_packet_cost() -> f64 {
    10.0
}

fn default_packet_size() -> f64 {
    2.0
}

// ===========================================================================
// Parts
// ===========================================================================

/// A part definition: a named component template.
///
/// `antenna` refers to a transmitter by name.
#[derive(Debug, Clone, Deserialize)]
pub struct PartData {
    pub name: String,
    #[serde(default)]
    pub antenna: Option<String>,
    #[serde(default)]
    pub crew: u32,
    #[serde(default)]
    pub probe_core: bool,
}
