//! Catalog loading: finds the data files in a directory, parses them, and
//! turns transmitter and part definitions into core types.
//!
//! Every catalog file may be written as RON, TOML or JSON, chosen by
//! extension. TOML has no top-level arrays, so list files put their entries
//! under `[[transmitters]]` or `[[parts]]`.

use linkrange_core::config::{ConfigError, NetworkConfig};
use linkrange_core::scene::Component;
use linkrange_core::unit::{Facet, TransmitterSpec, UnitError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::{PartData, TransmitterData};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The directory has no file for a required catalog section.
    #[error("no {name} file (.ron, .toml or .json) in {dir}")]
    Missing { name: &'static str, dir: PathBuf },

    #[error("unsupported file extension: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// The same catalog section exists in two formats.
    #[error("{a} and {b} define the same data; keep one")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("cannot parse {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A part names a transmitter that the catalog does not define.
    #[error("part '{part}' in {file} uses unknown transmitter '{transmitter}'")]
    UnknownTransmitter {
        file: PathBuf,
        part: String,
        transmitter: String,
    },

    #[error("'{name}' is defined twice in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A transmitter definition has out-of-range values.
    #[error("invalid transmitter '{name}' in {file}: {source}")]
    InvalidTransmitter {
        file: PathBuf,
        name: String,
        source: UnitError,
    },

    /// The network configuration file has out-of-range values.
    #[error("invalid network configuration in {file}: {source}")]
    InvalidConfig { file: PathBuf, source: ConfigError },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Files
// ===========================================================================

const EXTENSIONS: [&str; 3] = ["ron", "toml", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Result<Self, DataLoadError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => Ok(Format::Ron),
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => Err(DataLoadError::UnsupportedFormat {
                file: path.to_path_buf(),
            }),
        }
    }
}

/// The file holding catalog section `name`, if any. At most one format may
/// be present.
fn locate(dir: &Path, name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .filter(|path| path.is_file());
    let first = present.next();
    if let (Some(a), Some(b)) = (first.as_ref(), present.next()) {
        return Err(DataLoadError::ConflictingFormats { a: a.clone(), b });
    }
    Ok(first)
}

fn require(dir: &Path, name: &'static str) -> Result<PathBuf, DataLoadError> {
    locate(dir, name)?.ok_or_else(|| DataLoadError::Missing {
        name,
        dir: dir.to_path_buf(),
    })
}

/// Parse a file. `list_key` names the TOML array of tables holding a list;
/// RON and JSON lists are top-level arrays.
fn read<T: DeserializeOwned>(path: &Path, list_key: Option<&str>) -> Result<T, DataLoadError> {
    let format = Format::of(path)?;
    let content = fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match (format, list_key) {
        (Format::Ron, _) => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        (Format::Json, _) => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        (Format::Toml, None) => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        (Format::Toml, Some(key)) => {
            let mut table: toml::Table =
                toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
            let list = table
                .remove(key)
                .ok_or_else(|| parse_error(format!("missing [[{key}]] entries")))?;
            list.try_into()
                .map_err(|e: toml::de::Error| parse_error(e.to_string()))
        }
    }
}

fn insert_unique<V>(
    map: &mut HashMap<String, V>,
    name: String,
    value: V,
    file: &Path,
) -> Result<(), DataLoadError> {
    match map.entry(name) {
        Entry::Occupied(e) => Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: e.key().clone(),
        }),
        Entry::Vacant(e) => {
            e.insert(value);
            Ok(())
        }
    }
}

// ===========================================================================
// Catalog
// ===========================================================================

/// Everything loaded from a data directory.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub transmitters: HashMap<String, TransmitterSpec>,
    pub parts: HashMap<String, Component>,
    pub config: NetworkConfig,
}

impl Catalog {
    pub fn transmitter(&self, name: &str) -> Option<&TransmitterSpec> {
        self.transmitters.get(name)
    }

    /// A fresh copy of the named part, ready to mount on a structure.
    pub fn part(&self, name: &str) -> Option<Component> {
        self.parts.get(name).cloned()
    }
}

/// Load a catalog from a directory.
///
/// `transmitters.{ron,toml,json}` is required. `parts` and `network` are
/// optional; without `network` the default configuration is used.
pub fn load_catalog(dir: &Path) -> Result<Catalog, DataLoadError> {
    let transmitters = load_transmitters(&require(dir, "transmitters")?)?;

    let parts = match locate(dir, "parts")? {
        Some(path) => load_parts(&path, &transmitters)?,
        None => HashMap::new(),
    };

    let config = match locate(dir, "network")? {
        Some(path) => load_network_config(&path)?,
        None => NetworkConfig::default(),
    };

    log::debug!(
        "catalog: loaded {} transmitters and {} parts from {}",
        transmitters.len(),
        parts.len(),
        dir.display()
    );

    Ok(Catalog {
        transmitters,
        parts,
        config,
    })
}

fn load_transmitters(path: &Path) -> Result<HashMap<String, TransmitterSpec>, DataLoadError> {
    let data: Vec<TransmitterData> = read(path, Some("transmitters"))?;
    let mut transmitters = HashMap::with_capacity(data.len());

    for t in data {
        let spec = TransmitterSpec::new(t.nominal_range, t.max_power_factor, t.max_data_factor)
            .with_packet(t.packet_cost, t.packet_size);
        if let Err(source) = spec.validate() {
            return Err(DataLoadError::InvalidTransmitter {
                file: path.to_path_buf(),
                name: t.name,
                source,
            });
        }
        insert_unique(&mut transmitters, t.name, spec, path)?;
    }

    Ok(transmitters)
}

fn load_parts(
    path: &Path,
    transmitters: &HashMap<String, TransmitterSpec>,
) -> Result<HashMap<String, Component>, DataLoadError> {
    let data: Vec<PartData> = read(path, Some("parts"))?;
    let mut parts = HashMap::with_capacity(data.len());

    for p in data {
        let component = build_part(&p, transmitters, path)?;
        insert_unique(&mut parts, p.name, component, path)?;
    }

    Ok(parts)
}

// A part with no capability facets is structural.
fn build_part(
    data: &PartData,
    transmitters: &HashMap<String, TransmitterSpec>,
    file: &Path,
) -> Result<Component, DataLoadError> {
    let mut component = Component::new(data.name.clone());
    if data.probe_core {
        component = component.with_facet(Facet::ProbeCore);
    }
    if data.crew > 0 {
        component = component.with_facet(Facet::CommandSeat { crew: data.crew });
    }
    if let Some(antenna) = &data.antenna {
        let spec = transmitters
            .get(antenna)
            .ok_or_else(|| DataLoadError::UnknownTransmitter {
                file: file.to_path_buf(),
                part: data.name.clone(),
                transmitter: antenna.clone(),
            })?;
        component = component.with_facet(Facet::Antenna(spec.clone()));
    }
    if component.facets.is_empty() {
        component = component.with_facet(Facet::Structural);
    }
    Ok(component)
}

/// Load and validate a network configuration file. Missing fields take
/// their defaults.
pub fn load_network_config(path: &Path) -> Result<NetworkConfig, DataLoadError> {
    let config: NetworkConfig = read(path, None)?;
    config
        .validate()
        .map_err(|source| DataLoadError::InvalidConfig {
            file: path.to_path_buf(),
            source,
        })?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
