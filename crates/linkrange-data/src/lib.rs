//! Data-file front end for `linkrange-core`.
//!
//! Loads transmitter definitions, part templates, and the network
//! configuration from RON, JSON, or TOML files in a directory.

pub mod loader;
pub mod schema;

pub use loader::{load_catalog, load_network_config, Catalog, DataLoadError};
