//! Shared types, error model, and configuration for civicmap.
//!
//! This crate is the foundation depended on by all other civicmap crates.
//! It provides:
//! - [`CivicMapError`]: the unified error type
//! - Domain types ([`ExtractedData`], [`Address`], [`FeatureCollection`], [`Message`])
//! - Locality bounds ([`Locality`], [`Bounds`])
//! - Configuration ([`AppConfig`], [`GeocodingMode`], config loading)

pub mod config;
pub mod error;
pub mod geojson;
pub mod locality;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExtractionConfig, GeocodingConfig, GeocodingMode, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, read_api_key,
};
pub use error::{CivicMapError, FailureKind, Result};
pub use geojson::{Feature, FeatureCollection, FeatureProperties, Geometry, Position};
pub use locality::{Bounds, Locality, locality};
pub use types::{
    Address, Coordinates, ExtractedData, Message, MessageId, MessageUpdate, NewMessage, Pin,
    PipelineStage, StreetSection, Timespan,
};
