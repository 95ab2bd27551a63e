//! Supported localities and their bounding boxes.
//!
//! Geocoders bias their requests to the active locality and discard results
//! that land outside of it.

use serde::{Deserialize, Serialize};

use crate::error::{CivicMapError, Result};
use crate::types::Coordinates;

/// An axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Inclusive containment check.
    pub fn contains(&self, point: Coordinates) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }

    /// Viewport bias in the Google Geocoding `bounds` format: `south,west|north,east`.
    pub fn to_google_bounds(&self) -> String {
        format!("{},{}|{},{}", self.south, self.west, self.north, self.east)
    }
}

/// A city the pipeline can place announcements in.
#[derive(Debug, Clone, PartialEq)]
pub struct Locality {
    pub key: &'static str,
    /// Display name, also appended to intersection queries.
    pub name: &'static str,
    pub bounds: Bounds,
    pub center: Coordinates,
}

static LOCALITIES: &[Locality] = &[Locality {
    key: "bg.sofia",
    name: "София",
    bounds: Bounds {
        south: 42.605,
        west: 23.188,
        north: 42.83,
        east: 23.528,
    },
    center: Coordinates {
        lat: 42.6977,
        lng: 23.3219,
    },
}];

/// Look up a locality by key (e.g. `bg.sofia`).
pub fn locality(key: &str) -> Result<&'static Locality> {
    LOCALITIES
        .iter()
        .find(|l| l.key == key)
        .ok_or_else(|| CivicMapError::validation(format!("Unknown locality: {key}")))
}
