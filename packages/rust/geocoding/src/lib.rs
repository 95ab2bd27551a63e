//! Geocoding capabilities consumed by the address-resolution pipeline.
//!
//! Two capabilities are distinguished:
//! - [`PointGeocoder`]: plain address lookup, batched
//! - [`IntersectionGeocoder`]: street endpoints resolved as cross-street intersections
//!
//! Both report unresolved inputs by omission. An `Err` means the provider
//! failed as a whole, not that a subset of addresses could not be placed.

mod google;
mod intersection;

use std::collections::HashMap;

use async_trait::async_trait;
use civicmap_shared::{Address, Coordinates, Result, StreetSection};

pub use google::GoogleGeocoder;
pub use intersection::{cross_street, intersection_query};

/// Resolves free-form address strings to coordinates.
#[async_trait]
pub trait PointGeocoder: Send + Sync {
    /// Geocode every address; returns only the ones that resolved.
    async fn geocode_batch(&self, addresses: &[String]) -> Result<Vec<Address>>;
}

/// Resolves street-section endpoints as intersections with the street.
#[async_trait]
pub trait IntersectionGeocoder: Send + Sync {
    /// Map of endpoint string to coordinate for every endpoint that resolved.
    async fn resolve_streets(
        &self,
        streets: &[StreetSection],
    ) -> Result<HashMap<String, Coordinates>>;
}
