//! Geocoding strategy selection and the fallback pass.
//!
//! The strategy is fixed when the router is built:
//! - [`GeocodingRouter::Unified`]: every address through the point geocoder
//!   in one batch
//! - [`GeocodingRouter::Specialized`]: pins through the point geocoder,
//!   street endpoints as intersections, then exactly the endpoints still
//!   missing through the point geocoder once more
//!
//! An address that does not resolve is simply absent from the registry.
//! Reporting the gap is left to the completeness check.

use std::collections::HashMap;
use std::sync::Arc;

use civicmap_geocoding::{IntersectionGeocoder, PointGeocoder};
use civicmap_shared::{Address, Coordinates, ExtractedData, GeocodingMode, Result};
use tracing::{debug, info, instrument};

use crate::collector::{collect_pin_addresses, collect_unique_addresses};
use crate::registry::CoordinateRegistry;

/// Coordinates resolved for one extraction.
#[derive(Debug, Clone, Default)]
pub struct GeocodingOutcome {
    pub registry: CoordinateRegistry,
    /// One entry per registry key, in the order keys were first set.
    pub addresses: Vec<Address>,
}

impl GeocodingOutcome {
    /// Record `address` unless its key is already resolved.
    fn record(&mut self, address: Address) -> bool {
        let added = self
            .registry
            .insert_if_absent(&address.original_text, address.coordinates);
        if added {
            self.addresses.push(address);
        }
        added
    }

    fn record_all(&mut self, addresses: Vec<Address>) -> usize {
        let mut added = 0;
        for address in addresses {
            if self.record(address) {
                added += 1;
            }
        }
        added
    }
}

/// Geocoding strategy, chosen once per deployment.
#[derive(Clone)]
pub enum GeocodingRouter {
    Unified {
        point: Arc<dyn PointGeocoder>,
    },
    Specialized {
        point: Arc<dyn PointGeocoder>,
        intersection: Arc<dyn IntersectionGeocoder>,
    },
}

impl GeocodingRouter {
    /// Build the router for a configured mode.
    pub fn from_mode(
        mode: GeocodingMode,
        point: Arc<dyn PointGeocoder>,
        intersection: Arc<dyn IntersectionGeocoder>,
    ) -> Self {
        match mode {
            GeocodingMode::Unified => Self::Unified { point },
            GeocodingMode::Specialized => Self::Specialized {
                point,
                intersection,
            },
        }
    }

    pub fn mode(&self) -> GeocodingMode {
        match self {
            Self::Unified { .. } => GeocodingMode::Unified,
            Self::Specialized { .. } => GeocodingMode::Specialized,
        }
    }

    /// Resolve every location referenced by `data`.
    ///
    /// Only whole-provider failures are errors; partially resolved batches
    /// are returned as they are.
    #[instrument(skip_all, fields(mode = %self.mode(), pins = data.pins.len(), streets = data.streets.len()))]
    pub async fn geocode(&self, data: &ExtractedData) -> Result<GeocodingOutcome> {
        let outcome = match self {
            Self::Unified { point } => geocode_unified(point.as_ref(), data).await?,
            Self::Specialized {
                point,
                intersection,
            } => geocode_specialized(point.as_ref(), intersection.as_ref(), data).await?,
        };

        info!(resolved = outcome.registry.len(), "geocoding finished");
        Ok(outcome)
    }
}

async fn geocode_unified(
    point: &dyn PointGeocoder,
    data: &ExtractedData,
) -> Result<GeocodingOutcome> {
    let all: Vec<String> = collect_unique_addresses(data).into_iter().collect();
    let mut outcome = GeocodingOutcome::default();
    if all.is_empty() {
        return Ok(outcome);
    }

    let found = point.geocode_batch(&all).await?;
    let added = outcome.record_all(found);
    debug!(requested = all.len(), added, "unified batch merged");
    Ok(outcome)
}

async fn geocode_specialized(
    point: &dyn PointGeocoder,
    intersection: &dyn IntersectionGeocoder,
    data: &ExtractedData,
) -> Result<GeocodingOutcome> {
    let pin_addresses: Vec<String> = collect_pin_addresses(data).into_iter().collect();

    // Both calls only read `data`; the registry is written after both return.
    let (pins, streets) = tokio::join!(
        async {
            if pin_addresses.is_empty() {
                Ok(Vec::new())
            } else {
                point.geocode_batch(&pin_addresses).await
            }
        },
        async {
            if data.streets.is_empty() {
                Ok(HashMap::new())
            } else {
                intersection.resolve_streets(&data.streets).await
            }
        },
    );
    let pins = pins?;
    let streets: HashMap<String, Coordinates> = streets?;

    let mut outcome = GeocodingOutcome::default();
    let pins_added = outcome.record_all(pins);

    let mut endpoints_added = 0;
    for section in &data.streets {
        for endpoint in [&section.from, &section.to] {
            let Some(coordinates) = streets.get(endpoint.as_str()) else {
                continue;
            };
            let added = outcome.record(Address {
                original_text: endpoint.clone(),
                formatted_address: format!("{} & {}", section.street, endpoint),
                coordinates: *coordinates,
            });
            if added {
                endpoints_added += 1;
            }
        }
    }
    debug!(pins_added, endpoints_added, "primary pass merged");

    let missing = missing_endpoints(data, &outcome.registry);
    if missing.is_empty() {
        return Ok(outcome);
    }

    info!(missing = missing.len(), "falling back to point geocoding for street endpoints");
    let recovered = point.geocode_batch(&missing).await?;
    let recovered = outcome.record_all(recovered);
    debug!(requested = missing.len(), recovered, "fallback pass merged");

    Ok(outcome)
}

/// Street endpoints with no registry entry, each listed once, in input order.
fn missing_endpoints(data: &ExtractedData, registry: &CoordinateRegistry) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for section in &data.streets {
        for endpoint in [&section.from, &section.to] {
            if !registry.contains(endpoint) && !missing.contains(endpoint) {
                missing.push(endpoint.clone());
            }
        }
    }
    missing
}
