//! Google Geocoding API client.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use civicmap_shared::{
    Address, CivicMapError, Coordinates, GeocodingConfig, Locality, Result, StreetSection,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::intersection::intersection_query;
use crate::{IntersectionGeocoder, PointGeocoder};

/// User-Agent string for geocoding requests.
const USER_AGENT: &str = concat!("civicmap/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: ResultGeometry,
}

#[derive(Debug, Deserialize)]
struct ResultGeometry {
    location: Coordinates,
}

/// Outcome of a single lookup that did not fail the whole batch.
#[derive(Debug)]
enum Lookup {
    Found {
        formatted_address: String,
        coordinates: Coordinates,
    },
    Unresolved(String),
}

// ---------------------------------------------------------------------------
// GoogleGeocoder
// ---------------------------------------------------------------------------

/// Geocoder backed by the Google Geocoding API, bounded to one locality.
pub struct GoogleGeocoder {
    client: Client,
    endpoint: Url,
    api_key: String,
    language: String,
    region: String,
    locality: &'static Locality,
}

impl GoogleGeocoder {
    /// Build a geocoder from config and an already-resolved API key.
    pub fn new(
        config: &GeocodingConfig,
        locality: &'static Locality,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Url::parse(&config.base_url).map_err(|e| {
            CivicMapError::config(format!(
                "invalid geocoding endpoint '{}': {e}",
                config.base_url
            ))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CivicMapError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            language: config.language.clone(),
            region: config.region.clone(),
            locality,
        })
    }

    /// Look up one query. Only provider-wide failures are returned as `Err`:
    /// an unreachable or timed-out endpoint, a denied key, or an exhausted quota.
    async fn lookup(&self, query: &str) -> Result<Lookup> {
        let bounds = self.locality.bounds.to_google_bounds();
        let response = match self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("address", query),
                ("key", self.api_key.as_str()),
                ("language", self.language.as_str()),
                ("region", self.region.as_str()),
                ("bounds", bounds.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(CivicMapError::Geocoding(format!("provider unreachable: {e}")));
            }
            Err(e) => return Ok(Lookup::Unresolved(format!("request failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(Lookup::Unresolved(format!("HTTP {status}")));
        }

        let body: GeocodeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return Ok(Lookup::Unresolved(format!("invalid response body: {e}"))),
        };

        match body.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Ok(Lookup::Unresolved("no results".into())),
            "REQUEST_DENIED" | "OVER_QUERY_LIMIT" => {
                return Err(CivicMapError::Geocoding(format!(
                    "{}: {}",
                    body.status,
                    body.error_message.unwrap_or_default()
                )));
            }
            other => {
                return Ok(Lookup::Unresolved(format!(
                    "status {other}: {}",
                    body.error_message.unwrap_or_default()
                )));
            }
        }

        let Some(first) = body.results.into_iter().next() else {
            return Ok(Lookup::Unresolved("OK status without results".into()));
        };

        let coordinates = first.geometry.location;
        if !self.locality.bounds.contains(coordinates) {
            return Ok(Lookup::Unresolved(format!(
                "result ({}, {}) is outside {}",
                coordinates.lat, coordinates.lng, self.locality.key
            )));
        }

        Ok(Lookup::Found {
            formatted_address: first.formatted_address,
            coordinates,
        })
    }
}

#[async_trait]
impl PointGeocoder for GoogleGeocoder {
    #[instrument(skip_all, fields(count = addresses.len()))]
    async fn geocode_batch(&self, addresses: &[String]) -> Result<Vec<Address>> {
        let mut resolved = Vec::with_capacity(addresses.len());

        for address in addresses {
            match self.lookup(address).await? {
                Lookup::Found {
                    formatted_address,
                    coordinates,
                } => {
                    debug!(%address, %formatted_address, "address geocoded");
                    resolved.push(Address {
                        original_text: address.clone(),
                        formatted_address,
                        coordinates,
                    });
                }
                Lookup::Unresolved(reason) => {
                    warn!(%address, %reason, "failed to geocode address");
                }
            }
        }

        info!(
            requested = addresses.len(),
            resolved = resolved.len(),
            "point geocoding complete"
        );
        Ok(resolved)
    }
}

#[async_trait]
impl IntersectionGeocoder for GoogleGeocoder {
    #[instrument(skip_all, fields(streets = streets.len()))]
    async fn resolve_streets(
        &self,
        streets: &[StreetSection],
    ) -> Result<HashMap<String, Coordinates>> {
        let mut resolved = HashMap::new();
        let mut attempted = HashSet::new();

        for section in streets {
            for endpoint in [&section.from, &section.to] {
                if !attempted.insert(endpoint.clone()) {
                    continue;
                }

                let query = intersection_query(&section.street, endpoint, self.locality.name);
                match self.lookup(&query).await? {
                    Lookup::Found { coordinates, .. } => {
                        debug!(street = %section.street, %endpoint, "intersection resolved");
                        resolved.insert(endpoint.clone(), coordinates);
                    }
                    Lookup::Unresolved(reason) => {
                        warn!(street = %section.street, %endpoint, %reason, "failed to resolve intersection");
                    }
                }
            }
        }

        info!(
            attempted = attempted.len(),
            resolved = resolved.len(),
            "intersection geocoding complete"
        );
        Ok(resolved)
    }
}
