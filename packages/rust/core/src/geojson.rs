//! GeoJSON assembly from an extraction and its resolved coordinates.

use civicmap_shared::{
    CivicMapError, Coordinates, ExtractedData, Feature, FeatureCollection, FeatureProperties,
    Geometry, Result,
};
use tracing::{debug, instrument};

use crate::registry::CoordinateRegistry;

/// Build one feature per pin and per street section.
///
/// Pins come first as points, then streets as `[from, to]` line strings,
/// each group in input order. Run [`crate::ensure_complete`] first; a key
/// missing here aborts the whole collection instead of emitting a partial one.
#[instrument(skip_all, fields(pins = data.pins.len(), streets = data.streets.len()))]
pub fn assemble(data: &ExtractedData, registry: &CoordinateRegistry) -> Result<FeatureCollection> {
    let mut features = Vec::with_capacity(data.pins.len() + data.streets.len());

    for pin in &data.pins {
        let at = lookup(registry, &pin.address, || pin.address.clone())?;
        features.push(Feature {
            geometry: Geometry::Point {
                coordinates: at.to_position(),
            },
            properties: FeatureProperties {
                address: Some(pin.address.clone()),
                timespans: pin.timespans.clone(),
                ..Default::default()
            },
        });
    }

    for section in &data.streets {
        let from = lookup(registry, &section.from, || {
            format!("{} from: {}", section.street, section.from)
        })?;
        let to = lookup(registry, &section.to, || {
            format!("{} to: {}", section.street, section.to)
        })?;
        features.push(Feature {
            geometry: Geometry::LineString {
                coordinates: vec![from.to_position(), to.to_position()],
            },
            properties: FeatureProperties {
                street: Some(section.street.clone()),
                from: Some(section.from.clone()),
                to: Some(section.to.clone()),
                timespans: section.timespans.clone(),
                ..Default::default()
            },
        });
    }

    debug!(features = features.len(), "assembled feature collection");
    Ok(FeatureCollection::new(features))
}

fn lookup(
    registry: &CoordinateRegistry,
    key: &str,
    label: impl FnOnce() -> String,
) -> Result<Coordinates> {
    registry
        .get(key)
        .ok_or_else(|| CivicMapError::GeocodingIncomplete {
            missing: vec![label()],
        })
}
