//! GeoJSON (RFC 7946) output types.
//!
//! Only the geometry kinds the pipeline emits are modelled: points for pins
//! and two-vertex line strings for street sections.

use serde::{Deserialize, Serialize};

use crate::types::{Coordinates, Timespan};

/// A GeoJSON position: `[longitude, latitude]`.
pub type Position = [f64; 2];

impl Coordinates {
    /// Convert to GeoJSON axis order.
    pub fn to_position(self) -> Position {
        [self.lng, self.lat]
    }
}

/// Geometry of a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
}

impl Geometry {
    /// The GeoJSON `type` member.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Point { .. } => "Point",
            Self::LineString { .. } => "LineString",
        }
    }
}

/// Properties attached to each feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Original pin address (points only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Street name (line strings only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub timespans: Vec<Timespan>,
}

/// A single map feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

/// The assembled geometry set for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureCollection {
        FeatureCollection::new(vec![
            Feature {
                geometry: Geometry::Point {
                    coordinates: Coordinates::new(42.69, 23.32).to_position(),
                },
                properties: FeatureProperties {
                    address: Some("бул. Витоша 1".into()),
                    timespans: vec![Timespan::new("05.03.2025 08:00", "05.03.2025 18:00")],
                    ..Default::default()
                },
            },
            Feature {
                geometry: Geometry::LineString {
                    coordinates: vec![[23.331_845_6, 42.693_123_4], [23.334_401_2, 42.689_876_5]],
                },
                properties: FeatureProperties {
                    street: Some("ул. Граф Игнатиев".into()),
                    from: Some("ъгъл с бул. Патриарх Евтимий".into()),
                    to: Some("ул. Шипка".into()),
                    ..Default::default()
                },
            },
        ])
    }

    #[test]
    fn serializes_geojson_shape() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["type"], "Feature");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["geometry"]["coordinates"][0], 23.32);
        assert_eq!(json["features"][0]["geometry"]["coordinates"][1], 42.69);
        assert_eq!(json["features"][1]["geometry"]["type"], "LineString");
        assert!(json["features"][0]["properties"].get("street").is_none());
    }

    #[test]
    fn reparse_preserves_geometry_exactly() {
        let original = sample();
        let json = serde_json::to_string(&original).expect("serialize");
        let parsed: FeatureCollection = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.len(), original.len());
        for (a, b) in parsed.features.iter().zip(original.features.iter()) {
            assert_eq!(a.geometry.type_name(), b.geometry.type_name());
            assert_eq!(a.geometry, b.geometry);
        }
    }

    #[test]
    fn position_axis_order() {
        let c = Coordinates::new(42.6977, 23.3219);
        assert_eq!(c.to_position(), [23.3219, 42.6977]);
    }
}
