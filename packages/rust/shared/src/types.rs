//! Core domain types: extracted locations, geocoded addresses, and messages.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geojson::FeatureCollection;

/// Date format used in announcement timespans (`DD.MM.YYYY HH:MM`).
const TIMESPAN_FORMAT: &str = "%d.%m.%Y %H:%M";

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for message identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Generate a new time-sortable message identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Extracted data
// ---------------------------------------------------------------------------

/// A time window during which an announcement applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timespan {
    pub start: String,
    pub end: String,
}

impl Timespan {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parse the start as `DD.MM.YYYY HH:MM`, or `None` if malformed.
    pub fn parse_start(&self) -> Option<NaiveDateTime> {
        parse_timespan_date(&self.start)
    }

    /// Parse the end as `DD.MM.YYYY HH:MM`, or `None` if malformed.
    pub fn parse_end(&self) -> Option<NaiveDateTime> {
        parse_timespan_date(&self.end)
    }
}

fn parse_timespan_date(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESPAN_FORMAT).ok()
}

/// A single-point location reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub address: String,
    #[serde(default)]
    pub timespans: Vec<Timespan>,
}

/// A road segment bounded by two descriptive endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetSection {
    pub street: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub timespans: Vec<Timespan>,
}

/// Structured locations extracted from one announcement.
///
/// Address strings are opaque join keys into the coordinate registry:
/// they are never normalized after extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub streets: Vec<StreetSection>,
}

impl ExtractedData {
    /// True when neither pins nor streets were found.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty() && self.streets.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Geocoding results
// ---------------------------------------------------------------------------

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A resolved geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// The address string exactly as it was submitted.
    pub original_text: String,
    pub formatted_address: String,
    pub coordinates: Coordinates,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Pipeline stages in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Stored,
    Extracted,
    AddressesStored,
    Geocoded,
    GeocodingStored,
    Assembled,
    GeoJsonStored,
    Done,
}

impl PipelineStage {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Extracted => "extracted",
            Self::AddressesStored => "addresses_stored",
            Self::Geocoded => "geocoded",
            Self::GeocodingStored => "geocoding_stored",
            Self::Assembled => "assembled",
            Self::GeoJsonStored => "geo_json_stored",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stored" => Ok(Self::Stored),
            "extracted" => Ok(Self::Extracted),
            "addresses_stored" => Ok(Self::AddressesStored),
            "geocoded" => Ok(Self::Geocoded),
            "geocoding_stored" => Ok(Self::GeocodingStored),
            "assembled" => Ok(Self::Assembled),
            "geo_json_stored" => Ok(Self::GeoJsonStored),
            "done" => Ok(Self::Done),
            other => Err(format!("unknown pipeline stage: {other}")),
        }
    }
}

/// Fields written when a message is first stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub text: String,
    pub source: String,
}

/// A partial update: only `Some` fields are written, everything else is kept.
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    pub stage: Option<PipelineStage>,
    pub extracted_data: Option<ExtractedData>,
    pub addresses: Option<Vec<Address>>,
    pub geo_json: Option<FeatureCollection>,
}

impl MessageUpdate {
    /// An update that only advances the stage marker.
    pub fn stage(stage: PipelineStage) -> Self {
        Self {
            stage: Some(stage),
            ..Default::default()
        }
    }

    pub fn with_extracted_data(mut self, data: ExtractedData) -> Self {
        self.extracted_data = Some(data);
        self
    }

    pub fn with_addresses(mut self, addresses: Vec<Address>) -> Self {
        self.addresses = Some(addresses);
        self
    }

    pub fn with_geo_json(mut self, geo_json: FeatureCollection) -> Self {
        self.geo_json = Some(geo_json);
        self
    }
}

/// A civic announcement and everything derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub source: String,
    /// Last stage whose output was persisted.
    pub stage: PipelineStage,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_json: Option<FeatureCollection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
