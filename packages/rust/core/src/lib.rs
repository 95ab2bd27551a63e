//! Address-resolution pipeline for civic announcements.
//!
//! Raw text is turned into pins and street sections, every referenced
//! address is resolved to a coordinate, coverage is checked, and a GeoJSON
//! feature collection is assembled. [`MessageIngest`] sequences the stages
//! and persists each one's output.

pub mod collector;
pub mod geojson;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod router;
pub mod validate;

pub use collector::collect_unique_addresses;
pub use geojson::assemble;
pub use pipeline::{MessageIngest, ProgressReporter, SilentProgress};
pub use registry::CoordinateRegistry;
pub use response::FailureResponse;
pub use router::{GeocodingOutcome, GeocodingRouter};
pub use validate::{ensure_complete, find_missing_addresses, validate_message_text};
