//! Input validation and the completeness gate before assembly.

use civicmap_shared::{CivicMapError, ExtractedData, Result};

use crate::registry::CoordinateRegistry;

/// Reject blank text and text longer than `max_len` characters.
pub fn validate_message_text(text: &str, max_len: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(CivicMapError::validation("Invalid message text"));
    }
    let len = text.chars().count();
    if len > max_len {
        return Err(CivicMapError::validation(format!(
            "Message text is too long ({len} > {max_len})"
        )));
    }
    Ok(())
}

/// Labels of every pin address and street endpoint with no coordinate.
///
/// Pin labels are the raw address; street labels name the street and the
/// endpoint (`"<street> from: <from>"`, `"<street> to: <to>"`). Identical
/// labels are reported once, in input order.
pub fn find_missing_addresses(data: &ExtractedData, registry: &CoordinateRegistry) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    let mut push = |label: String| {
        if !missing.contains(&label) {
            missing.push(label);
        }
    };

    for pin in &data.pins {
        if !registry.contains(&pin.address) {
            push(pin.address.clone());
        }
    }

    for section in &data.streets {
        if !registry.contains(&section.from) {
            push(format!("{} from: {}", section.street, section.from));
        }
        if !registry.contains(&section.to) {
            push(format!("{} to: {}", section.street, section.to));
        }
    }

    missing
}

/// Fail with [`CivicMapError::GeocodingIncomplete`] unless every location resolved.
pub fn ensure_complete(data: &ExtractedData, registry: &CoordinateRegistry) -> Result<()> {
    let missing = find_missing_addresses(data, registry);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CivicMapError::GeocodingIncomplete { missing })
    }
}
