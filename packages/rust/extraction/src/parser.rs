//! Parsing of model output into [`ExtractedData`].
//!
//! The model is asked for a bare JSON object, but fenced replies
//! (```` ```json ... ``` ````) and a literal `null` are tolerated.

use std::sync::LazyLock;

use civicmap_shared::{CivicMapError, ExtractedData, Pin, Result, StreetSection, Timespan};
use regex::Regex;
use tracing::warn;

/// Matches a reply wrapped in a Markdown code fence.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json|JSON)?\s*(.*?)\s*```\s*$").expect("fence regex")
});

/// Strip an optional Markdown code fence around the payload.
pub(crate) fn strip_code_fence(content: &str) -> &str {
    match FENCE_RE.captures(content).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => content.trim(),
    }
}

/// Parse the model's reply.
///
/// Returns `Ok(None)` when no usable locations were found. Malformed JSON is
/// an extraction failure, not "no data".
pub fn parse_extraction(content: &str) -> Result<Option<ExtractedData>> {
    let payload = strip_code_fence(content);

    if payload.is_empty() || payload == "null" {
        return Ok(None);
    }

    let raw: ExtractedData = serde_json::from_str(payload).map_err(|e| {
        CivicMapError::extraction(format!(
            "malformed extraction response: {e} (got: {})",
            truncate(payload, 200)
        ))
    })?;

    let data = sanitize(raw);
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(data))
}

/// Count timespans whose start or end is not `DD.MM.YYYY HH:MM`.
pub(crate) fn malformed_timespans(timespans: &[Timespan]) -> usize {
    timespans
        .iter()
        .filter(|span| span.parse_start().is_none() || span.parse_end().is_none())
        .count()
}

/// Trim surrounding whitespace and drop entries with blank address strings.
///
/// Timespans are kept as written; malformed ones are only logged.
fn sanitize(raw: ExtractedData) -> ExtractedData {
    let pins = raw
        .pins
        .into_iter()
        .filter_map(|pin| {
            let address = pin.address.trim();
            if address.is_empty() {
                warn!("dropping pin with empty address");
                return None;
            }
            let malformed = malformed_timespans(&pin.timespans);
            if malformed > 0 {
                warn!(address, malformed, "pin has malformed timespans");
            }
            Some(Pin {
                address: address.to_string(),
                timespans: pin.timespans,
            })
        })
        .collect();

    let streets = raw
        .streets
        .into_iter()
        .filter_map(|s| {
            let (street, from, to) = (s.street.trim(), s.from.trim(), s.to.trim());
            if street.is_empty() || from.is_empty() || to.is_empty() {
                warn!(street, from, to, "dropping street section with a blank field");
                return None;
            }
            let malformed = malformed_timespans(&s.timespans);
            if malformed > 0 {
                warn!(street, malformed, "street section has malformed timespans");
            }
            Some(StreetSection {
                street: street.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                timespans: s.timespans,
            })
        })
        .collect();

    ExtractedData { pins, streets }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let content = r#"{
            "pins": [{"address": "бул. Витоша 1", "timespans": [{"start": "05.03.2025 08:00", "end": "05.03.2025 18:00"}]}],
            "streets": [{"street": "ул. Граф Игнатиев", "from": "ъгъл с бул. Патриарх Евтимий", "to": "ул. Шипка", "timespans": []}]
        }"#;
        let data = parse_extraction(content).unwrap().expect("some data");
        assert_eq!(data.pins.len(), 1);
        assert_eq!(data.pins[0].timespans.len(), 1);
        assert_eq!(data.streets[0].from, "ъгъл с бул. Патриарх Евтимий");
    }

    #[test]
    fn strips_code_fences() {
        let content = "```json\n{\"pins\": [{\"address\": \"пл. Македония\"}], \"streets\": []}\n```";
        let data = parse_extraction(content).unwrap().expect("some data");
        assert_eq!(data.pins[0].address, "пл. Македония");

        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[test]
    fn empty_results_are_none() {
        assert!(parse_extraction("null").unwrap().is_none());
        assert!(parse_extraction("").unwrap().is_none());
        assert!(parse_extraction(r#"{"pins": [], "streets": []}"#).unwrap().is_none());
        assert!(parse_extraction(r#"{"pins": [{"address": "   "}]}"#).unwrap().is_none());
    }

    #[test]
    fn trims_but_does_not_normalize() {
        let content = r#"{"pins": [{"address": "  Бул. ВИТОША  1 "}]}"#;
        let data = parse_extraction(content).unwrap().unwrap();
        assert_eq!(data.pins[0].address, "Бул. ВИТОША  1");
    }

    #[test]
    fn drops_streets_with_blank_endpoints() {
        let content = r#"{"streets": [
            {"street": "ул. Оборище", "from": "", "to": "ул. Шипка"},
            {"street": "ул. Оборище", "from": "ул. Шипка", "to": "бул. Васил Левски"}
        ]}"#;
        let data = parse_extraction(content).unwrap().unwrap();
        assert_eq!(data.streets.len(), 1);
        assert_eq!(data.streets[0].from, "ул. Шипка");
    }

    #[test]
    fn malformed_timespans_are_counted_but_kept() {
        let content = r#"{"pins": [{"address": "бул. Витоша 1", "timespans": [
            {"start": "05.03.2025 08:00", "end": "05.03.2025 18:00"},
            {"start": "2025-03-05", "end": "05.03.2025 18:00"},
            {"start": "05.03.2025 08:00", "end": "утре"}
        ]}]}"#;
        let data = parse_extraction(content).unwrap().unwrap();
        assert_eq!(data.pins[0].timespans.len(), 3);
        assert_eq!(malformed_timespans(&data.pins[0].timespans), 2);
        assert_eq!(malformed_timespans(&data.pins[0].timespans[..1]), 0);
    }

    #[test]
    fn malformed_json_is_extraction_failure() {
        let err = parse_extraction("I could not find any addresses.").unwrap_err();
        assert!(matches!(err, CivicMapError::ExtractionFailed(_)));
        assert!(err.to_string().contains("malformed extraction response"));
    }
}
