//! Street-intersection query building.

use std::sync::LazyLock;

use regex::Regex;

/// Descriptive lead-ins that precede the cross street in endpoint text,
/// e.g. "ъгъл с бул. Патриарх Евтимий".
static LEAD_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:ъгъла?\s+с|кръстовище(?:то)?\s+с|пресечката\s+с|до)\s+")
        .expect("lead-in regex")
});

/// The cross street named by an endpoint description.
pub fn cross_street(endpoint: &str) -> &str {
    let trimmed = endpoint.trim();
    match LEAD_IN_RE.find(trimmed) {
        Some(m) => trimmed[m.end()..].trim_start(),
        None => trimmed,
    }
}

/// Geocoder query for the intersection of `street` with an endpoint.
pub fn intersection_query(street: &str, endpoint: &str, locality_name: &str) -> String {
    format!("{} & {}, {locality_name}", street.trim(), cross_street(endpoint))
}
