//! Address collection: every address string an extraction references.

use std::collections::BTreeSet;

use civicmap_shared::ExtractedData;

/// Every pin address and street endpoint, deduplicated.
///
/// Strings are kept verbatim; two spellings of the same place are two keys.
/// The set is ordered lexicographically so batches are reproducible.
pub fn collect_unique_addresses(data: &ExtractedData) -> BTreeSet<String> {
    let pins = data.pins.iter().map(|pin| pin.address.clone());
    let endpoints = data
        .streets
        .iter()
        .flat_map(|section| [section.from.clone(), section.to.clone()]);

    pins.chain(endpoints).collect()
}

/// Pin addresses only, deduplicated.
pub(crate) fn collect_pin_addresses(data: &ExtractedData) -> BTreeSet<String> {
    data.pins.iter().map(|pin| pin.address.clone()).collect()
}
