//! Column header normalization

use crate::import::types::Value;

/// Column carrying the id of an existing entity to update
///
/// Kept in record data as the update discriminator, never part of the header.
pub const RESERVED_ENTITY_COLUMN: &str = "entity";

/// Clean a single column name candidate
///
/// Returns None for non-string candidates and names that are blank after
/// trimming. Surviving names are trimmed and internal spaces become
/// underscores. The reserved column is *not* rejected here.
pub fn clean_column_name(candidate: &Value) -> Option<String> {
    let name = candidate.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.replace(' ', "_"))
}

/// Whether a cleaned name is the reserved discriminator column
pub fn is_reserved(name: &str) -> bool {
    name == RESERVED_ENTITY_COLUMN
}

/// Produce the accepted header from raw candidates
///
/// Drops non-string, blank and reserved names, keeps the relative order of
/// the rest and does not deduplicate.
pub fn normalize_header(candidates: &[Value]) -> Vec<String> {
    let header: Vec<String> = candidates
        .iter()
        .filter_map(clean_column_name)
        .filter(|name| !is_reserved(name))
        .collect();

    if header.len() != candidates.len() {
        log::debug!(
            "Header reduced from {} to {} columns: {:?}",
            candidates.len(),
            header.len(),
            header
        );
    }

    header
}
