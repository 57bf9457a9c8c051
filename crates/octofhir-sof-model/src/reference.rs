//! Reference string handling
//!
//! A well-formed literal reference is `<ResourceType>/<id>`. For every
//! reference-valued column the compiler emits a companion column holding the
//! extracted identifier, so two views can be joined on bare ids without
//! string concatenation. The extraction and well-formedness rules live here
//! because the compiler, the projector and the integrity validator must all
//! agree on them.

use once_cell::sync::Lazy;
use regex::Regex;

/// Well-formed literal reference: resource type, slash, id
static REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+/[A-Za-z0-9.-]{1,64}$").expect("valid regex"));

/// Postgres regex equivalent of the well-formedness rule, for SQL checks
pub const REFERENCE_SQL_PATTERN: &str = "^[A-Za-z]+/[A-Za-z0-9.-]{1,64}$";

/// Check whether a reference string is well-formed
pub fn is_well_formed(reference: &str) -> bool {
    REFERENCE_RE.is_match(reference)
}

/// Extract the bare identifier from a well-formed reference
pub fn extract_id(reference: &str) -> Option<&str> {
    if !is_well_formed(reference) {
        return None;
    }
    reference.split_once('/').map(|(_, id)| id)
}

/// Extract the target resource type from a well-formed reference
pub fn target_type(reference: &str) -> Option<&str> {
    if !is_well_formed(reference) {
        return None;
    }
    reference.split_once('/').map(|(ty, _)| ty)
}

/// Name of the extracted-identifier companion for a reference column
///
/// `subject_reference` becomes `subject_id`; names without the conventional
/// suffix get `_id` appended.
pub fn companion_column(reference_column: &str) -> String {
    match reference_column.strip_suffix("_reference") {
        Some(prefix) => format!("{prefix}_id"),
        None => format!("{reference_column}_id"),
    }
}
