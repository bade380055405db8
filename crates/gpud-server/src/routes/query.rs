//! Shared query-parameter parsing for the observation routes (§6).

use std::collections::HashMap;

use gpud_core::component::case_fold;

/// Parses the `components` query parameter: a comma-separated, case-folded
/// list (§4.7 Filtering). Returns an empty vec when the parameter is absent
/// or blank.
pub(crate) fn parse_components(params: &HashMap<String, String>) -> Vec<String> {
    params
        .get("components")
        .map(|raw| {
            raw.split(',')
                .map(|s| case_fold(s.trim()))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parses an optional `since` query parameter (unix seconds); defaults to 0
/// (no lower bound) when absent or unparsable.
pub(crate) fn parse_since(params: &HashMap<String, String>) -> i64 {
    params
        .get("since")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
