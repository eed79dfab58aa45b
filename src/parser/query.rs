//! Query string parsing for key discrimination.

use std::collections::BTreeMap;

use crate::model::VERIFY_MODE_PARAM;

/// Parsed query parameters: name to values, sorted by name.
///
/// Sorting by name makes composed keys independent of parameter order.
pub type QueryMap = BTreeMap<String, Vec<String>>;

/// Parse a raw query string into a [`QueryMap`].
///
/// The name is the text before the first `=`, the value everything after it,
/// taken verbatim (no percent-decoding, no further splitting). A parameter
/// without `=` gets an empty value. The verification-control parameter is
/// excluded.
///
/// # Parameters
///
/// - `raw` - Query string without the leading `?`, if the request had one
///
/// # Returns
///
/// Returns the parameter map, empty when there is no query string.
pub fn parse_query(raw: Option<&str>) -> QueryMap {
    let mut query = QueryMap::new();
    let Some(raw) = raw else {
        return query;
    };

    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        if name == VERIFY_MODE_PARAM {
            continue;
        }
        query.entry(name.to_string()).or_default().push(value.to_string());
    }

    query
}

/// Value of the verification-control parameter, if present.
pub fn verify_mode_param(raw: Option<&str>) -> Option<&str> {
    raw?.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        (name == VERIFY_MODE_PARAM).then_some(value)
    })
}
