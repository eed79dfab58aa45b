//! Composite key derivation for mock slots.
//!
//! A composite key is the `-` joined concatenation of an optional correlation
//! id, an optional method token, the normalized URI and the discriminators
//! (sorted field names, then their values). Keys are compared by exact string
//! equality only.

use std::sync::Arc;

use tracing::debug;

use crate::error::MockError;
use crate::method::HttpMethod;
use crate::model::{HTTP_METHOD_HEADER, PARSE_PAYLOAD_HEADER};
use crate::parser::{parse_field, Payload, QueryMap};
use crate::request::MockRequest;
use crate::store::{KeyValueStore, OpsKind, Space, StoredValue};

/// Separator between the parts of a composite key.
const KEY_SEPARATOR: &str = "-";

/// Join key parts with the key separator.
pub fn concat_keys<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(KEY_SEPARATOR)
}

/// Append query discriminators to a base key: names first, then values.
///
/// Multiple values of one parameter are joined with `,`. An empty query
/// leaves the base key unchanged.
pub fn with_query(base: &str, query: &QueryMap) -> String {
    if query.is_empty() {
        return base.to_string();
    }
    let mut parts: Vec<String> = Vec::with_capacity(1 + query.len() * 2);
    parts.push(base.to_string());
    parts.extend(query.keys().cloned());
    parts.extend(query.values().map(|values| values.join(",")));
    concat_keys(&parts)
}

/// Derives the candidate composite keys of a request.
#[derive(Clone)]
pub struct KeyComposer {
    store: Arc<dyn KeyValueStore>,
}

impl KeyComposer {
    /// Create a composer reading and recording signatures in `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Base keys: correlation id, method token and normalized URI.
    ///
    /// Setups bind tightly to the correlation id when one is supplied, so
    /// they pass `include_without_id = false`. Executes and verifies pass
    /// `true` to also get the id-free key, which matches setups made without
    /// an id.
    ///
    /// On setup calls (`mock-resources` path, real method POST) a declared
    /// target method is recorded in the method signature of the id-free key.
    ///
    /// # Parameters
    ///
    /// - `correlation_id` - Correlation id of the request, if any
    /// - `request` - Request to derive keys for
    /// - `include_without_id` - Whether to also return the id-free key
    ///
    /// # Returns
    ///
    /// Returns distinct keys, id-qualified first.
    ///
    /// # Errors
    ///
    /// Returns `MockError::IllegalHttpMethod` if the target method header
    /// names an unknown method.
    pub fn base_keys(
        &self,
        correlation_id: Option<&str>,
        request: &MockRequest,
        include_without_id: bool,
    ) -> Result<Vec<String>, MockError> {
        let uri = request.key_uri();
        let token = self.method_token(request, &uri)?;

        let key_for = |id: Option<&str>| {
            let parts: Vec<&str> =
                [id, token.as_deref(), Some(uri.as_str())].into_iter().flatten().collect();
            concat_keys(&parts)
        };

        let mut keys = Vec::with_capacity(2);
        match correlation_id {
            Some(id) => {
                keys.push(key_for(Some(id)));
                if include_without_id {
                    let without_id = key_for(None);
                    if !keys.contains(&without_id) {
                        keys.push(without_id);
                    }
                }
            }
            None => keys.push(key_for(None)),
        }
        Ok(keys)
    }

    /// Keys with discriminators, used by execute and verify calls.
    ///
    /// For every base key the literal request query is tried first. If no
    /// mock exists under it, the query signature recorded at setup says which
    /// fields discriminate this endpoint; each one is resolved from the
    /// request query, then from the header the setup named for parsing, then
    /// from the payload. Unresolved fields are left out.
    ///
    /// # Errors
    ///
    /// Returns `MockError::IllegalHttpMethod` from key derivation, or
    /// `MockError::UnsupportedPayloadType` if a payload cannot be walked.
    pub fn keys_with_discriminators(
        &self,
        correlation_id: Option<&str>,
        request: &MockRequest,
        payload: Option<&Payload>,
    ) -> Result<Vec<String>, MockError> {
        let request_query = request.query_map();
        let mut keys = Vec::new();

        for base in self.base_keys(correlation_id, request, true)? {
            let literal = with_query(&base, &request_query);
            if self.store.exists(&Space::Execute, OpsKind::Value, &literal) {
                keys.push(literal);
                continue;
            }

            let fields = self.store.set_members(&Space::Query, &base);
            if fields.is_empty() {
                keys.push(base);
                continue;
            }

            let header_payload = self.header_payload(&base, request);
            let mut discriminators = QueryMap::new();
            for field in fields {
                // All query values, joined the same way the setup key was
                if let Some(values) = request_query.get(&field) {
                    discriminators.insert(field, values.clone());
                    continue;
                }
                let value = match header_payload.as_ref().or(payload) {
                    Some(source) => parse_field(source, &field)?,
                    None => None,
                };
                if let Some(value) = value {
                    discriminators.insert(field, vec![value]);
                }
            }
            debug!(base = %base, fields = ?discriminators.keys().collect::<Vec<_>>(), "resolved discriminators");
            keys.push(with_query(&base, &discriminators));
        }

        Ok(keys)
    }

    /// Decide the method token of the keys of this request.
    fn method_token(&self, request: &MockRequest, uri: &str) -> Result<Option<String>, MockError> {
        if request.is_mock_resources() {
            let Some(target) = request.header(HTTP_METHOD_HEADER) else {
                return Ok(None);
            };
            let target: HttpMethod = target.parse()?;
            if request.method == HttpMethod::Post {
                self.store.add_to_set(&Space::HttpMethod, uri, &[target.as_str().to_string()]);
            }
            return Ok(Some(target.key_token()));
        }

        let configured = self.store.set_members(&Space::HttpMethod, uri);
        Ok(configured.contains(request.method.as_str()).then(|| request.method.key_token()))
    }

    /// Payload taken from the header a setup asked to parse, if any.
    fn header_payload(&self, base: &str, request: &MockRequest) -> Option<Payload> {
        let stored = self.store.get_value(&Space::ParsePayloadRequestHeader, base)?;
        let header_name = match stored {
            StoredValue::Json(serde_json::Value::String(name)) => name,
            _ => return None,
        };
        request.header(&header_name).map(Payload::from_header_value)
    }

    /// Remember which request header to parse for discriminators of `base`.
    pub fn record_parse_payload_header(&self, base: &str, request: &MockRequest) {
        if let Some(header_name) = request.header(PARSE_PAYLOAD_HEADER) {
            self.store.set_value(
                &Space::ParsePayloadRequestHeader,
                base,
                StoredValue::Json(serde_json::Value::String(header_name.to_string())),
            );
        }
    }
}
