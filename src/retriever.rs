//! Resolution of the mock to serve for a set of candidate keys.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::defaults::DefaultMockProvider;
use crate::error::MockError;
use crate::model::{MockEntry, MockResponse};
use crate::parser::Payload;
use crate::request::MockRequest;
use crate::store::{KeyValueStore, Space, StoredValue};

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Key the mock was popped from, `None` for default mocks.
    pub matched_key: Option<String>,
    pub response: MockResponse,
}

/// Pops queued mocks and falls back to the defaults.
#[derive(Clone)]
pub struct MockDataRetriever {
    store: Arc<dyn KeyValueStore>,
    defaults: DefaultMockProvider,
}

impl MockDataRetriever {
    pub fn new(store: Arc<dyn KeyValueStore>, defaults: DefaultMockProvider) -> Self {
        Self { store, defaults }
    }

    /// Resolve the response for a request.
    ///
    /// Keys are tried in order. The first key holding a queued entry or a
    /// sticky fallback wins; a binary overlay under the same key replaces the
    /// body. The configured delay is awaited before returning.
    ///
    /// # Parameters
    ///
    /// - `keys` - Candidate composite keys, most specific first
    /// - `request` - Request being served
    /// - `payload` - Parsed request payload, if any
    ///
    /// # Returns
    ///
    /// Returns the response with the key it came from.
    ///
    /// # Errors
    ///
    /// Returns `MockError::MockNotFound` if no key holds an entry and no
    /// default matches.
    pub async fn resolve(
        &self,
        keys: &[String],
        request: &MockRequest,
        payload: Option<&Payload>,
    ) -> Result<Resolution, MockError> {
        for key in keys {
            let Some(entry) = self.pop_entry(key) else {
                continue;
            };
            let binary = match self.store.pop_list(&Space::Binary, key) {
                Some(StoredValue::Binary(bytes)) => Some(bytes),
                _ => None,
            };
            debug!(key = %key, binary = binary.is_some(), "resolved queued mock");
            return Ok(Self::finish(Some(key.clone()), entry, binary).await);
        }

        let entry = self.defaults.resolve(&request.key_uri(), payload)?;
        Ok(Self::finish(None, entry, None).await)
    }

    /// Pop the next entry of a key; undecodable entries are skipped with a warning.
    fn pop_entry(&self, key: &str) -> Option<MockEntry> {
        let value = match self.store.pop_list(&Space::Execute, key)? {
            StoredValue::Json(value) => value,
            StoredValue::Binary(_) => return None,
        };
        match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %key, error = %e, "stored mock entry is not decodable");
                None
            }
        }
    }

    async fn finish(matched_key: Option<String>, entry: MockEntry, binary: Option<bytes::Bytes>) -> Resolution {
        let delay = entry.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Resolution { matched_key, response: entry.into_response_with(binary) }
    }
}
