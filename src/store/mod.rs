//! Key-value storage abstractions for mocks, signatures and verification records.
//!
//! The store offers scalar values, FIFO lists and sets, every one of them bound
//! by a time-to-live. All keys are namespaced as `{space}-{opsKind}-{key}` so
//! that a value, a list and a set can share the same logical key.
//!
//! # Consistency
//!
//! Individual operations are atomic, but nothing spans two operations. In
//! particular [`KeyValueStore::pop_list`] is a pop followed by an independent
//! read of the sticky value: two concurrent executes against the same key may
//! both see the sticky fallback, or one of them may skip a freshly queued
//! entry. Tests that own a unique correlation id never observe this.

pub mod memory;

// Re-export main implementations
pub use memory::MemoryStore;

use std::collections::BTreeSet;
use std::fmt;

use bytes::Bytes;

/// Default time-to-live for every stored entry.
pub const DEFAULT_TTL: std::time::Duration = std::time::Duration::from_secs(30 * 60);

/// Logical namespace of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Space {
    /// Queued mock entries served by execute calls.
    Execute,
    /// Raw bytes overlaid on queued mock entries.
    Binary,
    /// Query signature: field names recorded at setup.
    Query,
    /// Method signature: methods configured for an id-free base key.
    HttpMethod,
    /// Captured execute payloads (list) and the last raw body (value).
    VerifyPayload,
    /// Captured execute request headers.
    VerifyHeaders,
    /// Name of a request header to parse instead of the body.
    ParsePayloadRequestHeader,
    /// Free-form space used by default-mock callbacks.
    Custom(String),
}

impl Space {
    /// Namespace prefix used in composed store keys.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Execute => "execute",
            Self::Binary => "binary",
            Self::Query => "query",
            Self::HttpMethod => "http-method",
            Self::VerifyPayload => "verify-payload",
            Self::VerifyHeaders => "verify-headers",
            Self::ParsePayloadRequestHeader => "parse-payload-request-header",
            Self::Custom(name) => name,
        }
    }

    /// Whether `name` collides with one of the built-in namespaces.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_SPACES.contains(&name)
    }
}

/// Prefixes of the built-in namespaces, unavailable to custom spaces.
const RESERVED_SPACES: [&str; 7] = [
    "execute",
    "binary",
    "query",
    "http-method",
    "verify-payload",
    "verify-headers",
    "parse-payload-request-header",
];

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of operation a namespaced key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpsKind {
    Value,
    List,
    Set,
}

impl OpsKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::List => "list",
            Self::Set => "set",
        }
    }
}

/// Compose the physical store key for a logical key.
pub fn namespaced_key(space: &Space, kind: OpsKind, key: &str) -> String {
    format!("{}-{}-{key}", space.as_str(), kind.as_str())
}

/// A stored value: structured JSON or opaque bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Json(serde_json::Value),
    Binary(Bytes),
}

impl StoredValue {
    /// Borrow the JSON value, if this is one.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Binary(_) => None,
        }
    }

    /// Borrow the bytes, if this is a binary value.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            Self::Json(_) => None,
        }
    }
}

impl From<serde_json::Value> for StoredValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Bytes> for StoredValue {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

/// Storage abstraction with per-key TTL and value/list/set semantics.
///
/// Every write sets or refreshes the TTL of the key it touches.
pub trait KeyValueStore: Send + Sync {
    /// Set the scalar value of a key.
    fn set_value(&self, space: &Space, key: &str, value: StoredValue);

    /// Get the scalar value of a key.
    ///
    /// # Returns
    ///
    /// Returns `None` if the key is missing or expired.
    fn get_value(&self, space: &Space, key: &str) -> Option<StoredValue>;

    /// Append a value to the right of a list.
    ///
    /// The pushed value also becomes the sticky scalar of the same key, so
    /// that [`pop_list`](Self::pop_list) keeps answering once the list drains.
    fn push_list(&self, space: &Space, key: &str, value: StoredValue);

    /// Pop the leftmost value of a list.
    ///
    /// # Returns
    ///
    /// Returns the popped value, or the sticky scalar if the list is empty or
    /// missing, or `None` if neither exists.
    fn pop_list(&self, space: &Space, key: &str) -> Option<StoredValue>;

    /// Read a whole list in insertion order without consuming it.
    fn list_all(&self, space: &Space, key: &str) -> Vec<StoredValue>;

    /// Add members to a set.
    fn add_to_set(&self, space: &Space, key: &str, members: &[String]);

    /// Read all members of a set, empty if missing.
    fn set_members(&self, space: &Space, key: &str) -> BTreeSet<String>;

    /// Check whether a key of the given kind exists and has not expired.
    fn exists(&self, space: &Space, kind: OpsKind, key: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test namespaced key composition.
    #[test]
    fn test_namespaced_key() {
        assert_eq!(namespaced_key(&Space::Execute, OpsKind::List, "/users"), "execute-list-/users");
        assert_eq!(
            namespaced_key(&Space::ParsePayloadRequestHeader, OpsKind::Value, "k"),
            "parse-payload-request-header-value-k"
        );
        assert_eq!(
            namespaced_key(&Space::Custom("callbacks".into()), OpsKind::Set, "k"),
            "callbacks-set-k"
        );
    }

    /// Test that every built-in space name is reserved.
    #[test]
    fn test_reserved_space_names() {
        for space in [
            Space::Execute,
            Space::Binary,
            Space::Query,
            Space::HttpMethod,
            Space::VerifyPayload,
            Space::VerifyHeaders,
            Space::ParsePayloadRequestHeader,
        ] {
            assert!(Space::is_reserved(space.as_str()), "{space} should be reserved");
        }
        assert!(!Space::is_reserved("payment-callbacks"));
    }

    /// Test stored value accessors.
    #[test]
    fn test_stored_value_accessors() {
        let json = StoredValue::from(serde_json::json!({"a": 1}));
        assert!(json.as_json().is_some());
        assert!(json.as_binary().is_none());

        let binary = StoredValue::from(Bytes::from_static(b"\x00\x01"));
        assert_eq!(binary.as_binary().map(|b| b.len()), Some(2));
        assert!(binary.as_json().is_none());
    }
}
