//! Dotted-path extraction of scalar fields from request payloads.
//!
//! Parsing a payload is expensive compared with keying on headers or the URI.
//! It is the fallback used to tell apart requests that share a URI and carry
//! their distinguishing value only in the body.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::MockError;
use crate::parser::xml::xml_to_map;
use crate::store::StoredValue;

/// Request payload, classified once at the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON object body.
    Map(Map<String, Value>),
    /// Any other UTF-8 body: XML, form-encoded, plain text or non-object JSON.
    RawString(String),
    /// A body that is not valid UTF-8.
    Binary(Bytes),
}

impl Payload {
    /// Classify a raw request body.
    ///
    /// Malformed JSON is not an error: it is kept as a raw string so that XML
    /// and form bodies stay usable.
    pub fn from_body(body: &[u8]) -> Self {
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
            return Self::Map(map);
        }
        match std::str::from_utf8(body) {
            Ok(text) => Self::RawString(text.to_string()),
            Err(_) => Self::Binary(Bytes::copy_from_slice(body)),
        }
    }

    /// Classify a request header value used in place of the body.
    pub fn from_header_value(value: &str) -> Self {
        match serde_json::from_str::<Value>(value) {
            Ok(Value::Object(map)) => Self::Map(map),
            _ => Self::RawString(value.to_string()),
        }
    }

    /// Name of the payload shape, for logs and errors.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Map(_) => "map",
            Self::RawString(_) => "string",
            Self::Binary(_) => "binary",
        }
    }

    /// JSON view of the payload as captured for verification.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Map(map) => Value::Object(map.clone()),
            Self::RawString(text) => Value::String(text.clone()),
            Self::Binary(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Storable form of the payload.
    pub fn to_stored(&self) -> StoredValue {
        match self {
            Self::Binary(bytes) => StoredValue::Binary(bytes.clone()),
            other => StoredValue::Json(other.to_json()),
        }
    }
}

/// Extract the value at a `.` delimited path.
///
/// A map is walked key by key. A string, at the top level or reached while
/// walking, is read as XML and walked the same way; if it is not XML it is
/// read as a form body (`a=1&b=2`) where only a single remaining segment can
/// match.
///
/// # Parameters
///
/// - `payload` - Payload to search
/// - `path` - Dotted field path, e.g. `customer.id`
///
/// # Returns
///
/// Returns `Ok(None)` if any segment is absent, the string form of the leaf
/// otherwise.
///
/// # Errors
///
/// Returns `MockError::UnsupportedPayloadType` if the walk reaches a value that
/// is neither a map nor a string before the path is consumed.
pub fn parse_field(payload: &Payload, path: &str) -> Result<Option<String>, MockError> {
    let segments: Vec<&str> = path.split('.').collect();
    match payload {
        Payload::Map(map) => find_in_map(map, &segments),
        Payload::RawString(text) => find_in_string(text, &segments),
        Payload::Binary(_) => Err(MockError::UnsupportedPayloadType("binary")),
    }
}

fn find_value(value: &Value, segments: &[&str]) -> Result<Option<String>, MockError> {
    if segments.is_empty() {
        return Ok(leaf_string(value));
    }
    match value {
        Value::Object(map) => find_in_map(map, segments),
        Value::String(text) => find_in_string(text, segments),
        Value::Null => Ok(None),
        Value::Array(_) => Err(MockError::UnsupportedPayloadType("array")),
        Value::Number(_) => Err(MockError::UnsupportedPayloadType("number")),
        Value::Bool(_) => Err(MockError::UnsupportedPayloadType("boolean")),
    }
}

fn find_in_map(map: &Map<String, Value>, segments: &[&str]) -> Result<Option<String>, MockError> {
    match segments.split_first() {
        Some((head, rest)) => match map.get(*head) {
            Some(child) => find_value(child, rest),
            None => Ok(None),
        },
        None => Ok(Some(Value::Object(map.clone()).to_string())),
    }
}

fn find_in_string(text: &str, segments: &[&str]) -> Result<Option<String>, MockError> {
    if let Some(map) = xml_to_map(text) {
        return find_in_map(&map, segments);
    }
    Ok(find_in_form(text, segments))
}

/// Flat lookup in a form-encoded body, first exact name wins.
fn find_in_form(text: &str, segments: &[&str]) -> Option<String> {
    let [name] = segments else {
        return None;
    };
    text.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == *name).then(|| value.to_string())
    })
}

fn leaf_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Payload {
        match value {
            Value::Object(m) => Payload::Map(m),
            other => panic!("not an object: {other}"),
        }
    }

    /// Test walking nested JSON maps.
    #[test]
    fn test_parse_map() {
        let payload = map(json!({"a": {"b": "v"}, "id": 5, "ok": true, "none": null}));
        assert_eq!(parse_field(&payload, "a.b").expect("supported"), Some("v".to_string()));
        assert_eq!(parse_field(&payload, "id").expect("supported"), Some("5".to_string()));
        assert_eq!(parse_field(&payload, "ok").expect("supported"), Some("true".to_string()));
        assert_eq!(parse_field(&payload, "none").expect("supported"), None);
        assert_eq!(parse_field(&payload, "missing").expect("supported"), None);
        assert_eq!(
            parse_field(&payload, "a").expect("supported"),
            Some(r#"{"b":"v"}"#.to_string())
        );

        let empty_child = map(json!({"a": {}}));
        assert_eq!(parse_field(&empty_child, "a.b").expect("supported"), None);
    }

    /// Test unsupported shapes reached before the path is consumed.
    #[test]
    fn test_unsupported_payload_type() {
        let binary = Payload::Binary(Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(
            parse_field(&binary, "id"),
            Err(MockError::UnsupportedPayloadType("binary"))
        ));

        let payload = map(json!({"items": [1, 2], "n": 3}));
        assert!(matches!(
            parse_field(&payload, "items.first"),
            Err(MockError::UnsupportedPayloadType("array"))
        ));
        assert!(matches!(
            parse_field(&payload, "n.x"),
            Err(MockError::UnsupportedPayloadType("number"))
        ));
    }

    /// Test XML payloads, at the top level and embedded in a JSON string.
    #[test]
    fn test_parse_xml() {
        let xml = Payload::RawString("<req><user><id>42</id></user></req>".to_string());
        assert_eq!(parse_field(&xml, "user.id").expect("supported"), Some("42".to_string()));
        assert_eq!(parse_field(&xml, "user.name").expect("supported"), None);

        let embedded = map(json!({"doc": "<d><code>X1</code></d>"}));
        assert_eq!(parse_field(&embedded, "doc.code").expect("supported"), Some("X1".to_string()));
    }

    /// Test the form-encoded fallback.
    #[test]
    fn test_parse_form() {
        let form = Payload::RawString("id=5&name=ada&id=6".to_string());
        assert_eq!(parse_field(&form, "id").expect("supported"), Some("5".to_string()));
        assert_eq!(parse_field(&form, "name").expect("supported"), Some("ada".to_string()));
        assert_eq!(parse_field(&form, "nam").expect("supported"), None);
        // Flat keys only
        assert_eq!(parse_field(&form, "id.x").expect("supported"), None);
    }

    /// Test payload classification of request bodies.
    #[test]
    fn test_from_body() {
        assert!(matches!(Payload::from_body(br#"{"id": 1}"#), Payload::Map(_)));
        assert_eq!(Payload::from_body(b"[1,2]"), Payload::RawString("[1,2]".to_string()));
        assert_eq!(Payload::from_body(b"{broken"), Payload::RawString("{broken".to_string()));
        assert_eq!(Payload::from_body(b""), Payload::RawString(String::new()));
        assert!(matches!(Payload::from_body(&[0xff, 0x00, 0xfe]), Payload::Binary(_)));
    }

    /// Test classification of header values.
    #[test]
    fn test_from_header_value() {
        assert!(matches!(Payload::from_header_value(r#"{"id":"h1"}"#), Payload::Map(_)));
        assert_eq!(Payload::from_header_value("id=1"), Payload::RawString("id=1".to_string()));
    }
}
