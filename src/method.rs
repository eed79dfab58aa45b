//! Known HTTP verbs used for method disambiguation of composite keys.

use std::fmt;
use std::str::FromStr;

use crate::error::MockError;

/// HTTP method known to the key composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Post,
    Put,
    Patch,
    Get,
    Delete,
    Options,
    Head,
    Trace,
    Connect,
}

impl HttpMethod {
    /// All known methods, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Get,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Trace,
        Self::Connect,
    ];

    /// Upper-case method name as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Get => "GET",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }

    /// Token folded into a composite key, e.g. `/post`.
    pub fn key_token(self) -> String {
        format!("/{}", self.as_str().to_ascii_lowercase())
    }

    /// Whether requests with this method carry no payload worth parsing.
    pub const fn is_bodiless(self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }

    /// Comma separated list of known methods, for error messages.
    pub fn known_list() -> String {
        Self::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = MockError;

    /// Parse a method name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| MockError::IllegalHttpMethod(s.to_string()))
    }
}

impl TryFrom<&axum::http::Method> for HttpMethod {
    type Error = MockError;

    fn try_from(method: &axum::http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test case-insensitive parsing and rejection of unknown verbs.
    #[test]
    fn test_parse() {
        assert_eq!(" post ".parse::<HttpMethod>().expect("known"), HttpMethod::Post);
        assert_eq!("Delete".parse::<HttpMethod>().expect("known"), HttpMethod::Delete);

        let err = "FETCH".parse::<HttpMethod>().unwrap_err();
        assert!(matches!(err, MockError::IllegalHttpMethod(ref m) if m == "FETCH"));
    }

    /// Test the key token and bodiless classification.
    #[test]
    fn test_key_token() {
        assert_eq!(HttpMethod::Get.key_token(), "/get");
        assert!(HttpMethod::Get.is_bodiless());
        assert!(HttpMethod::Delete.is_bodiless());
        assert!(!HttpMethod::Patch.is_bodiless());
    }

    /// Test conversion from the transport method type.
    #[test]
    fn test_from_transport_method() {
        let method = HttpMethod::try_from(&axum::http::Method::PUT).expect("known");
        assert_eq!(method, HttpMethod::Put);
    }
}
