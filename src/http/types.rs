//! API types for HTTP handlers.

use serde::Serialize;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse<'a> {
    /// Always "error"
    pub status: &'a str,
    /// Machine-readable error kind
    #[serde(rename = "errorType")]
    pub error_type: &'a str,
    /// Human-readable message
    pub error: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test ErrorResponse serialization.
    #[test]
    fn test_error_response_serialization() {
        let response =
            ErrorResponse { status: "error", error_type: "mock_not_found", error: "nothing here" };

        let json = serde_json::to_string(&response).expect("valid structure");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        assert_eq!(parsed["status"], "error");
        assert_eq!(parsed["errorType"], "mock_not_found");
        assert_eq!(parsed["error"], "nothing here");
        assert!(parsed.get("error_type").is_none());
    }
}
