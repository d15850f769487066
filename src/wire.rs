use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Wrapper every successful backend response is expected to use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: u16,
}

/// Optional fields read from a failed response body.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ErrorBody {
    /// Reads `message` and `errors` independently, so a malformed field
    /// never discards the other one.
    pub fn parse(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<JsonValue>(body) else {
            return Self::default();
        };
        Self {
            message: value
                .get("message")
                .and_then(JsonValue::as_str)
                .map(str::to_owned),
            errors: value
                .get("errors")
                .and_then(|errors| serde_json::from_value(errors.clone()).ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Envelope, ErrorBody};

    #[test]
    fn envelope_tolerates_missing_metadata() {
        let envelope: Envelope<u32> =
            serde_json::from_value(json!({ "data": 7 })).expect("envelope must decode");
        assert_eq!(envelope.data, 7);
        assert!(!envelope.success);
        assert_eq!(envelope.status, 0);
    }

    #[test]
    fn error_body_ignores_unknown_fields() {
        let body: ErrorBody = serde_json::from_value(json!({
            "message": "Forbidden",
            "status": 403,
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .expect("error body must decode");
        assert_eq!(body.message.as_deref(), Some("Forbidden"));
        assert!(body.errors.is_none());
    }

    #[test]
    fn error_body_keeps_message_when_errors_is_a_list() {
        let body = ErrorBody::parse(r#"{"message":"Validation failed","errors":["email invalid"]}"#);
        assert_eq!(body.message.as_deref(), Some("Validation failed"));
        assert!(body.errors.is_none());
    }

    #[test]
    fn error_body_keeps_errors_when_message_is_not_a_string() {
        let body = ErrorBody::parse(r#"{"message":{"code":7},"errors":{"email":["Invalid"]}}"#);
        assert!(body.message.is_none());
        assert_eq!(body.errors.expect("errors map")["email"], vec!["Invalid".to_owned()]);
    }

    #[test]
    fn error_body_of_non_json_is_empty() {
        let body = ErrorBody::parse("<html>Bad Gateway</html>");
        assert!(body.message.is_none());
        assert!(body.errors.is_none());
    }
}
