use std::time::Duration;

use reqwest::Method;
use serde_json::Value as JsonValue;

/// Per-call query parameters and extra headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestConfig {
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Adds a header, replacing any earlier value with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }
}

/// A fully resolved outbound request.
///
/// Request stages receive and return this value before every attempt.
/// Retries resend the descriptor produced for the logical call, so stages
/// see the same method, url, params and body each time.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    pub timeout: Duration,
}

impl ApiRequest {
    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a header, replacing any earlier value with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        set_header(&mut self.headers, name.into(), value.into());
    }

    pub fn key(&self, call_id: u64) -> RequestKey {
        RequestKey {
            method: self.method.clone(),
            url: self.url.clone(),
            call_id,
        }
    }
}

/// Correlates the retry attempts of one logical call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
    /// Unique per logical call; concurrent calls to one endpoint never collide.
    pub call_id: u64,
}

/// Runtime mode of the host application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Request and response traffic is logged at debug level.
    Development,
    #[default]
    Production,
}

impl Mode {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers
        .iter_mut()
        .find(|(key, _)| key.eq_ignore_ascii_case(&name))
    {
        Some(entry) => *entry = (name, value),
        None => headers.push((name, value)),
    }
}

pub(crate) fn remove_header(headers: &mut Vec<(String, String)>, name: &str) {
    headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
}

#[cfg(test)]
mod tests {
    use super::RequestConfig;

    #[test]
    fn header_replaces_case_insensitively() {
        let config = RequestConfig::new()
            .header("Accept", "text/plain")
            .header("accept", "application/json");
        assert_eq!(
            config.headers,
            vec![("accept".to_owned(), "application/json".to_owned())]
        );
    }

    #[test]
    fn params_keep_insertion_order() {
        let config = RequestConfig::new().param("page", 2).param("q", "lead");
        assert_eq!(config.params[0], ("page".to_owned(), "2".to_owned()));
        assert_eq!(config.params[1], ("q".to_owned(), "lead".to_owned()));
    }
}
