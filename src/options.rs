use crate::Mode;

/// Configures timeout, retry and logging behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Prefix joined to every relative request url.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base retry delay in milliseconds; retry `n` waits `n` times this.
    pub retry_delay_ms: u64,
    /// Status codes treated as transient for safe verbs.
    pub retryable_statuses: Vec<u16>,
    /// Development mode logs every request and response.
    pub mode: Mode,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            retryable_statuses: vec![408, 429, 500, 502, 503, 504],
            mode: Mode::Production,
        }
    }
}

impl ClientOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}
