//! Ordered request and response stages applied around every attempt.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::Utc;
use reqwest::header;

use crate::{
    credentials::AuthTokens,
    navigator::{Navigator, LOGIN_PATH},
    ApiRequest, Failure,
};

/// Header carrying the per-attempt tracing id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Transforms a request before it is sent.
pub trait RequestStage: Send + Sync {
    fn apply(&self, request: ApiRequest) -> ApiRequest;
}

/// Observes the outcome of a logical call.
///
/// Exactly one of the two runs per call: `on_success` once the body has
/// decoded, or `on_failure` for the failure that is surfaced to the caller.
pub trait ResponseStage: Send + Sync {
    fn on_success(&self, _request: &ApiRequest, _status: u16, _body: &str) {}
    fn on_failure(&self, _request: &ApiRequest, _failure: &Failure) {}
}

/// Stages composed when the client is built.
#[derive(Clone, Default)]
pub struct Pipeline {
    request: Vec<Arc<dyn RequestStage>>,
    response: Vec<Arc<dyn ResponseStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_request(&mut self, stage: Arc<dyn RequestStage>) {
        self.request.push(stage);
    }

    pub fn push_response(&mut self, stage: Arc<dyn ResponseStage>) {
        self.response.push(stage);
    }

    pub fn prepare(&self, request: ApiRequest) -> ApiRequest {
        self.request
            .iter()
            .fold(request, |request, stage| stage.apply(request))
    }

    pub fn succeeded(&self, request: &ApiRequest, status: u16, body: &str) {
        for stage in &self.response {
            stage.on_success(request, status, body);
        }
    }

    pub fn failed(&self, request: &ApiRequest, failure: &Failure) {
        for stage in &self.response {
            stage.on_failure(request, failure);
        }
    }
}

/// Attaches `Authorization: Bearer <token>` when a token is stored.
pub(crate) struct AuthStage {
    pub(crate) tokens: AuthTokens,
}

impl RequestStage for AuthStage {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(token) = self.tokens.read() {
            request.set_header(header::AUTHORIZATION.as_str(), format!("Bearer {token}"));
        }
        request
    }
}

/// Tags every attempt with a fresh request id.
pub(crate) struct RequestIdStage;

impl RequestStage for RequestIdStage {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        request.set_header(REQUEST_ID_HEADER, generate_request_id());
        request
    }
}

/// Debug traffic log, installed in development mode only.
pub(crate) struct DevLogStage;

impl RequestStage for DevLogStage {
    fn apply(&self, request: ApiRequest) -> ApiRequest {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            params = ?request.params,
            body = ?request.body,
            "API request"
        );
        request
    }
}

impl ResponseStage for DevLogStage {
    fn on_success(&self, request: &ApiRequest, status: u16, body: &str) {
        tracing::debug!(status, url = %request.url, body, "API response");
    }
}

/// 401 clears stored tokens and sends the user to the login page.
pub(crate) struct AuthFailureStage {
    pub(crate) tokens: AuthTokens,
    pub(crate) navigator: Arc<dyn Navigator>,
}

impl ResponseStage for AuthFailureStage {
    fn on_failure(&self, request: &ApiRequest, failure: &Failure) {
        if failure.status() != Some(401) {
            return;
        }
        self.tokens.clear();
        if self.navigator.current_path() != LOGIN_PATH {
            tracing::info!(url = %request.url, "unauthorized, redirecting to login");
            self.navigator.redirect(LOGIN_PATH);
        }
    }
}

/// 403 is only logged.
pub(crate) struct ForbiddenStage;

impl ResponseStage for ForbiddenStage {
    fn on_failure(&self, request: &ApiRequest, failure: &Failure) {
        if failure.status() == Some(403) {
            tracing::warn!(url = %request.url, "access forbidden");
        }
    }
}

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<millis since epoch>-<9 random base-36 chars>`.
pub fn generate_request_id() -> String {
    static FALLBACK: AtomicU64 = AtomicU64::new(0);

    let now = Utc::now();
    let mut bytes = [0u8; 9];
    if getrandom::getrandom(&mut bytes).is_err() {
        let seed = u64::from(now.timestamp_subsec_nanos())
            ^ FALLBACK.fetch_add(0x9e37_79b9, Ordering::Relaxed);
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = (seed >> ((index % 8) * 8)) as u8;
        }
    }
    let suffix: String = bytes
        .iter()
        .map(|byte| ID_ALPHABET[usize::from(*byte) % ID_ALPHABET.len()] as char)
        .collect();
    format!("{}-{suffix}", now.timestamp_millis())
}
