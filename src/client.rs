use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};
use std::time::Duration;

use reqwest::{header, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

// tokio::time::sleep is only available on non-WASM targets.
#[cfg(not(target_arch = "wasm32"))]
use tokio::time::sleep;

use crate::{
    credentials::{default_store, AuthTokens},
    navigator::default_navigator,
    pipeline::{AuthFailureStage, AuthStage, DevLogStage, ForbiddenStage, RequestIdStage},
    retry::{RetryPolicy, RetryTracker},
    types, ApiError, ApiRequest, ClientOptions, CredentialStore, Envelope, Failure, Mode,
    Navigator, Pipeline, RequestConfig, RequestStage, ResponseStage, Result,
};

/// Defaults applied to every call, mutable at runtime.
#[derive(Clone, Debug)]
struct Defaults {
    base_url: String,
    timeout: Duration,
    headers: Vec<(String, String)>,
}

#[derive(Clone)]
/// HTTP client for the portal backend.
///
/// Every call goes through the same pipeline of request and response
/// stages. Safe verbs are retried on transient failures and the response
/// envelope is unwrapped so callers receive `data` directly.
/// Cloning is cheap and clones share tokens, defaults and retry state.
pub struct ApiClient {
    http: reqwest::Client,
    defaults: Arc<RwLock<Defaults>>,
    tokens: AuthTokens,
    pipeline: Arc<Pipeline>,
    policy: RetryPolicy,
    retries: Arc<RetryTracker>,
    next_call: Arc<AtomicU64>,
    mode: Mode,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defaults = self.defaults();
        f.debug_struct("ApiClient")
            .field("base_url", &defaults.base_url)
            .field("timeout", &defaults.timeout)
            .field("policy", &self.policy)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client with default options for the current target.
    ///
    /// Natively, tokens and navigation are kept in memory; in the browser
    /// they use `localStorage`/`sessionStorage` and `window.location`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::builder()
            .options(ClientOptions::default().with_base_url(base_url))
            .build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Creates a client from environment variables.
    ///
    /// See [`crate::EnvConfig`] for the variables read.
    ///
    /// **Not available on `wasm32` targets** — environment variables do not
    /// exist in browser runtimes.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> std::result::Result<Self, crate::ConfigError> {
        let config = crate::EnvConfig::from_env()?;
        Ok(Self::builder().options(config.client_options()).build())
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<T> {
        self.request(Method::GET, url, Ok(None), config).await
    }

    pub async fn post<T, B>(&self, url: &str, body: &B, config: Option<RequestConfig>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, url, encode_body(body), config)
            .await
    }

    pub async fn put<T, B>(&self, url: &str, body: &B, config: Option<RequestConfig>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, url, encode_body(body), config)
            .await
    }

    pub async fn patch<T, B>(
        &self,
        url: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, url, encode_body(body), config)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<T> {
        self.request(Method::DELETE, url, Ok(None), config).await
    }

    /// DELETE with a JSON body.
    pub async fn delete_with_body<T, B>(
        &self,
        url: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::DELETE, url, encode_body(body), config)
            .await
    }

    /// HEAD request; the response body is ignored.
    pub async fn head(&self, url: &str, config: Option<RequestConfig>) -> Result<()> {
        let request = self.describe(Method::HEAD, url, None, config);
        self.execute(request, |_, _| Ok(())).await
    }

    /// OPTIONS request; the response body is ignored.
    pub async fn options(&self, url: &str, config: Option<RequestConfig>) -> Result<()> {
        let request = self.describe(Method::OPTIONS, url, None, config);
        self.execute(request, |_, _| Ok(())).await
    }

    /// Stores `token` for later requests.
    ///
    /// `remember` selects durable storage, otherwise the session area is
    /// used. The other area is cleared. Storage errors are logged only.
    pub fn set_auth_token(&self, token: &str, remember: bool) {
        self.tokens.write(token, remember);
    }

    /// Removes the token from both storage areas. Storage errors are logged only.
    pub fn clear_auth_token(&self) {
        self.tokens.clear();
    }

    /// The stored token, durable area first.
    pub fn auth_token(&self) -> Option<String> {
        self.tokens.read()
    }

    pub fn set_base_url(&self, base_url: impl Into<String>) {
        self.defaults_mut().base_url = base_url.into();
    }

    pub fn set_timeout(&self, timeout_ms: u64) {
        self.defaults_mut().timeout = Duration::from_millis(timeout_ms);
    }

    /// Adds a default header sent with every request.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        types::set_header(&mut self.defaults_mut().headers, name.into(), value.into());
    }

    pub fn remove_header(&self, name: &str) {
        types::remove_header(&mut self.defaults_mut().headers, name);
    }

    pub fn base_url(&self) -> String {
        self.defaults().base_url.clone()
    }

    /// Logical calls currently waiting on a retry.
    pub fn pending_retries(&self) -> usize {
        self.retries.in_flight()
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: std::result::Result<Option<JsonValue>, Failure>,
        config: Option<RequestConfig>,
    ) -> Result<T> {
        let (body, invalid_body) = match body {
            Ok(body) => (body, None),
            Err(failure) => (None, Some(failure)),
        };
        let request = self.describe(method, url, body, config);
        if let Some(failure) = invalid_body {
            return Err(self.surface(&request, failure));
        }

        self.execute(request, decode_envelope::<T>).await
    }

    fn describe(
        &self,
        method: Method,
        url: &str,
        body: Option<JsonValue>,
        config: Option<RequestConfig>,
    ) -> ApiRequest {
        let defaults = self.defaults().clone();
        let config = config.unwrap_or_default();
        let mut headers = defaults.headers;
        for (name, value) in config.headers {
            types::set_header(&mut headers, name, value);
        }
        ApiRequest {
            method,
            url: resolve_url(&defaults.base_url, url),
            params: config.params,
            headers,
            body,
            timeout: defaults.timeout,
        }
    }

    /// Runs one logical call: first attempt plus any retries.
    ///
    /// The body is decoded before any response stage runs, so a call ends
    /// in either the success stages or the failure stages, never both.
    async fn execute<T, D>(&self, request: ApiRequest, decode: D) -> Result<T>
    where
        D: Fn(u16, &str) -> std::result::Result<T, Failure>,
    {
        let key = request.key(self.next_call.fetch_add(1, Ordering::Relaxed));
        loop {
            let prepared = self.pipeline.prepare(request.clone());
            match self.send_once(&prepared).await {
                Ok((status, body)) => {
                    self.retries.clear(&key);
                    return match decode(status, &body) {
                        Ok(data) => {
                            self.pipeline.succeeded(&prepared, status, &body);
                            Ok(data)
                        }
                        Err(failure) => Err(self.surface(&prepared, failure)),
                    };
                }
                Err(failure) => {
                    if self.retries.retries(&key) < self.policy.max_retries
                        && self.policy.is_eligible(&prepared.method, &failure)
                    {
                        let retry = self.retries.record_retry(&key);
                        self.wait_before_retry(&prepared, retry).await;
                        continue;
                    }
                    self.retries.clear(&key);
                    return Err(self.surface(&prepared, failure));
                }
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> std::result::Result<(u16, String), Failure> {
        // On WASM, reqwest uses AbortController for timeout; the
        // `.timeout()` method is available on both targets.
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .timeout(request.timeout);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| Failure::from_transport(&err))?;
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            // An error status is still known without its body.
            Err(err) if !status.is_success() => {
                tracing::warn!(url = %request.url, error = %err, "failed to read error body");
                String::new()
            }
            Err(err) => return Err(Failure::from_transport(&err)),
        };

        if !status.is_success() {
            return Err(Failure::Response {
                status: status.as_u16(),
                body,
            });
        }
        Ok((status.as_u16(), body))
    }

    /// Normalizes a failure that reaches the caller and runs the failure stages.
    fn surface(&self, request: &ApiRequest, failure: Failure) -> ApiError {
        let error = failure.normalize();
        tracing::error!(
            status = error.status,
            method = %request.method,
            url = %request.url,
            message = %error.message,
            "API request failed"
        );
        self.pipeline.failed(request, &failure);
        error
    }

    /// Waits `base_delay * retry` before resending.
    ///
    /// On native targets: `tokio::time::sleep`.
    /// On WASM targets: a browser timer via `gloo-timers`.
    async fn wait_before_retry(&self, request: &ApiRequest, retry: u32) {
        let delay = self.policy.delay_for(retry);
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            retry,
            max_retries = self.policy.max_retries,
            ?delay,
            "retrying request"
        );

        #[cfg(not(target_arch = "wasm32"))]
        sleep(delay).await;

        #[cfg(target_arch = "wasm32")]
        gloo_timers::future::sleep(delay).await;
    }

    fn defaults(&self) -> std::sync::RwLockReadGuard<'_, Defaults> {
        self.defaults.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn defaults_mut(&self) -> std::sync::RwLockWriteGuard<'_, Defaults> {
        self.defaults.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Assembles an [`ApiClient`] and its interceptor pipeline.
#[derive(Default)]
pub struct ApiClientBuilder {
    options: ClientOptions,
    http: Option<reqwest::Client>,
    store: Option<Arc<dyn CredentialStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    request_stages: Vec<Arc<dyn RequestStage>>,
    response_stages: Vec<Arc<dyn ResponseStage>>,
}

impl ApiClientBuilder {
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses a preconfigured `reqwest` client as the transport.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Appends a request stage; it runs after the built-in stages.
    pub fn request_stage(mut self, stage: Arc<dyn RequestStage>) -> Self {
        self.request_stages.push(stage);
        self
    }

    /// Appends a response stage; it runs after the built-in stages.
    pub fn response_stage(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.response_stages.push(stage);
        self
    }

    pub fn build(self) -> ApiClient {
        let tokens = AuthTokens::new(self.store.unwrap_or_else(default_store));
        let navigator = self.navigator.unwrap_or_else(default_navigator);
        let mode = self.options.mode;

        let mut pipeline = Pipeline::new();
        pipeline.push_request(Arc::new(AuthStage {
            tokens: tokens.clone(),
        }));
        pipeline.push_request(Arc::new(RequestIdStage));
        if mode.is_development() {
            pipeline.push_request(Arc::new(DevLogStage));
            pipeline.push_response(Arc::new(DevLogStage));
        }
        pipeline.push_response(Arc::new(AuthFailureStage {
            tokens: tokens.clone(),
            navigator,
        }));
        pipeline.push_response(Arc::new(ForbiddenStage));
        for stage in self.request_stages {
            pipeline.push_request(stage);
        }
        for stage in self.response_stages {
            pipeline.push_response(stage);
        }

        let defaults = Defaults {
            base_url: self.options.base_url.clone(),
            timeout: Duration::from_millis(self.options.timeout_ms),
            headers: vec![
                (
                    header::CONTENT_TYPE.as_str().to_owned(),
                    "application/json".to_owned(),
                ),
                (
                    header::ACCEPT.as_str().to_owned(),
                    "application/json".to_owned(),
                ),
            ],
        };

        ApiClient {
            http: self.http.unwrap_or_default(),
            defaults: Arc::new(RwLock::new(defaults)),
            tokens,
            pipeline: Arc::new(pipeline),
            policy: RetryPolicy::from_options(&self.options),
            retries: Arc::new(RetryTracker::new()),
            next_call: Arc::new(AtomicU64::new(0)),
            mode,
        }
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> std::result::Result<Option<JsonValue>, Failure> {
    serde_json::to_value(body)
        .map(Some)
        .map_err(|err| Failure::Setup {
            message: format!("request body could not be serialized: {err}"),
        })
}

/// Unwraps `data`; an empty body decodes as JSON `null`.
fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> std::result::Result<T, Failure> {
    let decoded = if body.trim().is_empty() {
        serde_json::from_value::<T>(JsonValue::Null)
    } else {
        serde_json::from_str::<Envelope<T>>(body).map(|envelope| envelope.data)
    };
    decoded.map_err(|err| Failure::Decode {
        status,
        message: format!("invalid response envelope: {err}"),
    })
}

/// Joins a relative `url` onto `base_url`; absolute urls pass through.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    let is_absolute = url.starts_with("http://") || url.starts_with("https://");
    if is_absolute || base_url.is_empty() {
        return url.to_owned();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_envelope, resolve_url, ApiClient};
    use crate::{Failure, MemoryCredentialStore, StorageArea};

    #[test]
    fn resolve_url_joins_single_slash() {
        assert_eq!(resolve_url("http://api/v1/", "/leads"), "http://api/v1/leads");
        assert_eq!(resolve_url("http://api/v1", "leads"), "http://api/v1/leads");
        assert_eq!(resolve_url("", "/leads"), "/leads");
        assert_eq!(
            resolve_url("http://api/v1", "https://other/x"),
            "https://other/x"
        );
    }

    #[test]
    fn decode_envelope_returns_data() {
        let body = json!({ "data": { "id": 1 }, "success": true, "message": "OK", "status": 200 });
        let data: serde_json::Value =
            decode_envelope(200, &body.to_string()).expect("envelope must decode");
        assert_eq!(data, json!({ "id": 1 }));
    }

    #[test]
    fn decode_envelope_accepts_empty_body_for_unit() {
        decode_envelope::<()>(204, "").expect("empty body must decode as unit");
    }

    #[test]
    fn decode_envelope_reports_shape_mismatch() {
        let err = decode_envelope::<u32>(200, r#"{"items":[]}"#).expect_err("must fail");
        assert!(matches!(err, Failure::Decode { status: 200, .. }));
        assert_eq!(err.normalize().status, 200);
    }

    #[test]
    fn defaults_are_mutable_through_shared_clones() {
        let client = ApiClient::new("http://a");
        let clone = client.clone();
        clone.set_base_url("http://b");
        clone.set_header("X-Tenant", "acme");
        assert_eq!(client.base_url(), "http://b");

        let request = client.describe(reqwest::Method::GET, "/x", None, None);
        assert_eq!(request.url, "http://b/x");
        assert_eq!(request.header("x-tenant"), Some("acme"));
        assert_eq!(request.header("accept"), Some("application/json"));

        client.remove_header("x-tenant");
        let request = client.describe(reqwest::Method::GET, "/x", None, None);
        assert_eq!(request.header("x-tenant"), None);
    }

    #[test]
    fn token_helpers_use_configured_store() {
        let store = std::sync::Arc::new(MemoryCredentialStore::new());
        let client = ApiClient::builder().credential_store(store.clone()).build();
        client.set_auth_token("secret", true);
        assert_eq!(client.auth_token().as_deref(), Some("secret"));
        client.clear_auth_token();
        assert_eq!(store.peek(StorageArea::Durable), None);
        assert_eq!(store.peek(StorageArea::Session), None);
    }

    #[test]
    fn debug_does_not_expose_token() {
        let client = ApiClient::new("http://api");
        client.set_auth_token("secret-token", false);
        let debug = format!("{client:?}");
        assert!(debug.contains("http://api"));
        assert!(!debug.contains("secret-token"));
    }
}
