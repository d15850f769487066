//! `portal-api-client` is the async HTTP client behind the portal's Inbox
//! and Lead Management screens.
//!
//! [`ApiClient`] exposes typed verb methods that unwrap the backend's
//! `{ data, success, message, status }` envelope:
//! - [`ApiClient::get`]
//! - [`ApiClient::post`], [`ApiClient::put`], [`ApiClient::patch`]
//! - [`ApiClient::delete`]
//!
//! Every call carries the stored bearer token and an `X-Request-ID`.
//! GET/HEAD/OPTIONS are retried on transient failures; any failure that
//! reaches the caller is a single normalized [`ApiError`].

mod client;
mod config;
mod credentials;
mod error;
mod navigator;
mod options;
mod pipeline;
mod retry;
mod types;
mod wire;

pub use client::{resolve_url, ApiClient, ApiClientBuilder};
pub use config::EnvConfig;
#[cfg(target_arch = "wasm32")]
pub use credentials::BrowserCredentialStore;
pub use credentials::{CredentialStore, MemoryCredentialStore, StorageArea, TOKEN_KEY};
pub use error::{ApiError, ConfigError, Failure, StorageError, FALLBACK_MESSAGE, NO_RESPONSE_MESSAGE};
#[cfg(target_arch = "wasm32")]
pub use navigator::BrowserNavigator;
pub use navigator::{MemoryNavigator, Navigator, LOGIN_PATH};
pub use options::ClientOptions;
pub use pipeline::{generate_request_id, Pipeline, RequestStage, ResponseStage, REQUEST_ID_HEADER};
pub use retry::{RetryPolicy, RetryTracker};
pub use types::{ApiRequest, Mode, RequestConfig, RequestKey};
pub use wire::Envelope;

/// Re-exported so callers can name methods without depending on `reqwest`.
pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, ApiError>;
