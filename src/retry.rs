//! Retry eligibility and per-call retry bookkeeping.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use reqwest::Method;

use crate::{ClientOptions, Failure, RequestKey};

/// Bounded retry policy for safe verbs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            base_delay: Duration::from_millis(options.retry_delay_ms),
            retryable_statuses: options.retryable_statuses.clone(),
        }
    }

    /// Only GET, HEAD and OPTIONS are ever resent.
    pub fn is_safe_method(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    /// Decides whether `failure` of a `method` request may be retried.
    ///
    /// Timeouts and setup failures are never retried.
    pub fn is_eligible(&self, method: &Method, failure: &Failure) -> bool {
        if !Self::is_safe_method(method) {
            return false;
        }
        match failure {
            Failure::Response { status, .. } => self.retryable_statuses.contains(status),
            Failure::NoResponse { timed_out, .. } => !timed_out,
            Failure::Setup { .. } | Failure::Decode { .. } => false,
        }
    }

    /// Delay before the 1-based `retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }
}

/// Retries attempted so far, per in-flight logical call.
#[derive(Debug, Default)]
pub struct RetryTracker {
    counts: Mutex<HashMap<RequestKey, u32>>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries already recorded for `key`.
    pub fn retries(&self, key: &RequestKey) -> u32 {
        self.lock().get(key).copied().unwrap_or(0)
    }

    /// Records one more retry for `key` and returns the new count.
    pub fn record_retry(&self, key: &RequestKey) -> u32 {
        let mut counts = self.lock();
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Forgets `key`, after success or once the call gives up.
    pub fn clear(&self, key: &RequestKey) {
        self.lock().remove(key);
    }

    /// Number of calls currently tracked.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestKey, u32>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
