//! Page navigation used by the 401 handler.

use std::sync::{Arc, Mutex, PoisonError};

/// Path of the login page.
pub const LOGIN_PATH: &str = "/login";

pub trait Navigator: Send + Sync {
    /// Path of the page currently shown.
    fn current_path(&self) -> String;
    /// Full-page navigation to `path`.
    fn redirect(&self, path: &str);
}

/// Records navigation instead of performing it.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: Mutex<NavState>,
}

#[derive(Debug)]
struct NavState {
    current: String,
    redirects: Vec<String>,
}

impl MemoryNavigator {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(NavState {
                current: current.into(),
                redirects: Vec::new(),
            }),
        }
    }

    /// Every path passed to [`Navigator::redirect`], oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.lock().redirects.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NavState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.lock().current.clone()
    }

    fn redirect(&self, path: &str) {
        let mut state = self.lock();
        state.current = path.to_owned();
        state.redirects.push(path.to_owned());
    }
}

/// `window.location` backed navigator.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserNavigator;

#[cfg(target_arch = "wasm32")]
impl Navigator for BrowserNavigator {
    fn current_path(&self) -> String {
        web_sys::window()
            .and_then(|window| window.location().pathname().ok())
            .unwrap_or_default()
    }

    fn redirect(&self, path: &str) {
        let Some(window) = web_sys::window() else {
            tracing::warn!(path, "no window to redirect");
            return;
        };
        if let Err(err) = window.location().set_href(path) {
            tracing::warn!(path, error = ?err, "redirect failed");
        }
    }
}

pub(crate) fn default_navigator() -> Arc<dyn Navigator> {
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(BrowserNavigator)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(MemoryNavigator::default())
    }
}
