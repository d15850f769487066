//! Auth token storage.
//!
//! The token lives in exactly one of two areas: [`StorageArea::Durable`]
//! survives restarts ("remember me"), [`StorageArea::Session`] does not.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use crate::StorageError;

/// Key under which the token is stored in each area.
pub const TOKEN_KEY: &str = "auth_token";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageArea {
    Durable,
    Session,
}

impl StorageArea {
    fn index(self) -> usize {
        match self {
            Self::Durable => 0,
            Self::Session => 1,
        }
    }
}

/// Backend holding the auth token.
pub trait CredentialStore: Send + Sync {
    fn get(&self, area: StorageArea) -> Result<Option<String>, StorageError>;
    fn set(&self, area: StorageArea, token: &str) -> Result<(), StorageError>;
    fn remove(&self, area: StorageArea) -> Result<(), StorageError>;
}

/// In-process store for tests and non-browser hosts.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slots: Mutex<[Option<String>; 2]>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read fail, as a disabled storage area would.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write and removal fail, as a full storage area would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Reads a slot directly, bypassing simulated failures.
    pub fn peek(&self, area: StorageArea) -> Option<String> {
        self.slots()[area.index()].clone()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, [Option<String>; 2]> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write("quota exceeded".to_owned()));
        }
        Ok(())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, area: StorageArea) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read("storage disabled".to_owned()));
        }
        Ok(self.peek(area))
    }

    fn set(&self, area: StorageArea, token: &str) -> Result<(), StorageError> {
        self.check_write()?;
        self.slots()[area.index()] = Some(token.to_owned());
        Ok(())
    }

    fn remove(&self, area: StorageArea) -> Result<(), StorageError> {
        self.check_write()?;
        self.slots()[area.index()] = None;
        Ok(())
    }
}

/// `localStorage` / `sessionStorage` backed store.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserCredentialStore;

#[cfg(target_arch = "wasm32")]
impl BrowserCredentialStore {
    fn storage(area: StorageArea) -> Result<web_sys::Storage, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_owned()))?;
        let storage = match area {
            StorageArea::Durable => window.local_storage(),
            StorageArea::Session => window.session_storage(),
        };
        storage
            .map_err(|err| StorageError::Unavailable(format!("{err:?}")))?
            .ok_or_else(|| StorageError::Unavailable(format!("{area:?} storage disabled")))
    }
}

#[cfg(target_arch = "wasm32")]
impl CredentialStore for BrowserCredentialStore {
    fn get(&self, area: StorageArea) -> Result<Option<String>, StorageError> {
        Self::storage(area)?
            .get_item(TOKEN_KEY)
            .map_err(|err| StorageError::Read(format!("{err:?}")))
    }

    fn set(&self, area: StorageArea, token: &str) -> Result<(), StorageError> {
        Self::storage(area)?
            .set_item(TOKEN_KEY, token)
            .map_err(|err| StorageError::Write(format!("{err:?}")))
    }

    fn remove(&self, area: StorageArea) -> Result<(), StorageError> {
        Self::storage(area)?
            .remove_item(TOKEN_KEY)
            .map_err(|err| StorageError::Write(format!("{err:?}")))
    }
}

/// Default store for the current target.
pub(crate) fn default_store() -> Arc<dyn CredentialStore> {
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(BrowserCredentialStore)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(MemoryCredentialStore::new())
    }
}

/// Token operations that never fail: storage errors are logged and dropped.
#[derive(Clone)]
pub(crate) struct AuthTokens {
    store: Arc<dyn CredentialStore>,
}

impl AuthTokens {
    pub(crate) fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Durable area first, then session.
    pub(crate) fn read(&self) -> Option<String> {
        [StorageArea::Durable, StorageArea::Session]
            .into_iter()
            .find_map(|area| match self.store.get(area) {
                Ok(token) => token.filter(|token| !token.is_empty()),
                Err(err) => {
                    tracing::warn!(?area, error = %err, "failed to read auth token");
                    None
                }
            })
    }

    pub(crate) fn write(&self, token: &str, remember: bool) {
        let (target, other) = if remember {
            (StorageArea::Durable, StorageArea::Session)
        } else {
            (StorageArea::Session, StorageArea::Durable)
        };
        self.remove(other);
        if let Err(err) = self.store.set(target, token) {
            tracing::warn!(area = ?target, error = %err, "failed to store auth token");
        }
    }

    pub(crate) fn clear(&self) {
        self.remove(StorageArea::Durable);
        self.remove(StorageArea::Session);
    }

    fn remove(&self, area: StorageArea) {
        if let Err(err) = self.store.remove(area) {
            tracing::warn!(?area, error = %err, "failed to remove auth token");
        }
    }
}
