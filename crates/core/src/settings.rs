//! Settings accessors for the server base address and bearer credential.
//!
//! Components read settings through the [`BaseAddressProvider`] and
//! [`CredentialProvider`] traits so that the storage backend can be
//! swapped without touching the WebSocket or REST code. Both traits are
//! async because a persisted backend may need I/O to read a value.
//!
//! [`SettingsStore`] is the in-memory implementation used by the watch
//! binary and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Supplies the current server base address (e.g. `http://host:8080`).
#[async_trait]
pub trait BaseAddressProvider: Send + Sync {
    async fn current_base_address(&self) -> String;
}

/// Supplies the current bearer credential, if the user is signed in.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn current_credential(&self) -> Option<String>;
}

/// Mutable in-memory settings.
///
/// The base address falls back to the configured default until one is
/// stored. The credential is absent until [`save_credential`](Self::save_credential)
/// is called.
pub struct SettingsStore {
    default_base_address: String,
    base_address: RwLock<Option<String>>,
    credential: RwLock<Option<String>>,
}

impl SettingsStore {
    pub fn new(default_base_address: impl Into<String>) -> Self {
        Self {
            default_base_address: default_base_address.into(),
            base_address: RwLock::new(None),
            credential: RwLock::new(None),
        }
    }

    /// Convenience for sharing one store as both providers.
    pub fn shared(default_base_address: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(default_base_address))
    }

    pub async fn update_base_address(&self, value: impl Into<String>) {
        *self.base_address.write().await = Some(value.into());
    }

    pub async fn save_credential(&self, token: impl Into<String>) {
        *self.credential.write().await = Some(token.into());
    }

    /// Forget the stored credential, e.g. after the server rejected it.
    pub async fn clear_credential(&self) {
        *self.credential.write().await = None;
    }
}

#[async_trait]
impl BaseAddressProvider for SettingsStore {
    async fn current_base_address(&self) -> String {
        self.base_address
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.default_base_address.clone())
    }
}

#[async_trait]
impl CredentialProvider for SettingsStore {
    async fn current_credential(&self) -> Option<String> {
        self.credential.read().await.clone()
    }
}
