//! Unified access facade
//!
//! [`MailService`] is the single entry point for the command layer.
//! It resolves accounts, chooses between the cache and live fetches,
//! merges multi-account results and applies mutations id by id. Every
//! operation returns a serializable response and never an `Err`.

mod compose;
mod read;
mod types;
mod write;

pub use compose::{forward_subject, reply_subject};
pub use types::*;

use crate::account::{Account, AccountRegistry};
use crate::backend::MailBackend;
use crate::client::MailClient;
use crate::config::Settings;
use crate::error::Result;
use crate::store::CacheStore;
use crate::sync::{HealthReport, StatusReport, SyncOrchestrator, SyncReport, SyncRequest};
use tracing::debug;

pub struct MailService<B> {
    registry: AccountRegistry,
    backend: B,
    settings: Settings,
}

impl MailService<MailClient> {
    /// A service over live IMAP/SMTP configured from `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential document cannot be loaded.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let registry = settings.load_accounts()?;
        Ok(Self::new(registry, MailClient::new(), settings))
    }
}

impl<B: MailBackend> MailService<B> {
    #[must_use]
    pub const fn new(registry: AccountRegistry, backend: B, settings: Settings) -> Self {
        Self {
            registry,
            backend,
            settings,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The orchestrator over this service's accounts and backend.
    #[must_use]
    pub const fn sync(&self) -> SyncOrchestrator<'_, B> {
        SyncOrchestrator::new(&self.registry, &self.backend, &self.settings)
    }

    pub async fn force_sync(&self, account: Option<String>, full: bool) -> SyncReport {
        self.sync().force_sync(&SyncRequest { account, full }).await
    }

    pub async fn init(&self) -> SyncReport {
        self.sync().init().await
    }

    #[must_use]
    pub fn health(&self) -> HealthReport {
        self.sync().health()
    }

    #[must_use]
    pub fn status(&self) -> StatusReport {
        self.sync().status()
    }

    /// Configured accounts with their resolved endpoints.
    #[must_use]
    pub fn list_accounts(&self) -> AccountsResponse {
        let default_id = self.registry.default_account().map(|a| a.id.as_str());
        AccountsResponse {
            success: true,
            error: None,
            accounts: self
                .registry
                .list_accounts()
                .iter()
                .map(|a| AccountInfo {
                    id: a.id.clone(),
                    email: a.email.clone(),
                    provider: a.provider.clone(),
                    description: a.description.clone(),
                    imap_host: a.imap.host.clone(),
                    imap_port: a.imap.port,
                    smtp_host: a.smtp.host.clone(),
                    smtp_port: a.smtp.port,
                    is_default: Some(a.id.as_str()) == default_id,
                })
                .collect(),
        }
    }

    fn account(&self, identifier: Option<&str>) -> Result<&Account> {
        self.registry.get_account_by_id_or_email(identifier)
    }

    /// The cache, if one has been created. Fetched content is stored
    /// through it; a missing cache is not an error.
    fn cache(&self) -> Option<CacheStore> {
        match CacheStore::open_existing(&self.settings.cache_path()) {
            Ok(store) => Some(store),
            Err(e) => {
                debug!("Cache not used: {}", e);
                None
            }
        }
    }
}
