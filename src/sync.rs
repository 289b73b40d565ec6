//! Sync orchestrator
//!
//! Pulls the primary folder of each account through a [`MailBackend`]
//! and reconciles it into the [`CacheStore`], then rewrites the
//! [`SyncHealth`] record.

use crate::account::{Account, AccountRegistry};
use crate::backend::{MailBackend, PageRequest};
use crate::config::Settings;
use crate::error::Result;
use crate::health::{AccountHealth, HealthSummary, SyncHealth};
use crate::store::CacheStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Which accounts to sync and how.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// Account id or email; `None` or `"all"` syncs every account.
    pub account: Option<String>,
    /// Also prune cached messages that no longer exist remotely.
    pub full: bool,
}

/// Outcome of syncing one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSyncOutcome {
    pub account_id: String,
    pub email: String,
    pub success: bool,
    pub folder: String,
    pub messages_synced: usize,
    pub total_messages: u32,
    pub unread_messages: u32,
    pub pruned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub full: bool,
    pub synced_at: DateTime<Utc>,
    pub accounts: Vec<AccountSyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    fn failed(full: bool, error: String) -> Self {
        Self {
            success: false,
            full,
            synced_at: Utc::now(),
            accounts: Vec::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub success: bool,
    #[serde(flatten)]
    pub summary: HealthSummary,
    pub last_incremental_sync: Option<DateTime<Utc>>,
    pub last_full_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub success: bool,
    pub last_incremental_sync: Option<DateTime<Utc>>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub accounts: BTreeMap<String, AccountHealth>,
    pub cache_path: String,
    pub cache_size_bytes: u64,
}

/// Drives cache reconciliation for the configured accounts.
pub struct SyncOrchestrator<'a, B> {
    registry: &'a AccountRegistry,
    backend: &'a B,
    settings: &'a Settings,
}

impl<'a, B: MailBackend> SyncOrchestrator<'a, B> {
    #[must_use]
    pub const fn new(registry: &'a AccountRegistry, backend: &'a B, settings: &'a Settings) -> Self {
        Self {
            registry,
            backend,
            settings,
        }
    }

    /// Sync the targeted accounts one after another. A failing account
    /// is recorded and the pass continues; `success` is true only if
    /// every account synced.
    pub async fn force_sync(&self, request: &SyncRequest) -> SyncReport {
        let targets = match self.registry.resolve_targets(request.account.as_deref()) {
            Ok(targets) => targets,
            Err(e) => return SyncReport::failed(request.full, e.to_string()),
        };
        let store = match CacheStore::open(&self.settings.cache_path()) {
            Ok(store) => store,
            Err(e) => return SyncReport::failed(request.full, e.to_string()),
        };
        let health_path = self.settings.health_path();
        let mut health = SyncHealth::load(&health_path);

        info!(
            accounts = targets.len(),
            full = request.full,
            "Starting sync pass"
        );

        let mut outcomes = Vec::with_capacity(targets.len());
        for account in targets {
            let outcome = match self.sync_account(&store, account, request.full).await {
                Ok(outcome) => {
                    health.record_ok(&account.id, outcome.total_messages, Utc::now());
                    outcome
                }
                Err(e) => {
                    warn!(account = %account.email, "Sync failed: {}", e);
                    health.record_error(&account.id, e.to_string(), Utc::now());
                    AccountSyncOutcome {
                        account_id: account.id.clone(),
                        email: account.email.clone(),
                        success: false,
                        folder: self.settings.sync_folder.clone(),
                        messages_synced: 0,
                        total_messages: 0,
                        unread_messages: 0,
                        pruned: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let synced_at = Utc::now();
        health.record_pass(request.full, synced_at);
        let save_error = health.save(&health_path).err().map(|e| {
            warn!("Failed to write sync status: {}", e);
            format!("failed to write sync status: {e}")
        });

        let success = save_error.is_none() && outcomes.iter().all(|o| o.success);
        info!(success, "Sync pass finished");
        SyncReport {
            success,
            full: request.full,
            synced_at,
            accounts: outcomes,
            error: save_error,
        }
    }

    async fn sync_account(
        &self,
        store: &CacheStore,
        account: &Account,
        full: bool,
    ) -> Result<AccountSyncOutcome> {
        let folder = self.settings.sync_folder.as_str();
        let page = self
            .backend
            .fetch_page(
                account,
                folder,
                PageRequest {
                    unread_only: false,
                    limit: self.settings.sync_page_size,
                    offset: 0,
                },
            )
            .await?;

        let now = Utc::now();
        store.upsert_account(account, page.counts.total, now)?;
        let folder_id = store.upsert_folder(&account.id, folder, page.counts, now)?;
        let messages_synced = store.upsert_messages(&account.id, folder_id, &page.messages)?;

        let pruned = if full {
            let live = self.backend.list_uids(account, folder).await?;
            store.prune_messages(&account.id, folder_id, &live)?
        } else {
            0
        };

        info!(
            account = %account.email,
            folder,
            messages_synced,
            pruned,
            "Account synced"
        );
        Ok(AccountSyncOutcome {
            account_id: account.id.clone(),
            email: account.email.clone(),
            success: true,
            folder: folder.to_string(),
            messages_synced,
            total_messages: page.counts.total,
            unread_messages: page.counts.unseen,
            pruned,
            error: None,
        })
    }

    /// First-time bootstrap: sync every account.
    pub async fn init(&self) -> SyncReport {
        self.force_sync(&SyncRequest::default()).await
    }

    /// Aggregate account health from the last recorded outcomes.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let health = SyncHealth::load(&self.settings.health_path());
        HealthReport {
            success: true,
            summary: health.summary(),
            last_incremental_sync: health.last_incremental_sync,
            last_full_sync: health.last_full_sync,
        }
    }

    /// Per-account sync state, global timestamps and cache size.
    #[must_use]
    pub fn status(&self) -> StatusReport {
        let health = SyncHealth::load(&self.settings.health_path());
        let cache_path = self.settings.cache_path();
        StatusReport {
            success: true,
            last_incremental_sync: health.last_incremental_sync,
            last_full_sync: health.last_full_sync,
            accounts: health.accounts,
            cache_size_bytes: crate::store::file_size(&cache_path),
            cache_path: cache_path.display().to_string(),
        }
    }

    /// Run an incremental pass every `period`, starting immediately.
    /// Stops after `rounds` passes, or never when `None`.
    pub async fn run_every(
        &self,
        period: Duration,
        rounds: Option<usize>,
        mut on_pass: impl FnMut(&SyncReport),
    ) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut done = 0;
        while rounds.is_none_or(|rounds| done < rounds) {
            interval.tick().await;
            let report = self.force_sync(&SyncRequest::default()).await;
            on_pass(&report);
            done += 1;
        }
    }
}
