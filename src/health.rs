//! Sync health record
//!
//! Process-wide sync state kept beside the cache as a JSON document.
//! It is read once (or defaulted) and rewritten whole after every sync
//! pass through a temporary file and a rename, so a crash mid-write
//! never leaves a truncated record. Concurrent writers: last one wins.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of an account's most recent sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Ok,
    Error,
    #[default]
    Pending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountHealth {
    pub last_sync: Option<DateTime<Utc>>,
    pub total_messages: u32,
    pub status: SyncState,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncHealth {
    pub last_incremental_sync: Option<DateTime<Utc>>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub accounts: BTreeMap<String, AccountHealth>,
}

/// Aggregate view over [`SyncHealth`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub total_accounts: usize,
    pub healthy_accounts: usize,
    pub warning_accounts: usize,
    /// Healthy accounts as a percentage of all accounts.
    pub average_health_score: f64,
}

impl SyncHealth {
    /// Read the record at `path`, or start from an empty one if the
    /// file is missing or unreadable.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring unreadable sync status {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => {
                debug!("No sync status at {}", path.display());
                Self::default()
            }
        }
    }

    /// Rewrite the whole record atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, temporary file or rename
    /// fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Record a successful sync of one account.
    pub fn record_ok(&mut self, account_id: &str, total_messages: u32, at: DateTime<Utc>) {
        self.accounts.insert(
            account_id.to_string(),
            AccountHealth {
                last_sync: Some(at),
                total_messages,
                status: SyncState::Ok,
                error: None,
            },
        );
    }

    /// Record a failed sync, keeping the last known message count.
    pub fn record_error(&mut self, account_id: &str, error: String, at: DateTime<Utc>) {
        let entry = self.accounts.entry(account_id.to_string()).or_default();
        entry.last_sync = Some(at);
        entry.status = SyncState::Error;
        entry.error = Some(error);
    }

    /// Stamp the global timestamp for an incremental or full pass.
    pub const fn record_pass(&mut self, full: bool, at: DateTime<Utc>) {
        if full {
            self.last_full_sync = Some(at);
        } else {
            self.last_incremental_sync = Some(at);
        }
    }

    #[must_use]
    pub fn summary(&self) -> HealthSummary {
        let total = self.accounts.len();
        let healthy = self
            .accounts
            .values()
            .filter(|a| a.status == SyncState::Ok)
            .count();
        #[allow(clippy::cast_precision_loss)]
        let score = if total == 0 {
            0.0
        } else {
            (healthy as f64 / total as f64 * 1000.0).round() / 10.0
        };
        HealthSummary {
            total_accounts: total,
            healthy_accounts: healthy,
            warning_accounts: total - healthy,
            average_health_score: score,
        }
    }
}
