//! Runtime settings

use crate::account::AccountRegistry;
use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "unimail";

/// Paths and tunables for one process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub accounts_file: PathBuf,
    pub data_dir: PathBuf,
    pub default_account: Option<String>,
    /// Page size used by the sync orchestrator.
    pub sync_page_size: usize,
    /// Folder synced into the cache.
    pub sync_folder: String,
    /// Preferred trash folder name for non-permanent deletes.
    pub trash_folder: String,
}

impl Settings {
    /// Settings rooted at `data_dir`, everything else defaulted.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            accounts_file: data_dir.join("accounts.json"),
            data_dir,
            default_account: None,
            sync_page_size: 500,
            sync_folder: "INBOX".to_string(),
            trash_folder: "Trash".to_string(),
        }
    }

    /// Load settings from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `UNIMAIL_ACCOUNTS_FILE` (default: `<config dir>/unimail/accounts.json`)
    /// - `UNIMAIL_DATA_DIR` (default: `<data dir>/unimail`)
    /// - `UNIMAIL_DEFAULT_ACCOUNT`
    /// - `UNIMAIL_SYNC_PAGE_SIZE` (default: `500`)
    /// - `UNIMAIL_SYNC_FOLDER` (default: `INBOX`)
    /// - `UNIMAIL_TRASH_FOLDER` (default: `Trash`)
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse or no
    /// default directory can be determined.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir = match env::var("UNIMAIL_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_local_dir()
                .ok_or_else(|| Error::Config("Cannot determine data directory".into()))?
                .join(APP_DIR),
        };
        let accounts_file = match env::var("UNIMAIL_ACCOUNTS_FILE") {
            Ok(file) => PathBuf::from(file),
            Err(_) => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".into()))?
                .join(APP_DIR)
                .join("accounts.json"),
        };

        let mut settings = Self::with_data_dir(data_dir);
        settings.accounts_file = accounts_file;
        settings.default_account = env::var("UNIMAIL_DEFAULT_ACCOUNT").ok();
        if let Ok(size) = env::var("UNIMAIL_SYNC_PAGE_SIZE") {
            settings.sync_page_size = size
                .parse()
                .map_err(|e| Error::Config(format!("Invalid UNIMAIL_SYNC_PAGE_SIZE: {e}")))?;
        }
        if let Ok(folder) = env::var("UNIMAIL_SYNC_FOLDER") {
            settings.sync_folder = folder;
        }
        if let Ok(folder) = env::var("UNIMAIL_TRASH_FOLDER") {
            settings.trash_folder = folder;
        }
        Ok(settings)
    }

    /// Path of the SQLite cache file.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.db")
    }

    /// Path of the sync health record.
    #[must_use]
    pub fn health_path(&self) -> PathBuf {
        self.data_dir.join("sync_status.json")
    }

    /// Load the account registry these settings point at.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential document is unreadable.
    pub fn load_accounts(&self) -> Result<AccountRegistry> {
        Ok(AccountRegistry::load(Path::new(&self.accounts_file))?
            .with_default(self.default_account.clone()))
    }
}
