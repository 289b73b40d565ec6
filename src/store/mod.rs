//! Sync cache store
//!
//! A SQLite database holding the cached state of every account:
//! accounts, folders, message metadata, lazily fetched content and
//! attachment records. SQLite's own file locking and incremental
//! writes replace any whole-file load/flush, so a reader never sees a
//! half-written store.

mod content;
mod messages;
mod schema;

pub use content::{CachedAttachment, CachedContent};
pub use messages::{CachedFolder, CachedMessage, MessageQuery, QueryPage};

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Handle on the on-disk cache.
#[derive(Debug)]
pub struct CacheStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl CacheStore {
    /// Open the cache at `path`, creating the file, its directory and
    /// the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        configure(&conn)?;
        schema::initialize(&conn)?;
        info!("Opened cache at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Open an already initialized cache for reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheUnavailable`] if the file is missing or is
    /// not a cache database.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::CacheUnavailable(format!(
                "no cache at {}",
                path.display()
            )));
        }
        let unavailable = |e: rusqlite::Error| Error::CacheUnavailable(e.to_string());
        let conn = Connection::open(path).map_err(unavailable)?;
        configure(&conn).map_err(|e| Error::CacheUnavailable(e.to_string()))?;
        let version = schema::version(&conn).map_err(|e| match e {
            Error::Database(e) => unavailable(e),
            other => other,
        })?;
        if version > schema::SCHEMA_VERSION {
            return Err(Error::CacheUnavailable(format!(
                "cache schema version {version} is newer than supported"
            )));
        }
        debug!("Opened existing cache at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the database file in bytes (0 if it cannot be read).
    #[must_use]
    pub fn file_size(&self) -> u64 {
        file_size(&self.path)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Size of the file at `path`, or 0 if it does not exist.
#[must_use]
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(())
}
