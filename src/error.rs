//! Error types for unimail

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Network or protocol failure while talking to one account.
    #[error("Transport error for {account}: {message}")]
    Transport { account: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The cache store is missing or unreadable; callers fall back to
    /// the live path.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("{failed} of {total} operations failed")]
    PartialFailure { failed: usize, total: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Tag any lower-level failure with the account it happened on.
    ///
    /// Errors that already carry an account, and lookup/argument
    /// errors, pass through unchanged.
    #[must_use]
    pub fn for_account(self, email: &str) -> Self {
        match self {
            Self::Transport { .. } | Self::AccountNotFound(_) | Self::InvalidArgument(_) => self,
            other => Self::Transport {
                account: email.to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
