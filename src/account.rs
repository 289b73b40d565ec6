//! Account registry
//!
//! Loads credential records, normalizes the legacy flat document
//! layout, resolves per-provider connection defaults, and looks
//! accounts up by id or email.

use crate::error::{Error, Result};
use crate::provider::{self, ProviderDefaults};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Host, port and transport security for one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when `true`, STARTTLS otherwise.
    pub tls: bool,
}

/// One configured mailbox identity with resolved connection
/// parameters. Immutable for the duration of a run.
#[derive(Clone, Serialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub provider: String,
    pub description: Option<String>,
    pub imap: Endpoint,
    pub smtp: Endpoint,
    /// Skip certificate verification (self-signed local bridges).
    pub accept_invalid_certs: bool,
    #[serde(skip)]
    username: String,
    #[serde(skip)]
    password: String,
}

impl Account {
    /// Login name; defaults to the email address.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    fn matches(&self, identifier: &str) -> bool {
        self.id.eq_ignore_ascii_case(identifier) || self.email.eq_ignore_ascii_case(identifier)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("provider", &self.provider)
            .field("imap", &self.imap)
            .field("smtp", &self.smtp)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// A single credential record as stored in the credential document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialRecord {
    pub email: String,
    pub password: String,
    pub provider: String,
    pub description: Option<String>,
    pub username: Option<String>,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub imap_tls: Option<bool>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_secure: Option<bool>,
    pub accept_invalid_certs: Option<bool>,
}

impl CredentialRecord {
    /// Resolve this record into an [`Account`], letting explicit
    /// fields override the provider defaults one by one.
    #[must_use]
    pub fn resolve(self, id: &str) -> Account {
        let defaults: ProviderDefaults = provider::defaults_for(&self.provider);

        let imap_port = self.imap_port.unwrap_or(defaults.imap_port);
        let imap_tls = self.imap_tls.unwrap_or_else(|| {
            self.imap_port
                .map_or(defaults.imap_tls, |port| port == 993)
        });

        let smtp_port = self.smtp_port.unwrap_or(defaults.smtp_port);
        let smtp_secure = self.smtp_secure.unwrap_or_else(|| {
            self.smtp_port
                .map_or(defaults.smtp_secure, |port| port == 465)
        });

        Account {
            id: id.to_string(),
            username: self.username.unwrap_or_else(|| self.email.clone()),
            email: self.email,
            provider: provider::normalize(&self.provider),
            description: self.description,
            imap: Endpoint {
                host: self
                    .imap_host
                    .unwrap_or_else(|| defaults.imap_host.to_string()),
                port: imap_port,
                tls: imap_tls,
            },
            smtp: Endpoint {
                host: self
                    .smtp_host
                    .unwrap_or_else(|| defaults.smtp_host.to_string()),
                port: smtp_port,
                tls: smtp_secure,
            },
            accept_invalid_certs: self
                .accept_invalid_certs
                .unwrap_or(defaults.accept_invalid_certs),
            password: self.password,
        }
    }
}

/// All configured accounts plus the optional default pointer.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
    default_account: Option<String>,
}

impl AccountRegistry {
    /// Build a registry from already-resolved accounts.
    #[must_use]
    pub const fn new(accounts: Vec<Account>, default_account: Option<String>) -> Self {
        Self {
            accounts,
            default_account,
        }
    }

    /// Parse a credential document.
    ///
    /// Accepts the versioned layout
    /// (`{"version": 2, "default_account": .., "accounts": {..}}`) and
    /// the legacy flat `{id: record}` map, which is normalized here.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON or a record
    /// cannot be decoded.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut root) = value else {
            return Err(Error::Config(
                "credential document must be a JSON object".into(),
            ));
        };

        let versioned = root.get("accounts").is_some_and(Value::is_object);
        let (default_account, records) = if versioned {
            let default_account = root
                .get("default_account")
                .and_then(Value::as_str)
                .map(str::to_string);
            let accounts = root.remove("accounts").unwrap_or_default();
            let records: BTreeMap<String, CredentialRecord> = serde_json::from_value(accounts)?;
            (default_account, records)
        } else {
            debug!("Normalizing legacy credential document");
            let mut default_account = None;
            let mut records = BTreeMap::new();
            for (key, entry) in root {
                match entry {
                    Value::Object(_) => {
                        records.insert(key, serde_json::from_value(entry)?);
                    }
                    Value::String(id) if key == "default_account" || key == "default" => {
                        default_account = Some(id);
                    }
                    _ => warn!("Ignoring non-account entry '{}' in credentials", key),
                }
            }
            (default_account, records)
        };

        let accounts = records
            .into_iter()
            .map(|(id, record)| record.resolve(&id))
            .collect();
        Ok(Self::new(accounts, default_account))
    }

    /// Load the credential document at `path`.
    ///
    /// A missing file yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No credential file at {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Replace the default-account pointer (e.g. from the
    /// environment).
    #[must_use]
    pub fn with_default(mut self, default_account: Option<String>) -> Self {
        if default_account.is_some() {
            self.default_account = default_account;
        }
        self
    }

    /// All accounts, in id order.
    #[must_use]
    pub fn list_accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// All accounts with resolved connection parameters, for fan-out.
    #[must_use]
    pub fn all_accounts_resolved(&self) -> Vec<&Account> {
        self.accounts.iter().collect()
    }

    /// The configured default account, if it exists.
    #[must_use]
    pub fn default_account(&self) -> Option<&Account> {
        let id = self.default_account.as_deref()?;
        self.accounts.iter().find(|a| a.matches(id))
    }

    /// Resolve an account case-insensitively by id or email. An empty
    /// or missing identifier falls back to the default account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if nothing matches.
    pub fn get_account_by_id_or_email(&self, identifier: Option<&str>) -> Result<&Account> {
        match identifier.map(str::trim).filter(|s| !s.is_empty()) {
            Some(identifier) => self
                .accounts
                .iter()
                .find(|a| a.matches(identifier))
                .ok_or_else(|| Error::AccountNotFound(identifier.to_string())),
            None => self
                .default_account()
                .ok_or_else(|| Error::AccountNotFound("no account given and no default".into())),
        }
    }

    /// Accounts targeted by a request: every account for `None` or
    /// `"all"`, otherwise the single matching account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if a named account does not
    /// exist.
    pub fn resolve_targets(&self, identifier: Option<&str>) -> Result<Vec<&Account>> {
        match identifier.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(self.all_accounts_resolved()),
            Some(all) if all.eq_ignore_ascii_case("all") => Ok(self.all_accounts_resolved()),
            Some(identifier) => Ok(vec![self.get_account_by_id_or_email(Some(identifier))?]),
        }
    }
}
