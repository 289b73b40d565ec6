//! Multi-account mail access library
//!
//! Reads and mutates mailboxes on any number of IMAP/SMTP accounts
//! (Gmail, Outlook, Proton Bridge and friends) through one facade,
//! [`MailService`]. Listings can be served from a local SQLite cache
//! that the [`SyncOrchestrator`] keeps reconciled with each account's
//! primary folder.
//!
//! Live traffic goes through the [`MailBackend`] trait, implemented
//! over IMAP and SMTP by [`MailClient`].

mod account;
mod backend;
mod client;
mod config;
mod connection;
mod error;
mod flag;
mod folder;
mod health;
mod parse;
mod provider;
pub mod service;
mod smtp;
pub mod store;
mod sync;

pub use account::{Account, AccountRegistry, CredentialRecord, Endpoint};
pub use backend::{
    AttachmentData, FolderCounts, MailBackend, MessageDetail, MessageSummary, OutgoingAttachment,
    OutgoingMessage, PageRequest, RemotePage, SendReceipt,
};
pub use client::MailClient;
pub use config::Settings;
pub use error::{Error, Result};
pub use flag::{Flag, FlagAction, MarkAs};
pub use folder::{RemoteFolder, SpecialUse, pick_trash};
pub use health::{AccountHealth, HealthSummary, SyncHealth, SyncState};
pub use provider::{ProviderDefaults, defaults_for};
pub use service::MailService;
pub use store::CacheStore;
pub use sync::{
    AccountSyncOutcome, HealthReport, StatusReport, SyncOrchestrator, SyncReport, SyncRequest,
};
