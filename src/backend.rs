//! The protocol adapter seam
//!
//! [`MailBackend`] is the typed, per-message interface the rest of the
//! crate uses to reach live mailboxes. [`crate::MailClient`] implements
//! it over IMAP and SMTP; tests substitute an in-memory backend.

use crate::account::Account;
use crate::error::Result;
use crate::flag::{Flag, FlagAction};
use crate::folder::RemoteFolder;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata snapshot of one remote message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub uid: u32,
    pub message_id: Option<String>,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    /// Sent date from the `Date:` header, falling back to the
    /// server's internal date.
    pub date: Option<DateTime<Utc>>,
    pub unread: bool,
    pub flagged: bool,
    pub deleted: bool,
    pub has_attachments: bool,
    pub size: u32,
}

/// One attachment of a fully fetched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentData {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// A fully fetched message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub summary: MessageSummary,
    pub cc: Vec<String>,
    pub reply_to: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<AttachmentData>,
    #[serde(skip)]
    pub raw_headers: String,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

/// Which slice of a folder to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub unread_only: bool,
    pub limit: usize,
    pub offset: usize,
}

/// Folder message counts at the time of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderCounts {
    pub total: u32,
    pub unseen: u32,
}

/// A page of messages, most recent UID first.
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub messages: Vec<MessageSummary>,
    pub counts: FolderCounts,
}

/// An outbound attachment.
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A message to submit over SMTP.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    /// Extra headers as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Live mailbox operations for one account at a time.
///
/// Implementations never retry internally; every failure surfaces as
/// [`crate::Error::Transport`] tagged with the account email.
#[allow(async_fn_in_trait)]
pub trait MailBackend {
    /// Open `folder` and report its total/unseen counts.
    async fn test_connection(&self, account: &Account, folder: &str) -> Result<FolderCounts>;

    /// List every folder with its special-use attribute.
    async fn list_folders(&self, account: &Account) -> Result<Vec<RemoteFolder>>;

    /// Fetch `[offset, offset+limit)` of the folder's UIDs, sorted
    /// descending.
    async fn fetch_page(
        &self,
        account: &Account,
        folder: &str,
        page: PageRequest,
    ) -> Result<RemotePage>;

    /// Every UID currently in the folder.
    async fn list_uids(&self, account: &Account, folder: &str) -> Result<Vec<u32>>;

    /// Full single-message fetch including raw source.
    async fn fetch_one(&self, account: &Account, folder: &str, uid: u32) -> Result<MessageDetail>;

    /// Add or remove one flag. Idempotent.
    async fn mutate_flags(
        &self,
        account: &Account,
        folder: &str,
        uid: u32,
        flag: Flag,
        action: FlagAction,
    ) -> Result<()>;

    /// Discover the trash folder name.
    async fn resolve_trash(&self, account: &Account, preferred: &str) -> Result<String>;

    /// Relocate a message to another folder.
    async fn move_message(
        &self,
        account: &Account,
        folder: &str,
        uid: u32,
        destination: &str,
    ) -> Result<()>;

    /// Permanently remove a message, or move it to `trash` when not
    /// permanent.
    async fn move_or_delete(
        &self,
        account: &Account,
        folder: &str,
        uid: u32,
        permanent: bool,
        trash: &str,
    ) -> Result<()>;

    /// Submit a message over SMTP.
    async fn send(&self, account: &Account, message: &OutgoingMessage) -> Result<SendReceipt>;
}
