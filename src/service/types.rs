//! Facade requests and responses
//!
//! Every response carries `success` and, on failure, `error`. They are
//! serialized as-is by the command layer.

use crate::account::Account;
use crate::backend::{MessageDetail, MessageSummary, OutgoingAttachment};
use crate::error::Error;
use crate::flag::MarkAs;
use crate::folder::RemoteFolder;
use crate::store::CachedMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_FOLDER: &str = "INBOX";
pub const DEFAULT_LIMIT: usize = 20;

macro_rules! failure {
    ($($ty:ty),* $(,)?) => {$(
        impl $ty {
            /// A `success: false` response carrying `error`.
            #[must_use]
            pub fn failed(error: &Error) -> Self {
                Self {
                    success: false,
                    error: Some(error.to_string()),
                    ..Self::default()
                }
            }
        }
    )*};
}

failure!(
    ListResponse,
    SearchResponse,
    ShowResponse,
    MarkResponse,
    DeleteResponse,
    MoveResponse,
    FoldersResponse,
    CheckResponse,
    AttachmentsResponse,
    SendResponse,
    AccountsResponse,
);

// -- requests --

#[derive(Debug, Clone)]
pub struct ListRequest {
    /// Account id or email; `None` or `"all"` means every account.
    pub account: Option<String>,
    pub folder: String,
    pub limit: usize,
    pub offset: usize,
    pub unread_only: bool,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Serve from the cache when it has been synced.
    pub use_cache: bool,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            account: None,
            folder: DEFAULT_FOLDER.to_string(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            unread_only: false,
            date_from: None,
            date_to: None,
            use_cache: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub account: Option<String>,
    pub folder: String,
    /// Case-insensitive match against subject, sender and recipients.
    pub query: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub unread_only: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            account: None,
            folder: DEFAULT_FOLDER.to_string(),
            query: None,
            date_from: None,
            date_to: None,
            unread_only: false,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkRequest {
    pub account: Option<String>,
    pub folder: String,
    pub ids: Vec<u32>,
    pub mark_as: MarkAs,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub account: Option<String>,
    pub folder: String,
    pub ids: Vec<u32>,
    /// Expunge instead of moving to the trash folder.
    pub permanent: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub account: Option<String>,
    pub folder: String,
    pub ids: Vec<u32>,
    pub destination: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub account: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub account: Option<String>,
    pub folder: String,
    pub uid: u32,
    pub text: String,
    pub html: Option<String>,
    /// Also address the original recipients.
    pub reply_all: bool,
}

#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub account: Option<String>,
    pub folder: String,
    pub uid: u32,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    /// Note placed above the forwarded message.
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttachmentsRequest {
    pub account: Option<String>,
    pub folder: String,
    pub uid: u32,
    /// Write the attachments into this directory.
    pub save_dir: Option<PathBuf>,
}

// -- shared pieces --

/// A message in a listing, tagged with where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailItem {
    pub account_id: String,
    pub folder: String,
    #[serde(flatten)]
    pub summary: MessageSummary,
}

impl EmailItem {
    #[must_use]
    pub fn new(account: &Account, folder: &str, summary: MessageSummary) -> Self {
        Self {
            account_id: account.id.clone(),
            folder: folder.to_string(),
            summary,
        }
    }
}

impl From<CachedMessage> for EmailItem {
    fn from(message: CachedMessage) -> Self {
        Self {
            account_id: message.account_id,
            folder: message.folder,
            summary: message.summary,
        }
    }
}

/// An account that failed inside a fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFailure {
    pub account_id: String,
    pub error: String,
}

/// Outcome of one id inside a batch mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub id: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    #[must_use]
    pub fn from_result<T>(id: u32, result: &crate::Result<T>) -> Self {
        Self {
            id,
            success: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

// -- responses --

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub emails: Vec<EmailItem>,
    pub total_in_folder: u64,
    pub unread_count: u64,
    pub limit: usize,
    pub offset: usize,
    pub from_cache: bool,
    pub account_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<AccountFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub emails: Vec<EmailItem>,
    pub total_found: usize,
    pub limit: usize,
    pub offset: usize,
    pub query: Option<String>,
    pub account_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<AccountFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShowResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub account_id: String,
    pub folder: String,
    pub unread: bool,
    pub attachment_count: usize,
    pub email: Option<MessageDetail>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MarkResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_mark: Option<usize>,
    pub mark_as: Option<MarkAs>,
    pub ids: Vec<u32>,
    pub marked: usize,
    pub results: Vec<ItemOutcome>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_delete: Option<usize>,
    pub permanent: bool,
    pub ids: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash_folder: Option<String>,
    pub deleted: usize,
    pub results: Vec<ItemOutcome>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MoveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_move: Option<usize>,
    pub destination: String,
    pub ids: Vec<u32>,
    pub moved: usize,
    pub results: Vec<ItemOutcome>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FoldersResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub account_id: String,
    pub folders: Vec<RemoteFolder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountCheck {
    pub account_id: String,
    pub email: String,
    pub success: bool,
    pub total: u32,
    pub unseen: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub accounts: Vec<AccountCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentItem {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AttachmentsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub uid: u32,
    pub attachments: Vec<AttachmentItem>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub account_id: String,
    pub message_id: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub id: String,
    pub email: String,
    pub provider: String,
    pub description: Option<String>,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub accounts: Vec<AccountInfo>,
}
