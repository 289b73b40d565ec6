//! IMAP/SMTP implementation of [`MailBackend`]

use crate::account::Account;
use crate::backend::{
    FolderCounts, MailBackend, MessageDetail, OutgoingMessage, PageRequest, RemotePage,
    SendReceipt,
};
use crate::connection::{self, ImapSession};
use crate::error::{Error, Result};
use crate::flag::{Flag, FlagAction};
use crate::folder::{self, RemoteFolder, SpecialUse};
use crate::parse::{self, FetchMeta, FlagState};
use crate::smtp;
use async_imap::imap_proto::BodyStructure;
use async_imap::types::Fetch;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

const SUMMARY_ITEMS: &str = "(UID FLAGS INTERNALDATE RFC822.SIZE BODYSTRUCTURE BODY.PEEK[HEADER])";
const DETAIL_ITEMS: &str = "(UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[])";

type MailboxLock = Arc<tokio::sync::Mutex<()>>;

/// Live mailbox access over IMAP, with SMTP submission.
///
/// Every operation opens its own session and logs out before
/// returning. Operations on the same (account, folder) pair are
/// serialized.
#[derive(Default)]
pub struct MailClient {
    locks: Mutex<HashMap<(String, String), MailboxLock>>,
}

impl MailClient {
    #[must_use]
    pub fn new() -> Self {
        // lettre's rustls backend resolves the process-wide provider
        rustls::crypto::ring::default_provider()
            .install_default()
            .ok();
        Self::default()
    }

    fn mailbox_lock(&self, account: &Account, folder: &str) -> MailboxLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry((account.id.clone(), folder.to_string()))
            .or_default()
            .clone()
    }

    /// Run `op` on a freshly authenticated session and log out on
    /// every exit path. Dropping the returned future closes the socket.
    async fn with_session<T>(
        &self,
        account: &Account,
        op: impl AsyncFnOnce(&mut ImapSession) -> Result<T>,
    ) -> Result<T> {
        let result = async {
            let mut session = connection::connect(account).await?;
            let result = op(&mut session).await;
            if let Err(e) = session.logout().await {
                debug!(account = %account.email, "Logout failed: {}", e);
            }
            result
        }
        .await;
        result.map_err(|e| e.for_account(&account.email))
    }

    /// Like [`Self::with_session`], with `folder` selected and its
    /// mailbox lock held for the whole operation.
    async fn with_folder<T>(
        &self,
        account: &Account,
        folder: &str,
        op: impl AsyncFnOnce(&mut ImapSession) -> Result<T>,
    ) -> Result<T> {
        let lock = self.mailbox_lock(account, folder);
        let _guard = lock.lock().await;
        self.with_session(account, async |session| {
            connection::select(session, folder).await?;
            op(session).await
        })
        .await
    }
}

async fn search(session: &mut ImapSession, query: &str) -> Result<Vec<u32>> {
    let uids = session
        .uid_search(query)
        .await
        .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;
    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable_by(|a, b| b.cmp(a));
    Ok(uids)
}

async fn fetch_uid(session: &mut ImapSession, uid: u32, items: &str) -> Result<Fetch> {
    let fetches: Vec<Fetch> = session
        .uid_fetch(uid.to_string(), items)
        .await
        .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?
        .try_collect()
        .await
        .map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;

    take_uid(fetches, uid, |f| f.uid)
}

/// The response for `uid`. Servers may volunteer unrelated FETCH
/// responses, so the first one is not good enough.
fn take_uid<T>(mut items: Vec<T>, uid: u32, uid_of: impl Fn(&T) -> Option<u32>) -> Result<T> {
    let index = items
        .iter()
        .position(|item| uid_of(item) == Some(uid))
        .ok_or_else(|| Error::Imap(format!("UID {uid} not found")))?;
    Ok(items.swap_remove(index))
}

async fn store(session: &mut ImapSession, uid: u32, action: FlagAction, flag: Flag) -> Result<()> {
    let query = format!("{} ({})", action.store_item(), flag.as_imap_str());
    let _: Vec<Fetch> = session
        .uid_store(uid.to_string(), &query)
        .await
        .map_err(|e| Error::Imap(format!("Store failed: {e}")))?
        .try_collect()
        .await
        .map_err(|e| Error::Imap(format!("Store error: {e}")))?;
    Ok(())
}

/// Remove messages flagged `\Deleted`, limited to `uid` when the
/// server supports UIDPLUS.
async fn expunge(session: &mut ImapSession, uid: u32, uidplus: bool) -> Result<()> {
    let expunged: Vec<u32> = if uidplus {
        session
            .uid_expunge(uid.to_string())
            .await
            .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?
            .try_collect()
            .await
    } else {
        session
            .expunge()
            .await
            .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?
            .try_collect()
            .await
    }
    .map_err(|e| Error::Imap(format!("Expunge error: {e}")))?;
    debug!("Expunged {} message(s)", expunged.len());
    Ok(())
}

struct Capabilities {
    r#move: bool,
    uidplus: bool,
}

async fn capabilities(session: &mut ImapSession) -> Result<Capabilities> {
    let caps = session
        .capabilities()
        .await
        .map_err(|e| Error::Imap(format!("Capability failed: {e}")))?;
    Ok(Capabilities {
        r#move: caps.has_str("MOVE"),
        uidplus: caps.has_str("UIDPLUS"),
    })
}

async fn delete_permanently(session: &mut ImapSession, uid: u32) -> Result<()> {
    let caps = capabilities(session).await?;
    store(session, uid, FlagAction::Add, Flag::Deleted).await?;
    expunge(session, uid, caps.uidplus).await
}

async fn relocate(session: &mut ImapSession, uid: u32, destination: &str) -> Result<()> {
    let caps = capabilities(session).await?;
    if caps.r#move {
        session
            .uid_mv(uid.to_string(), destination)
            .await
            .map_err(|e| Error::Imap(format!("Move to {destination} failed: {e}")))?;
        return Ok(());
    }
    session
        .uid_copy(uid.to_string(), destination)
        .await
        .map_err(|e| Error::Imap(format!("Copy to {destination} failed: {e}")))?;
    store(session, uid, FlagAction::Add, Flag::Deleted).await?;
    expunge(session, uid, caps.uidplus).await
}

fn flag_state(fetch: &Fetch) -> FlagState {
    use async_imap::types::Flag as ImapFlag;

    let mut state = FlagState::default();
    for flag in fetch.flags() {
        match flag {
            ImapFlag::Seen => state.seen = true,
            ImapFlag::Flagged => state.flagged = true,
            ImapFlag::Deleted => state.deleted = true,
            _ => {}
        }
    }
    state
}

fn has_attachments(body: &BodyStructure<'_>) -> bool {
    match body {
        BodyStructure::Basic { common, .. } => {
            if let Some(disposition) = &common.disposition
                && disposition.ty.eq_ignore_ascii_case("attachment")
            {
                return true;
            }
            !common.ty.ty.eq_ignore_ascii_case("text")
        }
        BodyStructure::Text { common, .. } => common
            .disposition
            .as_ref()
            .is_some_and(|d| d.ty.eq_ignore_ascii_case("attachment")),
        BodyStructure::Message { body, .. } => has_attachments(body),
        BodyStructure::Multipart { bodies, .. } => bodies.iter().any(has_attachments),
    }
}

fn fetch_meta(uid: u32, fetch: &Fetch) -> FetchMeta {
    FetchMeta {
        uid: fetch.uid.unwrap_or(uid),
        flags: flag_state(fetch),
        internal_date: fetch.internal_date(),
        size: fetch.size.unwrap_or_default(),
        structure_has_attachments: fetch.bodystructure().map(has_attachments),
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl MailBackend for MailClient {
    async fn test_connection(&self, account: &Account, folder: &str) -> Result<FolderCounts> {
        self.with_folder(account, folder, async |session| {
            let all = search(session, "ALL").await?;
            let unseen = search(session, "UNSEEN").await?;
            Ok(FolderCounts {
                total: count(all.len()),
                unseen: count(unseen.len()),
            })
        })
        .await
    }

    async fn list_folders(&self, account: &Account) -> Result<Vec<RemoteFolder>> {
        self.with_session(account, async |session| {
            let names: Vec<_> = session
                .list(Some(""), Some("*"))
                .await
                .map_err(|e| Error::Imap(format!("List folders failed: {e}")))?
                .try_collect()
                .await
                .map_err(|e| Error::Imap(format!("List folders error: {e}")))?;

            Ok(names
                .iter()
                .map(|name| RemoteFolder {
                    name: name.name().to_string(),
                    delimiter: name.delimiter().map(str::to_string),
                    special_use: name
                        .attributes()
                        .iter()
                        .find_map(SpecialUse::from_name_attribute),
                })
                .collect())
        })
        .await
    }

    async fn fetch_page(
        &self,
        account: &Account,
        folder: &str,
        page: PageRequest,
    ) -> Result<RemotePage> {
        self.with_folder(account, folder, async |session| {
            let all = search(session, "ALL").await?;
            let unseen = search(session, "UNSEEN").await?;
            let counts = FolderCounts {
                total: count(all.len()),
                unseen: count(unseen.len()),
            };

            let candidates = if page.unread_only { &unseen } else { &all };
            let slice: Vec<u32> = candidates
                .iter()
                .skip(page.offset)
                .take(page.limit)
                .copied()
                .collect();

            info!(
                account = %account.email,
                folder,
                total = counts.total,
                "Fetching {} message(s)",
                slice.len()
            );

            let mut messages = Vec::with_capacity(slice.len());
            for uid in slice {
                let summary = async {
                    let fetch = fetch_uid(session, uid, SUMMARY_ITEMS).await?;
                    let header = fetch
                        .header()
                        .ok_or_else(|| Error::Imap(format!("No header for UID {uid}")))?;
                    parse::summary_from_headers(&fetch_meta(uid, &fetch), header)
                }
                .await;
                match summary {
                    Ok(summary) => messages.push(summary),
                    Err(e) => warn!(account = %account.email, uid, "Failed to fetch: {}", e),
                }
            }

            Ok(RemotePage { messages, counts })
        })
        .await
    }

    async fn list_uids(&self, account: &Account, folder: &str) -> Result<Vec<u32>> {
        self.with_folder(account, folder, async |session| search(session, "ALL").await)
            .await
    }

    async fn fetch_one(&self, account: &Account, folder: &str, uid: u32) -> Result<MessageDetail> {
        self.with_folder(account, folder, async |session| {
            let fetch = fetch_uid(session, uid, DETAIL_ITEMS).await?;
            let body = fetch
                .body()
                .ok_or_else(|| Error::Imap(format!("No body found for UID {uid}")))?;
            parse::detail_from_raw(&fetch_meta(uid, &fetch), body)
        })
        .await
    }

    async fn mutate_flags(
        &self,
        account: &Account,
        folder: &str,
        uid: u32,
        flag: Flag,
        action: FlagAction,
    ) -> Result<()> {
        self.with_folder(account, folder, async |session| {
            store(session, uid, action, flag).await?;
            debug!(account = %account.email, folder, uid, "{:?} {}", action, flag);
            Ok(())
        })
        .await
    }

    async fn resolve_trash(&self, account: &Account, preferred: &str) -> Result<String> {
        let folders = self.list_folders(account).await?;
        let trash = folder::pick_trash(&folders, preferred);
        debug!(account = %account.email, "Resolved trash folder: {}", trash);
        Ok(trash)
    }

    async fn move_message(
        &self,
        account: &Account,
        folder: &str,
        uid: u32,
        destination: &str,
    ) -> Result<()> {
        self.with_folder(account, folder, async |session| {
            relocate(session, uid, destination).await?;
            info!(account = %account.email, folder, uid, "Moved to {}", destination);
            Ok(())
        })
        .await
    }

    async fn move_or_delete(
        &self,
        account: &Account,
        folder: &str,
        uid: u32,
        permanent: bool,
        trash: &str,
    ) -> Result<()> {
        self.with_folder(account, folder, async |session| {
            if permanent {
                delete_permanently(session, uid).await?;
                info!(account = %account.email, folder, uid, "Deleted permanently");
            } else {
                relocate(session, uid, trash).await?;
                info!(account = %account.email, folder, uid, "Moved to {}", trash);
            }
            Ok(())
        })
        .await
    }

    async fn send(&self, account: &Account, message: &OutgoingMessage) -> Result<SendReceipt> {
        smtp::send(account, message)
            .await
            .map_err(|e| e.for_account(&account.email))
    }
}
