//! Read paths: listing, search, detail, folders, connection checks and
//! attachments.

use super::{
    AccountCheck, AccountFailure, AttachmentItem, AttachmentsRequest, AttachmentsResponse,
    CheckResponse, EmailItem, FoldersResponse, ListRequest, ListResponse, MailService,
    SearchRequest, SearchResponse, ShowResponse,
};
use crate::account::Account;
use crate::backend::{FolderCounts, MailBackend, MessageDetail, PageRequest};
use crate::error::{Error, Result};
use crate::store::{CacheStore, MessageQuery};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Newest first; undated messages last, then by UID.
fn by_date_desc(a: &EmailItem, b: &EmailItem) -> Ordering {
    match (a.summary.date, b.summary.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.summary.uid.cmp(&a.summary.uid))
}

fn within(date: Option<DateTime<Utc>>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    match date {
        Some(date) => from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t),
        None => from.is_none() && to.is_none(),
    }
}

fn matches_query(item: &EmailItem, query: &str) -> bool {
    let needle = query.to_lowercase();
    item.summary.subject.to_lowercase().contains(&needle)
        || item.summary.from.to_lowercase().contains(&needle)
        || item
            .summary
            .to
            .iter()
            .any(|t| t.to_lowercase().contains(&needle))
}

fn window<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

fn partial_failure(failures: &[AccountFailure], total: usize) -> Option<String> {
    (!failures.is_empty()).then(|| {
        Error::PartialFailure {
            failed: failures.len(),
            total,
        }
        .to_string()
    })
}

/// Keep only a safe file name from an attachment name.
fn safe_file_name(name: &str, index: usize) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map_or_else(|| format!("attachment-{}", index + 1), str::to_string)
}

/// `name`, or `name-2`, `name-3`... (before any extension) if an
/// earlier attachment of the same message already took it.
fn unique_file_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let path = Path::new(&name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(&name);
    let extension = path.extension().and_then(|e| e.to_str());
    let mut n = 2;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Pages gathered from a sequential fan-out.
#[derive(Default)]
struct FanOut {
    items: Vec<EmailItem>,
    counts: Vec<FolderCounts>,
    failures: Vec<AccountFailure>,
}

impl<B: MailBackend> MailService<B> {
    /// List messages, from the cache when permitted and synced,
    /// otherwise live from every targeted account.
    pub async fn list_emails(&self, request: &ListRequest) -> ListResponse {
        match self.try_list(request).await {
            Ok(response) => response,
            Err(e) => ListResponse::failed(&e),
        }
    }

    async fn try_list(&self, request: &ListRequest) -> Result<ListResponse> {
        if request.limit == 0 {
            return Err(Error::InvalidArgument("limit must be greater than 0".into()));
        }
        let targets = self.registry.resolve_targets(request.account.as_deref())?;

        if request.use_cache {
            match self.list_from_cache(&targets, request) {
                Ok(response) => return Ok(response),
                Err(e) => debug!("Falling back to live listing: {}", e),
            }
        }
        Ok(self.list_live(&targets, request).await)
    }

    fn list_from_cache(&self, targets: &[&Account], request: &ListRequest) -> Result<ListResponse> {
        let store = CacheStore::open_existing(&self.settings.cache_path())?;
        let ids: Vec<&str> = targets.iter().map(|a| a.id.as_str()).collect();
        if !store.has_synced_folder(&ids, &request.folder)? {
            return Err(Error::CacheUnavailable(format!(
                "{} has not been synced",
                request.folder
            )));
        }

        let page = store.query_messages(&MessageQuery {
            account_ids: ids.iter().map(ToString::to_string).collect(),
            folder: Some(request.folder.clone()),
            unread_only: request.unread_only,
            date_from: request.date_from,
            date_to: request.date_to,
            limit: request.limit,
            offset: request.offset,
        })?;

        // Without a date filter the counts are the server's, as recorded
        // by the last sync; a page of the folder may hold fewer rows.
        let (total, unread) = if request.date_from.is_none() && request.date_to.is_none() {
            let (total, unread) = store.folder_totals(&ids, &request.folder)?;
            (if request.unread_only { unread } else { total }, unread)
        } else {
            (page.total, page.unread)
        };

        debug!(
            folder = %request.folder,
            total,
            "Listing served from cache"
        );
        Ok(ListResponse {
            success: true,
            error: None,
            emails: page.messages.into_iter().map(EmailItem::from).collect(),
            total_in_folder: total,
            unread_count: unread,
            limit: request.limit,
            offset: request.offset,
            from_cache: true,
            account_count: targets.len(),
            failures: Vec::new(),
        })
    }

    /// Fetch `page` from each account in turn, recording failures
    /// without stopping.
    async fn fan_out(&self, targets: &[&Account], folder: &str, page: PageRequest) -> FanOut {
        let mut out = FanOut::default();
        for account in targets {
            match self.backend.fetch_page(account, folder, page).await {
                Ok(remote) => {
                    out.counts.push(remote.counts);
                    out.items.extend(
                        remote
                            .messages
                            .into_iter()
                            .map(|m| EmailItem::new(account, folder, m)),
                    );
                }
                Err(e) => {
                    warn!(account = %account.email, "Live fetch failed: {}", e);
                    out.failures.push(AccountFailure {
                        account_id: account.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        out
    }

    async fn list_live(&self, targets: &[&Account], request: &ListRequest) -> ListResponse {
        // One account pages on the server; several accounts are merged
        // and paged globally.
        let single = targets.len() == 1;
        let page = if single {
            PageRequest {
                unread_only: request.unread_only,
                limit: request.limit,
                offset: request.offset,
            }
        } else {
            PageRequest {
                unread_only: request.unread_only,
                limit: request.offset.saturating_add(request.limit),
                offset: 0,
            }
        };

        let mut fan = self.fan_out(targets, &request.folder, page).await;
        fan.items
            .retain(|item| within(item.summary.date, request.date_from, request.date_to));
        fan.items.sort_by(by_date_desc);
        let emails = if single {
            fan.items
        } else {
            window(fan.items, request.offset, request.limit)
        };

        let total: u64 = fan.counts.iter().map(|c| u64::from(c.total)).sum();
        let unread: u64 = fan.counts.iter().map(|c| u64::from(c.unseen)).sum();
        info!(
            accounts = targets.len(),
            failures = fan.failures.len(),
            "Live listing fetched {} message(s)",
            emails.len()
        );
        ListResponse {
            success: fan.failures.is_empty(),
            error: partial_failure(&fan.failures, targets.len()),
            emails,
            total_in_folder: if request.unread_only { unread } else { total },
            unread_count: unread,
            limit: request.limit,
            offset: request.offset,
            from_cache: false,
            account_count: targets.len(),
            failures: fan.failures,
        }
    }

    /// Search live messages. The cache is never consulted.
    pub async fn search_emails(&self, request: &SearchRequest) -> SearchResponse {
        match self.try_search(request).await {
            Ok(response) => response,
            Err(e) => SearchResponse::failed(&e),
        }
    }

    async fn try_search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if request.limit == 0 {
            return Err(Error::InvalidArgument("limit must be greater than 0".into()));
        }
        let targets = self.registry.resolve_targets(request.account.as_deref())?;
        let page = PageRequest {
            unread_only: request.unread_only,
            limit: request.offset.saturating_add(request.limit),
            offset: 0,
        };
        let mut fan = self.fan_out(&targets, &request.folder, page).await;

        let query = request.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
        fan.items.retain(|item| {
            query.is_none_or(|q| matches_query(item, q))
                && within(item.summary.date, request.date_from, request.date_to)
        });
        fan.items.sort_by(by_date_desc);
        let total_found = fan.items.len();

        Ok(SearchResponse {
            success: fan.failures.is_empty(),
            error: partial_failure(&fan.failures, targets.len()),
            emails: window(fan.items, request.offset, request.limit),
            total_found,
            limit: request.limit,
            offset: request.offset,
            query: request.query.clone(),
            account_count: targets.len(),
            failures: fan.failures,
        })
    }

    /// Fetch one message live. Its content is written into the cache
    /// when the message has a cached row.
    pub async fn show_email(&self, account: Option<&str>, folder: &str, uid: u32) -> ShowResponse {
        match self.try_show(account, folder, uid).await {
            Ok(response) => response,
            Err(e) => ShowResponse::failed(&e),
        }
    }

    async fn try_show(&self, account: Option<&str>, folder: &str, uid: u32) -> Result<ShowResponse> {
        let account = self.account(account)?;
        let detail = self.backend.fetch_one(account, folder, uid).await?;
        self.cache_content(account, folder, &detail);
        Ok(ShowResponse {
            success: true,
            error: None,
            account_id: account.id.clone(),
            folder: folder.to_string(),
            unread: detail.summary.unread,
            attachment_count: detail.attachments.len(),
            email: Some(detail),
        })
    }

    fn cache_content(&self, account: &Account, folder: &str, detail: &MessageDetail) {
        let Some(store) = self.cache() else { return };
        let saved = store
            .find_message(&account.id, folder, detail.summary.uid)
            .and_then(|row| match row {
                Some(row) => store.save_content(row.id, detail).map(|()| true),
                None => Ok(false),
            });
        match saved {
            Ok(true) => debug!(uid = detail.summary.uid, "Cached message content"),
            Ok(false) => {}
            Err(e) => warn!(uid = detail.summary.uid, "Failed to cache content: {}", e),
        }
    }

    /// Folders of one account with their special-use tags.
    pub async fn list_folders(&self, account: Option<&str>) -> FoldersResponse {
        let result = async {
            let account = self.account(account)?;
            let folders = self.backend.list_folders(account).await?;
            Ok::<_, Error>(FoldersResponse {
                success: true,
                error: None,
                account_id: account.id.clone(),
                folders,
            })
        }
        .await;
        result.unwrap_or_else(|e| FoldersResponse::failed(&e))
    }

    /// Open the sync folder of each targeted account and report its
    /// counts.
    pub async fn check_accounts(&self, account: Option<&str>) -> CheckResponse {
        let targets = match self.registry.resolve_targets(account) {
            Ok(targets) => targets,
            Err(e) => return CheckResponse::failed(&e),
        };
        let mut checks = Vec::with_capacity(targets.len());
        for account in targets {
            let result = self
                .backend
                .test_connection(account, &self.settings.sync_folder)
                .await;
            let counts = result.as_ref().copied().unwrap_or_default();
            checks.push(AccountCheck {
                account_id: account.id.clone(),
                email: account.email.clone(),
                success: result.is_ok(),
                total: counts.total,
                unseen: counts.unseen,
                error: result.err().map(|e| e.to_string()),
            });
        }
        CheckResponse {
            success: checks.iter().all(|c| c.success),
            error: None,
            accounts: checks,
        }
    }

    /// List a message's attachments, optionally saving them to a
    /// directory.
    pub async fn get_attachments(&self, request: &AttachmentsRequest) -> AttachmentsResponse {
        match self.try_attachments(request).await {
            Ok(response) => response,
            Err(e) => AttachmentsResponse::failed(&e),
        }
    }

    async fn try_attachments(&self, request: &AttachmentsRequest) -> Result<AttachmentsResponse> {
        let account = self.account(request.account.as_deref())?;
        let detail = self
            .backend
            .fetch_one(account, &request.folder, request.uid)
            .await?;
        self.cache_content(account, &request.folder, &detail);

        let cached_row = match (&request.save_dir, self.cache()) {
            (Some(_), Some(store)) => store
                .find_message(&account.id, &request.folder, request.uid)
                .ok()
                .flatten()
                .map(|row| (store, row.id)),
            _ => None,
        };

        let mut taken = HashSet::new();
        let mut attachments = Vec::with_capacity(detail.attachments.len());
        for (index, attachment) in detail.attachments.iter().enumerate() {
            let saved_to = match &request.save_dir {
                Some(dir) => {
                    std::fs::create_dir_all(dir)?;
                    let name =
                        unique_file_name(safe_file_name(&attachment.filename, index), &mut taken);
                    let path: PathBuf = dir.join(name);
                    std::fs::write(&path, &attachment.data)?;
                    let path = path.display().to_string();
                    if let Some((store, row)) = &cached_row
                        && let Err(e) = store.record_attachment_path(
                            *row,
                            index,
                            &attachment.filename,
                            &attachment.content_type,
                            attachment.size,
                            &path,
                        )
                    {
                        warn!("Failed to record attachment path: {}", e);
                    }
                    info!(uid = request.uid, "Saved attachment to {}", path);
                    Some(path)
                }
                None => None,
            };
            attachments.push(AttachmentItem {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                size: attachment.size,
                saved_to,
            });
        }

        Ok(AttachmentsResponse {
            success: true,
            error: None,
            uid: request.uid,
            attachments,
        })
    }
}
