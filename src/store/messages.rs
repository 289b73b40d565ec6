//! Account, folder and message rows

use super::CacheStore;
use crate::account::Account;
use crate::backend::{FolderCounts, MessageSummary};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// A message row as read back from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedMessage {
    /// Synthetic local identifier.
    pub id: i64,
    pub account_id: String,
    pub folder: String,
    #[serde(flatten)]
    pub summary: MessageSummary,
}

/// A cached folder row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedFolder {
    pub id: i64,
    pub account_id: String,
    pub name: String,
    pub message_count: u32,
    pub unread_count: u32,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Filter and page for [`CacheStore::query_messages`].
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    /// Accounts to include; empty means every account.
    pub account_ids: Vec<String>,
    pub folder: Option<String>,
    pub unread_only: bool,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

/// One page of cached messages plus counts over the whole filtered
/// set.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub messages: Vec<CachedMessage>,
    pub total: u64,
    pub unread: u64,
}

impl MessageQuery {
    /// The shared `WHERE` clause and its bound values.
    fn predicate(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values = Vec::new();
        if !self.account_ids.is_empty() {
            let marks = vec!["?"; self.account_ids.len()].join(", ");
            clauses.push(format!("m.account_id IN ({marks})"));
            values.extend(self.account_ids.iter().cloned().map(Value::Text));
        }
        if let Some(folder) = &self.folder {
            clauses.push("f.name = ?".into());
            values.push(Value::Text(folder.clone()));
        }
        if self.unread_only {
            clauses.push("m.is_read = 0".into());
        }
        if let Some(from) = self.date_from {
            clauses.push("m.sent_at >= ?".into());
            values.push(Value::Integer(from.timestamp()));
        }
        if let Some(to) = self.date_to {
            clauses.push("m.sent_at <= ?".into());
            values.push(Value::Integer(to.timestamp()));
        }
        let clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (clause, values)
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn read_message(row: &Row<'_>) -> rusqlite::Result<CachedMessage> {
    let recipients: String = row.get("recipients")?;
    let sent_at: Option<i64> = row.get("sent_at")?;
    Ok(CachedMessage {
        id: row.get("id")?,
        account_id: row.get("account_id")?,
        folder: row.get("folder")?,
        summary: MessageSummary {
            uid: row.get("uid")?,
            message_id: row.get("message_id")?,
            subject: row.get("subject")?,
            from: row.get("sender")?,
            to: serde_json::from_str(&recipients).unwrap_or_default(),
            date: sent_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            unread: !row.get::<_, bool>("is_read")?,
            flagged: row.get("is_flagged")?,
            deleted: row.get("is_deleted")?,
            has_attachments: row.get("has_attachments")?,
            size: row.get("size")?,
        },
    })
}

fn read_folder(row: &Row<'_>) -> rusqlite::Result<CachedFolder> {
    let last_sync: Option<String> = row.get("last_sync")?;
    Ok(CachedFolder {
        id: row.get("id")?,
        account_id: row.get("account_id")?,
        name: row.get("name")?,
        message_count: row.get("message_count")?,
        unread_count: row.get("unread_count")?,
        last_sync: last_sync
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}

const MESSAGE_COLUMNS: &str = "m.id, m.account_id, f.name AS folder, m.uid, m.message_id,
    m.subject, m.sender, m.recipients, m.sent_at, m.is_read, m.is_flagged, m.is_deleted,
    m.has_attachments, m.size";

impl CacheStore {
    /// Insert or refresh an account's identity row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_account(
        &self,
        account: &Account,
        total_messages: u32,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO accounts (id, email, provider, description, total_messages, last_sync)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                provider = excluded.provider,
                description = excluded.description,
                total_messages = excluded.total_messages,
                last_sync = excluded.last_sync",
            params![
                account.id,
                account.email,
                account.provider,
                account.description,
                total_messages,
                synced_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Insert or refresh a folder keyed on (account, name), returning
    /// its stable row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_folder(
        &self,
        account_id: &str,
        name: &str,
        counts: FolderCounts,
        synced_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO folders (account_id, name, message_count, unread_count, last_sync)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(account_id, name) DO UPDATE SET
                message_count = excluded.message_count,
                unread_count = excluded.unread_count,
                last_sync = excluded.last_sync",
            params![
                account_id,
                name,
                counts.total,
                counts.unseen,
                synced_at.to_rfc3339()
            ],
        )?;
        let id = conn.query_row(
            "SELECT id FROM folders WHERE account_id = ?1 AND name = ?2",
            params![account_id, name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Snapshot-overwrite messages keyed on (account, folder, uid).
    /// Existing rows keep their local id; every other column is
    /// replaced, except that a row with stored attachment records keeps
    /// its attachment flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn upsert_messages(
        &self,
        account_id: &str,
        folder_id: i64,
        messages: &[MessageSummary],
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (
                    account_id, folder_id, uid, message_id, subject, sender, recipients,
                    sent_at, is_read, is_flagged, is_deleted, has_attachments, size, synced_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(account_id, folder_id, uid) DO UPDATE SET
                    message_id = excluded.message_id,
                    subject = excluded.subject,
                    sender = excluded.sender,
                    recipients = excluded.recipients,
                    sent_at = excluded.sent_at,
                    is_read = excluded.is_read,
                    is_flagged = excluded.is_flagged,
                    is_deleted = excluded.is_deleted,
                    has_attachments = excluded.has_attachments
                        OR EXISTS (SELECT 1 FROM attachments a WHERE a.message_row = messages.id),
                    size = excluded.size,
                    synced_at = excluded.synced_at",
            )?;
            for message in messages {
                stmt.execute(params![
                    account_id,
                    folder_id,
                    message.uid,
                    message.message_id,
                    message.subject,
                    message.from,
                    serde_json::to_string(&message.to)?,
                    message.date.map(|d| d.timestamp()),
                    !message.unread,
                    message.flagged,
                    message.deleted,
                    message.has_attachments,
                    message.size,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        debug!(account = account_id, folder_id, "Upserted {} message(s)", messages.len());
        Ok(messages.len())
    }

    /// Delete cached messages of a folder whose UID is not in `live`.
    /// Content and attachment rows go with them.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn prune_messages(&self, account_id: &str, folder_id: i64, live: &[u32]) -> Result<usize> {
        let live: HashSet<u32> = live.iter().copied().collect();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stale: Vec<u32> = {
            let mut stmt =
                tx.prepare("SELECT uid FROM messages WHERE account_id = ?1 AND folder_id = ?2")?;
            let uids = stmt
                .query_map(params![account_id, folder_id], |row| row.get::<_, u32>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            uids.into_iter().filter(|uid| !live.contains(uid)).collect()
        };
        for uid in &stale {
            tx.execute(
                "DELETE FROM messages WHERE account_id = ?1 AND folder_id = ?2 AND uid = ?3",
                params![account_id, folder_id, uid],
            )?;
        }
        tx.commit()?;
        if !stale.is_empty() {
            info!(account = account_id, folder_id, "Pruned {} stale message(s)", stale.len());
        }
        Ok(stale.len())
    }

    /// One filtered page ordered by sent date (newest first), plus the
    /// total and unread counts of the whole filtered set.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn query_messages(&self, query: &MessageQuery) -> Result<QueryPage> {
        let (clause, values) = query.predicate();
        let conn = self.conn();

        let (total, unread): (i64, i64) = conn.query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN m.is_read = 0 THEN 1 ELSE 0 END), 0)
                 FROM messages m JOIN folders f ON f.id = m.folder_id {clause}"
            ),
            params_from_iter(values.iter()),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut page_values = values;
        page_values.push(Value::Integer(to_i64(query.limit)));
        page_values.push(Value::Integer(to_i64(query.offset)));
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages m JOIN folders f ON f.id = m.folder_id {clause}
             ORDER BY m.sent_at DESC NULLS LAST, m.uid DESC, m.id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let messages = stmt
            .query_map(params_from_iter(page_values.iter()), read_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(QueryPage {
            messages,
            total: u64::try_from(total).unwrap_or_default(),
            unread: u64::try_from(unread).unwrap_or_default(),
        })
    }

    /// Look a cached message up by its identity key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_message(
        &self,
        account_id: &str,
        folder: &str,
        uid: u32,
    ) -> Result<Option<CachedMessage>> {
        let message = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS}
                     FROM messages m JOIN folders f ON f.id = m.folder_id
                     WHERE m.account_id = ?1 AND f.name = ?2 AND m.uid = ?3"
                ),
                params![account_id, folder, uid],
                read_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Look messages up by their `Message-ID` header across accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_by_message_id(&self, message_id: &str) -> Result<Vec<CachedMessage>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages m JOIN folders f ON f.id = m.folder_id
             WHERE m.message_id = ?1
             ORDER BY m.account_id, f.name"
        ))?;
        let messages = stmt
            .query_map(params![message_id], read_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Cached folders, optionally limited to one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn folders(&self, account_id: Option<&str>) -> Result<Vec<CachedFolder>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, account_id, name, message_count, unread_count, last_sync
             FROM folders
             WHERE ?1 IS NULL OR account_id = ?1
             ORDER BY account_id, name",
        )?;
        let folders = stmt
            .query_map(params![account_id], read_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(folders)
    }

    /// Server-reported total and unread counts of `folder`, summed over
    /// the listed accounts as of their last sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn folder_totals(&self, account_ids: &[&str], folder: &str) -> Result<(u64, u64)> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT message_count, unread_count FROM folders
             WHERE account_id = ?1 AND name = ?2",
        )?;
        let mut totals = (0, 0);
        for account_id in account_ids {
            let counts: Option<(u32, u32)> = stmt
                .query_row(params![account_id, folder], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()?;
            if let Some((total, unread)) = counts {
                totals.0 += u64::from(total);
                totals.1 += u64::from(unread);
            }
        }
        Ok(totals)
    }

    /// Whether `folder` has been synced for every listed account.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_synced_folder(&self, account_ids: &[&str], folder: &str) -> Result<bool> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT COUNT(*) FROM folders
             WHERE account_id = ?1 AND name = ?2 AND last_sync IS NOT NULL",
        )?;
        for account_id in account_ids {
            let n: i64 = stmt.query_row(params![account_id, folder], |row| row.get(0))?;
            if n == 0 {
                return Ok(false);
            }
        }
        Ok(!account_ids.is_empty())
    }
}
