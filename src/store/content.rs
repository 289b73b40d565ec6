//! Lazily cached message content and attachment records

use super::CacheStore;
use crate::backend::MessageDetail;
use crate::error::Result;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

/// Body and header block of one cached message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedContent {
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub raw_headers: String,
}

/// One attachment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedAttachment {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    /// Where the attachment was saved, if it was.
    pub path: Option<String>,
}

impl CacheStore {
    /// Store the body, header block and attachment metadata of a fetched
    /// message against its cached row. Saved paths of existing
    /// attachment records survive.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn save_content(&self, message_row: i64, detail: &MessageDetail) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO message_content (message_row, text_body, html_body, raw_headers, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(message_row) DO UPDATE SET
                text_body = excluded.text_body,
                html_body = excluded.html_body,
                raw_headers = excluded.raw_headers,
                fetched_at = excluded.fetched_at",
            params![
                message_row,
                detail.text_body,
                detail.html_body,
                detail.raw_headers,
                Utc::now().to_rfc3339(),
            ],
        )?;
        for (part_index, attachment) in detail.attachments.iter().enumerate() {
            tx.execute(
                "INSERT INTO attachments (message_row, part_index, filename, content_type, size)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(message_row, part_index) DO UPDATE SET
                    filename = excluded.filename,
                    content_type = excluded.content_type,
                    size = excluded.size",
                params![
                    message_row,
                    part_index,
                    attachment.filename,
                    attachment.content_type,
                    i64::try_from(attachment.size).unwrap_or(i64::MAX),
                ],
            )?;
        }
        if !detail.attachments.is_empty() {
            tx.execute(
                "UPDATE messages SET has_attachments = 1 WHERE id = ?1",
                params![message_row],
            )?;
        }
        tx.commit()?;
        debug!(message_row, "Cached content with {} attachment(s)", detail.attachments.len());
        Ok(())
    }

    /// Cached content of a message, if it has been fetched before.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn content(&self, message_row: i64) -> Result<Option<CachedContent>> {
        let content = self
            .conn()
            .query_row(
                "SELECT text_body, html_body, raw_headers FROM message_content
                 WHERE message_row = ?1",
                params![message_row],
                |row| {
                    Ok(CachedContent {
                        text_body: row.get(0)?,
                        html_body: row.get(1)?,
                        raw_headers: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(content)
    }

    /// Attachment records of a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn attachments(&self, message_row: i64) -> Result<Vec<CachedAttachment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT filename, content_type, size, path FROM attachments
             WHERE message_row = ?1 ORDER BY part_index",
        )?;
        let rows = stmt
            .query_map(params![message_row], |row| {
                Ok(CachedAttachment {
                    filename: row.get(0)?,
                    content_type: row.get(1)?,
                    size: row.get(2)?,
                    path: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Record where the attachment at `part_index` (its position in
    /// the message) was written to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record_attachment_path(
        &self,
        message_row: i64,
        part_index: usize,
        filename: &str,
        content_type: &str,
        size: usize,
        path: &str,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO attachments (message_row, part_index, filename, content_type, size, path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(message_row, part_index) DO UPDATE SET path = excluded.path",
            params![
                message_row,
                part_index,
                filename,
                content_type,
                i64::try_from(size).unwrap_or(i64::MAX),
                path
            ],
        )?;
        Ok(())
    }
}
