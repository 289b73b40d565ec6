//! Message parsing helpers
//!
//! Turns raw header blocks and full RFC 5322 sources into
//! [`MessageSummary`] and [`MessageDetail`] using `mailparse`.

use crate::backend::{AttachmentData, MessageDetail, MessageSummary};
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, Utc};
use mailparse::{DispositionType, MailAddr, MailHeader, MailHeaderMap, ParsedMail};

/// Flag state of one message as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagState {
    pub seen: bool,
    pub flagged: bool,
    pub deleted: bool,
}

/// Server-side attributes that travel alongside the message bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchMeta {
    pub uid: u32,
    pub flags: FlagState,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub size: u32,
    /// Attachment presence derived from BODYSTRUCTURE, when the server
    /// returned one.
    pub structure_has_attachments: Option<bool>,
}

/// Build a summary from a `BODY[HEADER]` block.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the header block is malformed.
pub fn summary_from_headers(meta: &FetchMeta, header_block: &[u8]) -> Result<MessageSummary> {
    let (headers, _) =
        mailparse::parse_headers(header_block).map_err(|e| Error::Parse(e.to_string()))?;

    let has_attachments = meta
        .structure_has_attachments
        .unwrap_or_else(|| multipart_mixed(&headers));

    Ok(summary(meta, &headers, has_attachments))
}

/// Build a full detail view from a complete message source.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the message cannot be parsed.
pub fn detail_from_raw(meta: &FetchMeta, raw: &[u8]) -> Result<MessageDetail> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
    let (_, body_offset) =
        mailparse::parse_headers(raw).map_err(|e| Error::Parse(e.to_string()))?;

    let mut parts = BodyParts::default();
    parts.walk(&parsed)?;

    let headers = parsed.headers.as_slice();
    let summary = summary(meta, headers, !parts.attachments.is_empty());

    Ok(MessageDetail {
        summary,
        cc: addresses(headers, "Cc"),
        reply_to: headers.get_first_value("Reply-To"),
        in_reply_to: headers.get_first_value("In-Reply-To").map(|v| v.trim().to_string()),
        references: headers
            .get_first_value("References")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        text_body: parts.text,
        html_body: parts.html,
        attachments: parts.attachments,
        raw_headers: String::from_utf8_lossy(&raw[..body_offset.min(raw.len())]).into_owned(),
        raw: raw.to_vec(),
    })
}

fn summary(meta: &FetchMeta, headers: &[MailHeader<'_>], has_attachments: bool) -> MessageSummary {
    let date = headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .or_else(|| meta.internal_date.map(|d| d.with_timezone(&Utc)));

    MessageSummary {
        uid: meta.uid,
        message_id: headers
            .get_first_value("Message-ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        from: headers.get_first_value("From").unwrap_or_default(),
        to: addresses(headers, "To"),
        date,
        unread: !meta.flags.seen,
        flagged: meta.flags.flagged,
        deleted: meta.flags.deleted,
        has_attachments,
        size: meta.size,
    }
}

/// Bare addresses from an address-list header.
fn addresses(headers: &[MailHeader<'_>], name: &str) -> Vec<String> {
    let Some(value) = headers.get_first_value(name) else {
        return Vec::new();
    };
    match mailparse::addrparse(&value) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(info) => vec![info.addr.clone()],
                MailAddr::Group(group) => group.addrs.iter().map(|i| i.addr.clone()).collect(),
            })
            .collect(),
        Err(_) => value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

/// Bare address of the first mailbox in a header value such as
/// `"Alice <alice@example.com>"`.
#[must_use]
pub fn first_address(value: &str) -> Option<String> {
    let list = mailparse::addrparse(value).ok()?;
    list.iter().find_map(|addr| match addr {
        MailAddr::Single(info) => Some(info.addr.clone()),
        MailAddr::Group(group) => group.addrs.first().map(|i| i.addr.clone()),
    })
}

fn multipart_mixed(headers: &[MailHeader<'_>]) -> bool {
    headers
        .get_first_value("Content-Type")
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("multipart/mixed"))
}

#[derive(Default)]
struct BodyParts {
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<AttachmentData>,
}

impl BodyParts {
    fn walk(&mut self, part: &ParsedMail<'_>) -> Result<()> {
        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                self.walk(sub)?;
            }
            return Ok(());
        }

        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();
        let mimetype = part.ctype.mimetype.to_ascii_lowercase();

        if matches!(disposition.disposition, DispositionType::Attachment) || filename.is_some() {
            let data = part
                .get_body_raw()
                .map_err(|e| Error::Parse(e.to_string()))?;
            self.attachments.push(AttachmentData {
                filename: filename.unwrap_or_else(|| "attachment".to_string()),
                content_type: mimetype,
                size: data.len(),
                data,
            });
        } else if mimetype == "text/plain" && self.text.is_none() {
            self.text = Some(part.get_body().map_err(|e| Error::Parse(e.to_string()))?);
        } else if mimetype == "text/html" && self.html.is_none() {
            self.html = Some(part.get_body().map_err(|e| Error::Parse(e.to_string()))?);
        }
        Ok(())
    }
}
