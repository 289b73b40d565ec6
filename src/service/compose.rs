//! Reply and forward message construction

use crate::backend::{MessageDetail, OutgoingAttachment, OutgoingMessage};
use crate::parse::first_address;

fn prefixed(prefix: &str, aliases: &[&str], subject: &str) -> String {
    let trimmed = subject.trim();
    let lower = trimmed.to_ascii_lowercase();
    if aliases.iter().any(|a| lower.starts_with(a)) {
        trimmed.to_string()
    } else {
        format!("{prefix} {trimmed}")
    }
}

#[must_use]
pub fn reply_subject(subject: &str) -> String {
    prefixed("Re:", &["re:"], subject)
}

#[must_use]
pub fn forward_subject(subject: &str) -> String {
    prefixed("Fwd:", &["fwd:", "fw:"], subject)
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sent_line(source: &MessageDetail) -> String {
    source.summary.date.map_or_else(
        || format!("{} wrote:", source.summary.from),
        |date| format!("On {}, {} wrote:", date.to_rfc2822(), source.summary.from),
    )
}

/// Add `address` unless it is ours or already present.
fn push_unique(list: &mut Vec<String>, address: String, own: &str) {
    if address.eq_ignore_ascii_case(own) || list.iter().any(|a| a.eq_ignore_ascii_case(&address)) {
        return;
    }
    list.push(address);
}

/// Build a reply to `source` sent from `own_address`.
///
/// Threading headers point at the source; the body quotes its text
/// part.
#[must_use]
pub fn reply(
    own_address: &str,
    source: &MessageDetail,
    text: &str,
    html: Option<String>,
    reply_all: bool,
) -> OutgoingMessage {
    let mut to = Vec::new();
    let primary = source
        .reply_to
        .as_deref()
        .and_then(first_address)
        .or_else(|| first_address(&source.summary.from))
        .unwrap_or_else(|| source.summary.from.clone());
    push_unique(&mut to, primary, own_address);

    let mut cc = Vec::new();
    if reply_all {
        for address in source.summary.to.iter().chain(&source.cc) {
            if to.iter().any(|t| t.eq_ignore_ascii_case(address)) {
                continue;
            }
            push_unique(&mut cc, address.clone(), own_address);
        }
    }

    let mut references = source.references.clone();
    if let Some(id) = &source.summary.message_id
        && !references.contains(id)
    {
        references.push(id.clone());
    }

    let mut body = text.to_string();
    if let Some(original) = &source.text_body {
        body.push_str("\n\n");
        body.push_str(&sent_line(source));
        body.push('\n');
        body.push_str(&quote(original));
    }

    OutgoingMessage {
        to,
        cc,
        subject: reply_subject(&source.summary.subject),
        text: Some(body),
        html,
        in_reply_to: source.summary.message_id.clone(),
        references,
        ..OutgoingMessage::default()
    }
}

/// Build a forward of `source`, carrying its attachments.
#[must_use]
pub fn forward(
    source: &MessageDetail,
    to: Vec<String>,
    cc: Vec<String>,
    note: Option<&str>,
) -> OutgoingMessage {
    let mut body = note.map(str::to_string).unwrap_or_default();
    body.push_str("\n\n---------- Forwarded message ----------\n");
    body.push_str(&format!("From: {}\n", source.summary.from));
    if let Some(date) = source.summary.date {
        body.push_str(&format!("Date: {}\n", date.to_rfc2822()));
    }
    body.push_str(&format!("Subject: {}\n", source.summary.subject));
    if !source.summary.to.is_empty() {
        body.push_str(&format!("To: {}\n", source.summary.to.join(", ")));
    }
    body.push('\n');
    body.push_str(source.text_body.as_deref().unwrap_or_default());

    OutgoingMessage {
        to,
        cc,
        subject: forward_subject(&source.summary.subject),
        text: Some(body.trim_start().to_string()),
        html: None,
        attachments: source
            .attachments
            .iter()
            .map(|a| OutgoingAttachment {
                filename: a.filename.clone(),
                content_type: a.content_type.clone(),
                data: a.data.clone(),
            })
            .collect(),
        references: source.summary.message_id.iter().cloned().collect(),
        ..OutgoingMessage::default()
    }
}
