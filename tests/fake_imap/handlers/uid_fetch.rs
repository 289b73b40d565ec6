//! UID FETCH command handler.
//!
//! Message data goes out as **counted literals**: `{length}\r\n`
//! followed by exactly that many raw bytes. Non-literal items come
//! first, literals last:
//!
//! ```text
//! * 2 FETCH (UID 42 FLAGS (\Seen) INTERNALDATE "01-Mar-2024 09:00:00 +0000"
//!     RFC822.SIZE 512 BODY[HEADER] {120}
//! <120 bytes of header block>
//! )
//! ```
//!
//! BODYSTRUCTURE is accepted but not answered; clients fall back to
//! the headers for attachment detection.

use crate::fake_imap::handlers::uids_in;
use crate::fake_imap::io::{write_bytes, write_line};
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::sequence::SequenceSet;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Data items requested by a FETCH, read from the raw command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchItems {
    pub flags: bool,
    pub internal_date: bool,
    pub size: bool,
    pub header: bool,
    pub body: bool,
}

impl FetchItems {
    pub fn from_line(line: &str) -> Self {
        let upper = line.to_ascii_uppercase();
        Self {
            flags: upper.contains("FLAGS"),
            internal_date: upper.contains("INTERNALDATE"),
            size: upper.contains("RFC822.SIZE"),
            header: upper.contains("[HEADER]"),
            body: upper.contains("[]"),
        }
    }
}

fn attributes(email: &TestEmail, items: FetchItems) -> String {
    let mut out = format!("UID {}", email.uid);
    if items.flags {
        out.push_str(&format!(" FLAGS ({})", email.flag_list()));
    }
    if items.internal_date {
        out.push_str(&format!(
            " INTERNALDATE \"{}\"",
            email.internal_date.format("%d-%b-%Y %H:%M:%S %z")
        ));
    }
    if items.size {
        out.push_str(&format!(" RFC822.SIZE {}", email.raw.len()));
    }
    out
}

pub async fn handle_uid_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    items: FetchItems,
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };
    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let max_uid = folder.emails.iter().map(|e| e.uid).max().unwrap_or(0);
    for uid in uids_in(sequence_set, max_uid) {
        let Some((idx, email)) = folder.emails.iter().enumerate().find(|(_, e)| e.uid == uid)
        else {
            continue;
        };
        let seq = idx + 1;

        let mut literals: Vec<(&str, &[u8])> = Vec::new();
        if items.header {
            literals.push(("BODY[HEADER]", email.header()));
        }
        if items.body {
            literals.push(("BODY[]", &email.raw));
        }

        let mut prefix = format!("* {seq} FETCH ({}", attributes(email, items));
        for (name, data) in literals {
            prefix.push_str(&format!(" {name} {{{}}}\r\n", data.len()));
            if write_line(stream, &prefix).await.is_err() || write_bytes(stream, data).await.is_err()
            {
                return;
            }
            prefix.clear();
        }
        prefix.push_str(")\r\n");
        if write_line(stream, &prefix).await.is_err() {
            return;
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{RAW, output, pipe, uid_set};
    use crate::fake_imap::mailbox::MailboxBuilder;

    async fn run(line: &str, uid: u32, mailbox: &Mailbox, selected: Option<&str>) -> String {
        let (client, mut stream) = pipe();
        let items = FetchItems::from_line(line);
        handle_uid_fetch("A1", &uid_set(uid), items, mailbox, selected, &mut stream).await;
        drop(stream);
        output(client).await
    }

    fn inbox() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(7, false, RAW)
            .email(42, true, RAW)
            .flagged()
            .build()
    }

    #[test]
    fn parses_requested_items() {
        let items = FetchItems::from_line(
            "A3 UID FETCH 1 (UID FLAGS INTERNALDATE RFC822.SIZE BODYSTRUCTURE BODY.PEEK[HEADER])",
        );
        assert!(items.flags && items.internal_date && items.size && items.header);
        assert!(!items.body);
        assert!(FetchItems::from_line("A4 UID FETCH 1 (UID BODY.PEEK[])").body);
    }

    #[tokio::test]
    async fn summary_items_send_header_literal() {
        let out = run(
            "A1 UID FETCH 42 (UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[HEADER])",
            42,
            &inbox(),
            Some("INBOX"),
        )
        .await;

        let header_len = RAW.len() - "Body".len();
        assert!(out.starts_with("* 2 FETCH (UID 42 FLAGS (\\Seen \\Flagged)"));
        assert!(out.contains("INTERNALDATE \"01-Mar-2024 09:00:00 +0000\""));
        assert!(out.contains(&format!("RFC822.SIZE {}", RAW.len())));
        assert!(out.contains(&format!("BODY[HEADER] {{{header_len}}}\r\n")));
        assert!(!out.contains("\r\nBody"));
        assert!(out.ends_with(")\r\nA1 OK FETCH completed\r\n"));
    }

    #[tokio::test]
    async fn full_body_literal() {
        let out = run("A1 UID FETCH 7 (UID BODY.PEEK[])", 7, &inbox(), Some("INBOX")).await;
        assert!(out.contains(&format!("* 1 FETCH (UID 7 BODY[] {{{}}}\r\n", RAW.len())));
        assert!(out.contains("\r\n\r\nBody)\r\n"));
    }

    #[tokio::test]
    async fn missing_uid_returns_only_ok() {
        let out = run("A1 UID FETCH 99 (UID)", 99, &inbox(), Some("INBOX")).await;
        assert_eq!(out, "A1 OK FETCH completed\r\n");
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let out = run("A1 UID FETCH 1 (UID)", 1, &inbox(), None).await;
        assert!(out.contains("A1 BAD No folder selected"));
    }
}
