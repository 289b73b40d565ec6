//! UID SEARCH command handler.
//!
//! Supports the keys the adapter sends (`ALL`, `UNSEEN`) plus the
//! flag keys, `SINCE`/`BEFORE` against the internal date, and the
//! logical combinators. Unknown keys match everything.
//!
//! ```text
//! * SEARCH 1 2 3
//! A0003 OK SEARCH completed
//! ```

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::search::SearchKey;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_uid_search<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    criteria: &[SearchKey<'_>],
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

    let line: String = folder
        .emails
        .iter()
        .filter(|e| criteria.iter().all(|key| matches_key(e, key)))
        .map(|e| format!(" {}", e.uid))
        .collect();
    let _ = write_line(stream, &format!("* SEARCH{line}\r\n")).await;
    let resp = format!("{tag} OK SEARCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[allow(clippy::match_same_arms)]
fn matches_key(email: &TestEmail, key: &SearchKey<'_>) -> bool {
    let day = email.internal_date.date_naive();
    match key {
        SearchKey::All => true,
        SearchKey::Seen => email.seen,
        SearchKey::Unseen => !email.seen,
        SearchKey::Flagged => email.flagged,
        SearchKey::Unflagged => !email.flagged,
        SearchKey::Answered => email.answered,
        SearchKey::Deleted => email.deleted,
        SearchKey::Undeleted => !email.deleted,
        SearchKey::Since(date) => day >= *date.as_ref(),
        SearchKey::Before(date) => day < *date.as_ref(),
        SearchKey::And(keys) => keys.as_ref().iter().all(|k| matches_key(email, k)),
        SearchKey::Or(a, b) => matches_key(email, a) || matches_key(email, b),
        SearchKey::Not(k) => !matches_key(email, k),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{RAW, output, pipe};
    use crate::fake_imap::mailbox::MailboxBuilder;
    use chrono::NaiveDate;
    use imap_codec::imap_types::datetime::NaiveDate as ImapDate;

    fn dated(date: &str) -> Vec<u8> {
        format!("From: a@b.com\r\nDate: {date}\r\nSubject: Test\r\n\r\nBody").into_bytes()
    }

    fn date(y: i32, m: u32, d: u32) -> ImapDate {
        ImapDate::unvalidated(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    async fn run(criteria: &[SearchKey<'_>], mailbox: &Mailbox, selected: Option<&str>) -> String {
        let (client, mut stream) = pipe();
        handle_uid_search("A1", criteria, mailbox, selected, &mut stream).await;
        drop(stream);
        output(client).await
    }

    fn inbox() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(1, true, &dated("Mon, 01 Jan 2024 10:00:00 +0000"))
            .email(2, false, &dated("Wed, 10 Jan 2024 10:00:00 +0000"))
            .flagged()
            .email(5, true, &dated("Sat, 20 Jan 2024 10:00:00 +0000"))
            .build()
    }

    #[tokio::test]
    async fn all_and_unseen() {
        let mailbox = inbox();
        assert!(run(&[SearchKey::All], &mailbox, Some("INBOX")).await.contains("* SEARCH 1 2 5\r\n"));
        assert!(run(&[SearchKey::Unseen], &mailbox, Some("INBOX")).await.contains("* SEARCH 2\r\n"));
        assert!(run(&[SearchKey::Flagged], &mailbox, Some("INBOX")).await.contains("* SEARCH 2\r\n"));
    }

    #[tokio::test]
    async fn since_inclusive_before_exclusive() {
        let out = run(
            &[SearchKey::Since(date(2024, 1, 10)), SearchKey::Before(date(2024, 1, 20))],
            &inbox(),
            Some("INBOX"),
        )
        .await;
        assert!(out.contains("* SEARCH 2\r\n"));
    }

    #[tokio::test]
    async fn empty_result_has_no_trailing_space() {
        let mailbox = MailboxBuilder::new().folder("INBOX").email(1, true, RAW).build();
        let out = run(&[SearchKey::Unseen], &mailbox, Some("INBOX")).await;
        assert!(out.starts_with("* SEARCH\r\n"));
        assert!(out.ends_with("A1 OK SEARCH completed\r\n"));
    }

    #[tokio::test]
    async fn requires_selected_folder() {
        let out = run(&[SearchKey::All], &inbox(), None).await;
        assert!(out.contains("A1 BAD No folder selected"));
    }
}
