//! UID STORE command handler.
//!
//! `+FLAGS`, `-FLAGS` and `FLAGS` over `\Seen`, `\Answered`,
//! `\Flagged` and `\Deleted`. Answers `* N FETCH (UID u FLAGS (...))`
//! per message unless `.SILENT` was requested.

use crate::fake_imap::handlers::uids_in;
use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::flag::{Flag, StoreResponse, StoreType};
use imap_codec::imap_types::sequence::SequenceSet;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Parsed STORE command arguments.
pub struct StoreArgs<'a> {
    pub sequence_set: &'a SequenceSet,
    pub kind: &'a StoreType,
    pub response: &'a StoreResponse,
    pub flags: &'a [Flag<'a>],
}

fn apply(email: &mut TestEmail, kind: &StoreType, flags: &[Flag<'_>]) {
    let has = |wanted: fn(&Flag<'_>) -> bool| flags.iter().any(wanted);
    let targets: [(&mut bool, bool); 4] = [
        (&mut email.seen, has(|f| matches!(f, Flag::Seen))),
        (&mut email.answered, has(|f| matches!(f, Flag::Answered))),
        (&mut email.flagged, has(|f| matches!(f, Flag::Flagged))),
        (&mut email.deleted, has(|f| matches!(f, Flag::Deleted))),
    ];
    for (state, named) in targets {
        match kind {
            StoreType::Add if named => *state = true,
            StoreType::Remove if named => *state = false,
            StoreType::Replace => *state = named,
            _ => {}
        }
    }
}

pub async fn handle_uid_store<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    args: &StoreArgs<'_>,
    mailbox: &Mutex<Mailbox>,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    // Mutate under lock, write afterwards.
    let results = {
        let mut mb = mailbox.lock().unwrap();
        mb.get_folder_mut(folder_name).map(|folder| {
            let max_uid = folder.emails.iter().map(|e| e.uid).max().unwrap_or(0);
            let mut results = Vec::new();
            for uid in uids_in(args.sequence_set, max_uid) {
                if let Some((idx, email)) = folder
                    .emails
                    .iter_mut()
                    .enumerate()
                    .find(|(_, e)| e.uid == uid)
                {
                    apply(email, args.kind, args.flags);
                    results.push((idx + 1, uid, email.flag_list()));
                }
            }
            results
        })
    };
    let Some(results) = results else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    if !matches!(args.response, StoreResponse::Silent) {
        for (seq, uid, flags) in &results {
            let line = format!("* {seq} FETCH (UID {uid} FLAGS ({flags}))\r\n");
            if write_line(stream, &line).await.is_err() {
                return;
            }
        }
    }

    let resp = format!("{tag} OK STORE completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{RAW, output, pipe, uid_set};
    use crate::fake_imap::mailbox::MailboxBuilder;

    async fn store(
        kind: StoreType,
        response: StoreResponse,
        flags: &[Flag<'_>],
        mailbox: &Mutex<Mailbox>,
        selected: Option<&str>,
    ) -> String {
        let (client, mut stream) = pipe();
        let set = uid_set(1);
        let args = StoreArgs {
            sequence_set: &set,
            kind: &kind,
            response: &response,
            flags,
        };
        handle_uid_store("A1", &args, mailbox, selected, &mut stream).await;
        drop(stream);
        output(client).await
    }

    fn inbox(seen: bool) -> Mutex<Mailbox> {
        Mutex::new(MailboxBuilder::new().folder("INBOX").email(1, seen, RAW).build())
    }

    fn first(mb: &Mutex<Mailbox>) -> TestEmail {
        mb.lock().unwrap().get_folder("INBOX").unwrap().emails[0].clone()
    }

    #[tokio::test]
    async fn add_answers_with_flags() {
        let mb = inbox(false);
        let out = store(StoreType::Add, StoreResponse::Answer, &[Flag::Seen], &mb, Some("INBOX")).await;
        assert!(out.contains("* 1 FETCH (UID 1 FLAGS (\\Seen))"));
        assert!(first(&mb).seen);
    }

    #[tokio::test]
    async fn silent_remove_writes_only_ok() {
        let mb = inbox(true);
        let out = store(StoreType::Remove, StoreResponse::Silent, &[Flag::Seen], &mb, Some("INBOX")).await;
        assert_eq!(out, "A1 OK STORE completed\r\n");
        assert!(!first(&mb).seen);
    }

    #[tokio::test]
    async fn flagged_and_deleted_are_tracked() {
        let mb = inbox(false);
        store(
            StoreType::Add,
            StoreResponse::Silent,
            &[Flag::Flagged, Flag::Deleted, Flag::Answered],
            &mb,
            Some("INBOX"),
        )
        .await;
        let email = first(&mb);
        assert!(email.flagged && email.deleted && email.answered);
        assert!(!email.seen);
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let mb = inbox(false);
        let out = store(StoreType::Add, StoreResponse::Answer, &[Flag::Seen], &mb, None).await;
        assert!(out.contains("A1 BAD No folder selected"));
    }
}
