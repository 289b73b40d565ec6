//! LIST command handler.
//!
//! One `* LIST` line per folder, carrying its special-use attribute
//! when it has one:
//!
//! ```text
//! * LIST (\HasNoChildren) "/" "INBOX"
//! * LIST (\HasNoChildren \Trash) "/" "Bin"
//! A0002 OK LIST completed
//! ```

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    for folder in &mailbox.folders {
        let attributes = folder
            .special_use
            .as_deref()
            .map_or_else(|| "\\HasNoChildren".to_string(), |attr| format!("\\HasNoChildren {attr}"));
        let line = format!("* LIST ({attributes}) \"/\" \"{}\"\r\n", folder.name);
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let resp = format!("{tag} OK LIST completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{output, pipe};
    use crate::fake_imap::mailbox::MailboxBuilder;

    async fn run(tag: &str, mailbox: &Mailbox) -> String {
        let (client, mut stream) = pipe();
        handle_list(tag, mailbox, &mut stream).await;
        drop(stream);
        output(client).await
    }

    #[tokio::test]
    async fn lists_folders_with_special_use() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .special_folder("Bin", "\\Trash")
            .build();

        let out = run("A1", &mailbox).await;

        assert!(out.contains("* LIST (\\HasNoChildren) \"/\" \"INBOX\""));
        assert!(out.contains("* LIST (\\HasNoChildren \\Trash) \"/\" \"Bin\""));
        assert!(out.ends_with("A1 OK LIST completed\r\n"));
    }

    #[tokio::test]
    async fn empty_mailbox_returns_only_ok() {
        let out = run("T2", &MailboxBuilder::new().build()).await;
        assert_eq!(out, "T2 OK LIST completed\r\n");
    }
}
