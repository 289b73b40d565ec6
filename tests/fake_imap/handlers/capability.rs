//! CAPABILITY command handler.
//!
//! The fake server advertises neither MOVE nor UIDPLUS, so clients
//! fall back to COPY + `\Deleted` + EXPUNGE when relocating messages.

use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub const CAPABILITIES: &str = "IMAP4rev1 STARTTLS SPECIAL-USE";

pub async fn handle_capability<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    stream: &mut BufReader<S>,
) {
    let _ = write_line(stream, &format!("* CAPABILITY {CAPABILITIES}\r\n")).await;
    let resp = format!("{tag} OK CAPABILITY completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{output, pipe};

    #[tokio::test]
    async fn advertises_no_move_extension() {
        let (client, mut stream) = pipe();
        handle_capability("A1", &mut stream).await;
        drop(stream);

        let out = output(client).await;
        assert!(out.contains("* CAPABILITY IMAP4rev1"));
        assert!(!out.contains("MOVE"));
        assert!(out.ends_with("A1 OK CAPABILITY completed\r\n"));
    }
}
