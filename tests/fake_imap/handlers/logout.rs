//! LOGOUT command handler: BYE, then the tagged OK.

use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_logout<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    stream: &mut BufReader<S>,
) {
    let _ = write_line(stream, "* BYE Logging out\r\n").await;
    let resp = format!("{tag} OK LOGOUT completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{output, pipe};

    #[tokio::test]
    async fn says_bye_before_ok() {
        let (client, mut stream) = pipe();
        handle_logout("A9", &mut stream).await;
        drop(stream);
        let out = output(client).await;
        let bye = out.find("* BYE").unwrap();
        let ok = out.find("A9 OK LOGOUT completed").unwrap();
        assert!(bye < ok);
    }
}
