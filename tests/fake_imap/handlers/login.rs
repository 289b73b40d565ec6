//! LOGIN command handler. Any credentials are accepted.

use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Returns `false` if the connection is gone.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    stream: &mut BufReader<S>,
) -> bool {
    let resp = format!("{tag} OK LOGIN completed\r\n");
    write_line(stream, &resp).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::test_support::{output, pipe};

    #[tokio::test]
    async fn accepts_any_credentials() {
        let (client, mut stream) = pipe();
        assert!(handle_login("A1", &mut stream).await);
        drop(stream);
        assert_eq!(output(client).await, "A1 OK LOGIN completed\r\n");
    }
}
