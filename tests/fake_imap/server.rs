//! In-process fake IMAP server for integration testing
//!
//! ```text
//!   TCP connect -> "* OK" greeting -> STARTTLS -> TLS handshake
//!       -> LOGIN -> SELECT / UID SEARCH / UID FETCH / UID STORE
//!       -> UID COPY / EXPUNGE -> LOGOUT
//! ```
//!
//! Every client command starts with a tag that the server echoes in
//! its completion line; lines prefixed with `*` are untagged data sent
//! before it. Commands are parsed with `imap-codec` and dispatched to
//! one handler per command. State lives in one shared [`Mailbox`], so
//! a mutation made over one connection is visible to the next.

use super::handlers::{
    FetchItems, StoreArgs, handle_capability, handle_expunge, handle_list, handle_login,
    handle_logout, handle_noop, handle_select, handle_uid_copy, handle_uid_fetch,
    handle_uid_search, handle_uid_store,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::{Command, CommandBody};
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// A fake IMAP server on `127.0.0.1` with an OS-assigned port and a
/// self-signed certificate generated by `rcgen` at startup.
pub struct FakeImapServer {
    port: u16,
    mailbox: Arc<Mutex<Mailbox>>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Bind, generate the certificate and spawn the accept loop. The
    /// loop is aborted when the server is dropped.
    pub async fn start(mailbox: Mailbox) -> Self {
        // Tests race to install the process-wide provider.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");
        let cert_der = cert.cert.der().clone();
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der.into())
            .expect("build server TLS config");

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));
        let mailbox = Arc::new(Mutex::new(mailbox));
        let shared = mailbox.clone();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _addr)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let mailbox = shared.clone();
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, &mailbox).await;
                });
            }
        });

        Self {
            port,
            mailbox,
            handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// A copy of the current server-side state.
    pub fn snapshot(&self) -> Mailbox {
        self.mailbox.lock().unwrap().clone()
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Plaintext greeting, then STARTTLS. Returns `None` if the client
/// goes away or sends anything else first.
async fn starttls(stream: TcpStream) -> Option<TcpStream> {
    let mut plain = BufReader::new(stream);
    write_line(&mut plain, "* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .ok()?;

    let mut line = String::new();
    plain.read_line(&mut line).await.ok()?;
    let (tag, verb) = line.trim().split_once(' ')?;

    if !verb.eq_ignore_ascii_case("STARTTLS") {
        let _ = write_line(&mut plain, &format!("{tag} BAD Expected STARTTLS\r\n")).await;
        return None;
    }
    write_line(&mut plain, &format!("{tag} OK Begin TLS negotiation now\r\n"))
        .await
        .ok()?;
    Some(plain.into_inner())
}

async fn handle_connection(stream: TcpStream, acceptor: TlsAcceptor, mailbox: &Mutex<Mailbox>) {
    let Some(tcp) = starttls(stream).await else {
        return;
    };
    let Ok(tls) = acceptor.accept(tcp).await else {
        return;
    };

    let mut session = Session {
        stream: BufReader::new(tls),
        mailbox,
        selected: None,
    };
    session.run().await;
}

fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => String::from_utf8_lossy(other.as_ref()).into_owned(),
    }
}

/// What the command loop does after a command.
enum Flow {
    Continue,
    Close,
}

/// One authenticated-or-not client over TLS.
struct Session<'m, S> {
    stream: BufReader<S>,
    mailbox: &'m Mutex<Mailbox>,
    selected: Option<String>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<'_, S> {
    async fn run(&mut self) {
        let codec = CommandCodec::default();
        let mut line = String::new();
        loop {
            line.clear();
            match self.stream.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let flow = match codec.decode(line.as_bytes()) {
                Ok((_, command)) => self.dispatch(trimmed, command).await,
                Err(_) => {
                    let tag = trimmed.split_whitespace().next().unwrap_or("*");
                    self.reply(&format!("{tag} BAD Parse error\r\n")).await
                }
            };
            if matches!(flow, Flow::Close) {
                return;
            }
        }
    }

    async fn reply(&mut self, line: &str) -> Flow {
        match write_line(&mut self.stream, line).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Close,
        }
    }

    /// Read-only handlers see a copy of the mailbox taken under the
    /// lock; mutating handlers get the mutex itself.
    async fn dispatch(&mut self, line: &str, command: Command<'_>) -> Flow {
        let tag = command.tag.inner();
        let selected = self.selected.clone();
        let selected = selected.as_deref();
        let stream = &mut self.stream;

        match command.body {
            CommandBody::Capability => handle_capability(tag, stream).await,
            CommandBody::Noop => handle_noop(tag, stream).await,
            CommandBody::Login { .. } => {
                if !handle_login(tag, stream).await {
                    return Flow::Close;
                }
            }
            CommandBody::Logout => {
                handle_logout(tag, stream).await;
                return Flow::Close;
            }
            CommandBody::List { .. } => {
                let snapshot = self.snapshot();
                handle_list(tag, &snapshot, &mut self.stream).await;
            }
            CommandBody::Select { mailbox, .. } => {
                let snapshot = self.snapshot();
                self.selected =
                    handle_select(tag, &mailbox_name(&mailbox), &snapshot, &mut self.stream).await;
            }
            CommandBody::Search {
                criteria,
                uid: true,
                ..
            } => {
                let snapshot = self.snapshot();
                handle_uid_search(tag, criteria.as_ref(), &snapshot, selected, &mut self.stream)
                    .await;
            }
            CommandBody::Fetch {
                sequence_set,
                uid: true,
                ..
            } => {
                let snapshot = self.snapshot();
                let items = FetchItems::from_line(line);
                handle_uid_fetch(tag, &sequence_set, items, &snapshot, selected, &mut self.stream)
                    .await;
            }
            CommandBody::Store {
                ref sequence_set,
                uid: true,
                ref kind,
                ref response,
                ref flags,
                ..
            } => {
                let args = StoreArgs {
                    sequence_set,
                    kind,
                    response,
                    flags,
                };
                handle_uid_store(tag, &args, self.mailbox, selected, stream).await;
            }
            CommandBody::Copy {
                ref sequence_set,
                ref mailbox,
                uid: true,
                ..
            } => {
                let destination = mailbox_name(mailbox);
                handle_uid_copy(tag, sequence_set, &destination, self.mailbox, selected, stream)
                    .await;
            }
            CommandBody::Expunge => handle_expunge(tag, self.mailbox, selected, stream).await,
            _ => return self.reply(&format!("{tag} BAD Unknown command\r\n")).await,
        }
        Flow::Continue
    }

    fn snapshot(&self) -> Mailbox {
        self.mailbox.lock().unwrap().clone()
    }
}
