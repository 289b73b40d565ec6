//! IMAP connection and TLS helpers
//!
//! Provides the low-level `connect()` and `select()` functions used by
//! every operation of [`crate::MailClient`], plus the rustls client
//! configuration shared with SMTP submission.

use crate::account::Account;
use crate::error::{Error, Result};
use async_imap::Session;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

/// A TLS-wrapped IMAP session.
pub type ImapSession = Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// Build the rustls client configuration for an account.
///
/// Certificates are verified against the webpki roots unless the
/// account accepts invalid certificates (local bridges with
/// self-signed certs).
pub fn tls_config(accept_invalid_certs: bool) -> Result<rustls::ClientConfig> {
    let builder = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Tls(e.to_string()))?;

    let config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(config)
}

fn tls_connector(account: &Account) -> Result<TlsConnector> {
    Ok(TlsConnector::from(Arc::new(tls_config(
        account.accept_invalid_certs,
    )?)))
}

/// Open a fresh TLS-wrapped, authenticated IMAP session.
///
/// With implicit TLS the handshake happens right after the TCP
/// connect; otherwise the plaintext connection is upgraded with
/// STARTTLS first.
pub async fn connect(account: &Account) -> Result<ImapSession> {
    let endpoint = &account.imap;
    if endpoint.host.is_empty() {
        return Err(Error::Config(format!(
            "No IMAP host configured for {}",
            account.email
        )));
    }
    let addr = format!("{}:{}", endpoint.host, endpoint.port);
    debug!("Connecting to IMAP server at {}", addr);

    let tcp_stream = TcpStream::connect(&addr).await?;

    let inner = if endpoint.tls {
        tcp_stream
    } else {
        let mut client = async_imap::Client::new(tcp_stream.compat());
        client
            .run_command_and_check_ok("STARTTLS", None)
            .await
            .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;
        client.into_inner().into_inner()
    };

    let connector = tls_connector(account)?;
    let server_name = ServerName::try_from(endpoint.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
    let tls_stream = connector
        .connect(server_name, inner)
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    let tls_client = async_imap::Client::new(tls_stream.compat());

    let session = tls_client
        .login(account.username(), account.password())
        .await
        .map_err(|(e, _)| Error::Imap(format!("Login failed: {e}")))?;

    info!(account = %account.email, "Connected to IMAP server");
    Ok(session)
}

/// SELECT a folder on an existing session, returning its message
/// count.
pub async fn select(session: &mut ImapSession, folder: &str) -> Result<u32> {
    let mailbox = session
        .select(folder)
        .await
        .map_err(|e| Error::Imap(format!("Failed to select {folder}: {e}")))?;
    Ok(mailbox.exists)
}

/// Certificate verifier that accepts all certificates
/// (for self-signed local bridges).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
