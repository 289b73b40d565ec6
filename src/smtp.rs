//! SMTP submission
//!
//! Builds RFC 5322 messages with `lettre` and submits them over the
//! account's submission endpoint.

use crate::account::Account;
use crate::backend::{OutgoingMessage, SendReceipt};
use crate::error::{Error, Result};
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| Error::InvalidArgument(format!("Invalid address '{address}': {e}")))
}

/// Assemble the outgoing message.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when there are no recipients or
/// an address or header does not parse, and [`Error::Smtp`] when the
/// message cannot be built.
pub fn build_message(account: &Account, outgoing: &OutgoingMessage) -> Result<Message> {
    if outgoing.to.is_empty() && outgoing.cc.is_empty() && outgoing.bcc.is_empty() {
        return Err(Error::InvalidArgument("message has no recipients".into()));
    }

    let mut builder = Message::builder()
        .from(mailbox(&account.email)?)
        .subject(outgoing.subject.clone())
        .message_id(None);

    for to in &outgoing.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &outgoing.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    for bcc in &outgoing.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }
    if let Some(in_reply_to) = &outgoing.in_reply_to {
        builder = builder.in_reply_to(in_reply_to.clone());
    }
    if !outgoing.references.is_empty() {
        builder = builder.references(outgoing.references.join(" "));
    }
    for (name, value) in &outgoing.headers {
        let name = HeaderName::new_from_ascii(name.clone())
            .map_err(|e| Error::InvalidArgument(format!("Invalid header name '{name}': {e}")))?;
        builder = builder.raw_header(HeaderValue::new(name, value.clone()));
    }

    let text = outgoing.text.clone().unwrap_or_default();
    let result = if outgoing.attachments.is_empty() {
        match &outgoing.html {
            Some(html) if outgoing.text.is_some() => {
                builder.multipart(MultiPart::alternative_plain_html(text, html.clone()))
            }
            Some(html) => builder.singlepart(SinglePart::html(html.clone())),
            None => builder.singlepart(SinglePart::plain(text)),
        }
    } else {
        let mut mixed = match &outgoing.html {
            Some(html) if outgoing.text.is_some() => {
                MultiPart::mixed().multipart(MultiPart::alternative_plain_html(text, html.clone()))
            }
            Some(html) => MultiPart::mixed().singlepart(SinglePart::html(html.clone())),
            None => MultiPart::mixed().singlepart(SinglePart::plain(text)),
        };
        for attachment in &outgoing.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .unwrap_or(ContentType::TEXT_PLAIN);
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }
        builder.multipart(mixed)
    };

    result.map_err(|e| Error::Smtp(format!("Failed to build message: {e}")))
}

fn transport(account: &Account) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let endpoint = &account.smtp;
    if endpoint.host.is_empty() {
        return Err(Error::Config(format!(
            "No SMTP host configured for {}",
            account.email
        )));
    }

    let parameters = TlsParameters::builder(endpoint.host.clone())
        .dangerous_accept_invalid_certs(account.accept_invalid_certs)
        .build()
        .map_err(|e| Error::Tls(e.to_string()))?;
    let tls = if endpoint.tls {
        Tls::Wrapper(parameters)
    } else {
        Tls::Required(parameters)
    };

    Ok(
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(endpoint.host.as_str())
            .port(endpoint.port)
            .tls(tls)
            .credentials(Credentials::new(
                account.username().to_string(),
                account.password().to_string(),
            ))
            .build(),
    )
}

/// Build and submit a message, returning its `Message-ID`.
///
/// # Errors
///
/// Returns an error if the message cannot be built or the server
/// rejects it.
pub async fn send(account: &Account, outgoing: &OutgoingMessage) -> Result<SendReceipt> {
    let message = build_message(account, outgoing)?;
    let message_id = message
        .headers()
        .get_raw("Message-ID")
        .unwrap_or_default()
        .trim()
        .to_string();

    debug!(
        account = %account.email,
        host = %account.smtp.host,
        port = account.smtp.port,
        "Submitting message"
    );
    let response = transport(account)?
        .send(message)
        .await
        .map_err(|e| Error::Smtp(e.to_string()))?;

    info!(
        account = %account.email,
        code = %response.code(),
        "Message accepted"
    );
    Ok(SendReceipt { message_id })
}
