//! Fake IMAP server for integration testing
//!
//! Speaks enough IMAP over STARTTLS to drive `MailClient` end-to-end:
//! folder listing with special-use attributes, paged summary fetches,
//! full fetches, flag changes and COPY/EXPUNGE based moves.
//!
//! - `server` -- TCP listener, TLS setup, and command dispatch
//! - `handlers/` -- one file per IMAP command
//! - `mailbox` -- test data model and builder
//! - `io` -- shared write helpers

// Each test binary uses a different subset.
#![allow(dead_code)]

mod io;
pub mod mailbox;
mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
