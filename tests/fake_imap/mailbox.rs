//! Test data model for the fake IMAP server
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!         .email(1, false, raw_rfc2822_bytes)
//!     .special_folder("Trash", "\\Trash")
//!     .build();
//! ```
//!
//! Each email carries the system flags the adapter reads and writes,
//! plus an internal date taken from its `Date:` header.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
}

impl Mailbox {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn get_folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    /// RFC 6154 attribute announced in LIST, e.g. `\Trash`.
    pub special_use: Option<String>,
    pub emails: Vec<TestEmail>,
}

impl Folder {
    /// The UID the next appended message receives.
    pub fn next_uid(&self) -> u32 {
        self.emails.iter().map(|e| e.uid).max().map_or(1, |max| max + 1)
    }
}

#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub seen: bool,
    pub answered: bool,
    pub flagged: bool,
    pub deleted: bool,
    pub internal_date: DateTime<FixedOffset>,
    pub raw: Vec<u8>,
}

impl TestEmail {
    pub fn new(uid: u32, seen: bool, raw: &[u8]) -> Self {
        Self {
            uid,
            seen,
            answered: false,
            flagged: false,
            deleted: false,
            internal_date: date_header(raw).unwrap_or_else(|| {
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                    .unwrap()
                    .fixed_offset()
            }),
            raw: raw.to_vec(),
        }
    }

    /// Current flags as an IMAP flag list body, e.g. `\Seen \Flagged`.
    pub fn flag_list(&self) -> String {
        let mut flags = Vec::new();
        if self.seen {
            flags.push("\\Seen");
        }
        if self.answered {
            flags.push("\\Answered");
        }
        if self.flagged {
            flags.push("\\Flagged");
        }
        if self.deleted {
            flags.push("\\Deleted");
        }
        flags.join(" ")
    }

    /// The header block including the blank separator line.
    pub fn header(&self) -> &[u8] {
        self.raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map_or(&self.raw[..], |end| &self.raw[..end + 4])
    }
}

fn date_header(raw: &[u8]) -> Option<DateTime<FixedOffset>> {
    let text = std::str::from_utf8(raw).ok()?;
    text.lines()
        .take_while(|line| !line.is_empty())
        .find_map(|line| line.strip_prefix("Date:"))
        .and_then(|value| DateTime::parse_from_rfc2822(value.trim()).ok())
}

pub struct MailboxBuilder {
    folders: Vec<Folder>,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
        }
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            special_use: None,
            emails: Vec::new(),
        });
        self
    }

    /// Add a folder announced with a special-use attribute.
    pub fn special_folder(mut self, name: &str, attribute: &str) -> Self {
        self = self.folder(name);
        if let Some(folder) = self.folders.last_mut() {
            folder.special_use = Some(attribute.to_string());
        }
        self
    }

    /// Add an email to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(mut self, uid: u32, seen: bool, raw: &[u8]) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .emails
            .push(TestEmail::new(uid, seen, raw));
        self
    }

    /// Set `\Flagged` on the most recently added email.
    pub fn flagged(mut self) -> Self {
        if let Some(email) = self
            .folders
            .last_mut()
            .and_then(|f| f.emails.last_mut())
        {
            email.flagged = true;
        }
        self
    }

    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
        }
    }
}
