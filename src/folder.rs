//! Remote folder types
//!
//! Folders are identified by their raw IMAP name. Special-use
//! attributes (RFC 6154) tag a folder's purpose independently of its
//! name, which is how the trash folder is discovered.

use async_imap::types::NameAttribute;
use serde::Serialize;
use std::fmt;

/// The purpose of a folder as announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialUse {
    All,
    Archive,
    Drafts,
    Flagged,
    Junk,
    Sent,
    Trash,
}

impl SpecialUse {
    /// The purpose announced by one parsed LIST attribute. Attributes
    /// the parser does not know arrive as extensions and are matched by
    /// name.
    #[must_use]
    pub fn from_name_attribute(attr: &NameAttribute<'_>) -> Option<Self> {
        match attr {
            NameAttribute::All => Some(Self::All),
            NameAttribute::Archive => Some(Self::Archive),
            NameAttribute::Drafts => Some(Self::Drafts),
            NameAttribute::Flagged => Some(Self::Flagged),
            NameAttribute::Junk => Some(Self::Junk),
            NameAttribute::Sent => Some(Self::Sent),
            NameAttribute::Trash => Some(Self::Trash),
            NameAttribute::Extension(name) => Self::from_attribute(name),
            _ => None,
        }
    }

    /// Parse a raw attribute such as `\Trash`, case-insensitively.
    #[must_use]
    pub fn from_attribute(attr: &str) -> Option<Self> {
        let lower = attr.to_ascii_lowercase();
        match lower.strip_prefix('\\')? {
            "all" => Some(Self::All),
            "archive" => Some(Self::Archive),
            "drafts" => Some(Self::Drafts),
            "flagged" => Some(Self::Flagged),
            "junk" => Some(Self::Junk),
            "sent" => Some(Self::Sent),
            "trash" => Some(Self::Trash),
            _ => None,
        }
    }

    /// The IMAP attribute for this purpose.
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::All => "\\All",
            Self::Archive => "\\Archive",
            Self::Drafts => "\\Drafts",
            Self::Flagged => "\\Flagged",
            Self::Junk => "\\Junk",
            Self::Sent => "\\Sent",
            Self::Trash => "\\Trash",
        }
    }
}

impl fmt::Display for SpecialUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

/// A folder as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFolder {
    pub name: String,
    pub delimiter: Option<String>,
    pub special_use: Option<SpecialUse>,
}

impl RemoteFolder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiter: None,
            special_use: None,
        }
    }

    #[must_use]
    pub const fn with_special_use(mut self, special_use: SpecialUse) -> Self {
        self.special_use = Some(special_use);
        self
    }
}

/// Well-known alternate trash names, tried after the preferred name.
pub const TRASH_ALTERNATES: &[&str] = &["Deleted Items", "Deleted Messages", "[Gmail]/Trash", "Bin"];

/// Pick the trash folder from a folder listing.
///
/// Order of preference: a folder carrying the `\Trash` special-use
/// attribute, a case-insensitive match on `preferred`, a well-known
/// alternate name, and finally `preferred` verbatim even if it does
/// not exist, so a later move fails loudly.
#[must_use]
pub fn pick_trash(folders: &[RemoteFolder], preferred: &str) -> String {
    if let Some(f) = folders
        .iter()
        .find(|f| f.special_use == Some(SpecialUse::Trash))
    {
        return f.name.clone();
    }
    if let Some(f) = folders
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(preferred))
    {
        return f.name.clone();
    }
    for alt in TRASH_ALTERNATES {
        if let Some(f) = folders.iter().find(|f| f.name.eq_ignore_ascii_case(alt)) {
            return f.name.clone();
        }
    }
    preferred.to_string()
}
