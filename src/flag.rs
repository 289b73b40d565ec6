//! IMAP message flags and mark operations
//!
//! [`Flag`] is the wire-level system flag. [`MarkAs`] is the
//! user-facing operation accepted by the mark path, which maps to a
//! single flag being added or removed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An IMAP system flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read (`\Seen`).
    Seen,
    /// Message has been answered (`\Answered`).
    Answered,
    /// Message is flagged for attention (`\Flagged`).
    Flagged,
    /// Message is marked for deletion (`\Deleted`).
    Deleted,
    /// Message is a draft (`\Draft`).
    Draft,
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

/// Whether a flag mutation adds or removes the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    Add,
    Remove,
}

impl FlagAction {
    /// The `UID STORE` data item for this action, without untagged
    /// FETCH replies.
    #[must_use]
    pub const fn store_item(self) -> &'static str {
        match self {
            Self::Add => "+FLAGS.SILENT",
            Self::Remove => "-FLAGS.SILENT",
        }
    }
}

/// A mark operation requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkAs {
    Read,
    Unread,
    Flagged,
    Unflagged,
}

impl MarkAs {
    /// The flag and direction this operation applies.
    #[must_use]
    pub const fn flag_change(self) -> (Flag, FlagAction) {
        match self {
            Self::Read => (Flag::Seen, FlagAction::Add),
            Self::Unread => (Flag::Seen, FlagAction::Remove),
            Self::Flagged => (Flag::Flagged, FlagAction::Add),
            Self::Unflagged => (Flag::Flagged, FlagAction::Remove),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Unread => "unread",
            Self::Flagged => "flagged",
            Self::Unflagged => "unflagged",
        }
    }
}

impl fmt::Display for MarkAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkAs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "seen" => Ok(Self::Read),
            "unread" | "unseen" => Ok(Self::Unread),
            "flagged" | "flag" | "starred" => Ok(Self::Flagged),
            "unflagged" | "unflag" | "unstarred" => Ok(Self::Unflagged),
            other => Err(Error::InvalidArgument(format!(
                "unknown mark operation '{other}' (expected read, unread, flagged or unflagged)"
            ))),
        }
    }
}
