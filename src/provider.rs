//! Per-provider connection defaults
//!
//! A static lookup from a normalized provider key to the well-known
//! IMAP and SMTP endpoints of that provider. Explicit per-account
//! settings always win over these, field by field (see
//! [`crate::account`]).

/// Default endpoints for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub imap_host: &'static str,
    pub imap_port: u16,
    /// Implicit TLS for IMAP; `false` means STARTTLS.
    pub imap_tls: bool,
    pub smtp_host: &'static str,
    pub smtp_port: u16,
    /// Implicit TLS for SMTP; `false` means STARTTLS.
    pub smtp_secure: bool,
    /// Local bridges ship self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl ProviderDefaults {
    const fn hosted(imap_host: &'static str, smtp_host: &'static str, smtp_port: u16) -> Self {
        Self {
            imap_host,
            imap_port: 993,
            imap_tls: true,
            smtp_host,
            smtp_port,
            smtp_secure: smtp_port == 465,
            accept_invalid_certs: false,
        }
    }

    /// Defaults for a provider we know nothing about: the caller must
    /// supply hosts explicitly.
    pub const UNKNOWN: Self = Self::hosted("", "", 587);
}

const GMAIL: ProviderDefaults = ProviderDefaults::hosted("imap.gmail.com", "smtp.gmail.com", 465);
const OUTLOOK: ProviderDefaults =
    ProviderDefaults::hosted("outlook.office365.com", "smtp.office365.com", 587);
const YAHOO: ProviderDefaults =
    ProviderDefaults::hosted("imap.mail.yahoo.com", "smtp.mail.yahoo.com", 465);
const ICLOUD: ProviderDefaults =
    ProviderDefaults::hosted("imap.mail.me.com", "smtp.mail.me.com", 587);
const FASTMAIL: ProviderDefaults =
    ProviderDefaults::hosted("imap.fastmail.com", "smtp.fastmail.com", 465);
const ZOHO: ProviderDefaults = ProviderDefaults::hosted("imap.zoho.com", "smtp.zoho.com", 465);
const AOL: ProviderDefaults = ProviderDefaults::hosted("imap.aol.com", "smtp.aol.com", 465);
const GMX: ProviderDefaults = ProviderDefaults::hosted("imap.gmx.com", "mail.gmx.com", 587);
const PROTON_BRIDGE: ProviderDefaults = ProviderDefaults {
    imap_host: "127.0.0.1",
    imap_port: 1143,
    imap_tls: false,
    smtp_host: "127.0.0.1",
    smtp_port: 1025,
    smtp_secure: false,
    accept_invalid_certs: true,
};

/// Normalize a provider label: lowercase, ASCII alphanumerics only.
///
/// `"Office 365"`, `"office-365"` and `"OFFICE365"` all become
/// `"office365"`.
#[must_use]
pub fn normalize(provider: &str) -> String {
    provider
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Look up the defaults for a provider label.
///
/// Returns [`ProviderDefaults::UNKNOWN`] when the label is not in the
/// table.
#[must_use]
pub fn defaults_for(provider: &str) -> ProviderDefaults {
    match normalize(provider).as_str() {
        "gmail" | "google" | "googlemail" => GMAIL,
        "outlook" | "hotmail" | "live" | "office365" | "microsoft" => OUTLOOK,
        "yahoo" => YAHOO,
        "icloud" | "me" | "apple" => ICLOUD,
        "fastmail" => FASTMAIL,
        "zoho" => ZOHO,
        "aol" => AOL,
        "gmx" => GMX,
        "proton" | "protonmail" | "protonbridge" => PROTON_BRIDGE,
        _ => ProviderDefaults::UNKNOWN,
    }
}
