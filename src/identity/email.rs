//! Email address validation for log-in and registration.

use std::{fmt::Display, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Domains of well-known mail providers that are always accepted at registration.
const KNOWN_EMAIL_DOMAINS: [&str; 36] = [
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "yahoo.com",
    "icloud.com",
    "aol.com",
    "protonmail.com",
    "mail.com",
    "zoho.com",
    "yandex.com",
    "gmx.com",
    "live.com",
    "msn.com",
    "uol.com.br",
    "bol.com.br",
    "terra.com.br",
    "globo.com",
    "ig.com.br",
    "r7.com",
    "outlook.com.br",
    "hotmail.com.br",
    "yahoo.com.br",
    "me.com",
    "mac.com",
    "fastmail.com",
    "tutanota.com",
    "pm.me",
    "office365.com",
    "googlemail.com",
    "hey.com",
    "skiff.com",
    "proton.me",
    "edu.br",
    "gov.br",
    "org.br",
    "com.br",
];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();

    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is a valid regex")
    })
}

/// An email address that has passed format validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate `raw_email` and wrap it.
    ///
    /// Surrounding whitespace is ignored and the domain is lowercased, the local part is kept as is.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidEmail] if the address is not of the form
    /// `local@domain.tld` with a top level domain of at least two letters.
    pub fn new(raw_email: &str) -> Result<Self, Error> {
        let trimmed = raw_email.trim();

        if !email_pattern().is_match(trimmed) {
            return Err(Error::InvalidEmail(trimmed.to_owned()));
        }

        let Some((local_part, domain)) = trimmed.split_once('@') else {
            return Err(Error::InvalidEmail(trimmed.to_owned()));
        };

        let has_valid_extension = domain
            .rsplit('.')
            .next()
            .is_some_and(|extension| extension.len() >= 2);

        if !domain.contains('.') || !has_valid_extension {
            return Err(Error::InvalidEmail(trimmed.to_owned()));
        }

        Ok(Self(format!("{local_part}@{}", domain.to_lowercase())))
    }

    /// Wrap an address without validating it.
    ///
    /// The caller should ensure that `email` was validated earlier, e.g. when it was stored.
    pub fn new_unchecked(email: &str) -> Self {
        Self(email.to_owned())
    }

    /// The part before the '@'.
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(&self.0, |(local, _)| local)
    }

    /// The part after the '@'.
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }

    /// Whether new accounts may be registered with this address.
    ///
    /// Addresses at a well-known provider are accepted, as are addresses at
    /// any domain with more than two labels (e.g. "empresa.com.br").
    pub fn has_accepted_domain(&self) -> bool {
        let domain = self.domain();

        KNOWN_EMAIL_DOMAINS.contains(&domain) || domain.split('.').count() > 2
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;

    use super::EmailAddress;

    #[test]
    fn accepts_well_formed_addresses() {
        for raw in [
            "maria@gmail.com",
            "joao.silva+financas@empresa.com.br",
            "a_b%c-d@sub.domain.io",
        ] {
            assert!(EmailAddress::new(raw).is_ok(), "want {raw} to be valid");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in [
            "",
            "maria",
            "maria@",
            "@gmail.com",
            "maria@gmail",
            "maria@gmail.c",
            "maria@@gmail.com",
            "maria silva@gmail.com",
        ] {
            assert_eq!(
                EmailAddress::new(raw),
                Err(Error::InvalidEmail(raw.to_owned())),
                "want {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn trims_whitespace_and_lowercases_domain() {
        let email = EmailAddress::new("  Maria@GMail.COM ").unwrap();

        assert_eq!(email.as_str(), "Maria@gmail.com");
        assert_eq!(email.local_part(), "Maria");
        assert_eq!(email.domain(), "gmail.com");
    }

    #[test]
    fn known_and_corporate_domains_are_accepted() {
        let known = EmailAddress::new("maria@uol.com.br").unwrap();
        let corporate = EmailAddress::new("maria@financeiro.empresa.com").unwrap();
        let unknown = EmailAddress::new("maria@example.com").unwrap();

        assert!(known.has_accepted_domain());
        assert!(corporate.has_accepted_domain());
        assert!(!unknown.has_accepted_domain());
    }
}
