//! The user profile as seen by the rest of the application.
//!
//! Credential material never appears here, it stays inside the identity provider.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::identity::EmailAddress;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID, assigned by the identity provider.
    pub id: UserID,
    /// The name shown in the UI.
    pub name: String,
    /// The address the user logs in with.
    pub email: EmailAddress,
    /// When the account was created.
    pub created_at: OffsetDateTime,
}

/// Pick the name to display for a user.
///
/// Falls back to the part of the email address before the '@' when the
/// provider has no name on record.
pub fn display_name(name: Option<&str>, email: &EmailAddress) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => email.local_part().to_owned(),
    }
}
