//! The boundary to the service that owns accounts, credentials and sessions.
//!
//! The rest of the application only talks to an [IdentityProvider]. It never
//! sees password hashes and never decides by itself whether a session is valid.

mod email;
mod password;
mod sqlite;

use std::{fmt::Display, future::Future};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;

use crate::{Error, user::User};

pub use email::EmailAddress;
pub use password::{PASSWORD_MIN_LENGTH, PasswordHash, ValidatedPassword, password_problems};
pub use sqlite::{SqliteIdentityProvider, create_identity_tables};

/// Identifies a session issued by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(i64);

impl SessionId {
    /// Create a new session ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the session ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An authenticated session and the user it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub id: SessionId,
    pub user: User,
    pub expires_at: OffsetDateTime,
}

/// Profile fields collected at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
}

/// A change in authentication state announced by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A new session was issued.
    SignedIn(AuthSession),
    /// The session was ended on request.
    SignedOut(SessionId),
    /// The session's expiry was pushed back.
    TokenRefreshed(AuthSession),
    /// The session ran past its expiry and is no longer valid.
    SessionExpired(SessionId),
}

impl AuthEvent {
    /// The session this event is about.
    pub fn session_id(&self) -> SessionId {
        match self {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => session.id,
            AuthEvent::SignedOut(id) | AuthEvent::SessionExpired(id) => *id,
        }
    }
}

/// Operations offered by an identity provider.
///
/// Implementations announce every session change on the channel returned by
/// [IdentityProvider::on_auth_state_change], so that holders of a session can
/// react without polling.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Check the credentials and issue a new session.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidCredentials] if the email is unknown or the password is wrong.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthSession, Error>> + Send;

    /// Create an account and issue a session for it.
    ///
    /// # Errors
    ///
    /// Returns [Error::DuplicateEmail] if the email is already registered,
    /// [Error::InvalidEmail] or [Error::TooWeak] if the provider rejects the input.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: Profile,
    ) -> impl Future<Output = Result<AuthSession, Error>> + Send;

    /// End a session. Ending a session that does not exist is not an error.
    fn sign_out(&self, session_id: SessionId) -> impl Future<Output = Result<(), Error>> + Send;

    /// Look up a session, `None` if it does not exist or has expired.
    fn get_session(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Option<AuthSession>, Error>> + Send;

    /// Make sure the session stays valid for at least `duration` from now.
    ///
    /// Returns `None` if the session does not exist or has already expired.
    fn refresh_session(
        &self,
        session_id: SessionId,
        duration: Duration,
    ) -> impl Future<Output = Result<Option<AuthSession>, Error>> + Send;

    /// Subscribe to authentication state changes.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}
