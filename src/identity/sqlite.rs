//! An identity provider that keeps accounts and sessions in the application's SQLite database.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Row};
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;

use crate::{
    Error,
    identity::{
        AuthEvent, AuthSession, EmailAddress, IdentityProvider, PasswordHash, Profile, SessionId,
        ValidatedPassword,
    },
    user::{User, UserID, display_name},
};

/// How many auth events a slow subscriber may fall behind before it starts missing events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Stores users and sessions with rusqlite and announces session changes on a broadcast channel.
#[derive(Debug)]
pub struct SqliteIdentityProvider {
    connection: Arc<Mutex<Connection>>,
    events: broadcast::Sender<AuthEvent>,
    hash_cost: u32,
    session_duration: Duration,
}

impl SqliteIdentityProvider {
    /// Create a provider that hashes passwords with `hash_cost` and issues
    /// sessions lasting `session_duration`.
    ///
    /// The user and session tables must already exist, see [create_identity_tables].
    pub fn new(
        connection: Arc<Mutex<Connection>>,
        hash_cost: u32,
        session_duration: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            connection,
            events,
            hash_cost,
            session_duration,
        }
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }

    fn announce(&self, event: AuthEvent) {
        // Sending only fails when nobody is listening, which is fine.
        let _ = self.events.send(event);
    }

    fn create_session(
        &self,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<AuthSession, Error> {
        let expires_at = OffsetDateTime::now_utc() + self.session_duration;

        connection.execute(
            "INSERT INTO session (user_id, expires_at) VALUES (?1, ?2)",
            (user_id.as_i64(), expires_at),
        )?;

        let session_id = SessionId::new(connection.last_insert_rowid());

        select_session(session_id, connection)?.ok_or(Error::SessionNotFound)
    }

    /// Remove `session` if it has run past its expiry, returning it otherwise.
    fn reject_expired(
        &self,
        session: AuthSession,
        connection: &Connection,
    ) -> Result<Option<AuthSession>, Error> {
        if session.expires_at > OffsetDateTime::now_utc() {
            return Ok(Some(session));
        }

        connection.execute("DELETE FROM session WHERE id = ?1", (session.id.as_i64(),))?;
        tracing::debug!("session {} expired", session.id);
        self.announce(AuthEvent::SessionExpired(session.id));

        Ok(None)
    }
}

/// Run a bcrypt hash or check on the blocking thread pool, without holding the connection.
async fn run_bcrypt<T: Send + 'static>(
    operation: impl FnOnce() -> Result<T, Error> + Send + 'static,
) -> Result<T, Error> {
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|error| Error::HashingError(error.to_string()))?
}

impl IdentityProvider for SqliteIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, Error> {
        let email = EmailAddress::new(email).map_err(|_| Error::InvalidCredentials)?;

        let (user_id, password_hash) = {
            let connection = self.lock_connection()?;
            connection
                .query_row(
                    "SELECT id, password FROM user WHERE email = ?1",
                    (email.as_str(),),
                    |row| {
                        let id: i64 = row.get(0)?;
                        let hash: String = row.get(1)?;
                        Ok((UserID::new(id), PasswordHash::new_unchecked(&hash)))
                    },
                )
                .optional()?
                .ok_or(Error::InvalidCredentials)?
        };

        let password = password.to_owned();
        let is_password_valid = run_bcrypt(move || {
            password_hash
                .verify(&password)
                .map_err(|error| Error::HashingError(error.to_string()))
        })
        .await?;

        if !is_password_valid {
            return Err(Error::InvalidCredentials);
        }

        let session = {
            let connection = self.lock_connection()?;
            self.create_session(user_id, &connection)?
        };

        self.announce(AuthEvent::SignedIn(session.clone()));

        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: Profile,
    ) -> Result<AuthSession, Error> {
        let email = EmailAddress::new(email)?;
        let password = ValidatedPassword::new(password)?;
        let hash_cost = self.hash_cost;
        let password_hash = run_bcrypt(move || PasswordHash::new(password, hash_cost)).await?;
        let name = profile.name.trim();
        let name = (!name.is_empty()).then_some(name);

        let session = {
            let connection = self.lock_connection()?;
            connection.execute(
                "INSERT INTO user (name, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (
                    name,
                    email.as_str(),
                    password_hash.as_ref(),
                    OffsetDateTime::now_utc(),
                ),
            )?;
            let user_id = UserID::new(connection.last_insert_rowid());

            self.create_session(user_id, &connection)?
        };

        tracing::info!("registered user {}", session.user.id);
        self.announce(AuthEvent::SignedIn(session.clone()));

        Ok(session)
    }

    async fn sign_out(&self, session_id: SessionId) -> Result<(), Error> {
        {
            let connection = self.lock_connection()?;
            connection.execute("DELETE FROM session WHERE id = ?1", (session_id.as_i64(),))?;
        }

        self.announce(AuthEvent::SignedOut(session_id));

        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<AuthSession>, Error> {
        let connection = self.lock_connection()?;

        match select_session(session_id, &connection)? {
            Some(session) => self.reject_expired(session, &connection),
            None => Ok(None),
        }
    }

    async fn refresh_session(
        &self,
        session_id: SessionId,
        duration: Duration,
    ) -> Result<Option<AuthSession>, Error> {
        let refreshed = {
            let connection = self.lock_connection()?;

            let Some(session) = select_session(session_id, &connection)? else {
                return Ok(None);
            };
            let Some(session) = self.reject_expired(session, &connection)? else {
                return Ok(None);
            };

            let new_expiry = OffsetDateTime::now_utc()
                .checked_add(duration)
                .ok_or_else(|| {
                    Error::InvalidDateFormat(
                        "expiry overflowed".to_owned(),
                        format!("{} + {duration}", session.expires_at),
                    )
                })?;

            if new_expiry <= session.expires_at {
                return Ok(Some(session));
            }

            connection.execute(
                "UPDATE session SET expires_at = ?1 WHERE id = ?2",
                (new_expiry, session_id.as_i64()),
            )?;

            AuthSession {
                expires_at: new_expiry,
                ..session
            }
        };

        self.announce(AuthEvent::TokenRefreshed(refreshed.clone()));

        Ok(Some(refreshed))
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Create the tables that hold users and their sessions.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_identity_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    // AUTOINCREMENT stops the IDs of deleted sessions from being handed out again.
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn select_session(
    session_id: SessionId,
    connection: &Connection,
) -> Result<Option<AuthSession>, Error> {
    connection
        .query_row(
            "SELECT session.id, session.expires_at, user.id, user.name, user.email, user.created_at
            FROM session INNER JOIN user ON user.id = session.user_id
            WHERE session.id = ?1",
            (session_id.as_i64(),),
            map_session_row,
        )
        .optional()
        .map_err(Error::from)
}

fn map_session_row(row: &Row) -> Result<AuthSession, rusqlite::Error> {
    let session_id: i64 = row.get(0)?;
    let expires_at: OffsetDateTime = row.get(1)?;
    let user_id: i64 = row.get(2)?;
    let name: Option<String> = row.get(3)?;
    let email: String = row.get(4)?;
    let created_at: OffsetDateTime = row.get(5)?;

    let email = EmailAddress::new_unchecked(&email);

    Ok(AuthSession {
        id: SessionId::new(session_id),
        expires_at,
        user: User {
            id: UserID::new(user_id),
            name: display_name(name.as_deref(), &email),
            email,
            created_at,
        },
    })
}
