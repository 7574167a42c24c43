//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;
use tokio::task::JoinHandle;

use crate::{
    Error,
    auth::DEFAULT_COOKIE_DURATION,
    db::initialize,
    identity::{PasswordHash, SqliteIdentityProvider},
    table_store::SqliteTableStore,
    timezone::get_local_offset,
    transaction::TransactionStore,
    workspace::{WORKSPACE_PRUNE_INTERVAL, Workspaces},
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,

    pub(crate) identity: Arc<SqliteIdentityProvider>,

    pub(crate) transactions: TransactionStore<SqliteTableStore>,

    pub(crate) workspaces: Arc<Workspaces<SqliteIdentityProvider, SqliteTableStore>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "America/Sao_Paulo".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is not known.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        Self::with_hash_cost(
            db_connection,
            cookie_secret,
            local_timezone,
            PasswordHash::DEFAULT_COST,
        )
    }

    /// Same as [AppState::new] with a custom bcrypt cost for new password hashes.
    pub(crate) fn with_hash_cost(
        db_connection: Connection,
        cookie_secret: &str,
        local_timezone: &str,
        hash_cost: u32,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            identity: Arc::new(SqliteIdentityProvider::new(
                connection.clone(),
                hash_cost,
                DEFAULT_COOKIE_DURATION,
            )),
            transactions: TransactionStore::new(Arc::new(SqliteTableStore::new(connection))),
            workspaces: Arc::new(Workspaces::default()),
        })
    }
}

impl AppState {
    /// Periodically close the workspaces of sessions that have ended or run out.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_workspace_pruning(&self) -> JoinHandle<()> {
        self.workspaces
            .clone()
            .spawn_pruning(WORKSPACE_PRUNE_INTERVAL)
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
