//! Per-session state for logged in browsers.
//!
//! A [Workspace] pairs the [SessionHolder] of one browser session with the
//! [LiveTransactions] of its user. [Workspaces] keeps them by session ID so
//! that every request made with the same session cookie sees the same state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::{
    identity::{IdentityProvider, SessionId, SqliteIdentityProvider},
    session::SessionHolder,
    table_store::{SqliteTableStore, TableStore},
    transaction::{LiveTransactions, NewTransaction, TransactionStore},
    user::User,
};

/// How often the server closes workspaces of sessions that have run out.
pub const WORKSPACE_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// The workspace type used by the server.
pub type AppWorkspace = Workspace<SqliteIdentityProvider, SqliteTableStore>;

/// The identity and live transactions of one logged in browser session.
pub struct Workspace<P: IdentityProvider, S: TableStore> {
    holder: SessionHolder<P>,
    transactions: TransactionStore<S>,
    live: LiveTransactions,
}

impl<P: IdentityProvider, S: TableStore> Workspace<P, S> {
    /// Start following the transactions of the user logged in with `holder`.
    ///
    /// Returns `None` if `holder` is not authenticated.
    pub fn open(holder: SessionHolder<P>, transactions: TransactionStore<S>) -> Option<Self> {
        let user = holder.current_user()?;
        let live = LiveTransactions::start(transactions.clone(), user.id);

        Some(Self {
            holder,
            transactions,
            live,
        })
    }

    pub fn holder(&self) -> &SessionHolder<P> {
        &self.holder
    }

    /// The logged in user, `None` once the session has ended.
    pub fn user(&self) -> Option<User> {
        self.holder.current_user()
    }

    pub fn live(&self) -> &LiveTransactions {
        &self.live
    }

    /// Store a transaction for the workspace's user without waiting for the result.
    ///
    /// The transaction shows up in [Workspace::live] once it has been stored.
    pub fn append(&self, transaction: NewTransaction) {
        self.transactions.append(self.live.owner(), transaction);
    }
}

/// The open workspaces, keyed by session ID.
pub struct Workspaces<P: IdentityProvider, S: TableStore> {
    workspaces: Mutex<HashMap<SessionId, Arc<Workspace<P, S>>>>,
}

impl<P: IdentityProvider, S: TableStore> Default for Workspaces<P, S> {
    fn default() -> Self {
        Self {
            workspaces: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: IdentityProvider, S: TableStore> Workspaces<P, S> {
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Workspace<P, S>>>> {
        // The map stays consistent even if a holder of the lock panicked.
        self.workspaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the workspace for `session_id`.
    ///
    /// A workspace whose session has ended is removed and `None` is returned.
    pub fn get(&self, session_id: SessionId) -> Option<Arc<Workspace<P, S>>> {
        let mut workspaces = self.lock();
        let workspace = workspaces.get(&session_id)?;

        if workspace.holder.is_authenticated() {
            return Some(workspace.clone());
        }

        tracing::debug!("closing workspace for ended session {session_id}");
        workspaces.remove(&session_id);
        None
    }

    /// Add a workspace, replacing any workspace for the same session.
    pub fn insert(&self, session_id: SessionId, workspace: Workspace<P, S>) -> Arc<Workspace<P, S>> {
        let workspace = Arc::new(workspace);
        self.lock().insert(session_id, workspace.clone());
        workspace
    }

    /// Close the workspace for `session_id`.
    pub fn remove(&self, session_id: SessionId) -> Option<Arc<Workspace<P, S>>> {
        self.lock().remove(&session_id)
    }

    /// Close every workspace whose session has ended or runs out before `now`.
    ///
    /// Returns the number of workspaces closed.
    pub fn prune(&self, now: OffsetDateTime) -> usize {
        let mut workspaces = self.lock();
        let count_before = workspaces.len();

        workspaces.retain(|session_id, workspace| {
            let is_open = workspace
                .holder
                .expires_at()
                .is_some_and(|expires_at| expires_at > now);

            if !is_open {
                tracing::debug!("closing workspace for ended session {session_id}");
            }

            is_open
        });

        count_before - workspaces.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Get the workspace for `session_id`, reopening it from the identity provider if needed.
    ///
    /// Returns `None` if the session does not exist or has expired.
    pub async fn resolve(
        &self,
        session_id: SessionId,
        provider: &Arc<P>,
        transactions: &TransactionStore<S>,
    ) -> Option<Arc<Workspace<P, S>>> {
        if let Some(workspace) = self.get(session_id) {
            return Some(workspace);
        }

        let holder = SessionHolder::restore(provider.clone(), session_id).await;
        let workspace = Workspace::open(holder, transactions.clone())?;

        // Another request may have reopened the same session in the meantime.
        let mut workspaces = self.lock();
        let workspace = workspaces
            .entry(session_id)
            .or_insert_with(|| Arc::new(workspace))
            .clone();

        Some(workspace)
    }
}

impl<P: IdentityProvider + 'static, S: TableStore + 'static> Workspaces<P, S> {
    /// Prune the workspaces every `period` for as long as the returned task runs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_pruning(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let closed = self.prune(OffsetDateTime::now_utc());
                if closed > 0 {
                    tracing::info!("closed {closed} workspaces of ended sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime, macros::date};

    use crate::{
        db::initialize,
        identity::{IdentityProvider, Profile, SessionId, SqliteIdentityProvider},
        session::SessionHolder,
        table_store::SqliteTableStore,
        transaction::{Transaction, TransactionStore, TransactionType},
    };

    use super::{Workspace, Workspaces};

    struct Fixture {
        provider: Arc<SqliteIdentityProvider>,
        transactions: TransactionStore<SqliteTableStore>,
    }

    fn get_fixture() -> Fixture {
        get_fixture_with_session_duration(Duration::minutes(5))
    }

    fn get_fixture_with_session_duration(session_duration: Duration) -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let connection = Arc::new(Mutex::new(connection));

        Fixture {
            provider: Arc::new(SqliteIdentityProvider::new(
                connection.clone(),
                4,
                session_duration,
            )),
            transactions: TransactionStore::new(Arc::new(SqliteTableStore::new(connection))),
        }
    }

    async fn sign_up(fixture: &Fixture) -> SessionId {
        fixture
            .provider
            .sign_up(
                "maria@gmail.com",
                "Senha#Forte1",
                Profile {
                    name: "Maria".to_owned(),
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn open_requires_authenticated_holder() {
        let fixture = get_fixture();
        let holder = SessionHolder::new(fixture.provider.clone());

        assert!(Workspace::open(holder, fixture.transactions.clone()).is_none());
    }

    #[tokio::test]
    async fn resolve_restores_existing_session() {
        let fixture = get_fixture();
        let session_id = sign_up(&fixture).await;
        let workspaces = Workspaces::default();

        let workspace = workspaces
            .resolve(session_id, &fixture.provider, &fixture.transactions)
            .await
            .expect("want workspace for existing session");

        assert_eq!(workspace.user().unwrap().name, "Maria");
        assert_eq!(workspaces.len(), 1);

        let again = workspaces
            .resolve(session_id, &fixture.provider, &fixture.transactions)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&workspace, &again));
    }

    #[tokio::test]
    async fn resolve_unknown_session_is_none() {
        let fixture = get_fixture();
        let workspaces = Workspaces::default();

        let workspace = workspaces
            .resolve(SessionId::new(42), &fixture.provider, &fixture.transactions)
            .await;

        assert!(workspace.is_none());
        assert!(workspaces.is_empty());
    }

    #[tokio::test]
    async fn appended_transactions_show_up_in_live_list() {
        let fixture = get_fixture();
        let session_id = sign_up(&fixture).await;
        let workspaces = Workspaces::default();
        let workspace = workspaces
            .resolve(session_id, &fixture.provider, &fixture.transactions)
            .await
            .unwrap();
        workspace.live().loaded().await;
        let mut snapshots = workspace.live().watch();

        workspace.append(Transaction::build(
            100.0,
            TransactionType::Income,
            date!(2024 - 01 - 15),
            "Salário",
        ));

        let snapshot = snapshots
            .wait_for(|snapshot| !snapshot.transactions.is_empty())
            .await
            .unwrap();
        assert_eq!(snapshot.transactions.as_slice()[0].description, "Salário");
    }

    #[tokio::test]
    async fn get_drops_workspace_after_logout() {
        let fixture = get_fixture();
        let session_id = sign_up(&fixture).await;
        let workspaces = Workspaces::default();
        let workspace = workspaces
            .resolve(session_id, &fixture.provider, &fixture.transactions)
            .await
            .unwrap();

        workspace.holder().logout().await;

        assert!(workspaces.get(session_id).is_none());
        assert!(workspaces.is_empty());
    }

    #[tokio::test]
    async fn prune_closes_expired_sessions_only() {
        let fixture = get_fixture();
        let session_id = sign_up(&fixture).await;
        let workspaces = Workspaces::default();
        workspaces
            .resolve(session_id, &fixture.provider, &fixture.transactions)
            .await
            .unwrap();

        assert_eq!(workspaces.prune(OffsetDateTime::now_utc()), 0);
        assert_eq!(workspaces.len(), 1);

        let later = OffsetDateTime::now_utc() + Duration::minutes(10);
        assert_eq!(workspaces.prune(later), 1);
        assert!(workspaces.is_empty());
    }

    #[tokio::test]
    async fn prune_closes_logged_out_sessions() {
        let fixture = get_fixture();
        let session_id = sign_up(&fixture).await;
        let workspaces = Workspaces::default();
        let workspace = workspaces
            .resolve(session_id, &fixture.provider, &fixture.transactions)
            .await
            .unwrap();

        workspace.holder().logout().await;

        assert_eq!(workspaces.prune(OffsetDateTime::now_utc()), 1);
        assert!(workspaces.is_empty());
    }

    #[tokio::test]
    async fn pruning_task_closes_sessions_that_are_never_revisited() {
        let fixture = get_fixture_with_session_duration(Duration::milliseconds(50));
        let session_id = sign_up(&fixture).await;
        let workspaces = Arc::new(Workspaces::default());
        workspaces
            .resolve(session_id, &fixture.provider, &fixture.transactions)
            .await
            .unwrap();
        assert_eq!(workspaces.len(), 1);

        let pruning = workspaces
            .clone()
            .spawn_pruning(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        pruning.abort();

        assert!(workspaces.is_empty());
    }
}
