use std::sync::Arc;

use rusqlite::Connection;

use crate::{
    AppState,
    identity::{IdentityProvider, Profile},
    transaction::NewTransaction,
    workspace::AppWorkspace,
};

pub(crate) const TEST_USER_NAME: &str = "Maria";

/// Register a test user and open their workspace.
pub(crate) async fn get_test_workspace(state: &AppState) -> Arc<AppWorkspace> {
    let session = state
        .identity
        .sign_up(
            "maria@gmail.com",
            "Senha#Forte1",
            Profile {
                name: TEST_USER_NAME.to_owned(),
            },
        )
        .await
        .expect("Could not create test user");

    state
        .workspaces
        .resolve(session.id, &state.identity, &state.transactions)
        .await
        .expect("Could not open test workspace")
}

/// An app state backed by an in-memory database, with a low bcrypt cost.
pub(crate) fn get_test_app_state() -> AppState {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");

    AppState::with_hash_cost(connection, "foobar", "Etc/UTC", 4)
        .expect("Could not create test app state")
}

/// Append `transactions` and wait until the live list has all of them.
pub(crate) async fn append_and_wait(workspace: &AppWorkspace, transactions: Vec<NewTransaction>) {
    workspace.live().loaded().await;
    let want_len = workspace.live().snapshot().transactions.len() + transactions.len();
    let mut snapshots = workspace.live().watch();

    for transaction in transactions {
        workspace.append(transaction);
    }

    snapshots
        .wait_for(|snapshot| snapshot.transactions.len() == want_len)
        .await
        .expect("Live transactions stopped before the appends arrived");
}
