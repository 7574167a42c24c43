//! Read, follow and append a user's transactions through the table store.
//!
//! None of these operations fail from the caller's point of view: store errors
//! are logged and turned into an empty list, a closed subscription or a dropped write.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    table_store::{SortOrder, TableStore},
    transaction::{NewTransaction, Transaction, TransactionChange},
    user::UserID,
};

/// How many changes may queue up for a subscriber before the forwarding task waits.
const SUBSCRIPTION_BUFFER: usize = 64;

/// Accesses the transactions stored in a [TableStore].
#[derive(Debug)]
pub struct TransactionStore<S: TableStore> {
    store: Arc<S>,
}

impl<S: TableStore> Clone for TransactionStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: TableStore> TransactionStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get all of `owner`'s transactions, newest first.
    ///
    /// Returns an empty list if the transactions could not be loaded.
    pub async fn load(&self, owner: UserID) -> Vec<Transaction> {
        load_transactions(self.store.as_ref(), owner).await
    }

    /// Follow changes to `owner`'s transactions.
    ///
    /// Changes arrive in the order the store made them. If the subscription
    /// falls behind the store, it sends the reloaded list instead of the missed changes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, owner: UserID) -> Subscription {
        let mut feed = self.store.subscribe(owner);
        let store = self.store.clone();
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let task = tokio::spawn(async move {
            while let Some(change) = feed.next().await {
                let change = match change {
                    Ok(change) => TransactionChange::from(change),
                    Err(skipped) => {
                        tracing::warn!(
                            "missed {skipped} changes to the transactions of user {owner}, reloading"
                        );
                        TransactionChange::Reloaded(load_transactions(store.as_ref(), owner).await)
                    }
                };

                if sender.send(change).await.is_err() {
                    break;
                }
            }

            tracing::debug!("stopped following the transactions of user {owner}");
        });

        Subscription { receiver, task }
    }

    /// Store a new transaction for `owner` without waiting for the result.
    ///
    /// The transaction shows up through [TransactionStore::subscribe] once it
    /// has been stored. If it could not be stored, the error is logged and the
    /// transaction is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn append(&self, owner: UserID, transaction: NewTransaction) {
        let store = self.store.clone();

        tokio::spawn(async move {
            match store.insert(owner, transaction).await {
                Ok(transaction) => {
                    tracing::debug!("stored transaction {} for user {owner}", transaction.id)
                }
                Err(error) => {
                    tracing::error!("could not store transaction for user {owner}: {error}")
                }
            }
        });
    }
}

async fn load_transactions<S: TableStore>(store: &S, owner: UserID) -> Vec<Transaction> {
    store
        .select(owner, SortOrder::Descending)
        .await
        .inspect_err(|error| {
            tracing::error!("could not load the transactions of user {owner}: {error}")
        })
        .unwrap_or_default()
}

/// A live stream of changes to a user's transactions.
///
/// Dropping the subscription stops the stream.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<TransactionChange>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wait for the next change, `None` once the stream has stopped.
    pub async fn recv(&mut self) -> Option<TransactionChange> {
        self.receiver.recv().await
    }

    /// Stop the stream.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
