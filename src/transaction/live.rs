//! Keeps an in-memory copy of a user's transactions up to date with the table store.

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    table_store::TableStore,
    transaction::{TransactionList, TransactionStore},
    user::UserID,
};

/// A snapshot of the live transaction list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSnapshot {
    /// The user's transactions, newest first.
    pub transactions: TransactionList,
    /// Whether the initial load has not finished yet.
    pub is_loading: bool,
}

/// The transactions of one user, following every change made in the table store.
///
/// A background task owns the list: it subscribes to changes, loads the
/// current transactions and then applies each change in order. Readers get
/// snapshots through [LiveTransactions::snapshot] or [LiveTransactions::watch].
#[derive(Debug)]
pub struct LiveTransactions {
    owner: UserID,
    snapshots: watch::Receiver<LiveSnapshot>,
    task: JoinHandle<()>,
}

impl LiveTransactions {
    /// Start following `owner`'s transactions.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S: TableStore>(store: TransactionStore<S>, owner: UserID) -> Self {
        let (sender, snapshots) = watch::channel(LiveSnapshot {
            transactions: TransactionList::default(),
            is_loading: true,
        });

        // Subscribe before loading so no change made during the load is missed.
        let mut subscription = store.subscribe(owner);

        let task = tokio::spawn(async move {
            let transactions = TransactionList::new(store.load(owner).await);
            sender.send_replace(LiveSnapshot {
                transactions,
                is_loading: false,
            });

            while let Some(change) = subscription.recv().await {
                sender.send_modify(|snapshot| snapshot.transactions.apply(change));
            }
        });

        Self {
            owner,
            snapshots,
            task,
        }
    }

    /// The user whose transactions are followed.
    pub fn owner(&self) -> UserID {
        self.owner
    }

    /// The current state of the list.
    pub fn snapshot(&self) -> LiveSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch the list for changes.
    pub fn watch(&self) -> watch::Receiver<LiveSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the initial load to finish and return the list.
    pub async fn loaded(&self) -> LiveSnapshot {
        let mut snapshots = self.snapshots.clone();

        match snapshots.wait_for(|snapshot| !snapshot.is_loading).await {
            Ok(snapshot) => snapshot.clone(),
            // The task only stops early if it was aborted, serve what we have.
            Err(_) => self.snapshot(),
        }
    }
}

impl Drop for LiveTransactions {
    fn drop(&mut self) {
        self.task.abort();
    }
}
