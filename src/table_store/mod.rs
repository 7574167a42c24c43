//! The boundary to the table store that holds transaction records.
//!
//! Besides plain reads and writes, a [TableStore] pushes row changes to
//! subscribers so that open pages can follow changes made elsewhere.

mod sqlite;

use std::future::Future;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    Error,
    transaction::{NewTransaction, Transaction, TransactionId},
    user::UserID,
};

pub use sqlite::SqliteTableStore;

/// The order to sort transactions by date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// A change to a single row of the transaction table.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    Insert(Transaction),
    Update(Transaction),
    Delete { id: TransactionId, owner: UserID },
}

impl RowChange {
    /// The user that owns the changed row.
    pub fn owner(&self) -> UserID {
        match self {
            RowChange::Insert(transaction) | RowChange::Update(transaction) => transaction.owner,
            RowChange::Delete { owner, .. } => *owner,
        }
    }
}

/// A stream of row changes for one user, in the order the store made them.
#[derive(Debug)]
pub struct ChangeFeed {
    owner: UserID,
    receiver: broadcast::Receiver<RowChange>,
}

impl ChangeFeed {
    /// Filter `receiver` down to the changes to rows owned by `owner`.
    pub fn new(owner: UserID, receiver: broadcast::Receiver<RowChange>) -> Self {
        Self { owner, receiver }
    }

    /// Wait for the next change.
    ///
    /// Returns `None` once the store has shut down, and `Some(Err(n))` if the
    /// feed fell behind and `n` changes were dropped.
    pub async fn next(&mut self) -> Option<Result<RowChange, u64>> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.owner() == self.owner => return Some(Ok(change)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(Err(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Operations offered by the table store.
pub trait TableStore: Send + Sync + 'static {
    /// Get all of `owner`'s transactions sorted by date.
    fn select(
        &self,
        owner: UserID,
        order: SortOrder,
    ) -> impl Future<Output = Result<Vec<Transaction>, Error>> + Send;

    /// Store a new transaction for `owner`, the store assigns the ID.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] or [Error::EmptyDescription] if the
    /// transaction is rejected, or a store error if it could not be written.
    fn insert(
        &self,
        owner: UserID,
        transaction: NewTransaction,
    ) -> impl Future<Output = Result<Transaction, Error>> + Send;

    /// Subscribe to changes to `owner`'s transactions.
    fn subscribe(&self, owner: UserID) -> ChangeFeed;
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, macros::date};
    use tokio::sync::broadcast;

    use crate::{
        transaction::{Category, Transaction, TransactionType},
        user::UserID,
    };

    use super::{ChangeFeed, RowChange};

    fn transaction(id: i64, owner: i64) -> Transaction {
        Transaction {
            id,
            owner: UserID::new(owner),
            description: "Mercado".to_owned(),
            amount: 10.0,
            kind: TransactionType::Expense,
            category: Category::Food,
            date: date!(2025 - 01 - 15),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn feed_skips_changes_for_other_owners() {
        let (sender, receiver) = broadcast::channel(8);
        let mut feed = ChangeFeed::new(UserID::new(1), receiver);

        sender.send(RowChange::Insert(transaction(1, 2))).unwrap();
        sender.send(RowChange::Insert(transaction(2, 1))).unwrap();
        sender
            .send(RowChange::Delete {
                id: 1,
                owner: UserID::new(2),
            })
            .unwrap();
        sender
            .send(RowChange::Delete {
                id: 2,
                owner: UserID::new(1),
            })
            .unwrap();
        drop(sender);

        assert_eq!(
            feed.next().await,
            Some(Ok(RowChange::Insert(transaction(2, 1))))
        );
        assert_eq!(
            feed.next().await,
            Some(Ok(RowChange::Delete {
                id: 2,
                owner: UserID::new(1)
            }))
        );
        assert_eq!(feed.next().await, None);
    }

    #[tokio::test]
    async fn feed_reports_lag() {
        let (sender, receiver) = broadcast::channel(1);
        let mut feed = ChangeFeed::new(UserID::new(1), receiver);

        sender.send(RowChange::Insert(transaction(1, 1))).unwrap();
        sender.send(RowChange::Insert(transaction(2, 1))).unwrap();

        assert_eq!(feed.next().await, Some(Err(1)));
        assert_eq!(
            feed.next().await,
            Some(Ok(RowChange::Insert(transaction(2, 1))))
        );
    }
}
