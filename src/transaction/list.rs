//! The in-memory list of a user's transactions, kept newest first.

use std::cmp::Ordering;

use crate::{
    table_store::RowChange,
    transaction::{Transaction, TransactionId},
};

/// A change to apply to a [TransactionList].
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionChange {
    /// A transaction was added.
    Inserted(Transaction),
    /// A transaction was modified.
    Updated(Transaction),
    /// A transaction was removed.
    Deleted(TransactionId),
    /// The whole list was fetched again, e.g. after missing changes.
    Reloaded(Vec<Transaction>),
}

impl From<RowChange> for TransactionChange {
    fn from(change: RowChange) -> Self {
        match change {
            RowChange::Insert(transaction) => TransactionChange::Inserted(transaction),
            RowChange::Update(transaction) => TransactionChange::Updated(transaction),
            RowChange::Delete { id, .. } => TransactionChange::Deleted(id),
        }
    }
}

/// Transactions sorted by date, newest first. Each ID appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionList {
    transactions: Vec<Transaction>,
}

impl TransactionList {
    /// Create a list from transactions in any order.
    pub fn new(mut transactions: Vec<Transaction>) -> Self {
        transactions.sort_by(newest_first);
        transactions.dedup_by_key(|transaction| transaction.id);

        Self { transactions }
    }

    /// Apply a single change.
    ///
    /// Inserting a transaction whose ID is already in the list replaces it.
    /// Updates for unknown IDs are treated as inserts and deletes for unknown IDs are ignored.
    pub fn apply(&mut self, change: TransactionChange) {
        match change {
            TransactionChange::Inserted(transaction) | TransactionChange::Updated(transaction) => {
                self.upsert(transaction)
            }
            TransactionChange::Deleted(id) => self.transactions.retain(|t| t.id != id),
            TransactionChange::Reloaded(transactions) => *self = Self::new(transactions),
        }
    }

    fn upsert(&mut self, transaction: Transaction) {
        if let Some(index) = self.transactions.iter().position(|t| t.id == transaction.id) {
            if self.transactions[index].date == transaction.date {
                self.transactions[index] = transaction;
                return;
            }

            self.transactions.remove(index);
        }

        let index = self
            .transactions
            .partition_point(|existing| newest_first(existing, &transaction) == Ordering::Less);
        self.transactions.insert(index, transaction);
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Later dates first, then higher IDs first, matching the table store's descending order.
fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
    b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id))
}
