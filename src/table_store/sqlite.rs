//! A table store that keeps transactions in the application's SQLite database.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::{
    Error,
    table_store::{ChangeFeed, RowChange, SortOrder, TableStore},
    transaction::{
        NewTransaction, TRANSACTION_COLUMNS, Transaction, TransactionId, map_transaction_row,
    },
    user::UserID,
};

/// How many row changes a slow subscriber may fall behind before it starts missing changes.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Stores transactions with rusqlite and announces row changes on a broadcast channel.
#[derive(Debug, Clone)]
pub struct SqliteTableStore {
    connection: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<RowChange>,
}

impl SqliteTableStore {
    /// Create a store backed by `connection`.
    ///
    /// The transaction table must already exist, see [crate::db::initialize].
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Self {
            connection,
            changes,
        }
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }

    fn announce(&self, change: RowChange) {
        // Sending only fails when nobody is listening.
        let _ = self.changes.send(change);
    }

    /// Overwrite the stored transaction with the same ID.
    ///
    /// Not offered to users, it stands in for changes made by other clients of the store.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if no transaction with that ID belongs to the transaction's owner,
    /// - or [Error::SqlError] if there is some other SQL error.
    pub fn update(&self, transaction: Transaction) -> Result<Transaction, Error> {
        let updated = {
            let connection = self.lock_connection()?;
            connection
                .prepare(&format!(
                    "UPDATE \"transaction\"
                     SET description = ?1, amount = ?2, type = ?3, category = ?4, date = ?5
                     WHERE id = ?6 AND user_id = ?7
                     RETURNING {TRANSACTION_COLUMNS}"
                ))?
                .query_row(
                    (
                        &transaction.description,
                        transaction.amount,
                        transaction.kind,
                        &transaction.category,
                        transaction.date,
                        transaction.id,
                        transaction.owner.as_i64(),
                    ),
                    map_transaction_row,
                )?
        };

        self.announce(RowChange::Update(updated.clone()));

        Ok(updated)
    }

    /// Remove one of `owner`'s transactions.
    ///
    /// Not offered to users, it stands in for changes made by other clients of the store.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if no transaction with that ID belongs to `owner`,
    /// - or [Error::SqlError] if there is some other SQL error.
    pub fn delete(&self, id: TransactionId, owner: UserID) -> Result<(), Error> {
        let rows_affected = {
            let connection = self.lock_connection()?;
            connection.execute(
                "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
                (id, owner.as_i64()),
            )?
        };

        if rows_affected == 0 {
            return Err(Error::NotFound);
        }

        self.announce(RowChange::Delete { id, owner });

        Ok(())
    }
}

impl TableStore for SqliteTableStore {
    async fn select(&self, owner: UserID, order: SortOrder) -> Result<Vec<Transaction>, Error> {
        // Sort by ID after date so transactions on the same day keep a stable order.
        let order_clause = match order {
            SortOrder::Ascending => "ORDER BY date ASC, id ASC",
            SortOrder::Descending => "ORDER BY date DESC, id DESC",
        };

        let connection = self.lock_connection()?;

        connection
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE user_id = ?1 {order_clause}"
            ))?
            .query_map((owner.as_i64(),), map_transaction_row)?
            .map(|transaction_result| transaction_result.map_err(Error::SqlError))
            .collect()
    }

    async fn insert(
        &self,
        owner: UserID,
        transaction: NewTransaction,
    ) -> Result<Transaction, Error> {
        let transaction = transaction.validated()?;

        let inserted = {
            let connection = self.lock_connection()?;
            connection
                .prepare(&format!(
                    "INSERT INTO \"transaction\"
                     (user_id, description, amount, type, category, date, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     RETURNING {TRANSACTION_COLUMNS}"
                ))?
                .query_row(
                    (
                        owner.as_i64(),
                        transaction.description.trim(),
                        transaction.amount,
                        transaction.kind,
                        &transaction.category,
                        transaction.date,
                        OffsetDateTime::now_utc(),
                    ),
                    map_transaction_row,
                )?
        };

        self.announce(RowChange::Insert(inserted.clone()));

        Ok(inserted)
    }

    fn subscribe(&self, owner: UserID) -> ChangeFeed {
        ChangeFeed::new(owner, self.changes.subscribe())
    }
}
