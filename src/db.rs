//! Sets up the application's SQLite database.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{identity::create_identity_tables, transaction::create_transaction_table};

/// Create the tables for users, sessions and transactions if they do not exist yet.
///
/// # Errors
/// This function will return an error if any of the tables could not be created.
/// In that case none of the tables are created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_identity_tables(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()
}
