//! Defines the core data models and table schema for transactions.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Error, transaction::Category, user::UserID};

/// The largest amount a single transaction can have, in reais.
pub const MAX_TRANSACTION_AMOUNT: f64 = 1_000_000_000.0;

// ============================================================================
// MODELS
// ============================================================================

/// Alias for the integer type the table store uses for transaction IDs.
pub type TransactionId = i64;

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// The key the type is stored under.
    pub fn key(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// The Portuguese name shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Income => "Receita",
            TransactionType::Expense => "Despesa",
        }
    }

    /// The amount with the sign implied by the type, negative for expenses.
    pub fn signed(&self, amount: f64) -> f64 {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.key()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID the table store assigned to the transaction.
    pub id: TransactionId,
    /// The user that recorded the transaction.
    pub owner: UserID,
    /// A text description of what the transaction was for.
    pub description: String,
    /// How much money was spent or earned, never negative.
    pub amount: f64,
    /// Whether the money was spent or earned.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// What the money was spent on or where it came from.
    pub category: Category,
    /// When the transaction happened.
    pub date: Date,
    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [NewTransaction] for discoverability.
    pub fn build(
        amount: f64,
        kind: TransactionType,
        date: Date,
        description: &str,
    ) -> NewTransaction {
        NewTransaction {
            amount,
            kind,
            date,
            description: description.to_owned(),
            category: Category::Other,
        }
    }

    /// The amount with the sign implied by the transaction type.
    pub fn signed_amount(&self) -> f64 {
        self.kind.signed(self.amount)
    }
}

/// Format `date` the way dates are written in Brazil, e.g. "15/01/2025".
pub fn format_date_pt_br(date: Date) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        date.day(),
        u8::from(date.month()),
        date.year()
    )
}

/// A transaction that has not been stored yet.
///
/// The table store assigns the ID, owner and creation time when the transaction is inserted.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// use crate::transaction::{Category, Transaction, TransactionType};
///
/// let groceries = Transaction::build(45.99, TransactionType::Expense, date!(2025-01-15), "Mercado")
///     .category(Category::Food)
///     .validated()
///     .unwrap();
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct NewTransaction {
    /// How much money was spent or earned.
    ///
    /// Amounts are never negative, see [NewTransaction::kind] for the direction.
    pub amount: f64,

    /// Whether the money was spent or earned.
    pub kind: TransactionType,

    /// The date when the transaction occurred.
    ///
    /// This is the accounting date entered by the user, not the time the
    /// transaction was recorded.
    pub date: Date,

    /// A human-readable description of the transaction, e.g. "Aluguel" or "Mercado".
    pub description: String,

    /// What the money was spent on. Defaults to [Category::Other].
    pub category: Category,
}

impl NewTransaction {
    /// Set the category for the transaction.
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Check the transaction can be stored.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidAmount] if the amount is negative, NaN or larger than
    ///   [MAX_TRANSACTION_AMOUNT],
    /// - or [Error::EmptyDescription] if the description is blank.
    pub fn validated(self) -> Result<Self, Error> {
        if !(0.0..=MAX_TRANSACTION_AMOUNT).contains(&self.amount) {
            return Err(Error::InvalidAmount(self.amount.to_string()));
        }

        if self.description.trim().is_empty() {
            return Err(Error::EmptyDescription);
        }

        Ok(self)
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Composite index used by the per-user, date ordered listing.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

/// The columns selected by queries that are mapped with [map_transaction_row].
pub const TRANSACTION_COLUMNS: &str =
    "id, user_id, description, amount, type, category, date, created_at";

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let owner: i64 = row.get(1)?;
    let description = row.get(2)?;
    let amount = row.get(3)?;
    let kind = row.get(4)?;
    let category = row.get(5)?;
    let date = row.get(6)?;
    let created_at = row.get(7)?;

    Ok(Transaction {
        id,
        owner: UserID::new(owner),
        description,
        amount,
        kind,
        category,
        date,
        created_at,
    })
}

// ============================================================================
// TESTS
// ============================================================================
