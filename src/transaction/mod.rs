//! Transactions and everything needed to record, follow and list them.
//!
//! - [Transaction], [Category] and [TransactionType]: the record and its lookup tables
//! - [TransactionStore]: load, follow and append a user's transactions
//! - [LiveTransactions]: the in-memory list that follows the store
//! - Route handlers for the transaction pages and the create endpoint

mod category;
mod core;
mod create_endpoint;
mod create_page;
pub mod filter;
mod list;
mod live;
mod store;
mod transactions_page;

pub use category::Category;
pub use core::{
    MAX_TRANSACTION_AMOUNT, NewTransaction, TRANSACTION_COLUMNS, Transaction, TransactionId, TransactionType,
    create_transaction_table, format_date_pt_br, map_transaction_row,
};
pub use create_endpoint::create_transaction_endpoint;
pub use create_page::get_create_transaction_page;
pub use list::{TransactionChange, TransactionList};
pub use live::LiveTransactions;
pub use store::TransactionStore;
pub use transactions_page::get_transactions_page;
pub(crate) use transactions_page::transactions_table;
