//! Dashboard module
//!
//! Provides an overview page with summary cards, monthly charts and the
//! latest transactions.

mod aggregation;
mod cards;
mod charts;
mod handlers;

pub use handlers::get_dashboard_page;
