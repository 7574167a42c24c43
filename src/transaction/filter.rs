//! Narrowing down the transaction table by description, category and type.

use serde::Deserialize;

use crate::transaction::{Category, Transaction, TransactionType};

/// The query string value meaning "do not filter on this field".
pub const ALL: &str = "all";

/// Filter settings taken from the transactions page query string.
///
/// Missing, empty and "all" values leave the corresponding field unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransactionFilter {
    /// Text to look for in the description, ignoring case.
    #[serde(default)]
    pub search: String,
    /// The category key to keep.
    #[serde(default)]
    pub category: Option<String>,
    /// "income" or "expense".
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl TransactionFilter {
    /// The selected category, `None` when all categories are shown.
    pub fn selected_category(&self) -> Option<Category> {
        self.category
            .as_deref()
            .filter(|key| !key.is_empty() && *key != ALL)
            .map(Category::from_key)
    }

    /// The selected type, `None` when both types are shown or the value is not a type.
    pub fn selected_kind(&self) -> Option<TransactionType> {
        match self.kind.as_deref() {
            Some("income") => Some(TransactionType::Income),
            Some("expense") => Some(TransactionType::Expense),
            _ => None,
        }
    }

    /// Whether `transaction` passes every filter.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        let search = self.search.trim().to_lowercase();
        let matches_search =
            search.is_empty() || transaction.description.to_lowercase().contains(&search);
        let matches_category = self
            .selected_category()
            .is_none_or(|category| transaction.category == category);
        let matches_kind = self
            .selected_kind()
            .is_none_or(|kind| transaction.kind == kind);

        matches_search && matches_category && matches_kind
    }

    /// The transactions that pass every filter, in their original order.
    pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions
            .iter()
            .filter(|transaction| self.matches(transaction))
            .collect()
    }
}

/// The distinct categories used by `transactions`, in order of first appearance.
pub fn unique_categories(transactions: &[Transaction]) -> Vec<Category> {
    let mut categories: Vec<Category> = Vec::new();

    for transaction in transactions {
        if !categories.contains(&transaction.category) {
            categories.push(transaction.category.clone());
        }
    }

    categories
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, macros::date};

    use crate::{
        transaction::{Category, Transaction, TransactionType},
        user::UserID,
    };

    use super::{TransactionFilter, unique_categories};

    fn transaction(
        id: i64,
        description: &str,
        kind: TransactionType,
        category: Category,
    ) -> Transaction {
        Transaction {
            id,
            owner: UserID::new(1),
            description: description.to_owned(),
            amount: 10.0,
            kind,
            category,
            date: date!(2025 - 01 - 15),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn get_transactions() -> Vec<Transaction> {
        vec![
            transaction(1, "Salário de Janeiro", TransactionType::Income, Category::Salary),
            transaction(2, "Mercado", TransactionType::Expense, Category::Food),
            transaction(3, "Supermercado", TransactionType::Expense, Category::Food),
            transaction(
                4,
                "Ração",
                TransactionType::Expense,
                Category::Custom("pets".to_owned()),
            ),
        ]
    }

    #[track_caller]
    fn assert_filtered_ids(filter: &TransactionFilter, want: &[i64]) {
        let transactions = get_transactions();
        let got: Vec<_> = filter.apply(&transactions).iter().map(|t| t.id).collect();
        assert_eq!(got, want, "filter {filter:?}");
    }

    #[test]
    fn default_filter_keeps_everything() {
        assert_filtered_ids(&TransactionFilter::default(), &[1, 2, 3, 4]);
    }

    #[test]
    fn search_ignores_case() {
        let filter = TransactionFilter {
            search: "MERCADO".to_owned(),
            ..Default::default()
        };

        assert_filtered_ids(&filter, &[2, 3]);
    }

    #[test]
    fn filters_by_category_key() {
        let filter = TransactionFilter {
            category: Some("pets".to_owned()),
            ..Default::default()
        };

        assert_filtered_ids(&filter, &[4]);
    }

    #[test]
    fn all_means_no_filter() {
        let filter = TransactionFilter {
            category: Some("all".to_owned()),
            kind: Some("all".to_owned()),
            ..Default::default()
        };

        assert_filtered_ids(&filter, &[1, 2, 3, 4]);
    }

    #[test]
    fn filters_combine() {
        let filter = TransactionFilter {
            search: "super".to_owned(),
            category: Some("food".to_owned()),
            kind: Some("expense".to_owned()),
        };

        assert_filtered_ids(&filter, &[3]);
    }

    #[test]
    fn lists_unique_categories_in_order() {
        assert_eq!(
            unique_categories(&get_transactions()),
            vec![
                Category::Salary,
                Category::Food,
                Category::Custom("pets".to_owned())
            ]
        );
    }
}
