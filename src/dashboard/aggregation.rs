//! Transaction data aggregation for the dashboard cards and charts.
//!
//! Every function here is pure and independent of the order of its input.
//! Amounts are summed as whole cents so that permuting the transactions
//! cannot change the result through floating point rounding.

use std::collections::{BTreeMap, HashMap};

use time::Month;

use crate::transaction::{Category, Transaction, TransactionType};

/// The result of an aggregation, with "no transactions" kept apart from "all zeros".
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Aggregate<T> {
    /// There was nothing to aggregate.
    NoData,
    Data(T),
}

/// The total spent in one category.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CategoryTotal {
    pub category: Category,
    /// The name shown in the chart legend.
    pub label: String,
    /// Hex color for the chart slice.
    pub color: &'static str,
    pub total: f64,
}

/// The net amount (income minus expenses) for one month.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MonthlyBalance {
    pub year: i32,
    pub month: Month,
    pub label: String,
    pub balance: f64,
}

/// Income and expenses for one month, summed separately.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MonthlyIncomeExpenses {
    pub year: i32,
    pub month: Month,
    pub label: String,
    pub income: f64,
    pub expenses: f64,
}

/// Totals over all transactions, shown on the summary cards.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Totals {
    pub income: f64,
    pub expenses: f64,
    /// Income minus expenses.
    pub balance: f64,
}

type Cents = i128;

fn to_cents(amount: f64) -> Cents {
    (amount * 100.0).round() as Cents
}

fn from_cents(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

/// Sum expenses per category, largest total first.
///
/// Income is ignored. Ties are ordered by label.
pub(crate) fn expenses_by_category(transactions: &[Transaction]) -> Aggregate<Vec<CategoryTotal>> {
    let mut totals: HashMap<&str, (&Category, Cents)> = HashMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.kind == TransactionType::Expense)
    {
        let entry = totals
            .entry(transaction.category.key())
            .or_insert((&transaction.category, 0));
        entry.1 = entry.1.saturating_add(to_cents(transaction.amount));
    }

    if totals.is_empty() {
        return Aggregate::NoData;
    }

    let mut totals: Vec<(String, &Category, Cents)> = totals
        .into_values()
        .map(|(category, cents)| (category.chart_label(), category, cents))
        .collect();
    totals.sort_by(|(label_a, _, total_a), (label_b, _, total_b)| {
        total_b.cmp(total_a).then_with(|| label_a.cmp(label_b))
    });

    Aggregate::Data(
        totals
            .into_iter()
            .map(|(label, category, cents)| CategoryTotal {
                category: category.clone(),
                label,
                color: category.color(),
                total: from_cents(cents),
            })
            .collect(),
    )
}

/// Group amounts by (year, month).
///
/// All twelve months of `current_year` are present even without transactions,
/// months of other years only when they have transactions.
fn group_by_month<T: Default + Copy>(
    transactions: &[Transaction],
    current_year: i32,
    mut add: impl FnMut(&mut T, &Transaction),
) -> BTreeMap<(i32, u8), T> {
    let mut months: BTreeMap<(i32, u8), T> =
        (1..=12).map(|month| ((current_year, month), T::default())).collect();

    for transaction in transactions {
        let key = (transaction.date.year(), transaction.date.month() as u8);
        add(months.entry(key).or_default(), transaction);
    }

    months
}

/// Net balance per month, in chronological order.
pub(crate) fn monthly_balance(
    transactions: &[Transaction],
    current_year: i32,
) -> Aggregate<Vec<MonthlyBalance>> {
    if transactions.is_empty() {
        return Aggregate::NoData;
    }

    let months = group_by_month(transactions, current_year, |cents: &mut Cents, transaction| {
        *cents = cents.saturating_add(to_cents(transaction.signed_amount()));
    });

    Aggregate::Data(
        months
            .into_iter()
            .filter_map(|((year, month), cents)| {
                let month = Month::try_from(month).ok()?;
                Some(MonthlyBalance {
                    year,
                    month,
                    label: month_label(year, month, current_year),
                    balance: from_cents(cents),
                })
            })
            .collect(),
    )
}

/// Income and expenses per month, in chronological order.
pub(crate) fn monthly_income_expenses(
    transactions: &[Transaction],
    current_year: i32,
) -> Aggregate<Vec<MonthlyIncomeExpenses>> {
    if transactions.is_empty() {
        return Aggregate::NoData;
    }

    let months = group_by_month(
        transactions,
        current_year,
        |(income, expenses): &mut (Cents, Cents), transaction| match transaction.kind {
            TransactionType::Income => *income = income.saturating_add(to_cents(transaction.amount)),
            TransactionType::Expense => {
                *expenses = expenses.saturating_add(to_cents(transaction.amount))
            }
        },
    );

    Aggregate::Data(
        months
            .into_iter()
            .filter_map(|((year, month), (income, expenses))| {
                let month = Month::try_from(month).ok()?;
                Some(MonthlyIncomeExpenses {
                    year,
                    month,
                    label: month_label(year, month, current_year),
                    income: from_cents(income),
                    expenses: from_cents(expenses),
                })
            })
            .collect(),
    )
}

/// Total income, expenses and balance.
pub(crate) fn summarize(transactions: &[Transaction]) -> Totals {
    let (income, expenses) =
        transactions
            .iter()
            .fold((0, 0), |(income, expenses): (Cents, Cents), transaction| {
                let cents = to_cents(transaction.amount);
                match transaction.kind {
                    TransactionType::Income => (income.saturating_add(cents), expenses),
                    TransactionType::Expense => (income, expenses.saturating_add(cents)),
                }
            });

    Totals {
        income: from_cents(income),
        expenses: from_cents(expenses),
        balance: from_cents(income.saturating_sub(expenses)),
    }
}

/// The Portuguese three letter abbreviation of `month`.
pub(crate) fn month_abbreviation(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Fev",
        Month::March => "Mar",
        Month::April => "Abr",
        Month::May => "Mai",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Ago",
        Month::September => "Set",
        Month::October => "Out",
        Month::November => "Nov",
        Month::December => "Dez",
    }
}

/// "Mar" for months of `current_year`, "Mar/2023" otherwise.
fn month_label(year: i32, month: Month, current_year: i32) -> String {
    let abbreviation = month_abbreviation(month);

    if year == current_year {
        abbreviation.to_owned()
    } else {
        format!("{abbreviation}/{year}")
    }
}

#[cfg(test)]
mod tests {
    use time::{Date, Month, OffsetDateTime, macros::date};

    use crate::{
        transaction::{Category, Transaction, TransactionType},
        user::UserID,
    };

    use super::{
        Aggregate, expenses_by_category, month_label, monthly_balance, monthly_income_expenses,
        summarize,
    };

    fn create_test_transaction(
        id: i64,
        amount: f64,
        kind: TransactionType,
        category: Category,
        date: Date,
    ) -> Transaction {
        Transaction {
            id,
            owner: UserID::new(1),
            description: format!("transação {id}"),
            amount,
            kind,
            category,
            date,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn sample_transactions() -> Vec<Transaction> {
        vec![
            create_test_transaction(
                1,
                100.0,
                TransactionType::Income,
                Category::Salary,
                date!(2024 - 01 - 15),
            ),
            create_test_transaction(
                2,
                40.0,
                TransactionType::Expense,
                Category::Food,
                date!(2024 - 01 - 20),
            ),
        ]
    }

    fn varied_transactions() -> Vec<Transaction> {
        vec![
            create_test_transaction(
                1,
                3500.0,
                TransactionType::Income,
                Category::Salary,
                date!(2024 - 03 - 05),
            ),
            create_test_transaction(
                2,
                1200.10,
                TransactionType::Expense,
                Category::Housing,
                date!(2024 - 03 - 10),
            ),
            create_test_transaction(
                3,
                85.35,
                TransactionType::Expense,
                Category::Food,
                date!(2024 - 04 - 02),
            ),
            create_test_transaction(
                4,
                19.99,
                TransactionType::Expense,
                Category::Custom("academia".to_owned()),
                date!(2024 - 04 - 12),
            ),
            create_test_transaction(
                5,
                64.65,
                TransactionType::Expense,
                Category::Food,
                date!(2023 - 12 - 24),
            ),
            create_test_transaction(
                6,
                250.0,
                TransactionType::Income,
                Category::Investment,
                date!(2023 - 11 - 30),
            ),
        ]
    }

    #[test]
    fn income_and_expense_example() {
        let transactions = sample_transactions();

        let Aggregate::Data(balances) = monthly_balance(&transactions, 2024) else {
            panic!("want monthly balances");
        };
        assert_eq!(balances.len(), 12);
        assert_eq!(balances[0].label, "Jan");
        assert_eq!(balances[0].balance, 60.0);
        assert!(balances[1..].iter().all(|month| month.balance == 0.0));

        let Aggregate::Data(categories) = expenses_by_category(&transactions) else {
            panic!("want expenses by category");
        };
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category, Category::Food);
        assert_eq!(categories[0].total, 40.0);
        assert_eq!(categories[0].label, "Alimentação");
    }

    #[test]
    fn empty_input_is_no_data() {
        assert_eq!(expenses_by_category(&[]), Aggregate::NoData);
        assert_eq!(monthly_balance(&[], 2024), Aggregate::NoData);
        assert_eq!(monthly_income_expenses(&[], 2024), Aggregate::NoData);
    }

    #[test]
    fn only_income_has_no_expense_data() {
        let transactions = vec![create_test_transaction(
            1,
            100.0,
            TransactionType::Income,
            Category::Salary,
            date!(2024 - 01 - 15),
        )];

        assert_eq!(expenses_by_category(&transactions), Aggregate::NoData);
        assert!(matches!(
            monthly_balance(&transactions, 2024),
            Aggregate::Data(_)
        ));
    }

    #[test]
    fn zero_amounts_are_data_not_no_data() {
        let transactions = vec![create_test_transaction(
            1,
            0.0,
            TransactionType::Expense,
            Category::Food,
            date!(2024 - 01 - 15),
        )];

        let Aggregate::Data(categories) = expenses_by_category(&transactions) else {
            panic!("want data for zero amount");
        };
        assert_eq!(categories[0].total, 0.0);
    }

    #[test]
    fn category_totals_sum_to_total_expenses() {
        let transactions = varied_transactions();

        let Aggregate::Data(categories) = expenses_by_category(&transactions) else {
            panic!("want expenses by category");
        };
        let category_sum: f64 = categories.iter().map(|category| category.total).sum();

        assert!((category_sum - summarize(&transactions).expenses).abs() < 1e-9);
    }

    #[test]
    fn categories_sorted_by_total_then_label() {
        let mut transactions = varied_transactions();
        transactions.push(create_test_transaction(
            7,
            19.99,
            TransactionType::Expense,
            Category::Entertainment,
            date!(2024 - 04 - 13),
        ));

        let Aggregate::Data(categories) = expenses_by_category(&transactions) else {
            panic!("want expenses by category");
        };
        let labels: Vec<&str> = categories
            .iter()
            .map(|category| category.label.as_str())
            .collect();

        assert_eq!(
            labels,
            vec!["Moradia", "Alimentação", "Academia", "Entretenimento"]
        );
        assert_eq!(categories[1].total, 150.0);
    }

    #[test]
    fn current_year_balances_sum_to_income_minus_expenses() {
        let transactions = varied_transactions();
        let current_year_transactions: Vec<Transaction> = transactions
            .iter()
            .filter(|transaction| transaction.date.year() == 2024)
            .cloned()
            .collect();
        let totals = summarize(&current_year_transactions);

        let Aggregate::Data(balances) = monthly_balance(&transactions, 2024) else {
            panic!("want monthly balances");
        };
        let current_year_sum: f64 = balances
            .iter()
            .filter(|month| month.year == 2024)
            .map(|month| month.balance)
            .sum();

        assert_eq!(
            balances.iter().filter(|month| month.year == 2024).count(),
            12
        );
        assert!((current_year_sum - (totals.income - totals.expenses)).abs() < 1e-9);
    }

    #[test]
    fn other_years_are_included_in_order_with_qualified_labels() {
        let Aggregate::Data(balances) = monthly_balance(&varied_transactions(), 2024) else {
            panic!("want monthly balances");
        };

        assert_eq!(balances.len(), 14);
        assert_eq!(balances[0].label, "Nov/2023");
        assert_eq!(balances[0].balance, 250.0);
        assert_eq!(balances[1].label, "Dez/2023");
        assert_eq!(balances[1].balance, -64.65);
        assert_eq!(balances[2].label, "Jan");
        assert_eq!(balances[13].label, "Dez");
    }

    #[test]
    fn monthly_income_expenses_sums_separately() {
        let Aggregate::Data(months) = monthly_income_expenses(&varied_transactions(), 2024) else {
            panic!("want monthly income and expenses");
        };

        let march = months
            .iter()
            .find(|month| month.year == 2024 && month.month == Month::March)
            .unwrap();
        assert_eq!(march.income, 3500.0);
        assert_eq!(march.expenses, 1200.10);

        let april = months
            .iter()
            .find(|month| month.year == 2024 && month.month == Month::April)
            .unwrap();
        assert_eq!(april.income, 0.0);
        assert_eq!(april.expenses, 105.34);
    }

    #[test]
    fn aggregations_are_order_independent_and_idempotent() {
        let transactions = varied_transactions();
        let mut reversed = transactions.clone();
        reversed.reverse();
        let mut rotated = transactions.clone();
        rotated.rotate_left(2);

        for permutation in [&reversed, &rotated, &transactions] {
            assert_eq!(
                expenses_by_category(permutation),
                expenses_by_category(&transactions)
            );
            assert_eq!(
                monthly_balance(permutation, 2024),
                monthly_balance(&transactions, 2024)
            );
            assert_eq!(
                monthly_income_expenses(permutation, 2024),
                monthly_income_expenses(&transactions, 2024)
            );
            assert_eq!(summarize(permutation), summarize(&transactions));
        }
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        let large_expense = |id| {
            create_test_transaction(
                id,
                1e17,
                TransactionType::Expense,
                Category::Housing,
                date!(2024 - 05 - 01),
            )
        };
        let transactions = vec![large_expense(1), large_expense(2)];

        let Aggregate::Data(by_category) = expenses_by_category(&transactions) else {
            panic!("expected expense data");
        };
        assert_eq!(by_category[0].total, 2e17);
        assert_eq!(summarize(&transactions).balance, -2e17);

        let Aggregate::Data(months) = monthly_income_expenses(&transactions, 2024) else {
            panic!("expected monthly data");
        };
        assert_eq!(months[4].expenses, 2e17);

        let Aggregate::Data(months) = monthly_balance(&transactions, 2024) else {
            panic!("expected monthly data");
        };
        assert_eq!(months[4].balance, -2e17);
    }

    #[test]
    fn summarize_totals() {
        let totals = summarize(&sample_transactions());

        assert_eq!(totals.income, 100.0);
        assert_eq!(totals.expenses, 40.0);
        assert_eq!(totals.balance, 60.0);
    }

    #[test]
    fn month_labels_are_portuguese() {
        assert_eq!(month_label(2024, Month::February, 2024), "Fev");
        assert_eq!(month_label(2023, Month::September, 2024), "Set/2023");
    }
}
