//! Summary cards with the overall balance, income and expenses.

use maud::{Markup, html};

use crate::{dashboard::aggregation::Totals, html::format_currency};

/// Renders the three summary cards.
pub(super) fn summary_cards_view(totals: &Totals) -> Markup {
    html! {
        section id="summary-cards" class="w-full grid grid-cols-1 md:grid-cols-3 gap-4 mb-8" {
            (summary_card(
                "Saldo Total",
                totals.balance,
                "Saldo atual em todas as contas",
                "text-gray-900 dark:text-white",
            ))
            (summary_card(
                "Receitas Totais",
                totals.income,
                "Total de receitas no período atual",
                "text-emerald-500",
            ))
            (summary_card(
                "Despesas Totais",
                totals.expenses,
                "Total de despesas no período atual",
                "text-rose-500",
            ))
        }
    }
}

fn summary_card(title: &str, amount: f64, description: &str, amount_style: &str) -> Markup {
    html! {
        div
            class="bg-white dark:bg-gray-800 border border-gray-200
                dark:border-gray-700 rounded-lg p-4 shadow-md"
        {
            h3 class="text-sm font-medium text-gray-600 dark:text-gray-400" { (title) }
            p class={ "text-2xl font-bold " (amount_style) } { (format_currency(amount)) }
            p class="text-xs text-gray-500 dark:text-gray-400" { (description) }
        }
    }
}
