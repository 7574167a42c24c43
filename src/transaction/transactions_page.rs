//! Defines the route handler for the page that displays transactions as a table.

use std::sync::Arc;

use axum::{
    Extension,
    extract::Query,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    endpoints,
    html::{
        BUTTON_SECONDARY_STYLE, CATEGORY_BADGE_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        format_currency, link,
    },
    navigation::NavBar,
    transaction::{
        Category, Transaction, TransactionType, format_date_pt_br,
        filter::{ALL, TransactionFilter, unique_categories},
    },
    workspace::AppWorkspace,
};

fn amount_class(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Expense => "text-red-700 dark:text-red-300",
        TransactionType::Income => "text-green-700 dark:text-green-300",
    }
}

/// Renders `transactions` as a table, or `empty_message` when there are none.
pub(crate) fn transactions_table(transactions: &[&Transaction], empty_message: &str) -> Markup {
    html! {
        div class="relative overflow-x-auto w-full"
        {
            table class="w-full my-2 text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Descrição" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Categoria" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Data" }
                        th scope="col" class="px-6 py-4 text-right" { "Valor" }
                    }
                }

                tbody
                {
                    @for transaction in transactions {
                        (transaction_row_view(transaction))
                    }

                    @if transactions.is_empty() {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td colspan="4" class="px-6 py-8 text-center" { (empty_message) }
                        }
                    }
                }
            }
        }
    }
}

fn transaction_row_view(transaction: &Transaction) -> Markup {
    html! {
        tr class=(TABLE_ROW_STYLE) data-transaction-row="true"
        {
            td class=(TABLE_CELL_STYLE) { (transaction.description) }
            td class=(TABLE_CELL_STYLE)
            {
                span
                    class=(CATEGORY_BADGE_STYLE)
                    style={ "background-color: " (transaction.category.color()) }
                {
                    (transaction.category.label())
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                time datetime=(transaction.date.to_string()) { (format_date_pt_br(transaction.date)) }
            }
            td class={ "px-6 py-4 text-right " (amount_class(transaction.kind)) }
            {
                (format_currency(transaction.signed_amount()))
            }
        }
    }
}

fn filter_form(filter: &TransactionFilter, categories: &[Category]) -> Markup {
    let selected_category = filter.selected_category();
    let selected_kind = filter.selected_kind();

    html! {
        form
            method="get"
            action=(endpoints::TRANSACTIONS_VIEW)
            class="w-full grid grid-cols-1 md:grid-cols-4 gap-4 items-end mb-4"
        {
            div
            {
                label for="search" class=(FORM_LABEL_STYLE) { "Buscar" }
                input
                    type="search"
                    name="search"
                    id="search"
                    placeholder="Buscar transações..."
                    value=(filter.search)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="category" class=(FORM_LABEL_STYLE) { "Categoria" }
                select name="category" id="category" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value=(ALL) selected[selected_category.is_none()] { "Todas as Categorias" }

                    @for category in categories {
                        option
                            value=(category.key())
                            selected[selected_category.as_ref() == Some(category)]
                        {
                            (category.label())
                        }
                    }
                }
            }

            div
            {
                label for="type" class=(FORM_LABEL_STYLE) { "Tipo" }
                select name="type" id="type" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value=(ALL) selected[selected_kind.is_none()] { "Todos os Tipos" }

                    @for kind in [TransactionType::Income, TransactionType::Expense] {
                        option value=(kind.key()) selected[selected_kind == Some(kind)]
                        {
                            (kind.label())
                        }
                    }
                }
            }

            button type="submit" class=(BUTTON_SECONDARY_STYLE) { "Filtrar" }
        }
    }
}

/// Render a page listing the user's transactions, narrowed down by the filters in the query string.
pub async fn get_transactions_page(
    Extension(workspace): Extension<Arc<AppWorkspace>>,
    Query(filter): Query<TransactionFilter>,
) -> Response {
    let snapshot = workspace.live().loaded().await;
    let transactions = snapshot.transactions.as_slice();
    let user_name = workspace.user().map(|user| user.name).unwrap_or_default();

    let categories = unique_categories(transactions);
    let filtered = filter.apply(transactions);
    tracing::debug!(
        "showing {} of {} transactions",
        filtered.len(),
        transactions.len()
    );

    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW, &user_name).into_html();
    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-screen-xl"
            {
                div class="flex flex-wrap justify-between items-baseline gap-4 mb-4"
                {
                    h1 class="text-xl font-bold" { "Transações" }

                    div class="flex gap-4"
                    {
                        (link(endpoints::NEW_TRANSACTION_VIEW, "Nova Transação"))
                        (link(endpoints::EXPORT_API, "Exportar CSV"))
                    }
                }

                (filter_form(&filter, &categories))
                (transactions_table(&filtered, "Nenhuma transação encontrada."))
            }
        }
    };

    base("Transações", &[], &content).into_response()
}
