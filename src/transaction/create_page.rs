//! Defines the route handler for the page for creating a new transaction.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use time::Date;

use crate::{
    AppState, endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_RADIO_GROUP_STYLE,
        FORM_RADIO_INPUT_STYLE, FORM_RADIO_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base,
        currency_input_styles, loading_spinner,
    },
    navigation::NavBar,
    timezone::local_today,
    transaction::{Category, MAX_TRANSACTION_AMOUNT, TransactionType},
    workspace::AppWorkspace,
};

fn type_radio(kind: TransactionType, checked: bool) -> Markup {
    let id = format!("type-{}", kind.key());

    html! {
        div class="flex items-center gap-2"
        {
            input
                type="radio"
                name="type"
                id=(id)
                value=(kind.key())
                checked[checked]
                required
                class=(FORM_RADIO_INPUT_STYLE);

            label for=(id) class=(FORM_RADIO_LABEL_STYLE) { (kind.label()) }
        }
    }
}

fn create_transaction_view(today: Date, user_name: &str) -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_TRANSACTION_VIEW, user_name).into_html();
    let spinner = loading_spinner();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            form
                hx-post=(endpoints::TRANSACTIONS_API)
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                h2 class="text-xl font-bold" { "Nova Transação" }

                div
                {
                    label for="description" class=(FORM_LABEL_STYLE) { "Descrição" }

                    input
                        name="description"
                        id="description"
                        type="text"
                        placeholder="Ex.: Mercado"
                        required
                        autofocus
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div
                {
                    label for="amount" class=(FORM_LABEL_STYLE) { "Valor" }

                    // w-full needed to ensure input takes the full width when prefilled with a value
                    div class="input-wrapper w-full"
                    {
                        input
                            name="amount"
                            id="amount"
                            type="number"
                            step="0.01"
                            min="0"
                            max=(MAX_TRANSACTION_AMOUNT)
                            placeholder="0,00"
                            required
                            class=(FORM_TEXT_INPUT_STYLE);
                    }
                }

                fieldset
                {
                    legend class=(FORM_LABEL_STYLE) { "Tipo" }

                    div class=(FORM_RADIO_GROUP_STYLE)
                    {
                        (type_radio(TransactionType::Expense, true))
                        (type_radio(TransactionType::Income, false))
                    }
                }

                div
                {
                    label for="category" class=(FORM_LABEL_STYLE) { "Categoria" }

                    input
                        name="category"
                        id="category"
                        type="text"
                        list="category-options"
                        placeholder="other"
                        class=(FORM_TEXT_INPUT_STYLE);

                    datalist id="category-options"
                    {
                        @for category in Category::PREDEFINED.iter() {
                            option value=(category.key()) { (category.label()) }
                        }
                    }
                }

                div
                {
                    label for="date" class=(FORM_LABEL_STYLE) { "Data" }

                    input
                        name="date"
                        id="date"
                        type="date"
                        required
                        value=(today)
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
                {
                    span id="indicator" class="inline htmx-indicator" { (spinner) }
                    " Adicionar Transação"
                }
            }
        }
    };

    base("Nova Transação", &[currency_input_styles()], &content)
}

/// The state needed for the new transaction page.
#[derive(Debug, Clone)]
pub struct CreateTransactionPageState {
    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateTransactionPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Renders the page for creating a transaction.
pub async fn get_create_transaction_page(
    State(state): State<CreateTransactionPageState>,
    Extension(workspace): Extension<Arc<AppWorkspace>>,
) -> Response {
    let today = local_today(&state.local_timezone);
    let user_name = workspace.user().map(|user| user.name).unwrap_or_default();

    create_transaction_view(today, &user_name).into_response()
}
