//! Dashboard HTTP handler and view rendering.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    AppState,
    dashboard::{
        aggregation::{
            Aggregate, expenses_by_category, monthly_balance, monthly_income_expenses, summarize,
        },
        cards::summary_cards_view,
        charts::{
            DashboardChart, chart_container, chart_empty_state, charts_script,
            expenses_by_category_chart, income_expenses_chart, monthly_balance_chart,
        },
    },
    endpoints,
    html::{HeadElement, base, link},
    navigation::NavBar,
    timezone::local_today,
    transaction::{Transaction, transactions_table},
    workspace::AppWorkspace,
};

/// How many of the latest transactions are listed below the charts.
const RECENT_TRANSACTION_COUNT: usize = 5;

/// The state needed for displaying the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A chart slot on the dashboard: either a chart to draw or a message saying why there is none.
enum ChartSlot {
    Chart(DashboardChart),
    Empty {
        title: &'static str,
        description: &'static str,
    },
}

impl ChartSlot {
    fn view(&self) -> Markup {
        match self {
            ChartSlot::Chart(chart) => chart_container(chart),
            ChartSlot::Empty { title, description } => chart_empty_state(title, description),
        }
    }
}

fn build_chart_slots(transactions: &[Transaction], current_year: i32) -> [ChartSlot; 3] {
    let balance = match monthly_balance(transactions, current_year) {
        Aggregate::Data(months) => ChartSlot::Chart(DashboardChart {
            id: "monthly-balance-chart",
            options: monthly_balance_chart(&months).to_string(),
        }),
        Aggregate::NoData => ChartSlot::Empty {
            title: "Sem dados de balanço mensal",
            description: "Adicione transações para ver a evolução do seu saldo.",
        },
    };

    let income_expenses = match monthly_income_expenses(transactions, current_year) {
        Aggregate::Data(months) => ChartSlot::Chart(DashboardChart {
            id: "income-expenses-chart",
            options: income_expenses_chart(&months).to_string(),
        }),
        Aggregate::NoData => ChartSlot::Empty {
            title: "Sem dados de receitas e despesas",
            description: "Adicione transações para comparar receitas e despesas.",
        },
    };

    let categories = match expenses_by_category(transactions) {
        Aggregate::Data(categories) => ChartSlot::Chart(DashboardChart {
            id: "expenses-by-category-chart",
            options: expenses_by_category_chart(&categories).to_string(),
        }),
        Aggregate::NoData => ChartSlot::Empty {
            title: "Sem despesas por categoria",
            description: "Adicione despesas para ver onde seu dinheiro está indo.",
        },
    };

    [balance, income_expenses, categories]
}

fn recent_transactions_view(transactions: &[Transaction]) -> Markup {
    if transactions.is_empty() {
        return html! {
            div
                id="recent-transactions-empty"
                class="flex flex-col items-center text-center py-8"
            {
                h3 class="text-lg font-medium mb-2" { "Comece a rastrear suas finanças" }
                p class="text-gray-600 dark:text-gray-400 mb-4"
                {
                    "Você ainda não tem transações. "
                    (link(endpoints::NEW_TRANSACTION_VIEW, "Adicione sua primeira transação"))
                    "."
                }
            }
        };
    }

    let recent: Vec<&Transaction> = transactions
        .iter()
        .take(RECENT_TRANSACTION_COUNT)
        .collect();

    html! {
        div class="flex justify-between items-baseline"
        {
            h3 class="text-lg font-medium" { "Transações Recentes" }
            (link(endpoints::TRANSACTIONS_VIEW, "Ver todas"))
        }

        (transactions_table(&recent, "Nenhuma transação encontrada."))
    }
}

fn dashboard_view(
    nav_bar: NavBar,
    transactions: &[Transaction],
    current_year: i32,
) -> Markup {
    let nav_bar = nav_bar.into_html();
    let totals = summarize(transactions);
    let slots = build_chart_slots(transactions, current_year);
    let chart_views: Vec<Markup> = slots.iter().map(ChartSlot::view).collect();
    let charts: Vec<DashboardChart> = slots
        .into_iter()
        .filter_map(|slot| match slot {
            ChartSlot::Chart(chart) => Some(chart),
            ChartSlot::Empty { .. } => None,
        })
        .collect();

    let content = html!(
        (nav_bar)

        div
            id="dashboard-content"
            class="flex flex-col items-center px-2 lg:px-6 lg:py-8 mx-auto
                max-w-screen-xl text-gray-900 dark:text-white"
        {
            h1 class="w-full text-xl font-bold mb-4" { "Dashboard" }

            (summary_cards_view(&totals))

            section id="charts" class="w-full mx-auto mb-8"
            {
                div class="grid grid-cols-1 xl:grid-cols-2 gap-4"
                {
                    @for chart_view in &chart_views {
                        (chart_view)
                    }
                }
            }

            section id="recent-transactions" class="w-full mb-8"
            {
                (recent_transactions_view(transactions))
            }
        }
    );

    let scripts = [
        HeadElement::ScriptLink("/static/echarts.6.0.0.min.js".to_owned()),
        charts_script(&charts),
    ];

    base("Dashboard", &scripts, &content)
}

/// Display a page with an overview of the user's finances.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Extension(workspace): Extension<Arc<AppWorkspace>>,
) -> Response {
    let snapshot = workspace.live().loaded().await;
    let user_name = workspace.user().map(|user| user.name).unwrap_or_default();
    let current_year = local_today(&state.local_timezone).year();

    let nav_bar = NavBar::new(endpoints::DASHBOARD_VIEW, &user_name);

    dashboard_view(nav_bar, snapshot.transactions.as_slice(), current_year).into_response()
}
