//! Chart generation and rendering for the dashboard.
//!
//! This module creates interactive ECharts visualizations for financial data:
//! - **Monthly Balance Chart**: net balance per month
//! - **Income vs Expenses Chart**: income and expenses side by side per month
//! - **Expenses by Category Chart**: share of expenses per category
//!
//! Each chart is generated as JSON configuration for the ECharts library and
//! rendered with corresponding HTML containers and JavaScript initialization code.

use charming::{
    Chart,
    component::{Axis, Grid, Legend, Title, VisualMap, VisualMapPiece},
    element::{
        AxisLabel, AxisPointer, AxisPointerType, AxisType, Color, Emphasis, EmphasisFocus,
        ItemStyle, JsFunction, Tooltip, Trigger,
    },
    series::{Line, Pie, bar},
};
use maud::{Markup, PreEscaped, html};

use crate::{
    dashboard::aggregation::{CategoryTotal, MonthlyBalance, MonthlyIncomeExpenses},
    html::HeadElement,
};

const INCOME_COLOR: &str = "#22c55e";
const EXPENSE_COLOR: &str = "#f43f5e";

/// A dashboard chart with its HTML container ID and ECharts configuration.
pub(super) struct DashboardChart {
    /// The HTML element ID to use for the chart (kebab-case)
    pub id: &'static str,
    /// The ECharts configuration as a JSON string
    pub options: String,
}

/// Renders the HTML container for one dashboard chart.
pub(super) fn chart_container(chart: &DashboardChart) -> Markup {
    html!(
        div
            id=(chart.id)
            class="min-h-[380px] rounded dark:bg-gray-100"
        {}
    )
}

/// Shown in place of a chart that has nothing to plot.
pub(super) fn chart_empty_state(title: &str, description: &str) -> Markup {
    html!(
        div
            class="flex flex-col items-center justify-center min-h-[380px] text-center
                rounded bg-gray-50 dark:bg-gray-800 px-4"
        {
            h3 class="text-lg font-medium mb-2" { (title) }
            p class="text-gray-600 dark:text-gray-400 max-w-xs" { (description) }
        }
    )
}

/// Generates JavaScript initialization code for dashboard charts.
///
/// Creates scripts that initialize ECharts instances with dark mode support
/// and responsive resizing.
pub(super) fn charts_script(charts: &[DashboardChart]) -> HeadElement {
    let script_content = charts
        .iter()
        .map(|chart| {
            format!(
                r#"(function() {{
                    const chartDom = document.getElementById("{}");
                    const chart = echarts.init(chartDom);
                    const option = {};
                    chart.setOption(option);

                    window.addEventListener('resize', chart.resize);

                    const darkModeMediaQuery = window.matchMedia('(prefers-color-scheme: dark)');
                    const updateTheme = () => {{
                        const isDarkMode = darkModeMediaQuery.matches;
                        chart.setTheme(isDarkMode ? 'dark' : 'default');
                    }}
                    darkModeMediaQuery.addEventListener('change', updateTheme);
                    updateTheme();
                }})();"#,
                chart.id, chart.options
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let wrapped_script = format!(
        "document.addEventListener('DOMContentLoaded', function() {{\n{}\n}});",
        script_content
    );

    HeadElement::ScriptSource(PreEscaped(wrapped_script))
}

fn chart_grid() -> Grid {
    Grid::new()
        .left("3%")
        .right("4%")
        .bottom("3%")
        .contain_label(true)
}

fn currency_axis() -> Axis {
    Axis::new()
        .type_(AxisType::Value)
        .axis_label(AxisLabel::new().formatter(currency_formatter()))
}

pub(super) fn monthly_balance_chart(months: &[MonthlyBalance]) -> Chart {
    let labels: Vec<String> = months.iter().map(|month| month.label.clone()).collect();
    let values: Vec<f64> = months.iter().map(|month| month.balance).collect();

    Chart::new()
        .title(Title::new().text("Visão Mensal").subtext("Saldo mensal"))
        .tooltip(currency_tooltip())
        .grid(chart_grid())
        .x_axis(Axis::new().type_(AxisType::Category).data(labels))
        .y_axis(currency_axis())
        .visual_map(VisualMap::new().show(false).pieces(vec![
            VisualMapPiece::new().lt(0).color(EXPENSE_COLOR),
            VisualMapPiece::new().gte(0).color(INCOME_COLOR),
        ]))
        .series(Line::new().name("Saldo Mensal").data(values))
}

pub(super) fn income_expenses_chart(months: &[MonthlyIncomeExpenses]) -> Chart {
    let labels: Vec<String> = months.iter().map(|month| month.label.clone()).collect();
    let income: Vec<f64> = months.iter().map(|month| month.income).collect();
    let expenses: Vec<f64> = months.iter().map(|month| month.expenses).collect();

    Chart::new()
        .title(Title::new().text("Receitas x Despesas").left(20).top("1%"))
        .tooltip(currency_tooltip())
        .legend(Legend::new().right(20).top("1%"))
        .grid(chart_grid().top(70))
        .x_axis(Axis::new().type_(AxisType::Category).data(labels))
        .y_axis(currency_axis())
        .series(
            bar::Bar::new()
                .name("Receitas")
                .item_style(ItemStyle::new().color(INCOME_COLOR))
                .emphasis(Emphasis::new().focus(EmphasisFocus::Series))
                .data(income),
        )
        .series(
            bar::Bar::new()
                .name("Despesas")
                .item_style(ItemStyle::new().color(EXPENSE_COLOR))
                .emphasis(Emphasis::new().focus(EmphasisFocus::Series))
                .data(expenses),
        )
}

pub(super) fn expenses_by_category_chart(categories: &[CategoryTotal]) -> Chart {
    let colors: Vec<Color> = categories
        .iter()
        .map(|category| Color::from(category.color))
        .collect();
    let data: Vec<(f64, &str)> = categories
        .iter()
        .map(|category| (category.total, category.label.as_str()))
        .collect();

    Chart::new()
        .title(Title::new().text("Despesas por Categoria"))
        .tooltip(item_tooltip())
        .legend(Legend::new().bottom("1%"))
        .color(colors)
        .series(
            Pie::new()
                .name("Despesas")
                .radius(vec!["40%", "70%"])
                .center(vec!["50%", "50%"])
                .data(data),
        )
}

#[inline]
fn currency_formatter() -> JsFunction {
    JsFunction::new_with_args(
        "number",
        "const currencyFormatter = new Intl.NumberFormat('pt-BR', {
              style: 'currency',
              currency: 'BRL'
            });
            return (number) ? currencyFormatter.format(number) : \"-\";",
    )
}

/// Creates a tooltip configuration for currency values
fn currency_tooltip() -> Tooltip {
    Tooltip::new()
        .trigger(Trigger::Axis)
        .value_formatter(currency_formatter())
        .axis_pointer(AxisPointer::new().type_(AxisPointerType::Shadow))
}

/// Tooltip for charts where each item is shown on its own, e.g. pie slices.
fn item_tooltip() -> Tooltip {
    Tooltip::new()
        .trigger(Trigger::Item)
        .value_formatter(currency_formatter())
}
