//! Defines the endpoint for creating a new transaction.

use std::sync::Arc;

use axum::{
    Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use serde::Deserialize;
use time::Date;

use crate::{
    endpoints,
    transaction::{Category, Transaction, TransactionType},
    workspace::AppWorkspace,
};

/// The form data for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct TransactionForm {
    /// Text detailing the transaction.
    pub description: String,
    /// The value of the transaction in reais, always positive.
    pub amount: f64,
    /// Whether the money came in or went out.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// A predefined category key or any text typed by the user.
    #[serde(default)]
    pub category: Option<String>,
    /// The date when the transaction ocurred.
    pub date: Date,
}

/// A route handler for creating a new transaction, redirects to the dashboard on success.
///
/// The transaction is stored in the background, the dashboard picks it up
/// from the live transaction list once the write has gone through.
pub async fn create_transaction_endpoint(
    Extension(workspace): Extension<Arc<AppWorkspace>>,
    Form(form): Form<TransactionForm>,
) -> Response {
    let category = form
        .category
        .as_deref()
        .map(Category::from_key)
        .unwrap_or_default();

    let transaction = match Transaction::build(form.amount, form.kind, form.date, &form.description)
        .category(category)
        .validated()
    {
        Ok(transaction) => transaction,
        Err(error) => {
            tracing::debug!("rejected new transaction: {error}");
            return error.into_alert_response();
        }
    };

    workspace.append(transaction);

    (
        HxRedirect(endpoints::DASHBOARD_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::{Extension, http::StatusCode};
    use axum_extra::extract::Form;
    use time::macros::date;

    use crate::{
        endpoints,
        test_utils::{assert_hx_redirect, get_test_app_state, get_test_workspace},
        transaction::{Category, TransactionType},
    };

    use super::{TransactionForm, create_transaction_endpoint};

    fn form(amount: f64, description: &str, category: Option<&str>) -> TransactionForm {
        TransactionForm {
            description: description.to_owned(),
            amount,
            kind: TransactionType::Expense,
            category: category.map(str::to_owned),
            date: date!(2025 - 01 - 15),
        }
    }

    #[tokio::test]
    async fn can_create_transaction() {
        let state = get_test_app_state();
        let workspace = get_test_workspace(&state).await;
        workspace.live().loaded().await;
        let mut snapshots = workspace.live().watch();

        let response = create_transaction_endpoint(
            Extension(workspace.clone()),
            Form(form(45.99, "Mercado", Some("food"))),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::DASHBOARD_VIEW);

        let snapshot = snapshots
            .wait_for(|snapshot| snapshot.transactions.len() == 1)
            .await
            .unwrap()
            .clone();
        let transaction = &snapshot.transactions.as_slice()[0];
        assert_eq!(transaction.description, "Mercado");
        assert_eq!(transaction.amount, 45.99);
        assert_eq!(transaction.kind, TransactionType::Expense);
        assert_eq!(transaction.category, Category::Food);
    }

    #[tokio::test]
    async fn missing_category_becomes_other() {
        let state = get_test_app_state();
        let workspace = get_test_workspace(&state).await;
        workspace.live().loaded().await;
        let mut snapshots = workspace.live().watch();

        create_transaction_endpoint(
            Extension(workspace.clone()),
            Form(form(10.0, "Presente", None)),
        )
        .await;

        let snapshot = snapshots
            .wait_for(|snapshot| snapshot.transactions.len() == 1)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.transactions.as_slice()[0].category, Category::Other);
    }

    #[tokio::test]
    async fn custom_category_is_kept() {
        let state = get_test_app_state();
        let workspace = get_test_workspace(&state).await;
        workspace.live().loaded().await;
        let mut snapshots = workspace.live().watch();

        create_transaction_endpoint(
            Extension(workspace.clone()),
            Form(form(80.0, "Ração", Some("pets"))),
        )
        .await;

        let snapshot = snapshots
            .wait_for(|snapshot| snapshot.transactions.len() == 1)
            .await
            .unwrap()
            .clone();
        assert_eq!(
            snapshot.transactions.as_slice()[0].category,
            Category::Custom("pets".to_owned())
        );
    }

    #[tokio::test]
    async fn rejects_negative_amount() {
        let state = get_test_app_state();
        let workspace = get_test_workspace(&state).await;

        let response = create_transaction_endpoint(
            Extension(workspace.clone()),
            Form(form(-5.0, "Estorno", None)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("hx-redirect").is_none());
    }

    #[tokio::test]
    async fn rejects_blank_description() {
        let state = get_test_app_state();
        let workspace = get_test_workspace(&state).await;

        let response =
            create_transaction_endpoint(Extension(workspace), Form(form(5.0, "   ", None))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
