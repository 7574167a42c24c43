//! The page shown for routes that do not exist.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

pub async fn get_404_not_found() -> Response {
    get_404_not_found_response()
}

pub fn get_404_not_found_response() -> Response {
    let page = error_view(
        "Página não encontrada",
        "404",
        "Página não encontrada",
        "A página que você procura não existe ou foi movida.",
    );

    (StatusCode::NOT_FOUND, Html(page.into_string())).into_response()
}
