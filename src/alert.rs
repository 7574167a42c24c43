//! Alert system for displaying error messages to users.
//!
//! Alerts are swapped into the `#alert-container` element that [crate::html::base]
//! places at the bottom of every page. Forms target it with `hx-target-error`.

use axum::response::{Html, IntoResponse, Response};
use maud::{Markup, html};

/// A dismissible error message for the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Error { message: String, details: String },
    ErrorSimple { message: String },
}

impl Alert {
    pub fn into_html(self) -> Markup {
        let (message, details) = match self {
            Alert::Error { message, details } => (message, Some(details)),
            Alert::ErrorSimple { message } => (message, None),
        };

        html! {
            div
                class="flex p-4 mb-4 text-red-800 border border-red-300 rounded-lg bg-red-50
                    dark:bg-gray-800 dark:text-red-400 dark:border-red-800"
                role="alert"
            {
                div class="ms-3 text-sm"
                {
                    p class="font-medium" { (message) }

                    @if let Some(details) = details.filter(|details| !details.is_empty())
                    {
                        p class="mt-1" { (details) }
                    }
                }

                button
                    type="button"
                    class="ms-auto -mx-1.5 -my-1.5 rounded-lg p-1.5 inline-flex items-center justify-center h-8 w-8"
                    aria-label="Fechar"
                    onclick="this.closest('[role=alert]').remove()"
                {
                    "×"
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        Html(self.into_html().into_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::Alert;

    fn render(alert: Alert) -> Html {
        Html::parse_fragment(&alert.into_html().into_string())
    }

    #[test]
    fn error_alert_shows_message_and_details() {
        let html = render(Alert::Error {
            message: "Valor inválido".to_owned(),
            details: "Use um número positivo.".to_owned(),
        });

        let alert = html
            .select(&Selector::parse("[role=alert]").unwrap())
            .next()
            .expect("alert missing");
        let text = alert.text().collect::<String>();
        assert!(text.contains("Valor inválido"));
        assert!(text.contains("Use um número positivo."));
    }

    #[test]
    fn simple_alert_has_no_details() {
        let html = render(Alert::ErrorSimple {
            message: "A descrição da transação é obrigatória".to_owned(),
        });

        let paragraphs = html.select(&Selector::parse("p").unwrap()).count();
        assert_eq!(paragraphs, 1);
    }
}
