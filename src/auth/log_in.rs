//! This file defines the routes for displaying the log-in page and handling log-in requests.
//! The auth module handles the lower level authentication and cookie auth logic.

use std::sync::Arc;

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    Error,
    auth::{AuthState, invalidate_auth_cookie, normalize_redirect_url, set_auth_cookie},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, base, link, loading_spinner, log_in_register, password_input, text_input},
    identity::SqliteIdentityProvider,
    session::SessionHolder,
    timezone::get_local_offset,
    workspace::Workspace,
};

fn log_in_form(email: &str, error_message: Option<&str>, redirect_url: Option<&str>) -> Markup {
    let error_messages: Vec<&str> = error_message.into_iter().collect();

    html! {
        form
            hx-post=(endpoints::LOG_IN_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#email, #password, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            @if let Some(redirect_url) = redirect_url {
                input type="hidden" name="redirect_url" value=(redirect_url);
            }

            (text_input("email", "email", "Email", email, None))
            (password_input("password", "Senha", 0, &error_messages))

            div class="flex items-center gap-x-3"
            {
                input
                    type="checkbox"
                    name="remember_me"
                    id="remember_me"
                    tabindex="0"
                    class="rounded-xs";

                label
                    for="remember_me"
                    class="block text-sm font-medium text-gray-900 dark:text-white"
                {
                    "Manter conectado por uma semana"
                }
            }

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Entrar"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Não tem uma conta? "
                (link(endpoints::REGISTER_VIEW, "Cadastre-se"))
            }
        }
    }
}

fn parse_redirect_url(raw_url: Option<&str>, source: &str) -> Option<String> {
    match raw_url.and_then(normalize_redirect_url) {
        Some(redirect_url) => Some(redirect_url),
        None => {
            if let Some(redirect_url) = raw_url {
                tracing::warn!("Invalid redirect URL from {source}: {redirect_url}");
            }
            None
        }
    }
}

/// Display the log-in page.
pub async fn get_log_in_page(Query(query): Query<RedirectQuery>) -> Response {
    let redirect_url = parse_redirect_url(query.redirect_url.as_deref(), "log-in query");
    let log_in_form = log_in_form("", None, redirect_url.as_deref());
    let content = log_in_register("Entre na sua conta", &log_in_form);
    base("Entrar", &[], &content).into_response()
}

/// How long the session should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// Open a workspace for the authenticated `holder`, set the auth cookie and
/// send the client to `redirect_url`.
///
/// Shared by log-in and registration, which both end with a fresh session.
pub(super) fn start_session(
    state: &AuthState,
    jar: PrivateCookieJar,
    holder: SessionHolder<SqliteIdentityProvider>,
    cookie_duration: Duration,
    redirect_url: &str,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        return Error::InvalidTimezoneError(state.local_timezone.clone()).into_response();
    };

    let Some(session_id) = holder.session_id() else {
        tracing::error!("Tried to start a session without an authenticated user.");
        return Error::SessionNotFound.into_response();
    };
    let Some(workspace) = Workspace::open(holder, state.transactions.clone()) else {
        tracing::error!("Session {session_id} ended before its workspace could be opened.");
        return Error::SessionNotFound.into_response();
    };
    state.workspaces.insert(session_id, workspace);

    set_auth_cookie(jar.clone(), session_id, cookie_duration, local_offset)
        .map(|updated_jar| {
            (
                StatusCode::SEE_OTHER,
                HxRedirect(redirect_url.to_owned()),
                updated_jar,
            )
        })
        .map_err(|err| {
            tracing::error!("Error setting auth cookie: {err}");
            state.workspaces.remove(session_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HxRedirect(endpoints::INTERNAL_ERROR_VIEW.to_owned()),
                invalidate_auth_cookie(jar),
            )
        })
        .into_response()
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request, the auth cookie is set and the client is redirected to the
/// dashboard page, or the page they were on before being sent to log in.
/// Otherwise, the form is returned with an error message explaining the problem.
pub async fn post_log_in(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let redirect_url = parse_redirect_url(user_data.redirect_url.as_deref(), "log-in form");
    let redirect_url = redirect_url.as_deref();

    let holder = SessionHolder::new(Arc::clone(&state.identity));
    let outcome = holder.login(&user_data.email, &user_data.password).await;

    if !outcome.success {
        return log_in_form(&user_data.email, Some(&outcome.message), redirect_url)
            .into_response();
    }

    let cookie_duration = if user_data.remember_me.is_some() {
        holder.refresh(REMEMBER_ME_COOKIE_DURATION).await;
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    start_session(
        &state,
        jar,
        holder,
        cookie_duration,
        redirect_url.unwrap_or(endpoints::DASHBOARD_VIEW),
    )
}

#[derive(Deserialize)]
pub struct RedirectQuery {
    pub redirect_url: Option<String>,
}

/// The raw data entered by the user in the log-in form.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password hash in the database.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    pub email: String,

    /// Password entered during log-in.
    pub password: String,

    /// Whether to extend the initial session duration.
    ///
    /// This value comes from a checkbox, so it either has a string value or is not set
    /// (see the [MDN docs](https://developer.mozilla.org/en-US/docs/Web/HTML/Element/input/checkbox#value_2)).
    /// The `Some` variant should be interpreted as `true` irregardless of the
    /// string value, and the `None` variant should be interpreted as `false`.
    pub remember_me: Option<String>,

    /// Optional URL to redirect to after logging in.
    /// Only accepted from the log-in form submission.
    pub redirect_url: Option<String>,
}


#[cfg(test)]
mod log_in_tests {
    use axum::{Router, extract::FromRef, http::StatusCode, routing::post};
    use axum_test::{TestResponse, TestServer};
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        AppState,
        auth::{AuthState, COOKIE_TOKEN},
        endpoints,
        identity::{IdentityProvider, Profile},
        session::INVALID_CREDENTIALS_MSG,
    };

    use super::{REMEMBER_ME_COOKIE_DURATION, post_log_in};

    const EMAIL: &str = "maria@gmail.com";
    const PASSWORD: &str = "Senha#Forte1";

    async fn get_test_server() -> (TestServer, AuthState) {
        let connection = Connection::open_in_memory().unwrap();
        let app_state = AppState::with_hash_cost(connection, "foobar", "Etc/UTC", 4).unwrap();
        let state = AuthState::from_ref(&app_state);
        let session = state
            .identity
            .sign_up(
                EMAIL,
                PASSWORD,
                Profile {
                    name: "Maria".to_owned(),
                },
            )
            .await
            .unwrap();
        state.identity.sign_out(session.id).await.unwrap();

        let app = Router::new()
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .with_state(state.clone());

        (
            TestServer::try_new(app).expect("Could not create test server."),
            state,
        )
    }

    #[track_caller]
    fn assert_hx_redirect(response: &TestResponse, want: &str) {
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(response.header("hx-redirect"), want);
    }

    #[track_caller]
    fn assert_date_time_close(left: OffsetDateTime, right: OffsetDateTime) {
        assert!(
            (left - right).abs() < Duration::seconds(2),
            "got date time {left:?}, want {right:?}"
        );
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let (server, state) = get_test_server().await;

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[("email", EMAIL), ("password", PASSWORD)])
            .await;

        assert_hx_redirect(&response, endpoints::DASHBOARD_VIEW);
        response.cookie(COOKIE_TOKEN);
        assert_eq!(state.workspaces.len(), 1);
    }

    #[tokio::test]
    async fn log_in_redirects_to_requested_url() {
        let (server, _) = get_test_server().await;
        let redirect_url = "/transactions?search=mercado";

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[
                ("email", EMAIL),
                ("password", PASSWORD),
                ("redirect_url", redirect_url),
            ])
            .await;

        assert_hx_redirect(&response, redirect_url);
    }

    #[tokio::test]
    async fn log_in_falls_back_on_invalid_redirect_url() {
        let (server, _) = get_test_server().await;

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[
                ("email", EMAIL),
                ("password", PASSWORD),
                ("redirect_url", "https://example.com"),
            ])
            .await;

        assert_hx_redirect(&response, endpoints::DASHBOARD_VIEW);
    }

    #[tokio::test]
    async fn log_in_fails_with_missing_credentials() {
        let (server, _) = get_test_server().await;

        server
            .post(endpoints::LOG_IN_API)
            .content_type("application/x-www-form-urlencoded")
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn log_in_fails_with_incorrect_password() {
        let (server, state) = get_test_server().await;

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[("email", EMAIL), ("password", "wrongpassword")])
            .await;

        response.assert_status_ok();
        assert!(response.text().contains(INVALID_CREDENTIALS_MSG));
        assert!(response.headers().get("set-cookie").is_none());
        assert!(state.workspaces.is_empty());
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let (server, _) = get_test_server().await;

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[("email", "joao@gmail.com"), ("password", PASSWORD)])
            .await;

        response.assert_status_ok();
        assert!(response.text().contains(INVALID_CREDENTIALS_MSG));
    }

    #[tokio::test]
    async fn remember_me_extends_auth_cookie() {
        let (server, _) = get_test_server().await;

        let response = server
            .post(endpoints::LOG_IN_API)
            .form(&[
                ("email", EMAIL),
                ("password", PASSWORD),
                ("remember_me", "on"),
            ])
            .await;

        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        let token_cookie = response.cookie(COOKIE_TOKEN);
        assert_date_time_close(
            token_cookie.expires_datetime().unwrap(),
            OffsetDateTime::now_utc() + REMEMBER_ME_COOKIE_DURATION,
        );
    }
}
