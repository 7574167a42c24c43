//! The registration page for creating a new account.

use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;
use maud::{Markup, html};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AuthState, log_in::start_session},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, base, link, loading_spinner, log_in_register, password_input,
        text_input,
    },
    identity::{EmailAddress, PASSWORD_MIN_LENGTH, password_problems},
    session::{INVALID_EMAIL_MSG, SessionHolder},
    user::display_name,
};

const UNACCEPTED_DOMAIN_MSG: &str =
    "Use um email de um provedor conhecido, como Gmail ou Outlook";
const PASSWORD_MISMATCH_MSG: &str = "As senhas não coincidem";

/// The problems found with a registration form, grouped by the field they belong to.
#[derive(Debug, Default)]
struct FormErrors<'a> {
    email: Option<&'a str>,
    password: Vec<&'a str>,
    confirm_password: Vec<&'a str>,
}

impl FormErrors<'_> {
    fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_empty() && self.confirm_password.is_empty()
    }
}

fn registration_form(name: &str, email: &str, errors: &FormErrors) -> Markup {
    html! {
        form
            hx-post=(endpoints::USERS)
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            (text_input("name", "text", "Nome", name, None))
            (text_input("email", "email", "Email", email, errors.email))
            (password_input("password", "Senha", PASSWORD_MIN_LENGTH, &errors.password))
            (password_input(
                "confirm_password",
                "Confirmar senha",
                PASSWORD_MIN_LENGTH,
                &errors.confirm_password,
            ))

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Criar conta"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Já tem uma conta? "
                (link(endpoints::LOG_IN_VIEW, "Entrar"))
            }
        }
    }
}

/// Display the registration page.
pub async fn get_register_page() -> Response {
    let registration_form = registration_form("", "", &FormErrors::default());
    let content = log_in_register("Crie sua conta", &registration_form);
    base("Cadastro", &[], &content).into_response()
}

#[derive(Serialize, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Check the form before anything is sent to the identity provider.
///
/// Every failing password rule is reported, not just the first.
fn validate(form: &RegisterForm) -> (Option<EmailAddress>, FormErrors<'static>) {
    let mut errors = FormErrors::default();

    let email = match EmailAddress::new(&form.email) {
        Ok(email) if email.has_accepted_domain() => Some(email),
        Ok(_) => {
            errors.email = Some(UNACCEPTED_DOMAIN_MSG);
            None
        }
        Err(_) => {
            errors.email = Some(INVALID_EMAIL_MSG);
            None
        }
    };

    errors.password = password_problems(&form.password);

    if form.password != form.confirm_password {
        errors.confirm_password.push(PASSWORD_MISMATCH_MSG);
    }

    (email, errors)
}

/// Handler for registration requests via the POST method.
///
/// A new account starts a session straight away and the client is sent to the dashboard.
pub async fn register_user(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<RegisterForm>,
) -> Response {
    let (email, errors) = validate(&user_data);

    let email = match email {
        Some(email) if errors.is_empty() => email,
        _ => {
            return registration_form(&user_data.name, &user_data.email, &errors).into_response();
        }
    };

    let name = display_name(Some(&user_data.name), &email);
    let holder = SessionHolder::new(Arc::clone(&state.identity));
    let outcome = holder
        .register(&name, email.as_str(), &user_data.password)
        .await;

    if !outcome.success {
        let errors = FormErrors {
            email: Some(outcome.message.as_str()),
            ..Default::default()
        };
        return registration_form(&user_data.name, &user_data.email, &errors).into_response();
    }

    tracing::info!("registered new account for {}", email.as_str());
    start_session(
        &state,
        jar,
        holder,
        state.cookie_duration,
        endpoints::DASHBOARD_VIEW,
    )
}
