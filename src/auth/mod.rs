//! Cookie based sessions on top of the identity provider.
//!
//! The auth cookie holds an encrypted session ID. The middleware resolves it to the
//! session's workspace, and the log-in, registration and log-out handlers start
//! and end sessions.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod redirect;
mod register;
mod token;

pub(crate) use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie};
pub use log_in::{get_log_in_page, post_log_in};
pub use log_out::get_log_out;
pub use middleware::{AuthState, auth_guard, auth_guard_hx};
pub use redirect::normalize_redirect_url;
pub use register::{get_register_page, register_user};
pub(super) use token::Token;

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
