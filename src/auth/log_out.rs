//! Log-out route handler that ends the session and redirects users.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::{
    auth::{AuthState, cookie::get_token_from_cookies, invalidate_auth_cookie},
    endpoints,
    identity::IdentityProvider,
};

/// End the session, invalidate the auth cookie and redirect the client to the log-in page.
///
/// Clients without a valid session are redirected all the same.
pub async fn get_log_out(State(state): State<AuthState>, jar: PrivateCookieJar) -> Response {
    if let Ok(token) = get_token_from_cookies(&jar) {
        let session_id = token.session_id;

        match state.workspaces.remove(session_id) {
            Some(workspace) => workspace.holder().logout().await,
            None => {
                if let Err(error) = state.identity.sign_out(session_id).await {
                    tracing::error!("could not sign out session {session_id}: {error}");
                }
            }
        }
    }

    let jar = invalidate_auth_cookie(jar);

    (jar, Redirect::to(endpoints::LOG_IN_VIEW)).into_response()
}
