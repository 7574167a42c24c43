//! Holds the identity of one client and keeps it in step with the identity provider.
//!
//! A [SessionHolder] is created unauthenticated ([SessionHolder::new]) or from
//! an existing provider session ([SessionHolder::restore]). While it lives, a
//! background task listens to the provider's auth events and clears or updates
//! the identity when the session expires, is signed out elsewhere or is refreshed.
//! Dropping the holder stops that task.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, watch},
    task::JoinHandle,
};

use crate::{
    Error,
    identity::{AuthEvent, AuthSession, IdentityProvider, Profile, SessionId},
    user::User,
};

pub const LOG_IN_SUCCESS_MSG: &str = "Login realizado com sucesso";
pub const INVALID_CREDENTIALS_MSG: &str = "Email ou senha incorretos";
pub const LOG_IN_ERROR_MSG: &str = "Ocorreu um erro ao fazer login";
pub const REGISTER_SUCCESS_MSG: &str = "Conta criada com sucesso";
pub const DUPLICATE_EMAIL_MSG: &str = "Este email já está cadastrado";
pub const INVALID_EMAIL_MSG: &str = "Por favor, insira um email válido";
pub const REGISTER_ERROR_MSG: &str = "Ocorreu um erro ao criar a conta";

/// The result of a log-in or registration attempt.
///
/// Failures are reported here instead of as errors, `message` is ready to show to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub success: bool,
    pub message: String,
}

impl AuthOutcome {
    fn success(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_owned(),
        }
    }

    fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_owned(),
        }
    }
}

/// The identity currently held, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub session: Option<AuthSession>,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|session| &session.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// The authenticated identity of a single client.
pub struct SessionHolder<P: IdentityProvider> {
    provider: Arc<P>,
    state: Arc<watch::Sender<AuthState>>,
    listener: JoinHandle<()>,
}

impl<P: IdentityProvider> SessionHolder<P> {
    /// Create a holder with no active identity.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(provider: Arc<P>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let state = Arc::new(state);
        let listener = tokio::spawn(listen_for_auth_events(
            provider.on_auth_state_change(),
            provider.clone(),
            state.clone(),
        ));

        Self {
            provider,
            state,
            listener,
        }
    }

    /// Create a holder for an existing provider session.
    ///
    /// The holder ends up unauthenticated if the session is unknown, has
    /// expired, or the provider could not be reached.
    pub async fn restore(provider: Arc<P>, session_id: SessionId) -> Self {
        let holder = Self::new(provider);

        match holder.provider.get_session(session_id).await {
            Ok(Some(session)) => {
                holder.state.send_replace(AuthState {
                    session: Some(session),
                });
            }
            Ok(None) => tracing::debug!("session {session_id} no longer exists"),
            Err(error) => tracing::error!("could not restore session {session_id}: {error}"),
        }

        holder
    }

    /// Log in with an email and password, replacing any active identity on success.
    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        match self.provider.sign_in(email, password).await {
            Ok(session) => {
                tracing::info!("user {} logged in", session.user.id);
                self.state.send_replace(AuthState {
                    session: Some(session),
                });
                AuthOutcome::success(LOG_IN_SUCCESS_MSG)
            }
            Err(Error::InvalidCredentials) => AuthOutcome::failure(INVALID_CREDENTIALS_MSG),
            Err(error) => {
                tracing::error!("unexpected error while logging in: {error}");
                AuthOutcome::failure(LOG_IN_ERROR_MSG)
            }
        }
    }

    /// Create an account and make it the active identity.
    ///
    /// The active identity is left untouched when registration fails, for
    /// example because the email is already registered.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthOutcome {
        let profile = Profile {
            name: name.to_owned(),
        };

        match self.provider.sign_up(email, password, profile).await {
            Ok(session) => {
                self.state.send_replace(AuthState {
                    session: Some(session),
                });
                AuthOutcome::success(REGISTER_SUCCESS_MSG)
            }
            Err(Error::DuplicateEmail) => AuthOutcome::failure(DUPLICATE_EMAIL_MSG),
            Err(Error::InvalidEmail(_)) => AuthOutcome::failure(INVALID_EMAIL_MSG),
            Err(Error::TooWeak(reason)) => AuthOutcome::failure(&reason),
            Err(error) => {
                tracing::error!("unexpected error while registering: {error}");
                AuthOutcome::failure(REGISTER_ERROR_MSG)
            }
        }
    }

    /// End the session at the provider and clear the active identity.
    ///
    /// The identity is cleared even if the provider could not be reached.
    pub async fn logout(&self) {
        let session_id = self.session_id();

        if let Some(session_id) = session_id
            && let Err(error) = self.provider.sign_out(session_id).await
        {
            tracing::error!("could not sign out session {session_id}: {error}");
        }

        self.state.send_replace(AuthState::default());
    }

    /// Keep the active session valid for at least `duration`.
    pub async fn refresh(&self, duration: Duration) {
        let Some(session_id) = self.session_id() else {
            return;
        };

        match self.provider.refresh_session(session_id, duration).await {
            Ok(Some(session)) => {
                self.state.send_if_modified(|state| {
                    let is_same_session = state.session.as_ref().map(|s| s.id) == Some(session.id);
                    if is_same_session && state.session.as_ref() != Some(&session) {
                        state.session = Some(session);
                        true
                    } else {
                        false
                    }
                });
            }
            Ok(None) => clear_session(&self.state, session_id),
            Err(error) => tracing::error!("could not refresh session {session_id}: {error}"),
        }
    }

    /// The user that is currently logged in.
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// The ID of the active session.
    pub fn session_id(&self) -> Option<SessionId> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|session| session.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// When the active session runs out, `None` without one.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|session| session.expires_at)
    }

    /// Watch the identity for changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

impl<P: IdentityProvider> Drop for SessionHolder<P> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen_for_auth_events<P: IdentityProvider>(
    mut events: broadcast::Receiver<AuthEvent>,
    provider: Arc<P>,
    state: Arc<watch::Sender<AuthState>>,
) {
    loop {
        match events.recv().await {
            Ok(event) => apply_auth_event(&state, event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("missed {skipped} auth events, checking session with provider");
                resync_session(provider.as_ref(), &state).await;
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Update `state` for an event about the session it holds. Events about other sessions are ignored.
fn apply_auth_event(state: &watch::Sender<AuthState>, event: AuthEvent) {
    let event_session_id = event.session_id();

    state.send_if_modified(|state| {
        let Some(current) = &state.session else {
            return false;
        };

        if current.id != event_session_id {
            return false;
        }

        match event {
            AuthEvent::SignedOut(_) | AuthEvent::SessionExpired(_) => {
                tracing::info!("session {event_session_id} ended by the identity provider");
                state.session = None;
                true
            }
            AuthEvent::TokenRefreshed(session) | AuthEvent::SignedIn(session) => {
                if state.session.as_ref() == Some(&session) {
                    false
                } else {
                    state.session = Some(session);
                    true
                }
            }
        }
    });
}

async fn resync_session<P: IdentityProvider>(provider: &P, state: &watch::Sender<AuthState>) {
    let session_id = state.borrow().session.as_ref().map(|session| session.id);
    let Some(session_id) = session_id else {
        return;
    };

    match provider.get_session(session_id).await {
        Ok(Some(session)) => apply_auth_event(state, AuthEvent::TokenRefreshed(session)),
        Ok(None) => clear_session(state, session_id),
        Err(error) => tracing::error!("could not check session {session_id}: {error}"),
    }
}

fn clear_session(state: &watch::Sender<AuthState>, session_id: SessionId) {
    state.send_if_modified(|state| {
        if state.session.as_ref().map(|session| session.id) == Some(session_id) {
            state.session = None;
            true
        } else {
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::Duration;
    use tokio::sync::broadcast;

    use crate::{
        Error,
        db::initialize,
        identity::{AuthEvent, AuthSession, IdentityProvider, Profile, SessionId, SqliteIdentityProvider},
    };

    use super::{
        AuthOutcome, DUPLICATE_EMAIL_MSG, INVALID_CREDENTIALS_MSG, LOG_IN_ERROR_MSG,
        LOG_IN_SUCCESS_MSG, REGISTER_ERROR_MSG, REGISTER_SUCCESS_MSG, SessionHolder,
    };

    const PASSWORD: &str = "Senha$egura1";

    fn get_provider() -> Arc<SqliteIdentityProvider> {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        Arc::new(SqliteIdentityProvider::new(
            Arc::new(Mutex::new(connection)),
            4,
            Duration::minutes(5),
        ))
    }

    /// A provider whose every call fails, as if the network were down.
    struct UnreachableProvider {
        events: broadcast::Sender<AuthEvent>,
    }

    impl UnreachableProvider {
        fn new() -> Self {
            Self {
                events: broadcast::channel(1).0,
            }
        }
    }

    impl IdentityProvider for UnreachableProvider {
        async fn sign_in(&self, _: &str, _: &str) -> Result<AuthSession, Error> {
            Err(Error::DatabaseLockError)
        }

        async fn sign_up(&self, _: &str, _: &str, _: Profile) -> Result<AuthSession, Error> {
            Err(Error::DatabaseLockError)
        }

        async fn sign_out(&self, _: SessionId) -> Result<(), Error> {
            Err(Error::DatabaseLockError)
        }

        async fn get_session(&self, _: SessionId) -> Result<Option<AuthSession>, Error> {
            Err(Error::DatabaseLockError)
        }

        async fn refresh_session(
            &self,
            _: SessionId,
            _: Duration,
        ) -> Result<Option<AuthSession>, Error> {
            Err(Error::DatabaseLockError)
        }

        fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }
    }

    #[tokio::test]
    async fn register_makes_new_user_active() {
        let holder = SessionHolder::new(get_provider());

        let outcome = holder.register("Maria", "maria@gmail.com", PASSWORD).await;

        assert_eq!(
            outcome,
            AuthOutcome {
                success: true,
                message: REGISTER_SUCCESS_MSG.to_owned()
            }
        );
        let user = holder.current_user().expect("user should be logged in");
        assert_eq!(user.name, "Maria");
        assert_eq!(user.email.as_str(), "maria@gmail.com");
    }

    #[tokio::test]
    async fn register_with_existing_email_keeps_active_session() {
        let provider = get_provider();
        let holder = SessionHolder::new(provider.clone());
        holder.register("Maria", "maria@gmail.com", PASSWORD).await;
        let session_before = holder.subscribe().borrow().clone();

        let outcome = holder.register("Joana", "maria@gmail.com", PASSWORD).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, DUPLICATE_EMAIL_MSG);
        assert_eq!(*holder.subscribe().borrow(), session_before);
    }

    #[tokio::test]
    async fn register_with_existing_email_leaves_anonymous_holder_anonymous() {
        let provider = get_provider();
        SessionHolder::new(provider.clone())
            .register("Maria", "maria@gmail.com", PASSWORD)
            .await;
        let holder = SessionHolder::new(provider);

        let outcome = holder.register("Joana", "maria@gmail.com", PASSWORD).await;

        assert!(!outcome.success);
        assert!(!holder.is_authenticated());
    }

    #[tokio::test]
    async fn login_with_valid_credentials() {
        let provider = get_provider();
        SessionHolder::new(provider.clone())
            .register("Maria", "maria@gmail.com", PASSWORD)
            .await;
        let holder = SessionHolder::new(provider);

        let outcome = holder.login("maria@gmail.com", PASSWORD).await;

        assert!(outcome.success);
        assert_eq!(outcome.message, LOG_IN_SUCCESS_MSG);
        assert!(holder.is_authenticated());
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails_with_message() {
        let provider = get_provider();
        SessionHolder::new(provider.clone())
            .register("Maria", "maria@gmail.com", PASSWORD)
            .await;
        let holder = SessionHolder::new(provider);

        let outcome = holder.login("maria@gmail.com", "Errada$123").await;

        assert_eq!(
            outcome,
            AuthOutcome {
                success: false,
                message: INVALID_CREDENTIALS_MSG.to_owned()
            }
        );
        assert!(!holder.is_authenticated());
    }

    #[tokio::test]
    async fn provider_failures_become_failed_outcomes() {
        let holder = SessionHolder::new(Arc::new(UnreachableProvider::new()));

        let login = holder.login("maria@gmail.com", PASSWORD).await;
        let register = holder.register("Maria", "maria@gmail.com", PASSWORD).await;
        holder.logout().await;

        assert_eq!(login.message, LOG_IN_ERROR_MSG);
        assert!(!login.success);
        assert_eq!(register.message, REGISTER_ERROR_MSG);
        assert!(!register.success);
        assert!(!holder.is_authenticated());
    }

    #[tokio::test]
    async fn restore_resolves_existing_session() {
        let provider = get_provider();
        let first = SessionHolder::new(provider.clone());
        first.register("Maria", "maria@gmail.com", PASSWORD).await;
        let session_id = first.session_id().unwrap();

        let restored = SessionHolder::restore(provider, session_id).await;

        assert_eq!(restored.current_user(), first.current_user());
    }

    #[tokio::test]
    async fn restore_unknown_session_is_unauthenticated() {
        let restored = SessionHolder::restore(get_provider(), SessionId::new(99)).await;

        assert!(!restored.is_authenticated());
    }

    #[tokio::test]
    async fn restore_with_unreachable_provider_is_unauthenticated() {
        let restored =
            SessionHolder::restore(Arc::new(UnreachableProvider::new()), SessionId::new(1)).await;

        assert!(!restored.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_identity_and_ends_session() {
        let provider = get_provider();
        let holder = SessionHolder::new(provider.clone());
        holder.register("Maria", "maria@gmail.com", PASSWORD).await;
        let session_id = holder.session_id().unwrap();

        holder.logout().await;

        assert!(!holder.is_authenticated());
        assert_eq!(provider.get_session(session_id).await, Ok(None));
    }

    #[tokio::test]
    async fn sign_out_elsewhere_clears_identity() {
        let provider = get_provider();
        let holder = SessionHolder::new(provider.clone());
        holder.register("Maria", "maria@gmail.com", PASSWORD).await;
        let session_id = holder.session_id().unwrap();
        let mut state = holder.subscribe();

        provider.sign_out(session_id).await.unwrap();

        state
            .wait_for(|state| !state.is_authenticated())
            .await
            .expect("holder should still be alive");
        assert!(holder.current_user().is_none());
    }

    #[tokio::test]
    async fn events_for_other_sessions_are_ignored() {
        let provider = get_provider();
        let holder = SessionHolder::new(provider.clone());
        holder.register("Maria", "maria@gmail.com", PASSWORD).await;
        let other = SessionHolder::new(provider.clone());
        other.register("Joana", "joana@gmail.com", PASSWORD).await;

        other.logout().await;
        // Give the listener a chance to run before checking.
        tokio::task::yield_now().await;

        assert!(holder.is_authenticated());
        assert!(!other.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_updates_session_expiry() {
        let provider = get_provider();
        let holder = SessionHolder::new(provider.clone());
        holder.register("Maria", "maria@gmail.com", PASSWORD).await;
        let before = holder.subscribe().borrow().session.clone().unwrap();

        holder.refresh(Duration::days(7)).await;

        let after = holder.subscribe().borrow().session.clone().unwrap();
        assert_eq!(after.id, before.id);
        assert!(after.expires_at > before.expires_at);
    }
}
