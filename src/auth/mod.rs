pub mod cognito;
pub mod dev;
pub mod keyring;
pub mod provider;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use self::keyring::StoredSession;
use self::provider::{AuthError, IdentityProvider, TokenSet, UserIdentity};

/// Where the session currently stands. `Unknown` lasts from construction
/// until `resolve` has checked for a cached session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Authenticated(UserIdentity),
    Unauthenticated,
}

/// What the task store needs to authenticate a request.
#[derive(Debug, Clone)]
pub struct RequestCredentials {
    pub id_token: String,
    pub username: String,
}

/// Authentication state over a swappable identity provider.
///
/// Holds at most one error message at a time: each operation clears the
/// previous one on entry, and a failure's message overwrites whatever was
/// there. The session is passed around as an explicit handle, never as
/// global state.
pub struct Session {
    provider: Box<dyn IdentityProvider>,
    state: SessionState,
    tokens: Option<TokenSet>,
    error: Option<String>,
    use_keyring: bool,
}

impl Session {
    pub fn new(provider: Box<dyn IdentityProvider>, use_keyring: bool) -> Self {
        Self {
            provider,
            state: SessionState::Unknown,
            tokens: None,
            error: None,
            use_keyring,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        match &self.state {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Token and username for request headers, or `None` when signed out.
    /// Never fails: a missing session is the silent-fallback condition, not
    /// an error.
    pub fn credentials(&self) -> Option<RequestCredentials> {
        let identity = self.identity()?;
        let tokens = self.tokens.as_ref()?;
        Some(RequestCredentials {
            id_token: tokens.id_token.clone(),
            username: identity.username.clone(),
        })
    }

    /// Settle the initial `Unknown` state by looking for a cached session.
    /// Every failure path here degrades silently to `Unauthenticated`; only
    /// explicit operations record user-visible errors.
    pub async fn resolve(&mut self) {
        if !self.use_keyring {
            self.state = SessionState::Unauthenticated;
            return;
        }
        let stored = match keyring::load_session().await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                self.state = SessionState::Unauthenticated;
                return;
            }
            Err(e) => {
                log::debug!("Keyring unavailable, starting signed out: {}", e);
                self.state = SessionState::Unauthenticated;
                return;
            }
        };

        let tokens = if stored.tokens.is_expired(Utc::now()) {
            let Some(refresh_token) = stored.tokens.refresh_token.as_deref() else {
                log::debug!("Cached session expired with no refresh token");
                self.state = SessionState::Unauthenticated;
                return;
            };
            match self
                .provider
                .refresh_session(&stored.username, refresh_token)
                .await
            {
                Ok(tokens) => tokens,
                Err(e) => {
                    log::debug!("Session refresh failed: {}", e);
                    self.state = SessionState::Unauthenticated;
                    return;
                }
            }
        } else {
            stored.tokens
        };

        match self.provider.current_user(&tokens.access_token).await {
            Ok(identity) => {
                self.persist(&identity.username, &tokens).await;
                self.state = SessionState::Authenticated(identity);
                self.tokens = Some(tokens);
            }
            Err(e) => {
                log::debug!("Cached session rejected by provider: {}", e);
                self.state = SessionState::Unauthenticated;
            }
        }
    }

    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        self.error = None;
        match self.provider.sign_in(username, password).await {
            Ok((tokens, identity)) => {
                self.persist(&identity.username, &tokens).await;
                self.state = SessionState::Authenticated(identity);
                self.tokens = Some(tokens);
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.message.clone());
                Err(e)
            }
        }
    }

    /// Signs out locally no matter what the provider says; a failed remote
    /// revocation is logged, not surfaced.
    pub async fn sign_out(&mut self) {
        self.error = None;
        if let Some(tokens) = &self.tokens {
            if let Err(e) = self.provider.sign_out(&tokens.access_token).await {
                log::warn!("Remote sign-out failed: {}", e);
            }
        }
        if self.use_keyring {
            if let Err(e) = keyring::clear_session().await {
                log::warn!("Failed to clear cached session: {}", e);
            }
        }
        self.state = SessionState::Unauthenticated;
        self.tokens = None;
    }

    pub async fn sign_up(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        self.error = None;
        let result = self.provider.sign_up(username, email, password).await;
        self.record_failure(&result);
        result
    }

    pub async fn confirm_sign_up(&mut self, username: &str, code: &str) -> Result<(), AuthError> {
        self.error = None;
        let result = self.provider.confirm_sign_up(username, code).await;
        self.record_failure(&result);
        result
    }

    pub async fn forgot_password(&mut self, username: &str) -> Result<(), AuthError> {
        self.error = None;
        let result = self.provider.forgot_password(username).await;
        self.record_failure(&result);
        result
    }

    pub async fn confirm_forgot_password(
        &mut self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.error = None;
        let result = self
            .provider
            .confirm_forgot_password(username, code, new_password)
            .await;
        self.record_failure(&result);
        result
    }

    fn record_failure(&mut self, result: &Result<(), AuthError>) {
        if let Err(e) = result {
            self.error = Some(e.message.clone());
        }
    }

    async fn persist(&self, username: &str, tokens: &TokenSet) {
        if !self.use_keyring {
            return;
        }
        let stored = StoredSession {
            username: username.to_string(),
            tokens: tokens.clone(),
        };
        if let Err(e) = keyring::store_session(&stored).await {
            log::warn!("Failed to cache session: {}", e);
        }
    }
}

/// Cloneable handle to the one session, shared between the CLI and the
/// task store client.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }

    /// Snapshot of the current request credentials; `None` when signed out.
    pub async fn credentials(&self) -> Option<RequestCredentials> {
        self.0.lock().await.credentials()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::dev::{DEV_CODE, DevProvider};

    fn session_with(provider: DevProvider) -> Session {
        Session::new(Box::new(provider), false)
    }

    #[tokio::test]
    async fn resolve_without_cache_settles_unauthenticated() {
        let mut session = session_with(DevProvider::new());
        assert_eq!(*session.state(), SessionState::Unknown);
        session.resolve().await;
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(session.credentials().is_none());
    }

    #[tokio::test]
    async fn wrong_credentials_record_an_error_and_stay_signed_out() {
        let mut session = session_with(DevProvider::with_user("maria", "hunter2"));
        session.resolve().await;

        let err = session.sign_in("maria", "wrong").await.unwrap_err();
        assert!(!err.message.is_empty());
        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert_eq!(session.error(), Some(err.message.as_str()));

        // The message survives until cleared...
        assert!(session.error().is_some());
        session.clear_error();
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn next_failure_overwrites_the_previous_error() {
        let mut session = session_with(DevProvider::with_user("maria", "hunter2"));
        session.sign_in("maria", "wrong").await.unwrap_err();
        let first = session.error().unwrap().to_string();

        session.forgot_password("nobody").await.unwrap_err();
        let second = session.error().unwrap().to_string();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn successful_sign_in_authenticates_and_exposes_credentials() {
        let mut session = session_with(DevProvider::with_user("maria", "hunter2"));
        session.sign_in("maria", "hunter2").await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.identity().unwrap().username, "maria");
        let creds = session.credentials().unwrap();
        assert_eq!(creds.username, "maria");
        assert!(!creds.id_token.is_empty());
    }

    #[tokio::test]
    async fn sign_out_clears_identity_and_credentials() {
        let mut session = session_with(DevProvider::with_user("maria", "hunter2"));
        session.sign_in("maria", "hunter2").await.unwrap();
        session.sign_out().await;

        assert_eq!(*session.state(), SessionState::Unauthenticated);
        assert!(session.credentials().is_none());
    }

    #[tokio::test]
    async fn sign_up_then_confirm_then_sign_in() {
        let mut session = session_with(DevProvider::new());
        session
            .sign_up("nina", "nina@example.org", "s3cret!!")
            .await
            .unwrap();
        // Confirmation and sign-in are separate steps: not signed in yet,
        // and sign-in is rejected until confirmed.
        assert!(!session.is_authenticated());
        session.sign_in("nina", "s3cret!!").await.unwrap_err();

        session.clear_error();
        session.confirm_sign_up("nina", DEV_CODE).await.unwrap();
        assert!(!session.is_authenticated());

        session.sign_in("nina", "s3cret!!").await.unwrap();
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let mut session = session_with(DevProvider::with_user("maria", "hunter2"));
        session.forgot_password("maria").await.unwrap();
        session
            .confirm_forgot_password("maria", DEV_CODE, "new-pass-9")
            .await
            .unwrap();
        session.sign_in("maria", "hunter2").await.unwrap_err();
        session.sign_in("maria", "new-pass-9").await.unwrap();
        assert!(session.is_authenticated());
    }
}
