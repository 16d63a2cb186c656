use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure from the identity provider. The message is whatever the provider
/// said, surfaced to the user verbatim.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The signed-in user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    pub attributes: HashMap<String, String>,
}

/// Tokens issued on sign-in. The id token goes into request headers; the
/// refresh token lets a stored session outlive the id token's expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// One interface over the identity provider, with swappable implementations
/// chosen at startup: the Cognito user-pool API for real deployments, an
/// in-memory variant for local development and tests.
///
/// Every operation is a one-shot request/response; none of them mutates any
/// session state here — that is the `Session`'s job.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate with username and password, returning tokens and the
    /// resolved identity.
    async fn sign_in(&self, username: &str, password: &str)
    -> Result<(TokenSet, UserIdentity), AuthError>;

    /// Exchange a refresh token for a fresh token set.
    async fn refresh_session(&self, username: &str, refresh_token: &str)
    -> Result<TokenSet, AuthError>;

    /// Look up the identity behind an access token.
    async fn current_user(&self, access_token: &str) -> Result<UserIdentity, AuthError>;

    /// Register a new account. Confirmation and sign-in remain separate steps.
    async fn sign_up(&self, username: &str, email: &str, password: &str)
    -> Result<(), AuthError>;

    /// Confirm a registration with the emailed code.
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), AuthError>;

    /// Invalidate the session server-side.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Start a password reset; the provider sends a code out of band.
    async fn forgot_password(&self, username: &str) -> Result<(), AuthError>;

    /// Complete a password reset with the code.
    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}
