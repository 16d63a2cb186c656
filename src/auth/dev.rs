use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::provider::{AuthError, IdentityProvider, TokenSet, UserIdentity};

/// Confirmation code the dev provider "sends" for sign-up and password reset.
pub const DEV_CODE: &str = "000000";

#[derive(Debug, Clone)]
struct DevUser {
    password: String,
    email: String,
    confirmed: bool,
}

/// In-memory identity provider for local development, and the test double
/// for the session state machine. Sign-up, confirmation, and password reset
/// all work, with a fixed confirmation code instead of email delivery.
#[derive(Default)]
pub struct DevProvider {
    users: Mutex<HashMap<String, DevUser>>,
}

impl DevProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a confirmed account, e.g. from config or a test.
    pub fn with_user(username: &str, password: &str) -> Self {
        let provider = Self::new();
        provider.users.lock().unwrap().insert(
            username.to_string(),
            DevUser {
                password: password.to_string(),
                email: format!("{}@localhost", username),
                confirmed: true,
            },
        );
        provider
    }

    fn token_for(username: &str) -> TokenSet {
        TokenSet {
            id_token: format!("dev-id-{}", username),
            access_token: format!("dev-access-{}", username),
            refresh_token: Some(format!("dev-refresh-{}", username)),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn identity_for(username: &str, email: &str) -> UserIdentity {
        let mut attributes = HashMap::new();
        attributes.insert("email".to_string(), email.to_string());
        UserIdentity {
            username: username.to_string(),
            attributes,
        }
    }
}

#[async_trait]
impl IdentityProvider for DevProvider {
    async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(TokenSet, UserIdentity), AuthError> {
        let users = self.users.lock().unwrap();
        let user = users
            .get(username)
            .ok_or_else(|| AuthError::new("Incorrect username or password."))?;
        if user.password != password {
            return Err(AuthError::new("Incorrect username or password."));
        }
        if !user.confirmed {
            return Err(AuthError::new("User is not confirmed."));
        }
        Ok((
            Self::token_for(username),
            Self::identity_for(username, &user.email),
        ))
    }

    async fn refresh_session(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<TokenSet, AuthError> {
        if refresh_token != format!("dev-refresh-{}", username) {
            return Err(AuthError::new("Invalid refresh token."));
        }
        Ok(Self::token_for(username))
    }

    async fn current_user(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        let username = access_token
            .strip_prefix("dev-access-")
            .ok_or_else(|| AuthError::new("Invalid access token."))?;
        let users = self.users.lock().unwrap();
        let user = users
            .get(username)
            .ok_or_else(|| AuthError::new("Invalid access token."))?;
        Ok(Self::identity_for(username, &user.email))
    }

    async fn sign_up(&self, username: &str, email: &str, password: &str)
    -> Result<(), AuthError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(username) {
            return Err(AuthError::new("User already exists"));
        }
        users.insert(
            username.to_string(),
            DevUser {
                password: password.to_string(),
                email: email.to_string(),
                confirmed: false,
            },
        );
        Ok(())
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), AuthError> {
        if code != DEV_CODE {
            return Err(AuthError::new("Invalid verification code provided."));
        }
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(username)
            .ok_or_else(|| AuthError::new("Username/client id combination not found."))?;
        user.confirmed = true;
        Ok(())
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn forgot_password(&self, username: &str) -> Result<(), AuthError> {
        let users = self.users.lock().unwrap();
        if !users.contains_key(username) {
            return Err(AuthError::new("Username/client id combination not found."));
        }
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if code != DEV_CODE {
            return Err(AuthError::new("Invalid verification code provided."));
        }
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(username)
            .ok_or_else(|| AuthError::new("Username/client id combination not found."))?;
        user.password = new_password.to_string();
        Ok(())
    }
}
