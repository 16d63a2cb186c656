use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{Value, json};

use super::provider::{AuthError, IdentityProvider, TokenSet, UserIdentity};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

/// Identity provider backed by the Cognito user-pool JSON API.
///
/// Each operation is a POST to the regional endpoint with an
/// `X-Amz-Target` header naming the operation; user-pool public clients
/// need no request signing.
pub struct CognitoProvider {
    endpoint: String,
    client_id: String,
    http: Client,
}

impl CognitoProvider {
    pub fn new(region: &str, client_id: &str) -> Result<Self, AuthError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AuthError::new(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: format!("https://cognito-idp.{}.amazonaws.com/", region),
            client_id: client_id.to_string(),
            http,
        })
    }

    /// POST one operation and parse the JSON response. Cognito reports
    /// failures as `{"__type": ..., "message": ...}`; the message is passed
    /// through verbatim.
    async fn call(&self, operation: &str, body: Value) -> Result<Value, AuthError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", format!("{}.{}", TARGET_PREFIX, operation))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::new(format!("{} request failed: {}", operation, e)))?;

        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| AuthError::new(format!("Failed to parse {} response: {}", operation, e)))?;

        if !status.is_success() {
            let message = payload["message"]
                .as_str()
                .or_else(|| payload["__type"].as_str())
                .unwrap_or("unknown provider error");
            log::debug!("{} failed with {}: {}", operation, status, message);
            return Err(AuthError::new(message));
        }
        Ok(payload)
    }

    fn token_set(result: &Value, prior_refresh: Option<&str>) -> Result<TokenSet, AuthError> {
        let auth = &result["AuthenticationResult"];
        let id_token = auth["IdToken"]
            .as_str()
            .ok_or_else(|| AuthError::new("No id token in authentication result"))?;
        let access_token = auth["AccessToken"]
            .as_str()
            .ok_or_else(|| AuthError::new("No access token in authentication result"))?;
        // Refresh flows omit the refresh token; keep the one we already had.
        let refresh_token = auth["RefreshToken"]
            .as_str()
            .or(prior_refresh)
            .map(str::to_string);
        let expires_in = auth["ExpiresIn"].as_i64().unwrap_or(3600);
        Ok(TokenSet {
            id_token: id_token.to_string(),
            access_token: access_token.to_string(),
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        })
    }

    fn identity(payload: &Value) -> Result<UserIdentity, AuthError> {
        let username = payload["Username"]
            .as_str()
            .ok_or_else(|| AuthError::new("No username in provider response"))?;
        let mut attributes = std::collections::HashMap::new();
        if let Some(attrs) = payload["UserAttributes"].as_array() {
            for attr in attrs {
                if let (Some(name), Some(value)) = (attr["Name"].as_str(), attr["Value"].as_str()) {
                    attributes.insert(name.to_string(), value.to_string());
                }
            }
        }
        Ok(UserIdentity {
            username: username.to_string(),
            attributes,
        })
    }
}

#[async_trait]
impl IdentityProvider for CognitoProvider {
    async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(TokenSet, UserIdentity), AuthError> {
        let result = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": "USER_PASSWORD_AUTH",
                    "ClientId": self.client_id,
                    "AuthParameters": { "USERNAME": username, "PASSWORD": password },
                }),
            )
            .await?;
        if result.get("ChallengeName").is_some_and(|c| !c.is_null()) {
            return Err(AuthError::new(
                "New password required. This flow is not implemented.",
            ));
        }
        let tokens = Self::token_set(&result, None)?;
        let identity = self.current_user(&tokens.access_token).await?;
        Ok((tokens, identity))
    }

    async fn refresh_session(
        &self,
        _username: &str,
        refresh_token: &str,
    ) -> Result<TokenSet, AuthError> {
        let result = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": "REFRESH_TOKEN_AUTH",
                    "ClientId": self.client_id,
                    "AuthParameters": { "REFRESH_TOKEN": refresh_token },
                }),
            )
            .await?;
        Self::token_set(&result, Some(refresh_token))
    }

    async fn current_user(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        let payload = self
            .call("GetUser", json!({ "AccessToken": access_token }))
            .await?;
        Self::identity(&payload)
    }

    async fn sign_up(&self, username: &str, email: &str, password: &str)
    -> Result<(), AuthError> {
        self.call(
            "SignUp",
            json!({
                "ClientId": self.client_id,
                "Username": username,
                "Password": password,
                "UserAttributes": [ { "Name": "email", "Value": email } ],
            }),
        )
        .await?;
        Ok(())
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), AuthError> {
        self.call(
            "ConfirmSignUp",
            json!({
                "ClientId": self.client_id,
                "Username": username,
                "ConfirmationCode": code,
            }),
        )
        .await?;
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.call("GlobalSignOut", json!({ "AccessToken": access_token }))
            .await?;
        Ok(())
    }

    async fn forgot_password(&self, username: &str) -> Result<(), AuthError> {
        self.call(
            "ForgotPassword",
            json!({ "ClientId": self.client_id, "Username": username }),
        )
        .await?;
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.call(
            "ConfirmForgotPassword",
            json!({
                "ClientId": self.client_id,
                "Username": username,
                "ConfirmationCode": code,
                "Password": new_password,
            }),
        )
        .await?;
        Ok(())
    }
}
