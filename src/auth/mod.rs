//! Optional sign-in gate in front of the dashboard.
//!
//! Without an identity provider configured the gate is open. With one, the
//! dashboard stays hidden until a session is present.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::dashboard::forms::{Mutation, MutationState};
use crate::error::{AppError, Result};

const LINK_SENT: &str = "Check your inbox for the magic link";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disabled,
    SignedOut,
    LinkSent { email: String },
    SignedIn { email: String },
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    email: Option<String>,
}

pub struct IdentityProvider {
    client: Client,
    url: String,
    key: String,
}

impl IdentityProvider {
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    pub async fn request_magic_link(&self, email: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/auth/v1/otp", self.url))
            .header("apikey", &self.key)
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(auth_error(response).await);
        }
        Ok(())
    }

    /// Email of the user owning `access_token`.
    pub async fn current_user(&self, access_token: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.url))
            .header("apikey", &self.key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(auth_error(response).await);
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;
        user.email
            .ok_or_else(|| AppError::Auth("Session has no email address".to_string()))
    }
}

/// Pull the provider's human message out of an error response.
async fn auth_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let from_json = serde_json::from_str::<Value>(&text).ok().and_then(|body| {
        ["msg", "error_description", "message", "error"]
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_str).map(str::to_string))
    });
    let message = from_json
        .or_else(|| (!text.is_empty()).then_some(text))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Sign-in failed").to_string());
    AppError::Auth(message)
}

pub struct AuthGate {
    provider: Option<Arc<IdentityProvider>>,
    state: SessionState,
    pub email_input: String,
    message: Option<String>,
    link: Mutation<String, AppError>,
}

impl AuthGate {
    pub fn disabled() -> Self {
        Self {
            provider: None,
            state: SessionState::Disabled,
            email_input: String::new(),
            message: None,
            link: Mutation::new(),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let Some((url, key)) = config.auth_provider() else {
            return Ok(Self::disabled());
        };
        let provider = IdentityProvider::new(url, key)?;
        let mut gate = Self {
            provider: None,
            state: SessionState::SignedOut,
            email_input: String::new(),
            message: None,
            link: Mutation::new(),
        };

        if let Some(token) = &config.auth_access_token {
            match provider.current_user(token).await {
                Ok(email) => gate.state = SessionState::SignedIn { email },
                Err(e) => {
                    tracing::warn!("Stored session rejected: {}", e);
                    gate.message = Some(e.to_string());
                }
            }
        }

        gate.provider = Some(Arc::new(provider));
        Ok(gate)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether dashboard content may be shown.
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            SessionState::Disabled | SessionState::SignedIn { .. }
        )
    }

    pub fn is_pending(&self) -> bool {
        self.link.state() == &MutationState::Pending
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Ask the provider to email a sign-in link to `email_input`.
    pub fn request_link(&mut self) -> bool {
        let Some(provider) = self.provider.clone() else {
            return false;
        };
        if self.is_pending() {
            return false;
        }

        let email = self.email_input.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            self.message = Some("Enter a valid email address".to_string());
            return false;
        }

        self.message = None;
        self.link.start(async move {
            provider.request_magic_link(&email).await?;
            Ok(email)
        });
        true
    }

    pub fn poll_result(&mut self) {
        if let Some(outcome) = self.link.try_finish() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: Result<String>) {
        match outcome {
            Ok(email) => {
                tracing::info!("Sign-in link sent to {}", email);
                self.state = SessionState::LinkSent { email };
                self.message = Some(LINK_SENT.to_string());
            }
            Err(e) => {
                tracing::warn!("Sign-in rejected: {}", e);
                self.message = Some(e.to_string());
            }
        }
    }

    pub fn sign_out(&mut self) {
        if self.provider.is_some() {
            self.state = SessionState::SignedOut;
            self.message = None;
        }
    }

    /// Gate with a live session against an unreachable provider.
    #[cfg(test)]
    pub fn signed_in(email: &str) -> Self {
        let provider = IdentityProvider::new("http://127.0.0.1:9", "anon").unwrap();
        Self {
            provider: Some(Arc::new(provider)),
            state: SessionState::SignedIn {
                email: email.to_string(),
            },
            email_input: String::new(),
            message: None,
            link: Mutation::new(),
        }
    }

    #[cfg(test)]
    async fn settle(&mut self) {
        if let Some(outcome) = self.link.finish().await {
            self.apply(outcome);
        }
    }
}
