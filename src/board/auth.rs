//! Bearer-token authentication against an external identity provider.
//!
//! Handlers take an [`AuthUser`] argument; extraction rejects a missing or
//! malformed `Authorization` header with 401 and a token the provider does
//! not recognise with 403.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use serde::Deserialize;

use super::api::{ApiError, SharedState};
use crate::config::IdentityConfig;
use crate::errors::{AuthError, BoardError};

/// Resolves bearer tokens to user ids.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means the provider rejected the token. `Err` means the
    /// provider could not be asked.
    async fn verify(&self, token: &str) -> Result<Option<String>, BoardError>;
}

/// The authenticated caller, injected into handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingToken),
    }
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).map_err(BoardError::from)?;
        match state.identity.verify(token).await? {
            Some(user_id) => Ok(AuthUser { user_id }),
            None => {
                tracing::debug!("bearer token rejected by identity provider");
                Err(BoardError::from(AuthError::InvalidToken).into())
            }
        }
    }
}

// ── Providers ─────────────────────────────────────────────────────────

/// Fixed token → user map, for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new<I, T, U>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            tokens: pairs
                .into_iter()
                .map(|(t, u)| (t.into(), u.into()))
                .collect(),
        }
    }

    /// Parse `token:user,token:user`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut tokens = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once(':') {
                Some((token, user)) if !token.is_empty() && !user.is_empty() => {
                    tokens.insert(token.to_string(), user.to_string());
                }
                _ => bail!("Invalid dev token entry '{}': expected token:user", entry),
            }
        }
        if tokens.is_empty() {
            bail!("No dev tokens configured");
        }
        Ok(Self { tokens })
    }
}

#[async_trait]
impl IdentityProvider for StaticTokens {
    async fn verify(&self, token: &str) -> Result<Option<String>, BoardError> {
        Ok(self.tokens.get(token).cloned())
    }
}

/// Supabase-compatible auth server: `GET {url}/auth/v1/user`.
pub struct SupabaseIdentity {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct SupabaseUser {
    id: String,
}

impl SupabaseIdentity {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn verify(&self, token: &str) -> Result<Option<String>, BoardError> {
        let resp = self
            .client
            .get(self.user_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BoardError::IdentityProvider(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BoardError::IdentityProvider(format!(
                "auth server returned {}",
                status
            )));
        }

        let user: SupabaseUser = resp
            .json()
            .await
            .map_err(|e| BoardError::IdentityProvider(format!("bad user payload: {}", e)))?;
        Ok(Some(user.id))
    }
}

/// Build the configured provider.
pub fn provider_from_config(config: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>> {
    Ok(match config {
        IdentityConfig::Supabase { url, anon_key } => Arc::new(SupabaseIdentity::new(url, anon_key)),
        IdentityConfig::DevTokens(raw) => Arc::new(StaticTokens::parse(raw)?),
    })
}
