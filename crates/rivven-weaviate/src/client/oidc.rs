//! WCS authentication via the OIDC resource-owner password grant.
//!
//! Weaviate advertises its identity provider at
//! `/v1/.well-known/openid-configuration` (`href` + `clientId`). The provider
//! document at `href` names the token endpoint, where the WCS username and
//! password are exchanged for a short-lived access token. Tokens are cached
//! and re-requested shortly before they expire.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::weaviate::transport_error;
use crate::error::{ConnectorError, Result};
use crate::types::SensitiveString;

/// Token lifetime assumed when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// Re-request tokens this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct WeaviateOidcConfig {
    href: String,
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(default)]
    scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderConfig {
    token_endpoint: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct AccessToken {
    value: SensitiveString,
    refresh_at: Instant,
}

/// Cached OIDC session for one set of WCS credentials.
pub(crate) struct OidcSession {
    token_endpoint: String,
    client_id: String,
    scope: String,
    username: String,
    password: SensitiveString,
    token: Mutex<Option<AccessToken>>,
}

impl std::fmt::Debug for OidcSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcSession")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl OidcSession {
    /// Resolve the token endpoint advertised by the Weaviate instance.
    pub(crate) async fn discover(
        http: &reqwest::Client,
        base_url: &str,
        username: &str,
        password: &SensitiveString,
    ) -> Result<Self> {
        let url = format!("{}/v1/.well-known/openid-configuration", base_url);
        let resp = http.get(&url).send().await.map_err(transport_error)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ConnectorError::Auth(
                "WCS credentials given, but the Weaviate instance has no OIDC configured"
                    .to_string(),
            ));
        }
        if !resp.status().is_success() {
            return Err(ConnectorError::connection(format!(
                "OIDC discovery failed with HTTP {}",
                resp.status().as_u16()
            )));
        }
        let weaviate_oidc: WeaviateOidcConfig = resp.json().await.map_err(|e| {
            ConnectorError::connection(format!("invalid OIDC discovery document: {}", e))
        })?;

        let provider: ProviderConfig = http
            .get(&weaviate_oidc.href)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(|e| {
                ConnectorError::connection(format!("OIDC provider lookup failed: {}", e))
            })?
            .json()
            .await
            .map_err(|e| {
                ConnectorError::connection(format!("invalid OIDC provider document: {}", e))
            })?;

        let mut scopes = weaviate_oidc.scopes;
        if !scopes.iter().any(|s| s == "offline_access") {
            scopes.push("offline_access".to_string());
        }

        debug!(
            token_endpoint = %provider.token_endpoint,
            client_id = %weaviate_oidc.client_id,
            "Resolved WCS token endpoint"
        );

        Ok(Self {
            token_endpoint: provider.token_endpoint,
            client_id: weaviate_oidc.client_id,
            scope: scopes.join(" "),
            username: username.to_string(),
            password: password.clone(),
            token: Mutex::new(None),
        })
    }

    /// Current access token, requesting a new one if the cached token is
    /// missing or about to expire.
    pub(crate) async fn bearer(&self, http: &reqwest::Client) -> Result<SensitiveString> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token(http).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn request_token(&self, http: &reqwest::Client) -> Result<AccessToken> {
        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.expose_secret()),
            ("scope", self.scope.as_str()),
        ];
        let resp = http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(ConnectorError::Auth(format!(
                "WCS credentials rejected (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(ConnectorError::connection(format!(
                "token request failed with HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ConnectorError::Auth(format!("invalid token response: {}", e)))?;
        let lifetime = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);

        debug!(
            expires_in_secs = lifetime.as_secs(),
            "Obtained WCS access token"
        );

        Ok(AccessToken {
            value: SensitiveString::new(body.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}
