//! Authorization URL construction and token endpoint calls.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use caldemo_core::{DemoError, DemoResult};

use crate::config::ClientConfiguration;
use crate::tokens::Token;

/// Length in bytes of the random CSRF state, before encoding.
const STATE_LENGTH: usize = 16;

/// Generates a random state token for CSRF protection.
pub fn generate_state() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..STATE_LENGTH).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Client for the authorization server.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: ClientConfiguration,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a client for the given configuration.
    pub fn new(config: ClientConfiguration, timeout: Duration) -> DemoResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DemoError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    /// Builds the URL the user opens to grant access.
    ///
    /// Offline access is requested so the token endpoint issues a refresh token.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> DemoResult<String> {
        let mut url = Url::parse(&self.config.auth_uri).map_err(|e| {
            DemoError::configuration(format!("invalid auth_uri {}", self.config.auth_uri))
                .with_source(e)
        })?;

        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);

        Ok(url.into())
    }

    /// Exchanges an authorization code for a token.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> DemoResult<Token> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.post_token_request(&params, "exchange code for token").await?;
        info!("obtained tokens from {}", self.config.token_uri);
        Ok(Token::new(
            response.access_token,
            response.token_type,
            response.refresh_token,
            response.expires_in,
        ))
    }

    /// Obtains a new access token with a refresh token.
    ///
    /// The endpoint usually omits the refresh token on refresh; the one that
    /// was used is carried over in that case.
    pub async fn refresh_token(&self, refresh_token: &str) -> DemoResult<Token> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self.post_token_request(&params, "refresh token").await?;
        info!("refreshed access token");
        Ok(Token::new(
            response.access_token,
            response.token_type,
            response
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            response.expires_in,
        ))
    }

    async fn post_token_request(
        &self,
        params: &[(&str, &str)],
        operation: &str,
    ) -> DemoResult<TokenResponse> {
        debug!("POST {} ({})", self.config.token_uri, operation);

        let response = self
            .http_client
            .post(&self.config.token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| DemoError::authorization(format!("unable to {}", operation)).with_source(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            DemoError::authorization(format!("unable to {}: failed to read response", operation))
                .with_source(e)
        })?;

        if !status.is_success() {
            return Err(DemoError::authorization(format!(
                "unable to {}: {}",
                operation,
                body.trim()
            ))
            .with_status(status.as_u16()));
        }

        serde_json::from_str(&body).map_err(|e| {
            DemoError::authorization(format!("unable to {}: invalid token response", operation))
                .with_source(e)
        })
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
