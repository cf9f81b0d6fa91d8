//! Token acquisition: cached token, refresh, or interactive authorization.
//!
//! ```text
//! CHECK_CACHE ── fresh ─────────────────────────────────────────► DONE
//!      │ expired + refresh token ── REFRESH ── ok ──► PERSIST ──► DONE
//!      │                               │ rejected
//!      ▼ miss                          ▼
//! AWAIT_AUTHORIZATION ─► AWAIT_CALLBACK | AWAIT_INPUT ─► EXCHANGE ─► PERSIST ─► DONE
//! ```
//!
//! A rejected exchange is terminal for the run; nothing is retried.

use std::time::Duration;

use tracing::{debug, info, warn};

use caldemo_core::DemoResult;

use crate::callback::CallbackListener;
use crate::config::AuthorizationMode;
use crate::oauth::{OAuthClient, generate_state};
use crate::prompt::AuthorizationPrompt;
use crate::tokens::{Token, TokenCache};

/// Produces a fresh [`Token`] for one calendar session.
pub struct AuthorizationAgent {
    oauth: OAuthClient,
    cache: TokenCache,
    prompt: Box<dyn AuthorizationPrompt>,
    mode: AuthorizationMode,
    callback_timeout: Option<Duration>,
}

impl AuthorizationAgent {
    /// Creates an agent using the local-redirect flow.
    pub fn new(oauth: OAuthClient, cache: TokenCache, prompt: Box<dyn AuthorizationPrompt>) -> Self {
        Self {
            oauth,
            cache,
            prompt,
            mode: AuthorizationMode::default(),
            callback_timeout: None,
        }
    }

    /// Selects how the authorization code is received.
    pub fn with_mode(mut self, mode: AuthorizationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bounds the wait for the browser callback. `None` waits forever.
    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Returns the token cache.
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns a token that has not expired.
    ///
    /// A cached token is used as-is while it is fresh. An expired one is
    /// refreshed when it carries a refresh token. Otherwise, or when the
    /// refresh is rejected, the interactive flow runs once and its token is
    /// persisted.
    pub async fn obtain_token(&self) -> DemoResult<Token> {
        match self.cache.load() {
            Some(token) if !token.is_expired() => {
                info!("using cached token from {}", self.cache.path().display());
                return Ok(token);
            }
            Some(token) => {
                if let Some(refreshed) = self.refresh(&token).await? {
                    return Ok(refreshed);
                }
            }
            None => debug!("token cache miss"),
        }

        let token = self.authorize_interactively().await?;
        self.cache.persist(&token)?;
        Ok(token)
    }

    /// Refreshes an expired token, persisting the result.
    ///
    /// Returns `Ok(None)` when the caller should fall back to re-authorizing.
    async fn refresh(&self, expired: &Token) -> DemoResult<Option<Token>> {
        let Some(ref refresh_token) = expired.refresh_token else {
            info!("cached token expired and carries no refresh token");
            return Ok(None);
        };

        match self.oauth.refresh_token(refresh_token).await {
            Ok(token) => {
                self.cache.persist(&token)?;
                Ok(Some(token))
            }
            Err(e) => {
                warn!("token refresh rejected, re-authorizing: {}", e);
                Ok(None)
            }
        }
    }

    /// Runs one authorization-code flow and exchanges the code.
    pub async fn authorize_interactively(&self) -> DemoResult<Token> {
        let state = generate_state();

        let (code, redirect_uri) = match self.mode {
            AuthorizationMode::LocalRedirect => {
                let listener = CallbackListener::bind(&self.oauth.config().redirect_uri).await?;
                let redirect_uri = listener.redirect_uri().to_string();
                let auth_url = self.oauth.authorization_url(&redirect_uri, &state)?;
                self.prompt.present_url(&auth_url);

                info!("waiting for authorization callback on {}", redirect_uri);
                let code = listener.wait_for_code(&state, self.callback_timeout).await?;
                (code, redirect_uri)
            }
            AuthorizationMode::ManualEntry => {
                let redirect_uri = self.oauth.config().redirect_uri.clone();
                let auth_url = self.oauth.authorization_url(&redirect_uri, &state)?;
                self.prompt.present_url(&auth_url);
                (self.prompt.read_code(&state).await?, redirect_uri)
            }
        };

        self.oauth.exchange_code(&code, &redirect_uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use caldemo_core::{BoxFuture, DemoError, ErrorCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use tempfile::tempdir;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ClientConfiguration;

    /// Records presented URLs and answers read_code with a fixed code.
    struct ScriptedPrompt {
        code: Option<&'static str>,
        urls: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl AuthorizationPrompt for ScriptedPrompt {
        fn present_url(&self, auth_url: &str) {
            self.urls.lock().unwrap().push(auth_url.to_string());
        }

        fn read_code<'a>(&'a self, _state: &'a str) -> BoxFuture<'a, DemoResult<String>> {
            let code = self.code;
            Box::pin(async move {
                code.map(str::to_string)
                    .ok_or_else(|| DemoError::authorization("no code scripted"))
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        server: MockServer,
        cache: TokenCache,
        urls: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = tempdir().unwrap();
            let cache = TokenCache::new(dir.path().join(".credentials").join("calendar-token.json"));
            Self {
                _dir: dir,
                server: MockServer::start().await,
                cache,
                urls: Default::default(),
            }
        }

        fn agent(&self, code: Option<&'static str>) -> AuthorizationAgent {
            let mut config = ClientConfiguration::new("c1", "s1");
            config.auth_uri = "https://auth.example/authorize".to_string();
            config.token_uri = format!("{}/token", self.server.uri());
            let oauth = OAuthClient::new(config, Duration::from_secs(5)).unwrap();
            let prompt = ScriptedPrompt {
                code,
                urls: self.urls.clone(),
            };
            AuthorizationAgent::new(oauth, self.cache.clone(), Box::new(prompt))
                .with_mode(AuthorizationMode::ManualEntry)
        }

        async fn expect_exchange(&self, times: u64) {
            Mock::given(method("POST"))
                .and(path("/token"))
                .and(body_string_contains("grant_type=authorization_code"))
                .and(body_string_contains("code=ABC123"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "ya29.new",
                    "token_type": "Bearer",
                    "refresh_token": "1//new",
                    "expires_in": 3599
                })))
                .expect(times)
                .mount(&self.server)
                .await;
        }

        fn presented(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    fn fresh_token() -> Token {
        Token {
            access_token: "ya29.cached".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//cached".to_string()),
            expiry: Some(Utc::now() + ChronoDuration::hours(1)),
        }
    }

    #[tokio::test]
    async fn cached_token_skips_interactive_flow() {
        let fx = Fixture::new().await;
        fx.expect_exchange(0).await;
        let cached = fresh_token();
        fx.cache.persist(&cached).unwrap();

        let token = fx.agent(Some("ABC123")).obtain_token().await.unwrap();
        assert_eq!(token, cached);
        assert_eq!(fx.presented(), 0);
    }

    #[tokio::test]
    async fn cached_token_without_expiry_is_used() {
        let fx = Fixture::new().await;
        fx.expect_exchange(0).await;
        let cached = Token::new("forever", None, None, None);
        fx.cache.persist(&cached).unwrap();

        let token = fx.agent(None).obtain_token().await.unwrap();
        assert_eq!(token, cached);
    }

    #[tokio::test]
    async fn cache_miss_runs_one_flow_and_persists() {
        let fx = Fixture::new().await;
        fx.expect_exchange(1).await;

        let token = fx.agent(Some("ABC123")).obtain_token().await.unwrap();
        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(fx.presented(), 1);
        assert_eq!(fx.cache.load(), Some(token));

        let url = fx.urls.lock().unwrap()[0].clone();
        assert!(url.starts_with("https://auth.example/authorize?"));
        assert!(url.contains("state="));
    }

    #[tokio::test]
    async fn malformed_cache_runs_flow() {
        let fx = Fixture::new().await;
        fx.expect_exchange(1).await;
        std::fs::create_dir_all(fx.cache.path().parent().unwrap()).unwrap();
        std::fs::write(fx.cache.path(), "garbage").unwrap();

        let token = fx.agent(Some("ABC123")).obtain_token().await.unwrap();
        assert_eq!(fx.presented(), 1);
        assert_eq!(fx.cache.load(), Some(token));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let fx = Fixture::new().await;
        fx.expect_exchange(0).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Fcached"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&fx.server)
            .await;

        let mut expired = fresh_token();
        expired.expiry = Some(Utc::now() - ChronoDuration::minutes(5));
        fx.cache.persist(&expired).unwrap();

        let token = fx.agent(None).obtain_token().await.unwrap();
        assert_eq!(token.access_token, "ya29.refreshed");
        assert_eq!(token.refresh_token.as_deref(), Some("1//cached"));
        assert!(!token.is_expired());
        assert_eq!(fx.presented(), 0);
        assert_eq!(fx.cache.load(), Some(token));
    }

    #[tokio::test]
    async fn rejected_refresh_falls_back_to_flow() {
        let fx = Fixture::new().await;
        fx.expect_exchange(1).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&fx.server)
            .await;

        let mut expired = fresh_token();
        expired.expiry = Some(Utc::now() - ChronoDuration::minutes(5));
        fx.cache.persist(&expired).unwrap();

        let token = fx.agent(Some("ABC123")).obtain_token().await.unwrap();
        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(fx.presented(), 1);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_runs_flow() {
        let fx = Fixture::new().await;
        fx.expect_exchange(1).await;
        let mut expired = Token::new("old", None, None, None);
        expired.expiry = Some(Utc::now() - ChronoDuration::minutes(5));
        fx.cache.persist(&expired).unwrap();

        let token = fx.agent(Some("ABC123")).obtain_token().await.unwrap();
        assert_eq!(token.access_token, "ya29.new");
    }

    #[tokio::test]
    async fn rejected_exchange_is_fatal_and_not_persisted() {
        let fx = Fixture::new().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .expect(1)
            .mount(&fx.server)
            .await;

        let err = fx.agent(Some("ABC123")).obtain_token().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthorizationError);
        assert!(fx.cache.load().is_none());
    }
}
