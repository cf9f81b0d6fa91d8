//! Local-redirect authorization against a real loopback listener.

use std::time::Duration;

use caldemo_auth::{
    AuthorizationAgent, AuthorizationMode, AuthorizationPrompt, ClientConfiguration, OAuthClient,
    TokenCache,
};
use caldemo_core::{BoxFuture, DemoError, DemoResult, ErrorCode};
use tokio::sync::mpsc;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Forwards the presented URL to the test body.
struct ChannelPrompt(mpsc::UnboundedSender<String>);

impl AuthorizationPrompt for ChannelPrompt {
    fn present_url(&self, auth_url: &str) {
        let _ = self.0.send(auth_url.to_string());
    }

    fn read_code<'a>(&'a self, _state: &'a str) -> BoxFuture<'a, DemoResult<String>> {
        Box::pin(async { Err(DemoError::internal("manual entry not expected")) })
    }
}

fn query_param(url: &Url, name: &str) -> String {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| panic!("missing {} in {}", name, url))
}

struct Harness {
    _dir: tempfile::TempDir,
    server: MockServer,
    cache: TokenCache,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join(".credentials/calendar-token.json"));
        Self {
            _dir: dir,
            server: MockServer::start().await,
            cache,
        }
    }

    fn agent(&self, urls: mpsc::UnboundedSender<String>) -> AuthorizationAgent {
        let config = ClientConfiguration::new("c1", "s1").with_redirect_uri("http://127.0.0.1:0");
        let config = ClientConfiguration {
            auth_uri: "https://auth.example/authorize".to_string(),
            token_uri: format!("{}/token", self.server.uri()),
            ..config
        };
        let oauth = OAuthClient::new(config, Duration::from_secs(5)).unwrap();
        AuthorizationAgent::new(oauth, self.cache.clone(), Box::new(ChannelPrompt(urls)))
            .with_mode(AuthorizationMode::LocalRedirect)
            .with_callback_timeout(Some(Duration::from_secs(10)))
    }
}

#[tokio::test]
async fn browser_redirect_completes_flow() {
    let harness = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=ABC123"))
        .and(body_string_contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.local",
            "refresh_token": "1//local",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let agent = harness.agent(tx);
    let flow = tokio::spawn(async move { agent.obtain_token().await });

    let auth_url = Url::parse(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(auth_url.host_str(), Some("auth.example"));
    let state = query_param(&auth_url, "state");
    let redirect_uri = Url::parse(&query_param(&auth_url, "redirect_uri")).unwrap();
    assert_ne!(redirect_uri.port(), Some(0));

    // A browser preconnect that never sends a request does not hold up the callback.
    let addr = format!("127.0.0.1:{}", redirect_uri.port().unwrap());
    let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();

    // A stray request does not end the flow.
    let stray = reqwest::get(redirect_uri.join("/favicon.ico").unwrap()).await.unwrap();
    assert_eq!(stray.status().as_u16(), 404);

    let mut callback = redirect_uri.clone();
    callback
        .query_pairs_mut()
        .append_pair("state", &state)
        .append_pair("code", "ABC123");
    let response = reqwest::get(callback).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        caldemo_auth::callback::SUCCESS_MESSAGE
    );

    let token = flow.await.unwrap().unwrap();
    assert_eq!(token.access_token, "ya29.local");
    assert_eq!(harness.cache.load(), Some(token));
}

#[tokio::test]
async fn mismatched_state_aborts_flow() {
    let harness = Harness::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let agent = harness.agent(tx);
    let flow = tokio::spawn(async move { agent.obtain_token().await });

    let auth_url = Url::parse(&rx.recv().await.unwrap()).unwrap();
    let mut callback = Url::parse(&query_param(&auth_url, "redirect_uri")).unwrap();
    callback
        .query_pairs_mut()
        .append_pair("state", "forged")
        .append_pair("code", "ABC123");

    let response = reqwest::get(callback).await.unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(
        response.text().await.unwrap(),
        caldemo_auth::callback::STATE_MISMATCH_MESSAGE
    );

    let err = flow.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthorizationError);
    assert!(harness.cache.load().is_none());
}

#[tokio::test]
async fn denied_consent_aborts_flow() {
    let harness = Harness::new().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let agent = harness.agent(tx);
    let flow = tokio::spawn(async move { agent.obtain_token().await });

    let auth_url = Url::parse(&rx.recv().await.unwrap()).unwrap();
    let state = query_param(&auth_url, "state");
    let mut callback = Url::parse(&query_param(&auth_url, "redirect_uri")).unwrap();
    callback
        .query_pairs_mut()
        .append_pair("state", &state)
        .append_pair("error", "access_denied");

    let response = reqwest::get(callback).await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let err = flow.await.unwrap().unwrap_err();
    assert!(err.message().contains("access_denied"));
}
