//! OAuth client configuration.
//!
//! The client-secret file is the JSON downloaded from the Google Cloud
//! Console. It holds either an `installed` or a `web` section; a flat layout
//! with `client_id`/`client_secret` at the root is accepted too.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use caldemo_core::{DemoError, DemoResult};

/// Google's authorization endpoint, used when the file omits `auth_uri`.
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's token endpoint, used when the file omits `token_uri`.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Redirect target used when the file lists none.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080";

/// Full read/write access to calendars.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// How the authorization code reaches the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthorizationMode {
    /// A loopback listener receives the browser redirect.
    #[default]
    LocalRedirect,
    /// The user pastes the code on standard input.
    ManualEntry,
}

/// Client identity and endpoints for the authorization-code grant.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfiguration {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ClientConfiguration {
    /// Creates a configuration with Google's endpoints and the calendar scope.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: vec![CALENDAR_SCOPE.to_string()],
        }
    }

    /// Loads the configuration from a client-secret JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> DemoResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DemoError::configuration(format!("unable to read {}", path.display())).with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses the configuration from client-secret JSON.
    pub fn from_json(json: &str) -> DemoResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            DemoError::configuration("unable to parse client secret file to config").with_source(e)
        })?;

        let config = if let Some(section) = file.installed.or(file.web) {
            Self::new(section.client_id, section.client_secret).with_endpoints(
                section.auth_uri,
                section.token_uri,
                section.redirect_uris,
            )
        } else if let (Some(id), Some(secret)) = (file.client_id, file.client_secret) {
            Self::new(id, secret).with_endpoints(file.auth_uri, file.token_uri, file.redirect_uris)
        } else {
            return Err(DemoError::configuration(
                "client secret file must contain an 'installed' or 'web' section",
            ));
        };

        config.validate()?;
        Ok(config)
    }

    fn with_endpoints(
        mut self,
        auth_uri: Option<String>,
        token_uri: Option<String>,
        redirect_uris: Vec<String>,
    ) -> Self {
        if let Some(uri) = auth_uri {
            self.auth_uri = uri;
        }
        if let Some(uri) = token_uri {
            self.token_uri = uri;
        }
        if let Some(uri) = redirect_uris.into_iter().next() {
            self.redirect_uri = uri;
        }
        self
    }

    /// Replaces the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Replaces the redirect target.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Rewrites the port of the redirect target.
    pub fn with_redirect_port(mut self, port: u16) -> DemoResult<Self> {
        let mut url = self.redirect_url()?;
        url.set_port(Some(port))
            .map_err(|_| DemoError::configuration("redirect URI cannot carry a port"))?;
        self.redirect_uri = url.to_string();
        Ok(self)
    }

    /// Returns the parsed redirect target.
    pub fn redirect_url(&self) -> DemoResult<Url> {
        Url::parse(&self.redirect_uri).map_err(|e| {
            DemoError::configuration(format!("invalid redirect URI {}", self.redirect_uri))
                .with_source(e)
        })
    }

    /// Checks that every field needed by the grant is usable.
    pub fn validate(&self) -> DemoResult<()> {
        if self.client_id.is_empty() {
            return Err(DemoError::configuration("client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(DemoError::configuration("client_secret is required"));
        }
        if self.scopes.is_empty() {
            return Err(DemoError::configuration("at least one OAuth scope is required"));
        }
        for (name, uri) in [("auth_uri", &self.auth_uri), ("token_uri", &self.token_uri)] {
            Url::parse(uri).map_err(|e| {
                DemoError::configuration(format!("invalid {}: {}", name, uri)).with_source(e)
            })?;
        }
        self.redirect_url()?;
        Ok(())
    }
}
