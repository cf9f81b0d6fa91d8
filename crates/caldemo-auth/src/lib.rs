//! OAuth 2.0 authorization-code flow for installed applications.
//!
//! [`AuthorizationAgent`] yields a usable access token: from the on-disk
//! cache when one is fresh, by refreshing an expired one, or by walking the
//! user through the consent screen and exchanging the returned code.

pub mod agent;
pub mod callback;
pub mod config;
pub mod oauth;
pub mod prompt;
pub mod tokens;

pub use agent::AuthorizationAgent;
pub use callback::CallbackListener;
pub use config::{AuthorizationMode, CALENDAR_SCOPE, ClientConfiguration};
pub use oauth::{OAuthClient, generate_state};
pub use prompt::{AuthorizationPrompt, ConsolePrompt, read_code_from};
pub use tokens::{Token, TokenCache};
