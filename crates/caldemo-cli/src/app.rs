//! Composes authorization and the calendar demonstration.

use tracing::{debug, info};

use caldemo_auth::{
    AuthorizationAgent, AuthorizationPrompt, ClientConfiguration, OAuthClient, TokenCache,
};
use caldemo_calendar::run_demo;

use crate::error::CliResult;
use crate::settings::Settings;

/// Obtains a token, then creates, updates and deletes one event.
pub async fn run(settings: &Settings, prompt: Box<dyn AuthorizationPrompt>) -> CliResult<()> {
    settings.validate()?;

    let mut config = ClientConfiguration::from_file(&settings.credentials_path)?;
    if let Some(port) = settings.port {
        config = config.with_redirect_port(port)?;
    }
    debug!("loaded client configuration from {}", settings.credentials_path.display());

    let oauth = OAuthClient::new(config, settings.timeout())?;
    let agent = AuthorizationAgent::new(oauth, TokenCache::new(&settings.token_path), prompt)
        .with_mode(settings.mode)
        .with_callback_timeout(settings.callback_timeout());

    let token = agent.obtain_token().await?;
    info!("authorized, running calendar operations on {}", settings.calendar_id);

    run_demo(&token, &settings.demo_options()).await?;
    Ok(())
}
