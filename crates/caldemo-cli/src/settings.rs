//! Settings file and flag merging.
//!
//! Settings live in `~/.config/caldemo/config.toml` by default. Every field
//! is optional; command-line flags take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use caldemo_auth::{AuthorizationMode, TokenCache};
use caldemo_calendar::{DEFAULT_API_BASE, DEFAULT_CALENDAR_ID, DEFAULT_TIME_ZONE, DemoOptions};

use crate::cli::Cli;
use crate::error::{CliError, CliResult};

/// Runtime settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OAuth client-secret JSON.
    pub credentials_path: PathBuf,

    /// Token cache file.
    pub token_path: PathBuf,

    pub calendar_id: String,

    /// Time zone of the demonstration event.
    pub time_zone: String,

    pub mode: AuthorizationMode,

    /// Overrides the port of the configured redirect URI.
    pub port: Option<u16>,

    pub api_base_url: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// Give up waiting for the browser callback after this many seconds.
    pub callback_timeout_secs: Option<u64>,

    pub open_browser: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: TokenCache::default_path(),
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            mode: AuthorizationMode::default(),
            port: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            callback_timeout_secs: None,
            open_browser: false,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from the default location if present.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads settings from a specific file.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|source| CliError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values that would make every request or the callback wait
    /// fail immediately.
    pub fn validate(&self) -> CliResult<()> {
        if self.timeout_secs == 0 {
            return Err(CliError::InvalidSetting(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.callback_timeout_secs == Some(0) {
            return Err(CliError::InvalidSetting(
                "callback_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default settings file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caldemo")
            .join("config.toml")
    }

    /// Applies command-line overrides.
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        if let Some(ref path) = cli.credentials {
            self.credentials_path = path.clone();
        }
        if let Some(ref path) = cli.token_cache {
            self.token_path = path.clone();
        }
        if let Some(ref id) = cli.calendar_id {
            self.calendar_id = id.clone();
        }
        if cli.manual {
            self.mode = AuthorizationMode::ManualEntry;
        }
        if cli.port.is_some() {
            self.port = cli.port;
        }
        if cli.open_browser {
            self.open_browser = true;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }

    /// Options for the calendar demonstration.
    pub fn demo_options(&self) -> DemoOptions {
        DemoOptions {
            calendar_id: self.calendar_id.clone(),
            time_zone: self.time_zone.clone(),
            api_base_url: self.api_base_url.clone(),
            timeout: self.timeout(),
        }
    }
}
