//! OAuth token model and the on-disk token cache.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use caldemo_core::{DemoError, DemoResult};

/// A token this close to its expiry is treated as already expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An access/refresh token pair as returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The access token for API requests.
    pub access_token: String,

    /// Usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When the access token expires. `None` means it does not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Creates a token from token endpoint response data.
    pub fn new(
        access_token: impl Into<String>,
        token_type: Option<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.unwrap_or_else(default_token_type),
            refresh_token,
            expiry: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Returns true if the access token has expired at `now`, or will
    /// within [`EXPIRY_MARGIN_SECS`].
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| now + Duration::seconds(EXPIRY_MARGIN_SECS) >= expiry)
    }

    /// Returns true if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// File-backed token cache.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// Creates a cache at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.credentials/calendar-token.json`, or beside the program when the
    /// home directory is unknown.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".credentials"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calendar-token.json")
    }

    /// Returns the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached token.
    ///
    /// A missing, unreadable or malformed file is a cache miss, not an error.
    pub fn load(&self) -> Option<Token> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("no usable token cache at {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Token>(&content) {
            Ok(token) => {
                debug!("loaded token from {}", self.path.display());
                Some(token)
            }
            Err(e) => {
                warn!("ignoring malformed token cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Writes the token to the cache file and prints its location.
    ///
    /// The parent directory is created with mode 0700 and the file written
    /// with mode 0600. Content goes to a temp file first and is renamed over
    /// the target, so readers see either the old file or the new one.
    pub fn persist(&self, token: &Token) -> DemoResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent)?;
        }

        let content = serde_json::to_string_pretty(token).map_err(|e| {
            DemoError::persistence("unable to serialize OAuth token").with_source(e)
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        write_private_file(&temp_path, content.as_bytes()).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            DemoError::persistence(format!("unable to cache OAuth token to {}", temp_path.display()))
                .with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            DemoError::persistence(format!("unable to cache OAuth token to {}", self.path.display()))
                .with_source(e)
        })?;

        info!("saved token to {}", self.path.display());
        println!("Token saved to {}", self.path.display());
        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> DemoResult<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(dir).map_err(|e| {
        DemoError::persistence(format!("unable to create token directory {}", dir.display()))
            .with_source(e)
    })
}

fn write_private_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}
