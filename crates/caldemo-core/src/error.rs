//! Error types shared by the authorization and calendar crates.
//!
//! Every failure in the demonstration workflow is a [`DemoError`] carrying an
//! [`ErrorCode`]. Errors propagate up to the binary's single top-level
//! handler, which prints them and exits non-zero.

use std::fmt;
use thiserror::Error;

/// The category of a [`DemoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing or malformed client configuration or settings.
    ConfigurationError,
    /// Listener bind failure, state mismatch, denied consent, rejected exchange.
    AuthorizationError,
    /// Token cache could not be written.
    PersistenceError,
    /// A calendar API call was rejected or failed on the network.
    RemoteApiError,
    /// Unexpected runtime state (task join failure and the like).
    InternalError,
}

impl ErrorCode {
    /// Returns a machine-friendly name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::AuthorizationError => "authorization_error",
            Self::PersistenceError => "persistence_error",
            Self::RemoteApiError => "remote_api_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised anywhere in the demonstration workflow.
#[derive(Debug, Error)]
pub struct DemoError {
    code: ErrorCode,
    message: String,
    /// HTTP status returned by a remote endpoint, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DemoError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthorizationError, message)
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PersistenceError, message)
    }

    /// Creates a remote API error.
    pub fn remote_api(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RemoteApiError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Attaches the HTTP status returned by the remote endpoint.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the error came from a remote response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true for a remote API error answered with 404 or 410.
    ///
    /// Google answers 410 Gone for events that were already deleted.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RemoteApiError && matches!(self.status, Some(404 | 410))
    }
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

/// A specialized Result type for the demonstration workflow.
pub type DemoResult<T> = Result<T, DemoError>;
