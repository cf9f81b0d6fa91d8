//! User interaction during authorization.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;
use url::Url;

use caldemo_core::{BoxFuture, DemoError, DemoResult};

use crate::callback::extract_code;

/// Shows the authorization URL and, in manual-entry mode, collects the code.
pub trait AuthorizationPrompt: Send + Sync {
    /// Shows the URL the user must open.
    fn present_url(&self, auth_url: &str);

    /// Reads an authorization code typed by the user.
    ///
    /// `state` is the value sent in the authorization request; a pasted
    /// redirect URL must carry it.
    fn read_code<'a>(&'a self, state: &'a str) -> BoxFuture<'a, DemoResult<String>>;
}

/// Prompt on the process's terminal.
#[derive(Debug, Clone, Default)]
pub struct ConsolePrompt {
    open_browser: bool,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also try to open the URL in the default browser.
    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }
}

impl AuthorizationPrompt for ConsolePrompt {
    fn present_url(&self, auth_url: &str) {
        println!("Open the following URL in the browser:\n{}", auth_url);
        if self.open_browser {
            if let Err(e) = open::that(auth_url) {
                warn!("failed to open browser: {}", e);
            }
        }
    }

    fn read_code<'a>(&'a self, state: &'a str) -> BoxFuture<'a, DemoResult<String>> {
        Box::pin(async move {
            print!("Enter the authorization code: ");
            let _ = std::io::stdout().flush();
            read_code_from(BufReader::new(tokio::io::stdin()), state).await
        })
    }
}

/// Reads one line holding an authorization code.
///
/// A pasted redirect URL is accepted too. It is checked like a callback on
/// the local listener: its `state` must equal `state`, and an `error`
/// parameter rejects it.
pub async fn read_code_from<R>(mut reader: R, state: &str) -> DemoResult<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await.map_err(|e| {
        DemoError::authorization("unable to read authorization code").with_source(e)
    })?;
    if read == 0 {
        return Err(DemoError::authorization("no authorization code entered"));
    }

    let input = line.trim();
    if input.starts_with("http://") || input.starts_with("https://") {
        let url = Url::parse(input).map_err(|e| {
            DemoError::authorization("pasted redirect URL is not valid").with_source(e)
        })?;
        return extract_code(&url, state);
    }

    if input.is_empty() {
        return Err(DemoError::authorization("no authorization code entered"));
    }
    Ok(input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_plain_code() {
        let code = read_code_from(&b"  4/0AeaYSHB-code \n"[..], "s1").await.unwrap();
        assert_eq!(code, "4/0AeaYSHB-code");
    }

    #[tokio::test]
    async fn reads_code_from_pasted_url() {
        let input = b"http://localhost:8080/?state=s1&code=4%2F0Aea&scope=x\n";
        let code = read_code_from(&input[..], "s1").await.unwrap();
        assert_eq!(code, "4/0Aea");
    }

    #[tokio::test]
    async fn rejects_pasted_url_with_wrong_state() {
        let forged = b"http://localhost:8080/?state=forged&code=EVIL\n";
        let err = read_code_from(&forged[..], "s1").await.unwrap_err();
        assert_eq!(err.code(), caldemo_core::ErrorCode::AuthorizationError);
        assert!(err.message().contains("state"));

        let stateless = b"http://localhost:8080/?code=EVIL\n";
        assert!(read_code_from(&stateless[..], "s1").await.is_err());
    }

    #[tokio::test]
    async fn rejects_pasted_url_with_error() {
        let denied = b"http://localhost:8080/?state=s1&error=access_denied\n";
        let err = read_code_from(&denied[..], "s1").await.unwrap_err();
        assert!(err.message().contains("access_denied"));
    }

    #[tokio::test]
    async fn rejects_empty_input() {
        assert!(read_code_from(&b"\n"[..], "s1").await.is_err());
        assert!(read_code_from(&b""[..], "s1").await.is_err());
        assert!(read_code_from(&b"http://localhost:8080/?state=s1\n"[..], "s1").await.is_err());
    }
}
