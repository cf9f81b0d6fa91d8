//! Loopback listener for the authorization redirect.
//!
//! A background task accepts connections on the redirect address until one
//! request carries the authorization code. The code is handed to the waiting
//! caller through a oneshot channel; the task is aborted as soon as the
//! caller stops waiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use url::{Host, Url};

use caldemo_core::{DemoError, DemoResult};

/// Body sent to the browser once the code has been received.
pub const SUCCESS_MESSAGE: &str = "Authorization successful! You can close this tab.";

/// Body sent when the callback's state does not match.
pub const STATE_MISMATCH_MESSAGE: &str = "State does not match";

const STATE_MISMATCH_ERROR: &str = "authorization callback state does not match";

/// How long a client may take to send its request line and headers.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A bound callback listener that has not started serving yet.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
    redirect_uri: String,
}

impl CallbackListener {
    /// Binds the loopback address named by the redirect URI.
    ///
    /// `localhost` binds `127.0.0.1`. Port 0 picks a free port, and the
    /// returned [`redirect_uri`](Self::redirect_uri) carries the real one.
    pub async fn bind(redirect_uri: &str) -> DemoResult<Self> {
        let mut url = Url::parse(redirect_uri).map_err(|e| {
            DemoError::configuration(format!("invalid redirect URI {}", redirect_uri)).with_source(e)
        })?;

        let ip = match url.host() {
            Some(Host::Domain("localhost")) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
            Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
            _ => {
                return Err(DemoError::configuration(format!(
                    "redirect URI {} does not point at a loopback address",
                    redirect_uri
                )));
            }
        };
        let port = url.port_or_known_default().unwrap_or(80);
        let addr = SocketAddr::new(ip, port);

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            DemoError::authorization(format!("unable to start local server on {}", addr)).with_source(e)
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            DemoError::authorization("unable to read local server address").with_source(e)
        })?;
        debug!("callback listener bound on {}", local_addr);

        let redirect_uri = if port == 0 {
            // set_port only fails for cannot-be-a-base URLs, ruled out by the host match above
            let _ = url.set_port(Some(local_addr.port()));
            url.to_string()
        } else {
            redirect_uri.to_string()
        };

        Ok(Self {
            listener,
            path: url.path().to_string(),
            redirect_uri,
        })
    }

    /// The redirect URI to put in the authorization request.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> DemoResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| DemoError::internal("unable to read local server address").with_source(e))
    }

    /// Serves callbacks until one carries a code matching `state`.
    ///
    /// A callback with a mismatched state, an `error` parameter or no code
    /// ends the wait with an authorization error. Requests for other paths
    /// are answered with 404 and ignored. Without a timeout this waits
    /// indefinitely.
    pub async fn wait_for_code(self, state: &str, timeout: Option<Duration>) -> DemoResult<String> {
        let (code_tx, code_rx) = oneshot::channel();
        let mut task = ListenerTask(tokio::spawn(serve(
            self.listener,
            self.path,
            state.to_string(),
            code_tx,
        )));

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, code_rx).await.map_err(|_| {
                DemoError::authorization(format!(
                    "no authorization callback within {} seconds",
                    limit.as_secs()
                ))
            })?,
            None => code_rx.await,
        };

        match received {
            Ok(code) => Ok(code),
            // The sender is dropped when the task stops; its result says why.
            Err(_) => match (&mut task.0).await {
                Ok(Err(e)) => Err(e),
                Ok(Ok(())) => Err(DemoError::internal(
                    "callback listener stopped without an authorization code",
                )),
                Err(e) => Err(DemoError::internal("callback listener task failed").with_source(e)),
            },
        }
    }
}

/// Aborts the listener task when dropped.
struct ListenerTask(JoinHandle<DemoResult<()>>);

impl Drop for ListenerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Outcome of a single callback request.
#[derive(Debug)]
pub(crate) enum CallbackOutcome {
    /// The request carried a valid code.
    Code(String),
    /// Not a callback (wrong path, method, or unreadable); keep listening.
    Ignored,
    /// A callback that ends the flow without a code.
    Rejected(DemoError),
}

/// Accepts connections until a callback resolves the flow.
///
/// Each connection is read on its own task, so a client that connects and
/// never sends a request does not hold up the real callback. The code is sent
/// on `code_tx` only for a callback whose state matches.
pub(crate) async fn serve(
    listener: TcpListener,
    path: String,
    state: String,
    code_tx: oneshot::Sender<String>,
) -> DemoResult<()> {
    let path: Arc<str> = path.into();
    let state: Arc<str> = state.into();
    let (outcome_tx, mut outcome_rx) = mpsc::channel(8);
    // Dropping the set aborts connections still being read.
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("callback connection from {}", peer);
                    let (path, state) = (path.clone(), state.clone());
                    let outcome_tx = outcome_tx.clone();
                    connections.spawn(async move {
                        let outcome = handle_connection(stream, &path, &state).await;
                        let _ = outcome_tx.send(outcome).await;
                    });
                }
                Err(e) => warn!("failed to accept callback connection: {}", e),
            },
            Some(outcome) = outcome_rx.recv() => match outcome {
                CallbackOutcome::Code(code) => {
                    info!("received authorization code");
                    // The receiver only goes away when the caller gave up.
                    let _ = code_tx.send(code);
                    return Ok(());
                }
                CallbackOutcome::Ignored => {}
                CallbackOutcome::Rejected(err) => return Err(err),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

/// Reads one HTTP request from `stream`, answers it and classifies it.
///
/// A client that has not sent its request line and headers within
/// [`REQUEST_READ_TIMEOUT`] is dropped without an answer.
pub(crate) async fn handle_connection<S>(stream: S, path: &str, state: &str) -> CallbackOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    let read = tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request(&mut reader)).await;
    let request_line = match read {
        Ok(Some(line)) => line,
        Ok(None) => return CallbackOutcome::Ignored,
        Err(_) => {
            debug!("closing idle callback connection");
            return CallbackOutcome::Ignored;
        }
    };

    let outcome = classify_request(&request_line, path, state);
    let (status, body) = match &outcome {
        CallbackOutcome::Code(_) => ("200 OK", SUCCESS_MESSAGE.to_string()),
        CallbackOutcome::Ignored if request_line.starts_with("GET ") => {
            ("404 Not Found", "Not Found".to_string())
        }
        CallbackOutcome::Ignored => ("405 Method Not Allowed", "Method Not Allowed".to_string()),
        CallbackOutcome::Rejected(err) => ("400 Bad Request", rejection_body(err)),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = write_half.write_all(response.as_bytes()).await {
        warn!("failed to answer callback request: {}", e);
    }
    let _ = write_half.flush().await;
    let _ = write_half.shutdown().await;

    outcome
}

/// Reads the request line, then drains the headers so closing the socket
/// does not reset the connection.
async fn read_request<R>(reader: &mut R) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.is_err() {
        return None;
    }

    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header).await {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    Some(request_line)
}

fn rejection_body(err: &DemoError) -> String {
    if err.message() == STATE_MISMATCH_ERROR {
        STATE_MISMATCH_MESSAGE.to_string()
    } else {
        format!("Authorization failed: {}", err.message())
    }
}

/// Classifies a request line such as `GET /?state=..&code=.. HTTP/1.1`.
fn classify_request(request_line: &str, path: &str, state: &str) -> CallbackOutcome {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return CallbackOutcome::Ignored;
    };

    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return CallbackOutcome::Ignored;
    };
    if url.path() != path {
        debug!("ignoring request for {}", url.path());
        return CallbackOutcome::Ignored;
    }

    match extract_code(&url, state) {
        Ok(code) => CallbackOutcome::Code(code),
        Err(err) => CallbackOutcome::Rejected(err),
    }
}

/// Validates the query of a redirect to the callback and returns its code.
///
/// The `state` must match before `error` or `code` are looked at.
pub(crate) fn extract_code(url: &Url, state: &str) -> DemoResult<String> {
    let mut received_state = None;
    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "state" => received_state = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if received_state.as_deref() != Some(state) {
        warn!("authorization callback state does not match");
        return Err(DemoError::authorization(STATE_MISMATCH_ERROR));
    }
    if let Some(error) = error {
        return Err(DemoError::authorization(format!(
            "authorization denied: {}",
            error
        )));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| DemoError::authorization("missing authorization code in callback"))
}
