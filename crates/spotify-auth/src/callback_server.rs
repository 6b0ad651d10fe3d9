//! Loopback HTTP receiver for the authorization redirect.

use crate::authorize::CallbackParams;
use crate::{AuthError, AuthResult};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use url::Url;

type ResultSender = Arc<tokio::sync::Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// Listens on the redirect URI's host and port for a single callback.
pub struct CallbackServer {
    listener: TcpListener,
    callback_path: String,
    timeout: Duration,
}

impl CallbackServer {
    /// Bind to the host and port of `redirect_uri`.
    pub async fn bind(redirect_uri: &Url, timeout: Duration) -> AuthResult<Self> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| AuthError::Config(format!("redirect_uri has no host: {}", redirect_uri)))?;
        let port = redirect_uri
            .port_or_known_default()
            .ok_or_else(|| AuthError::Config(format!("redirect_uri has no port: {}", redirect_uri)))?;

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        Ok(Self {
            listener,
            callback_path: redirect_uri.path().to_string(),
            timeout,
        })
    }

    pub fn local_addr(&self) -> AuthResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| AuthError::Transport(e.to_string()))
    }

    /// Serve until the callback arrives or the timeout elapses.
    pub async fn wait(self) -> AuthResult<CallbackParams> {
        info!(path = %self.callback_path, "Callback server listening");

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let tx: ResultSender = Arc::new(tokio::sync::Mutex::new(Some(tx)));
        let callback_path = Arc::new(self.callback_path);
        let listener = self.listener;

        let server_handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let tx = tx.clone();
                        let callback_path = callback_path.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, &callback_path, tx).await {
                                error!("Error handling callback connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        break;
                    }
                }
            }
        });

        let result = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(AuthError::Transport(
                "callback server stopped unexpectedly".to_string(),
            )),
            Err(_) => Err(AuthError::CallbackTimeout),
        };

        server_handle.abort();
        result
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    callback_path: &str,
    tx: ResultSender,
) -> std::io::Result<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received request");

    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => return send_response(&mut writer, 400, "Bad Request", "Bad Request").await,
    };

    if method != "GET" {
        return send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await;
    }

    let url = match Url::parse(&format!("http://localhost{}", target)) {
        Ok(url) if url.path() == callback_path => url,
        _ => return send_response(&mut writer, 404, "Not Found", "Not Found").await,
    };

    let params = CallbackParams::from_url(&url);
    let page = match (&params.error, &params.code) {
        (Some(reason), _) => failure_page(reason),
        (None, Some(_)) => success_page(),
        (None, None) => failure_page("missing authorization code"),
    };
    send_response(&mut writer, 200, "OK", &page).await?;

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(params);
    }

    Ok(())
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Toune - Signed In</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1 style="color: #1db954;">Signed in</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

fn failure_page(reason: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Toune - Sign In Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1 style="color: #ef4444;">Sign in failed</h1>
<p>Error: {}</p>
<p>Close this window and run <code>toune login</code> again.</p>
</body>
</html>"#,
        escape_html(reason)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
