use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use parking_lot::Mutex as SyncMutex;
use reqwest::{header::HeaderMap, Client, Response, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::{HeaderConfig, McpServerConfig};
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// MCP "streamable HTTP" transport.
///
/// Every JSON-RPC message is POSTed to a single endpoint. Replies come back
/// either as a JSON body or as an SSE stream of `message` events and are
/// queued for [`McpTransport::receive`].
pub struct StreamableHttpTransport {
    config: McpServerConfig,
    client: Client,
    connected: AtomicBool,
    session_id: SyncMutex<Option<String>>,
    message_tx: mpsc::Sender<String>,
    message_rx: Mutex<mpsc::Receiver<String>>,
}

impl StreamableHttpTransport {
    pub fn new(config: McpServerConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| McpError::InvalidConfig(format!("HTTP client: {}", e)))?;
        let (message_tx, message_rx) = mpsc::channel(100);

        Ok(Self {
            config,
            client,
            connected: AtomicBool::new(false),
            session_id: SyncMutex::new(None),
            message_tx,
            message_rx: Mutex::new(message_rx),
        })
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json, text/event-stream"),
        );

        for HeaderConfig { name, value } in &self.config.headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {}", e)))?;
            let header_value = value
                .parse()
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header value: {}", e)))?;
            headers.insert(header_name, header_value);
        }

        if let Some(session_id) = self.session_id() {
            let value = session_id
                .parse()
                .map_err(|e| McpError::Protocol(format!("Invalid session id: {}", e)))?;
            headers.insert(SESSION_HEADER, value);
        }

        Ok(headers)
    }

    async fn enqueue(&self, message: String) -> Result<()> {
        self.message_tx
            .send(message)
            .await
            .map_err(|_| McpError::Disconnected)
    }

    async fn read_event_stream(&self, response: Response) -> Result<()> {
        let mut stream = response.bytes_stream().eventsource();
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) if event.event == "message" || event.event.is_empty() => {
                    if !event.data.trim().is_empty() {
                        self.enqueue(event.data).await?;
                    }
                }
                Ok(event) => debug!("Skipping SSE event: {}", event.event),
                Err(e) => {
                    return Err(McpError::Transport(format!("SSE stream error: {}", e)));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn connect(&mut self) -> Result<()> {
        reqwest::Url::parse(&self.config.url)
            .map_err(|e| McpError::InvalidConfig(format!("Invalid URL {}: {}", self.config.url, e)))?;

        *self.session_id.lock() = None;
        self.connected.store(true, Ordering::SeqCst);

        info!("MCP transport ready for {}", self.config.url);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);

        let Some(session_id) = self.session_id.lock().take() else {
            return Ok(());
        };

        // Best effort: the server may already have dropped the session.
        let result = self
            .client
            .delete(&self.config.url)
            .header(SESSION_HEADER, session_id)
            .timeout(self.config.request_timeout())
            .send()
            .await;
        if let Err(e) = result {
            debug!("Session termination failed: {}", e);
        }

        info!("MCP transport for {} disconnected", self.config.url);
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let headers = self.build_headers()?;
        let response = self
            .client
            .post(&self.config.url)
            .headers(headers)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message)
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        let status = response.status();
        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            *self.session_id.lock() = Some(session_id.to_string());
        }

        if status == StatusCode::NOT_FOUND && self.session_id().is_some() {
            warn!("MCP session expired on {}", self.config.url);
            *self.session_id.lock() = None;
            self.connected.store(false, Ordering::SeqCst);
            return Err(McpError::Disconnected);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("text/event-stream"))
            .unwrap_or(false);

        if is_event_stream {
            self.read_event_stream(response).await
        } else {
            let body = response.text().await?;
            if body.trim().is_empty() {
                return Ok(());
            }
            self.enqueue(body).await
        }
    }

    async fn receive(&self) -> Result<Option<String>> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let mut rx = self.message_rx.lock().await;
        match tokio::time::timeout(tokio::time::Duration::from_millis(100), rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(McpError::Disconnected),
            Err(_) => Ok(None),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
