use async_trait::async_trait;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::McpServerConfig;
use crate::error::{McpError, Result};
use crate::session::{HttpConnector, McpConnector, McpSession};
use crate::tool_filter::ToolFilter;
use crate::types::{
    ConnectionInfo, ConnectionStatus, McpCallResult, McpContentItem, McpResourceInfo, McpTool,
};

/// Substituted for a successful tool call that returned no content.
pub const NO_DATA_MESSAGE: &str = "Tool executed successfully (no data returned)";

/// Anything that can run a remote tool by name.
#[async_trait]
pub trait RemoteToolCaller: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult>;
}

type PendingConnect = Shared<BoxFuture<'static, Result<()>>>;

struct State {
    session: Option<Arc<dyn McpSession>>,
    tools: Vec<McpTool>,
    info: ConnectionInfo,
}

struct Inner {
    config: McpServerConfig,
    connector: Arc<dyn McpConnector>,
    filter: ToolFilter,
    state: Mutex<State>,
    pending_connect: Mutex<Option<PendingConnect>>,
}

/// A single logical connection to a remote tool server.
///
/// Cloning is cheap; clones share the connection. Every remote operation
/// first makes sure the session is alive, reconnecting with bounded
/// exponential backoff when it is not.
#[derive(Clone)]
pub struct RemoteToolTransport {
    inner: Arc<Inner>,
}

impl RemoteToolTransport {
    pub fn new(config: McpServerConfig) -> Self {
        let connector = Arc::new(HttpConnector::new(config.clone()));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: McpServerConfig, connector: Arc<dyn McpConnector>) -> Self {
        let filter = ToolFilter::from_config(&config);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                filter,
                state: Mutex::new(State {
                    session: None,
                    tools: Vec::new(),
                    info: ConnectionInfo::default(),
                }),
                pending_connect: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.inner.config
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().info.status
    }

    pub fn info(&self) -> ConnectionInfo {
        self.inner.state.lock().info.clone()
    }

    /// Tools advertised at the last handshake or probe, after filtering.
    pub fn cached_tools(&self) -> Vec<McpTool> {
        self.inner.state.lock().tools.clone()
    }

    /// Connects unless already connected. Concurrent callers share one attempt.
    ///
    /// Also the manual restart after reconnects were exhausted: success resets
    /// the reconnect counter.
    pub async fn connect(&self) -> Result<()> {
        let pending = {
            let mut pending = self.inner.pending_connect.lock();
            if self.status() == ConnectionStatus::Connected {
                return Ok(());
            }
            match pending.as_ref() {
                Some(in_flight) => {
                    debug!("[{}] Joining in-flight connect", self.inner.config.id);
                    in_flight.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let attempt = async move { inner.establish().await }.boxed().shared();
                    *pending = Some(attempt.clone());
                    attempt
                }
            }
        };

        pending.await
    }

    /// One reconnect attempt, after the backoff for its position in the
    /// sequence. Refused once the configured number of attempts is used up.
    pub async fn reconnect(&self) -> Result<()> {
        let reconnect = &self.inner.config.reconnect;
        let attempt = {
            let mut state = self.inner.state.lock();
            if state.info.reconnect_attempts >= reconnect.max_attempts {
                warn!(
                    "[{}] Reconnect refused after {} attempts",
                    self.inner.config.id, state.info.reconnect_attempts
                );
                return Err(McpError::ReconnectExhausted {
                    attempts: reconnect.max_attempts,
                });
            }
            state.info.reconnect_attempts += 1;
            state.info.reconnect_attempts
        };

        let delay = reconnect.backoff(attempt);
        info!(
            "[{}] Reconnecting (attempt {}/{}) in {}ms",
            self.inner.config.id,
            attempt,
            reconnect.max_attempts,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;

        self.discard_session().await;
        self.connect().await
    }

    /// Best-effort close. Errors from the server are swallowed.
    ///
    /// The reconnect counter is kept; only a successful connect resets it.
    pub async fn disconnect(&self) {
        *self.inner.pending_connect.lock() = None;
        let session = {
            let mut state = self.inner.state.lock();
            state.tools.clear();
            state.info.tool_count = 0;
            state.info.status = ConnectionStatus::Disconnected;
            state.info.disconnected_at = Some(Utc::now());
            state.session.take()
        };

        if let Some(session) = session {
            if let Err(e) = session.close().await {
                debug!("[{}] Ignoring close error: {}", self.inner.config.id, e);
            }
            info!("[{}] Disconnected", self.inner.config.id);
        }
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        self.ensure_connected().await?;
        Ok(self.cached_tools())
    }

    /// Runs a remote tool. A connection-class failure gets one reconnect and
    /// one retry of the same call; anything else is returned as is.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult> {
        let session = self.ensure_connected().await?;

        let result = match session.call_tool(name, arguments.clone()).await {
            Ok(result) => result,
            Err(e) if e.is_connection_error() => {
                warn!(
                    "[{}] Tool '{}' hit a connection failure, retrying once: {}",
                    self.inner.config.id, name, e
                );
                self.inner.mark_disconnected(&e);
                self.reconnect().await?;

                let session = self.current_session()?;
                session
                    .call_tool(name, arguments)
                    .await
                    .inspect_err(|e| self.note_failure(e))?
            }
            Err(e) => return Err(e),
        };

        Ok(normalize_empty(result))
    }

    pub async fn list_resources(&self) -> Result<Vec<McpResourceInfo>> {
        let session = self.ensure_connected().await?;
        session
            .list_resources()
            .await
            .inspect_err(|e| self.note_failure(e))
    }

    /// Text of the first content entry of a resource.
    pub async fn read_resource(&self, uri: &str) -> Result<String> {
        let session = self.ensure_connected().await?;
        let contents = session
            .read_resource(uri)
            .await
            .inspect_err(|e| self.note_failure(e))?;

        contents
            .into_iter()
            .next()
            .and_then(|content| content.text)
            .ok_or_else(|| McpError::Protocol(format!("Resource {} has no text content", uri)))
    }

    async fn ensure_connected(&self) -> Result<Arc<dyn McpSession>> {
        let (status, session) = {
            let state = self.inner.state.lock();
            (state.info.status, state.session.clone())
        };

        match (status, session) {
            (ConnectionStatus::Connected, Some(session)) => match session.list_tools().await {
                Ok(tools) => {
                    self.inner.cache_tools(tools);
                    return Ok(session);
                }
                Err(e) => {
                    warn!("[{}] Liveness probe failed: {}", self.inner.config.id, e);
                    self.inner.mark_disconnected(&e);
                }
            },
            (ConnectionStatus::Connecting, _) => {
                self.connect().await?;
                return self.current_session();
            }
            _ => {}
        }

        self.reconnect().await?;
        self.current_session()
    }

    fn current_session(&self) -> Result<Arc<dyn McpSession>> {
        let state = self.inner.state.lock();
        match (&state.info.status, &state.session) {
            (ConnectionStatus::Connected, Some(session)) => Ok(session.clone()),
            _ => Err(McpError::Disconnected),
        }
    }

    fn note_failure(&self, error: &McpError) {
        if error.is_connection_error() {
            self.inner.mark_disconnected(error);
        }
    }

    async fn discard_session(&self) {
        let stale = self.inner.state.lock().session.take();
        if let Some(session) = stale {
            if let Err(e) = session.close().await {
                debug!("[{}] Stale session close failed: {}", self.inner.config.id, e);
            }
        }
    }
}

impl Inner {
    async fn establish(self: Arc<Self>) -> Result<()> {
        self.state.lock().info.status = ConnectionStatus::Connecting;
        info!("[{}] Connecting to {}", self.config.id, self.config.url);

        let result = self.open_session().await;
        let outcome = match result {
            Ok((session, tools)) => {
                let tools = self.filter.apply(tools);
                let mut state = self.state.lock();
                info!(
                    "[{}] Connected, {} tools available",
                    self.config.id,
                    tools.len()
                );
                state.session = Some(session);
                state.info.tool_count = tools.len();
                state.tools = tools;
                state.info.status = ConnectionStatus::Connected;
                state.info.reconnect_attempts = 0;
                state.info.connected_at = Some(Utc::now());
                state.info.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!("[{}] Connect failed: {}", self.config.id, e);
                let mut state = self.state.lock();
                state.info.status = ConnectionStatus::Disconnected;
                state.info.last_error = Some(e.to_string());
                Err(e)
            }
        };

        *self.pending_connect.lock() = None;
        outcome
    }

    async fn open_session(&self) -> Result<(Arc<dyn McpSession>, Vec<McpTool>)> {
        let session = self.connector.connect().await?;
        match session.list_tools().await {
            Ok(tools) => Ok((session, tools)),
            Err(e) => {
                let _ = session.close().await;
                Err(e)
            }
        }
    }

    fn cache_tools(&self, tools: Vec<McpTool>) {
        let tools = self.filter.apply(tools);
        let mut state = self.state.lock();
        state.info.tool_count = tools.len();
        state.tools = tools;
    }

    fn mark_disconnected(&self, error: &McpError) {
        let mut state = self.state.lock();
        state.info.status = ConnectionStatus::Disconnected;
        state.info.disconnected_at = Some(Utc::now());
        state.info.last_error = Some(error.to_string());
    }
}

fn normalize_empty(mut result: McpCallResult) -> McpCallResult {
    if result.content.is_empty() {
        result.content.push(McpContentItem::Text {
            text: NO_DATA_MESSAGE.to_string(),
        });
    }
    result
}

#[async_trait]
impl RemoteToolCaller for RemoteToolTransport {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult> {
        RemoteToolTransport::call_tool(self, name, arguments).await
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
