use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, error, warn};

use crate::error::{McpError, Result};
use crate::protocol::models::*;
use crate::types::{McpCallResult, McpResource, McpResourceInfo, McpTool};

/// Transport trait for MCP communication
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&mut self) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;
    async fn send(&self, message: String) -> Result<()>;
    async fn receive(&self) -> Result<Option<String>>;
    fn is_connected(&self) -> bool;
}

type PendingRequests = Arc<RwLock<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// JSON-RPC client speaking MCP over any [`McpTransport`].
pub struct McpProtocolClient {
    transport: Arc<RwLock<Box<dyn McpTransport>>>,
    next_id: AtomicU64,
    pending_requests: PendingRequests,
    message_handler: Mutex<Option<tokio::task::JoinHandle<()>>>,
    request_timeout: Duration,
}

impl McpProtocolClient {
    pub fn new(transport: Box<dyn McpTransport>, request_timeout: Duration) -> Self {
        Self {
            transport: Arc::new(RwLock::new(transport)),
            next_id: AtomicU64::new(1),
            pending_requests: Arc::new(RwLock::new(HashMap::new())),
            message_handler: Mutex::new(None),
            request_timeout,
        }
    }

    pub async fn connect(&self) -> Result<()> {
        let mut transport = self.transport.write().await;
        transport.connect().await?;
        drop(transport);

        self.start_message_handler();

        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        if let Some(handler) = self.message_handler.lock().take() {
            handler.abort();
        }

        // Wake anyone still waiting; their senders drop and they see Disconnected.
        self.pending_requests.write().await.clear();

        let mut transport = self.transport.write().await;
        transport.disconnect().await
    }

    fn start_message_handler(&self) {
        let transport = self.transport.clone();
        let pending_requests = self.pending_requests.clone();

        let handler = tokio::spawn(async move {
            loop {
                let transport = transport.read().await;
                if !transport.is_connected() {
                    break;
                }

                match transport.receive().await {
                    Ok(Some(message)) => {
                        debug!("Received message: {}", message);
                        if let Err(e) = Self::handle_message(&message, &pending_requests).await {
                            warn!("Failed to handle message: {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Transport error: {}", e);
                        break;
                    }
                }
            }
            // Fail whatever is still in flight instead of letting it time out.
            pending_requests.write().await.clear();
        });

        if let Some(previous) = self.message_handler.lock().replace(handler) {
            previous.abort();
        }
    }

    async fn handle_message(message: &str, pending_requests: &PendingRequests) -> Result<()> {
        let value: Value = serde_json::from_str(message)?;

        let messages = match value {
            Value::Array(batch) => batch,
            single => vec![single],
        };

        for message in messages {
            if message.get("method").is_some() {
                // Server notifications and server-initiated requests are not acted upon.
                debug!(
                    "Ignoring server message: {}",
                    message["method"].as_str().unwrap_or_default()
                );
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(message)?;
            let mut pending = pending_requests.write().await;
            match pending.remove(&response.id) {
                Some(sender) => {
                    let _ = sender.send(response);
                }
                None => warn!("Response for unknown request id {}", response.id),
            }
        }

        Ok(())
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = JsonRpcRequest::new(id, method, params);
        let request_json = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending_requests.write().await.insert(id, tx);

        let sent = {
            let transport = self.transport.read().await;
            transport.send(request_json).await
        };
        if let Err(e) = sent {
            self.pending_requests.write().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.error {
                    Err(McpError::Remote {
                        code: error.code,
                        message: error.message,
                    })
                } else {
                    response
                        .result
                        .ok_or_else(|| McpError::Protocol("Missing result".to_string()))
                }
            }
            Ok(Err(_)) => Err(McpError::Disconnected),
            Err(_) => {
                self.pending_requests.write().await.remove(&id);
                Err(McpError::Timeout(format!(
                    "{} (request {}) timed out after {}ms",
                    method,
                    id,
                    self.request_timeout.as_millis()
                )))
            }
        }
    }

    async fn send_notification(&self, method: &str) -> Result<()> {
        let notification = JsonRpcNotification::new(method);
        let transport = self.transport.read().await;
        transport.send(serde_json::to_string(&notification)?).await
    }

    pub async fn initialize(&self) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;
        let result = self.send_request("initialize", Some(params)).await?;
        let result: McpInitializeResult = serde_json::from_value(result)?;

        self.send_notification("notifications/initialized").await?;

        Ok(result)
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let result = self.send_request("tools/list", None).await?;
        let result: McpToolListResult = serde_json::from_value(result)?;
        Ok(result.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult> {
        let request = McpToolCallRequest {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let params = serde_json::to_value(request)?;

        let result = self.send_request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn list_resources(&self) -> Result<Vec<McpResourceInfo>> {
        let result = self.send_request("resources/list", None).await?;
        let result: McpResourceListResult = serde_json::from_value(result)?;
        Ok(result.resources)
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<McpResource>> {
        let params = serde_json::to_value(McpResourceReadRequest {
            uri: uri.to_string(),
        })?;
        let result = self.send_request("resources/read", Some(params)).await?;
        let result: McpResourceReadResult = serde_json::from_value(result)?;
        Ok(result.contents)
    }

    pub async fn ping(&self) -> Result<()> {
        self.send_request("ping", None).await?;
        Ok(())
    }
}

impl Drop for McpProtocolClient {
    fn drop(&mut self) {
        if let Some(handler) = self.message_handler.get_mut().take() {
            handler.abort();
        }
    }
}
