use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::McpServerConfig;
use crate::error::Result;
use crate::protocol::McpProtocolClient;
use crate::transports::StreamableHttpTransport;
use crate::types::{McpCallResult, McpResource, McpResourceInfo, McpTool};

/// One initialized MCP session.
#[async_trait]
pub trait McpSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpTool>>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult>;
    async fn list_resources(&self) -> Result<Vec<McpResourceInfo>>;
    async fn read_resource(&self, uri: &str) -> Result<Vec<McpResource>>;
    async fn close(&self) -> Result<()>;
}

/// Opens fresh sessions. Called once per connect or reconnect attempt.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn McpSession>>;
}

#[async_trait]
impl McpSession for McpProtocolClient {
    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        McpProtocolClient::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult> {
        McpProtocolClient::call_tool(self, name, arguments).await
    }

    async fn list_resources(&self) -> Result<Vec<McpResourceInfo>> {
        McpProtocolClient::list_resources(self).await
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<McpResource>> {
        McpProtocolClient::read_resource(self, uri).await
    }

    async fn close(&self) -> Result<()> {
        self.disconnect().await
    }
}

/// Connects over streamable HTTP and performs the initialize handshake.
pub struct HttpConnector {
    config: McpServerConfig,
}

impl HttpConnector {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl McpConnector for HttpConnector {
    async fn connect(&self) -> Result<Arc<dyn McpSession>> {
        let transport = StreamableHttpTransport::new(self.config.clone())?;
        let client = McpProtocolClient::new(Box::new(transport), self.config.request_timeout());

        client.connect().await?;
        let init = match client.initialize().await {
            Ok(init) => init,
            Err(e) => {
                let _ = client.disconnect().await;
                return Err(e);
            }
        };

        info!(
            "MCP server '{}' initialized: {} v{} (protocol {})",
            self.config.id, init.server_info.name, init.server_info.version, init.protocol_version
        );

        Ok(Arc::new(client))
    }
}
