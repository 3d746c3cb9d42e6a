use std::collections::HashSet;
use std::sync::Arc;

use agent_core::tools::{Tool, ToolError, ToolOrigin, ToolResult, ToolSchema};
use agent_mcp::{McpTool, RemoteToolCaller};
use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;

use crate::error::RegistryError;

pub type SharedTool = Arc<dyn Tool>;

#[derive(Clone)]
enum ToolEntry {
    Local(SharedTool),
    Remote {
        tool: McpTool,
        caller: Arc<dyn RemoteToolCaller>,
    },
}

impl ToolEntry {
    fn origin(&self) -> ToolOrigin {
        match self {
            ToolEntry::Local(_) => ToolOrigin::Local,
            ToolEntry::Remote { .. } => ToolOrigin::Remote,
        }
    }

    fn schema(&self) -> ToolSchema {
        match self {
            ToolEntry::Local(tool) => tool.to_schema(),
            ToolEntry::Remote { tool, .. } => ToolSchema::function(
                tool.name.clone(),
                tool.description.clone(),
                tool.input_schema.clone(),
            ),
        }
    }
}

/// Name-keyed tools from every source, behind one `execute` entry point.
///
/// Tool failures come back as unsuccessful [`ToolResult`]s. The only error
/// `execute` returns is [`ToolError::Unavailable`], when the remote backend
/// has given up for good.
pub struct ToolRegistry {
    tools: DashMap<String, ToolEntry>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    pub fn register_local<T>(&self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        self.register_local_shared(Arc::new(tool))
    }

    pub fn register_local_shared(&self, tool: SharedTool) -> Result<(), RegistryError> {
        let name = validate_name(tool.name())?;

        match self.tools.entry(name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateTool(name)),
            Entry::Vacant(entry) => {
                log::debug!("Registered local tool '{}'", name);
                entry.insert(ToolEntry::Local(tool));
                Ok(())
            }
        }
    }

    /// Register every tool a remote server advertises, all executed through
    /// `caller`. The batch is all or nothing: a clash with an existing name
    /// (or within the batch) registers none of it.
    pub fn register_remote(
        &self,
        tools: Vec<McpTool>,
        caller: Arc<dyn RemoteToolCaller>,
    ) -> Result<usize, RegistryError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            let name = validate_name(&tool.name)?;
            if self.tools.contains_key(&name) || !seen.insert(name.clone()) {
                return Err(RegistryError::DuplicateTool(name));
            }
        }

        let mut inserted: Vec<String> = Vec::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name.trim().to_string();
            let taken = match self.tools.entry(name.clone()) {
                Entry::Occupied(_) => true,
                Entry::Vacant(entry) => {
                    entry.insert(ToolEntry::Remote {
                        tool,
                        caller: Arc::clone(&caller),
                    });
                    false
                }
            };
            // Registered concurrently since the check above.
            if taken {
                for name in &inserted {
                    self.tools.remove(name);
                }
                return Err(RegistryError::DuplicateTool(name));
            }
            inserted.push(name);
        }

        log::info!("Registered {} remote tools", inserted.len());
        Ok(inserted.len())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn origin(&self, name: &str) -> Option<ToolOrigin> {
        self.tools.get(name).map(|entry| entry.value().origin())
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.origin(name) == Some(ToolOrigin::Local)
    }

    pub fn is_remote(&self, name: &str) -> bool {
        self.origin(name) == Some(ToolOrigin::Remote)
    }

    /// Schemas of every registered tool, sorted by name.
    pub fn tools_for_llm(&self) -> Vec<ToolSchema> {
        let mut tools: Vec<ToolSchema> = self
            .tools
            .iter()
            .map(|entry| entry.value().schema())
            .collect();
        tools.sort_by(|left, right| left.function.name.cmp(&right.function.name));
        tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolResult, ToolError> {
        // Clone out of the map so no shard lock is held across the await.
        let Some(entry) = self.tools.get(name).map(|entry| entry.value().clone()) else {
            log::warn!("Unknown tool requested: {}", name);
            let known = self.tool_names();
            let known = if known.is_empty() {
                "(none)".to_string()
            } else {
                known.join(", ")
            };
            return Ok(ToolResult::failure(
                name,
                ToolOrigin::Local,
                format!("Unknown tool '{}'. Available tools: {}", name, known),
            ));
        };

        match entry {
            ToolEntry::Local(tool) => Ok(match tool.execute(args).await {
                Ok(output) if output.success => {
                    ToolResult::success(name, ToolOrigin::Local, output.result)
                }
                Ok(output) => ToolResult::failure(name, ToolOrigin::Local, output.result),
                Err(e) => {
                    log::warn!("Local tool '{}' failed: {}", name, e);
                    ToolResult::failure(name, ToolOrigin::Local, e.to_string())
                }
            }),
            ToolEntry::Remote { caller, .. } => {
                match caller.call_tool(name, args.clone()).await {
                    Ok(result) => {
                        let text = result.first_text().unwrap_or_default();
                        let tool_result = if result.is_error {
                            ToolResult::failure(name, ToolOrigin::Remote, text)
                        } else {
                            ToolResult::success(name, ToolOrigin::Remote, text)
                        };
                        Ok(tool_result.with_payload(args))
                    }
                    Err(e) if e.is_fatal() => {
                        log::error!("Remote tool '{}' unavailable: {}", name, e);
                        Err(ToolError::Unavailable(e.to_string()))
                    }
                    Err(e) => {
                        log::warn!("Remote tool '{}' failed: {}", name, e);
                        Ok(ToolResult::failure(name, ToolOrigin::Remote, e.to_string())
                            .with_payload(args))
                    }
                }
            }
        }
    }
}

fn validate_name(name: &str) -> Result<String, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::InvalidTool(
            "tool name cannot be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}
