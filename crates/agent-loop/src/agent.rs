use std::sync::Arc;
use std::time::Instant;

use agent_core::tools::{parse_tool_args, ToolCall, ToolError, ToolOrigin, ToolResult};
use agent_core::{
    AgentError, AgentEvent, Conversation, Message, ProposedToolCall, ToolProposal,
};
use agent_llm::{LLMProvider, ModelConfig};
use agent_tools::ToolRegistry;
use tokio::sync::mpsc;

use crate::approval::{ApprovalGate, RejectAll};
use crate::config::AgentConfig;
use crate::parser::parse_embedded_calls;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Reply used when the model answers with nothing but whitespace.
pub const FALLBACK_RESPONSE: &str =
    "I'm sorry, I could not generate a response. Please try rephrasing your request.";

/// Reply used when the tool iteration budget runs out.
pub const MAX_STEPS_RESPONSE: &str = "I've reached the maximum number of steps for this \
request. Please try breaking it into smaller parts.";

/// Result text of calls that were never run because the batch was aborted.
pub const ABORTED_RESULT: &str = "Aborted: the remote tool server became unavailable";

/// How a call to [`Agent::process_message`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub response: Option<String>,
    pub cancelled: bool,
}

impl TurnOutcome {
    fn answered(response: String) -> Self {
        Self {
            response: Some(response),
            cancelled: false,
        }
    }

    fn cancelled() -> Self {
        Self {
            response: None,
            cancelled: true,
        }
    }
}

/// Conversational agent driving the model and the tools.
///
/// Owns its history. `process_message` takes `&mut self`, so turns never
/// overlap.
pub struct Agent {
    id: String,
    llm: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    approval: Arc<dyn ApprovalGate>,
    config: AgentConfig,
    models: Vec<ModelConfig>,
    selected_model: String,
    system_prompt: String,
    history: Conversation,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl Agent {
    /// The first model in `models` starts out selected.
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        models: Vec<ModelConfig>,
        config: AgentConfig,
    ) -> Self {
        let selected_model = models
            .first()
            .map(|model| model.key.clone())
            .unwrap_or_default();
        let system_prompt = config.system_prompt.clone();
        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

        Self {
            id,
            llm,
            registry,
            approval: Arc::new(RejectAll),
            config,
            models,
            selected_model,
            system_prompt,
            history: Conversation::new(),
            events: None,
        }
    }

    pub fn with_approval_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.approval = gate;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &Conversation {
        &self.history
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// Select the model used from the next turn on.
    pub fn set_model(&mut self, key: &str) -> Result<()> {
        if !self.models.iter().any(|model| model.key == key) {
            return Err(AgentError::UnknownModel(key.to_string()));
        }
        log::info!("[{}] Model switched to '{}'", self.id, key);
        self.selected_model = key.to_string();
        Ok(())
    }

    pub fn clear_history(&mut self) {
        log::debug!("[{}] History cleared", self.id);
        self.history.clear();
    }

    /// Run one user turn to completion.
    ///
    /// Errors only for conditions that end the turn: a failed or timed out
    /// model request, an unknown selected model, or a remote tool backend that
    /// has stopped reconnecting. Tool failures are fed back to the model.
    pub async fn process_message(&mut self, text: &str) -> Result<TurnOutcome> {
        let model = self.current_model()?;
        self.history.push(Message::user(text));
        log::debug!("[{}] Processing message with model '{}'", self.id, model.key);

        let mut iteration = 0;
        while iteration < self.config.max_iterations {
            let tools = self.registry.tools_for_llm();
            let context = self.build_context();

            self.emit(AgentEvent::ThinkingStarted { iteration });
            let started = Instant::now();
            let request = self.llm.chat(&model, &context, &tools);
            let reply = tokio::time::timeout(self.config.request_timeout(), request).await;
            self.emit(AgentEvent::ThinkingFinished { iteration });

            let reply = match reply {
                Ok(Ok(reply)) => reply,
                Ok(Err(error)) => {
                    return Err(self.fail(AgentError::LLM(error.to_string())));
                }
                Err(_) => {
                    return Err(self.fail(AgentError::Timeout(self.config.request_timeout())));
                }
            };
            log::debug!(
                "[{}] Model replied in {}ms",
                self.id,
                started.elapsed().as_millis()
            );

            let content = reply.content.unwrap_or_default();
            let mut calls = reply.tool_calls;
            if calls.is_empty() {
                calls = parse_embedded_calls(&content, |name| self.registry.has(name));
                if !calls.is_empty() {
                    log::debug!(
                        "[{}] Recovered {} tool calls from text",
                        self.id,
                        calls.len()
                    );
                }
            }

            if calls.is_empty() {
                let response = if content.trim().is_empty() {
                    FALLBACK_RESPONSE.to_string()
                } else {
                    content
                };
                self.history.push(Message::assistant(response.clone(), None));
                self.emit(AgentEvent::Complete {
                    response: response.clone(),
                });
                return Ok(TurnOutcome::answered(response));
            }

            let proposal = self.propose(&calls);
            self.emit(AgentEvent::ToolProposal {
                proposal: proposal.clone(),
            });

            if proposal.requires_approval {
                log::info!(
                    "[{}] Awaiting approval for {} remote tool calls",
                    self.id,
                    proposal.remote_calls().count()
                );
                if !self.approval.approve(&proposal).await {
                    log::info!("[{}] Tool batch rejected", self.id);
                    self.emit(AgentEvent::Cancelled);
                    return Ok(TurnOutcome::cancelled());
                }
            }

            self.history
                .push(Message::assistant(content, Some(calls.clone())));
            self.execute_batch(&calls).await?;
            iteration += 1;
        }

        log::warn!(
            "[{}] Stopped after {} tool iterations",
            self.id,
            self.config.max_iterations
        );
        let response = MAX_STEPS_RESPONSE.to_string();
        self.history.push(Message::assistant(response.clone(), None));
        self.emit(AgentEvent::Complete {
            response: response.clone(),
        });
        Ok(TurnOutcome::answered(response))
    }

    fn current_model(&self) -> Result<ModelConfig> {
        self.models
            .iter()
            .find(|model| model.key == self.selected_model)
            .cloned()
            .ok_or_else(|| AgentError::UnknownModel(self.selected_model.clone()))
    }

    /// System prompt followed by the most recent history window.
    fn build_context(&self) -> Vec<Message> {
        let tail = self.history.tail(self.config.history_window);
        let mut context = Vec::with_capacity(tail.len() + 1);
        if !self.system_prompt.trim().is_empty() {
            context.push(Message::system(self.system_prompt.clone()));
        }
        context.extend(tail.iter().cloned());
        context
    }

    fn propose(&self, calls: &[ToolCall]) -> ToolProposal {
        let calls: Vec<ProposedToolCall> = calls
            .iter()
            .map(|call| ProposedToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
                origin: self.registry.origin(&call.function.name),
            })
            .collect();
        let requires_approval = calls
            .iter()
            .any(|call| call.origin == Some(ToolOrigin::Remote));

        ToolProposal {
            calls,
            requires_approval,
        }
    }

    /// Run the calls in order, recording one tool message per call.
    async fn execute_batch(&mut self, calls: &[ToolCall]) -> Result<()> {
        let mut results = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            let name = call.function.name.as_str();
            let origin = self.registry.origin(name).unwrap_or(ToolOrigin::Local);

            let result = match parse_tool_args(&call.function.arguments) {
                Err(error) => {
                    log::warn!("[{}] Bad arguments for '{}': {}", self.id, name, error);
                    let message = match error {
                        ToolError::InvalidArguments(message) => message,
                        other => other.to_string(),
                    };
                    ToolResult::failure(name, origin, message)
                }
                Ok(args) => {
                    self.emit(AgentEvent::ToolStart {
                        tool_call_id: call.id.clone(),
                        tool_name: name.to_string(),
                        arguments: args.clone(),
                    });
                    let started = Instant::now();

                    match self.registry.execute(name, args).await {
                        Ok(result) => {
                            log::debug!(
                                "[{}] Tool '{}' finished in {}ms (success: {})",
                                self.id,
                                name,
                                started.elapsed().as_millis(),
                                result.success
                            );
                            result
                        }
                        Err(error) => {
                            for pending in &calls[index..] {
                                self.history.push(Message::tool_result(
                                    pending.id.clone(),
                                    format!("Error: {}", ABORTED_RESULT),
                                ));
                            }
                            return Err(self.fail(AgentError::Tool(error.to_string())));
                        }
                    }
                }
            };

            self.history
                .push(Message::tool_result(call.id.clone(), result.to_message_content()));
            self.emit(AgentEvent::ToolComplete {
                tool_call_id: call.id.clone(),
                result: result.clone(),
            });
            results.push(result);
        }

        self.emit(AgentEvent::ToolResults { results });
        Ok(())
    }

    fn fail(&self, error: AgentError) -> AgentError {
        log::error!("[{}] Turn failed: {}", self.id, error);
        self.emit(AgentEvent::Error {
            message: error.to_string(),
        });
        error
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
