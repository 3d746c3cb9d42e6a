//! End-to-end turns against a scripted model and fake tool backends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_core::tools::{ToolOrigin, ToolOutput};
use agent_core::{AgentError, AgentEvent, Message, Role, ToolCall, ToolProposal, ToolSchema};
use agent_llm::{AssistantReply, LLMError, LLMProvider, ModelConfig};
use agent_loop::{
    Agent, AgentConfig, ApprovalGate, AutoApprove, ABORTED_RESULT, FALLBACK_RESPONSE,
    MAX_STEPS_RESPONSE,
};
use agent_mcp::{McpCallResult, McpError, McpTool, RemoteToolCaller};
use agent_tools::{EchoTool, FnTool, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

type Reply = Result<AssistantReply, String>;

/// Plays back queued replies, then repeats `fallback` forever.
struct ScriptedLlm {
    replies: Mutex<VecDeque<Reply>>,
    fallback: AssistantReply,
    requests: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Self::with_fallback(replies, AssistantReply::text("done"))
    }

    fn with_fallback(replies: Vec<Reply>, fallback: AssistantReply) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> (String, Vec<Message>) {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn chat(
        &self,
        model: &ModelConfig,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> agent_llm::Result<AssistantReply> {
        self.requests
            .lock()
            .unwrap()
            .push((model.key.clone(), messages.to_vec()));

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(LLMError::Api(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Never answers within any reasonable timeout.
struct StalledLlm;

#[async_trait]
impl LLMProvider for StalledLlm {
    async fn chat(
        &self,
        _model: &ModelConfig,
        _messages: &[Message],
        _tools: &[ToolSchema],
    ) -> agent_llm::Result<AssistantReply> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(AssistantReply::text("too late"))
    }
}

struct FakeRemote {
    calls: Mutex<Vec<(String, Value)>>,
    outcome: Result<McpCallResult, McpError>,
}

impl FakeRemote {
    fn answering(outcome: Result<McpCallResult, McpError>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            outcome,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteToolCaller for FakeRemote {
    async fn call_tool(&self, name: &str, arguments: Value) -> agent_mcp::Result<McpCallResult> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        self.outcome.clone()
    }
}

/// Counts how often it is asked and answers with a fixed decision.
struct CountingGate {
    asked: AtomicUsize,
    approve: bool,
    seen: Mutex<Vec<ToolProposal>>,
}

impl CountingGate {
    fn new(approve: bool) -> Arc<Self> {
        Arc::new(Self {
            asked: AtomicUsize::new(0),
            approve,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalGate for CountingGate {
    async fn approve(&self, proposal: &ToolProposal) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(proposal.clone());
        self.approve
    }
}

fn shown_layers() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn show_layer_tool(shown: Arc<Mutex<Vec<String>>>) -> FnTool {
    FnTool::new(
        "local_show_layer",
        "Show a map layer",
        json!({"type": "object", "properties": {"id": {"type": "string"}}}),
        move |args| {
            let id = args["id"].as_str().unwrap_or_default().to_string();
            shown.lock().unwrap().push(id.clone());
            Ok(ToolOutput::ok(format!("Layer {} shown", id)))
        },
    )
}

fn run_query_tool() -> McpTool {
    McpTool {
        name: "run_query".to_string(),
        description: "Run a SQL query".to_string(),
        input_schema: json!({"type": "object", "properties": {"sql": {"type": "string"}}}),
    }
}

fn registry(shown: Arc<Mutex<Vec<String>>>, remote: Arc<FakeRemote>) -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    registry.register_local(show_layer_tool(shown)).unwrap();
    registry.register_local(EchoTool::new()).unwrap();
    registry
        .register_remote(vec![run_query_tool()], remote)
        .unwrap();
    Arc::new(registry)
}

fn models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("fast", "gpt-4o-mini"),
        ModelConfig::new("smart", "gpt-4o"),
    ]
}

fn agent(llm: Arc<dyn LLMProvider>, registry: Arc<ToolRegistry>) -> Agent {
    Agent::new(llm, registry, models(), AgentConfig::default())
}

fn calls(calls: &[(&str, &str, &str)]) -> Reply {
    Ok(AssistantReply::with_tool_calls(
        calls
            .iter()
            .map(|(id, name, args)| ToolCall::new(*id, *name, *args))
            .collect(),
    ))
}

fn tool_messages(agent: &Agent) -> Vec<(String, String)> {
    agent
        .history()
        .messages()
        .iter()
        .filter(|message| message.role == Role::Tool)
        .map(|message| {
            (
                message.tool_call_id.clone().unwrap_or_default(),
                message.content.clone(),
            )
        })
        .collect()
}

#[tokio::test]
async fn local_batch_runs_without_approval() {
    let shown = shown_layers();
    let remote = FakeRemote::answering(Ok(McpCallResult::text("unused")));
    let gate = CountingGate::new(false);
    let llm = ScriptedLlm::new(vec![
        calls(&[("call_1", "local_show_layer", r#"{"id":"roads"}"#)]),
        Ok(AssistantReply::text("The roads layer is now visible.")),
    ]);

    let mut agent = agent(llm.clone(), registry(shown.clone(), remote.clone()))
        .with_approval_gate(gate.clone());
    let outcome = agent.process_message("Show me the roads").await.unwrap();

    assert_eq!(
        outcome.response.as_deref(),
        Some("The roads layer is now visible.")
    );
    assert!(!outcome.cancelled);
    assert_eq!(gate.asked(), 0);
    assert_eq!(*shown.lock().unwrap(), vec!["roads".to_string()]);
    assert_eq!(
        tool_messages(&agent),
        vec![("call_1".to_string(), "Layer roads shown".to_string())]
    );

    // The second request carries the tool result back to the model.
    let (_, second) = llm.request(1);
    let last = second.last().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn rejected_remote_batch_executes_nothing() {
    let shown = shown_layers();
    let remote = FakeRemote::answering(Ok(McpCallResult::text("3 rows")));
    let gate = CountingGate::new(false);
    let llm = ScriptedLlm::new(vec![calls(&[
        ("call_1", "local_show_layer", r#"{"id":"roads"}"#),
        ("call_2", "run_query", r#"{"sql":"SELECT 1"}"#),
    ])]);

    let mut agent = agent(llm.clone(), registry(shown.clone(), remote.clone()))
        .with_approval_gate(gate.clone());
    let outcome = agent.process_message("Count the roads").await.unwrap();

    assert_eq!(outcome.response, None);
    assert!(outcome.cancelled);
    assert_eq!(gate.asked(), 1);
    assert_eq!(remote.call_count(), 0);
    assert!(shown.lock().unwrap().is_empty());
    assert!(tool_messages(&agent).is_empty());
    assert_eq!(llm.request_count(), 1);

    let proposal = gate.seen.lock().unwrap()[0].clone();
    assert!(proposal.requires_approval);
    assert_eq!(proposal.calls[0].origin, Some(ToolOrigin::Local));
    assert_eq!(proposal.calls[1].origin, Some(ToolOrigin::Remote));
    assert_eq!(proposal.calls[1].arguments, r#"{"sql":"SELECT 1"}"#);
}

#[tokio::test]
async fn default_gate_rejects_remote_batches() {
    let remote = FakeRemote::answering(Ok(McpCallResult::text("3 rows")));
    let llm = ScriptedLlm::new(vec![calls(&[("call_1", "run_query", "{}")])]);

    let mut agent = agent(llm, registry(shown_layers(), remote.clone()));
    let outcome = agent.process_message("Count the roads").await.unwrap();

    assert!(outcome.cancelled);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn approved_mixed_batch_keeps_call_order() {
    let shown = shown_layers();
    let remote = FakeRemote::answering(Ok(McpCallResult::text("42 rows")));
    let gate = CountingGate::new(true);
    let llm = ScriptedLlm::new(vec![
        calls(&[
            ("call_a", "run_query", r#"{"sql":"SELECT count(*) FROM roads"}"#),
            ("call_b", "local_show_layer", r#"{"id":"roads"}"#),
            ("call_c", "echo", r#"{"text":"hi"}"#),
        ]),
        Ok(AssistantReply::text("There are 42 roads.")),
    ]);

    let mut agent = agent(llm, registry(shown, remote.clone())).with_approval_gate(gate.clone());
    let outcome = agent.process_message("How many roads?").await.unwrap();

    assert_eq!(outcome.response.as_deref(), Some("There are 42 roads."));
    assert_eq!(gate.asked(), 1);
    assert_eq!(
        tool_messages(&agent),
        vec![
            ("call_a".to_string(), "42 rows".to_string()),
            ("call_b".to_string(), "Layer roads shown".to_string()),
            ("call_c".to_string(), "hi".to_string()),
        ]
    );
    assert_eq!(
        remote.calls.lock().unwrap()[0],
        (
            "run_query".to_string(),
            json!({"sql": "SELECT count(*) FROM roads"})
        )
    );
}

#[tokio::test]
async fn invalid_arguments_are_reported_and_the_batch_continues() {
    let shown = shown_layers();
    let remote = FakeRemote::answering(Ok(McpCallResult::text("unused")));
    let llm = ScriptedLlm::new(vec![
        calls(&[
            ("call_1", "local_show_layer", "{not json"),
            ("call_2", "local_show_layer", r#"{"id":"parcels"}"#),
        ]),
        Ok(AssistantReply::text("Shown parcels.")),
    ]);

    let mut agent = agent(llm, registry(shown.clone(), remote));
    let outcome = agent.process_message("Show layers").await.unwrap();

    assert_eq!(outcome.response.as_deref(), Some("Shown parcels."));
    let results = tool_messages(&agent);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "call_1");
    assert!(results[0].1.starts_with("Error: Invalid JSON arguments"));
    assert_eq!(results[1].1, "Layer parcels shown");
    assert_eq!(*shown.lock().unwrap(), vec!["parcels".to_string()]);
}

#[tokio::test]
async fn unknown_tool_is_fed_back_to_the_model() {
    let gate = CountingGate::new(false);
    let llm = ScriptedLlm::new(vec![
        calls(&[("call_1", "get_weather", "{}")]),
        Ok(AssistantReply::text("I cannot check the weather.")),
    ]);

    let mut agent = agent(
        llm,
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    )
    .with_approval_gate(gate.clone());
    let outcome = agent.process_message("Weather?").await.unwrap();

    assert_eq!(outcome.response.as_deref(), Some("I cannot check the weather."));
    assert_eq!(gate.asked(), 0);
    let results = tool_messages(&agent);
    assert!(results[0].1.starts_with("Error: Unknown tool 'get_weather'"));
}

#[tokio::test]
async fn iteration_budget_ends_with_max_steps_message() {
    let looping = AssistantReply::with_tool_calls(vec![ToolCall::new(
        "call_loop",
        "echo",
        r#"{"text":"again"}"#,
    )]);
    let llm = ScriptedLlm::with_fallback(Vec::new(), looping);

    let mut agent = agent(
        llm.clone(),
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );
    let outcome = agent.process_message("Loop forever").await.unwrap();

    assert_eq!(outcome.response.as_deref(), Some(MAX_STEPS_RESPONSE));
    assert!(!outcome.cancelled);
    assert_eq!(llm.request_count(), 20);
    assert_eq!(tool_messages(&agent).len(), 20);
    assert_eq!(agent.history().last().unwrap().content, MAX_STEPS_RESPONSE);
}

#[tokio::test]
async fn batch_as_large_as_the_window_reaches_the_model() {
    let batch: Vec<(String, String)> = (0..20)
        .map(|i| (format!("call_{i}"), format!(r#"{{"text":"item {i}"}}"#)))
        .collect();
    let llm = ScriptedLlm::new(vec![
        Ok(AssistantReply::with_tool_calls(
            batch
                .iter()
                .map(|(id, args)| ToolCall::new(id.clone(), "echo", args.clone()))
                .collect(),
        )),
        Ok(AssistantReply::text("Echoed all twenty.")),
    ]);

    let mut agent = agent(
        llm.clone(),
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );
    let outcome = agent.process_message("Echo twenty items").await.unwrap();
    assert_eq!(outcome.response.as_deref(), Some("Echoed all twenty."));

    let (_, second) = llm.request(1);
    assert_eq!(second[0].role, Role::System);
    assert_eq!(second[1].role, Role::Assistant);
    assert_eq!(second[1].tool_calls.as_ref().map(Vec::len), Some(20));

    let visible: Vec<&str> = second
        .iter()
        .filter(|message| message.role == Role::Tool)
        .filter_map(|message| message.tool_call_id.as_deref())
        .collect();
    let expected: Vec<&str> = batch.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(visible, expected);
}

#[tokio::test]
async fn embedded_calls_are_recovered_from_text() {
    let shown = shown_layers();
    let llm = ScriptedLlm::new(vec![
        Ok(AssistantReply::text(
            r#"Showing it now. <tool_call>{"name":"local_show_layer","arguments":{"id":"rivers"}}</tool_call>"#,
        )),
        Ok(AssistantReply::text("Rivers are visible.")),
    ]);

    let mut agent = agent(
        llm,
        registry(shown.clone(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );
    let outcome = agent.process_message("Show rivers").await.unwrap();

    assert_eq!(outcome.response.as_deref(), Some("Rivers are visible."));
    assert_eq!(*shown.lock().unwrap(), vec!["rivers".to_string()]);

    let assistant = agent
        .history()
        .messages()
        .iter()
        .find(|message| message.tool_calls.is_some())
        .unwrap();
    let id = &assistant.tool_calls.as_ref().unwrap()[0].id;
    assert!(id.starts_with("call_"));
    assert_eq!(tool_messages(&agent)[0].0, *id);
}

#[tokio::test]
async fn blank_reply_is_replaced_with_fallback() {
    let llm = ScriptedLlm::new(vec![Ok(AssistantReply::text("   \n"))]);

    let mut agent = agent(
        llm,
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );
    let outcome = agent.process_message("Hello").await.unwrap();

    assert_eq!(outcome.response.as_deref(), Some(FALLBACK_RESPONSE));
    assert_eq!(agent.history().last().unwrap().content, FALLBACK_RESPONSE);
}

#[tokio::test(start_paused = true)]
async fn model_timeout_ends_the_turn() {
    let mut agent = agent(
        Arc::new(StalledLlm),
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );

    let error = agent.process_message("Hello").await.unwrap_err();

    assert!(matches!(error, AgentError::Timeout(limit) if limit == Duration::from_secs(300)));
}

#[tokio::test]
async fn model_error_is_not_retried() {
    let llm = ScriptedLlm::new(vec![Err("HTTP 500: upstream failed".to_string())]);

    let mut agent = agent(
        llm.clone(),
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );
    let error = agent.process_message("Hello").await.unwrap_err();

    assert!(matches!(error, AgentError::LLM(message) if message.contains("HTTP 500")));
    assert_eq!(llm.request_count(), 1);
}

#[tokio::test]
async fn cleared_history_matches_a_fresh_agent() {
    let remote = FakeRemote::answering(Ok(McpCallResult::text("")));
    let used_llm = ScriptedLlm::new(Vec::new());
    let mut used = agent(used_llm.clone(), registry(shown_layers(), remote.clone()));
    used.process_message("First question").await.unwrap();
    used.clear_history();
    used.process_message("Same question").await.unwrap();

    let fresh_llm = ScriptedLlm::new(Vec::new());
    let mut fresh = agent(fresh_llm.clone(), registry(shown_layers(), remote));
    fresh.process_message("Same question").await.unwrap();

    let summarize = |messages: Vec<Message>| -> Vec<(Role, String)> {
        messages
            .into_iter()
            .map(|message| (message.role, message.content))
            .collect()
    };
    let (_, after_clear) = used_llm.request(1);
    let (_, from_fresh) = fresh_llm.request(0);
    assert_eq!(summarize(after_clear), summarize(from_fresh));
}

#[tokio::test]
async fn model_switch_applies_to_the_next_turn() {
    let llm = ScriptedLlm::new(Vec::new());
    let mut agent = agent(
        llm.clone(),
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );

    assert_eq!(agent.selected_model(), "fast");
    agent.process_message("one").await.unwrap();
    agent.set_model("smart").unwrap();
    agent.process_message("two").await.unwrap();

    assert_eq!(llm.request(0).0, "fast");
    assert_eq!(llm.request(1).0, "smart");

    let error = agent.set_model("missing").unwrap_err();
    assert!(matches!(error, AgentError::UnknownModel(key) if key == "missing"));
    assert_eq!(agent.selected_model(), "smart");
}

#[tokio::test]
async fn system_prompt_leads_every_request() {
    let llm = ScriptedLlm::new(Vec::new());
    let mut agent = agent(
        llm.clone(),
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    );
    agent.set_system_prompt("You are a GIS assistant.");
    agent.process_message("Hello").await.unwrap();

    let (_, request) = llm.request(0);
    assert_eq!(request[0].role, Role::System);
    assert_eq!(request[0].content, "You are a GIS assistant.");
    assert_eq!(request[1].content, "Hello");
}

#[tokio::test]
async fn exhausted_remote_aborts_the_rest_of_the_batch() {
    let shown = shown_layers();
    let remote = FakeRemote::answering(Err(McpError::ReconnectExhausted { attempts: 3 }));
    let llm = ScriptedLlm::new(vec![calls(&[
        ("call_1", "echo", r#"{"text":"before"}"#),
        ("call_2", "run_query", "{}"),
        ("call_3", "local_show_layer", r#"{"id":"roads"}"#),
    ])]);

    let mut agent = agent(llm.clone(), registry(shown.clone(), remote))
        .with_approval_gate(Arc::new(AutoApprove));
    let error = agent.process_message("Query").await.unwrap_err();

    assert!(matches!(error, AgentError::Tool(message) if message.contains("restart")));
    assert!(shown.lock().unwrap().is_empty());
    assert_eq!(llm.request_count(), 1);

    let results = tool_messages(&agent);
    let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["call_1", "call_2", "call_3"]);
    assert_eq!(results[0].1, "before");
    assert!(results[1].1.contains(ABORTED_RESULT));
    assert!(results[2].1.contains(ABORTED_RESULT));
}

#[tokio::test]
async fn events_follow_the_turn() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let llm = ScriptedLlm::new(vec![
        calls(&[("call_1", "echo", r#"{"text":"ping"}"#)]),
        Ok(AssistantReply::text("pong")),
    ]);

    let mut agent = agent(
        llm,
        registry(shown_layers(), FakeRemote::answering(Ok(McpCallResult::text("")))),
    )
    .with_events(tx);
    agent.process_message("ping").await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events[0], AgentEvent::ThinkingStarted { iteration: 0 }));
    assert!(matches!(events[1], AgentEvent::ThinkingFinished { iteration: 0 }));
    match &events[2] {
        AgentEvent::ToolProposal { proposal } => {
            assert!(!proposal.requires_approval);
            assert_eq!(proposal.calls[0].name, "echo");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(
        matches!(&events[3], AgentEvent::ToolStart { tool_call_id, arguments, .. }
            if tool_call_id == "call_1" && arguments["text"] == "ping")
    );
    assert!(
        matches!(&events[4], AgentEvent::ToolComplete { result, .. } if result.result == "ping")
    );
    assert!(matches!(&events[5], AgentEvent::ToolResults { results } if results.len() == 1));
    assert!(matches!(events[6], AgentEvent::ThinkingStarted { iteration: 1 }));
    assert!(matches!(events[7], AgentEvent::ThinkingFinished { iteration: 1 }));
    assert!(matches!(&events[8], AgentEvent::Complete { response } if response == "pong"));
    assert_eq!(events.len(), 9);
}
