use std::io::{self, Write};

use agent_core::AgentEvent;
use colored::Colorize;
use tokio::sync::mpsc;

const MAX_RESULT_PREVIEW: usize = 200;

/// Print whatever is already queued without waiting for more.
pub fn drain_events(events: &mut mpsc::UnboundedReceiver<AgentEvent>) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

pub fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::ThinkingStarted { iteration } => {
            if *iteration == 0 {
                print!("{}", "💭 Thinking...".dimmed());
            } else {
                print!("{}", format!("💭 Thinking (step {})...", iteration + 1).dimmed());
            }
            let _ = io::stdout().flush();
        }
        AgentEvent::ThinkingFinished { .. } => {
            println!();
        }
        // Remote batches are shown by the approval prompt.
        AgentEvent::ToolProposal { proposal } if !proposal.requires_approval => {
            let names: Vec<&str> = proposal.calls.iter().map(|c| c.name.as_str()).collect();
            println!("{}", format!("🔧 Running: {}", names.join(", ")).yellow());
        }
        AgentEvent::ToolProposal { .. } => {}
        AgentEvent::ToolStart {
            tool_name,
            arguments,
            ..
        } => {
            println!("{}", format!("🔧 Executing tool: {}", tool_name).yellow());
            println!("{}", format!("   Args: {}", arguments).dimmed());
        }
        AgentEvent::ToolComplete { result, .. } => {
            let text = preview(&result.result);
            if result.success {
                println!("{}", format!("✅ Tool result: {}", text).green());
            } else {
                println!("{}", format!("❌ Tool error: {}", text).red());
            }
        }
        AgentEvent::ToolResults { .. } | AgentEvent::Complete { .. } => {}
        AgentEvent::Cancelled => {
            println!("{}", "🚫 Cancelled, no tools were run".yellow());
        }
        AgentEvent::Error { message } => {
            println!("{}", format!("❌ Error: {}", message).red());
        }
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(MAX_RESULT_PREVIEW).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
