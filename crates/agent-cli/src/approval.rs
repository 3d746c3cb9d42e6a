use std::io::{self, Write};

use agent_core::{ToolOrigin, ToolProposal};
use agent_loop::ApprovalGate;
use async_trait::async_trait;
use colored::Colorize;

/// Asks on the terminal before a batch with remote tools runs.
pub struct StdinApprovalGate;

#[async_trait]
impl ApprovalGate for StdinApprovalGate {
    async fn approve(&self, proposal: &ToolProposal) -> bool {
        print_proposal(proposal);

        let answer = tokio::task::spawn_blocking(|| -> io::Result<String> {
            print!("{} ", "Approve? [y/N]".yellow().bold());
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_affirmative(&line),
            Ok(Err(e)) => {
                log::warn!("Failed to read approval answer: {}", e);
                false
            }
            Err(e) => {
                log::warn!("Approval prompt task failed: {}", e);
                false
            }
        }
    }
}

fn print_proposal(proposal: &ToolProposal) {
    println!();
    println!("{}", "⚠️  The assistant wants to run:".yellow());
    for call in &proposal.calls {
        let origin = match call.origin {
            Some(ToolOrigin::Remote) => "remote".magenta(),
            Some(ToolOrigin::Local) => "local".normal(),
            None => "unknown".red(),
        };
        println!("   • {} [{}]", call.name.bold(), origin);
        println!("{}", format!("     Args: {}", call.arguments).dimmed());
    }
}

/// Only an explicit yes approves.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
