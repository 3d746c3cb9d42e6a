use agent_core::ToolProposal;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Decides whether a batch containing remote tools may run.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn approve(&self, proposal: &ToolProposal) -> bool;
}

/// Refuses every batch. The default when nothing else is configured.
pub struct RejectAll;

#[async_trait]
impl ApprovalGate for RejectAll {
    async fn approve(&self, _proposal: &ToolProposal) -> bool {
        false
    }
}

pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn approve(&self, _proposal: &ToolProposal) -> bool {
        true
    }
}

/// A pending decision handed to whoever embeds the agent.
///
/// Dropping it without answering rejects the batch.
pub struct ApprovalRequest {
    pub proposal: ToolProposal,
    responder: oneshot::Sender<bool>,
}

impl ApprovalRequest {
    pub fn respond(self, approved: bool) {
        let _ = self.responder.send(approved);
    }

    pub fn approve(self) {
        self.respond(true);
    }

    pub fn reject(self) {
        self.respond(false);
    }
}

/// Forwards each proposal over a channel and waits for the answer.
pub struct ChannelApprovalGate {
    requests: mpsc::UnboundedSender<ApprovalRequest>,
}

impl ChannelApprovalGate {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ApprovalRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }
}

#[async_trait]
impl ApprovalGate for ChannelApprovalGate {
    async fn approve(&self, proposal: &ToolProposal) -> bool {
        let (responder, decision) = oneshot::channel();
        let request = ApprovalRequest {
            proposal: proposal.clone(),
            responder,
        };

        if self.requests.send(request).is_err() {
            log::warn!("Approval channel closed, rejecting tool batch");
            return false;
        }

        decision.await.unwrap_or(false)
    }
}
