//! Approval Channel: the one seam every surface asking a human "run
//! this?" goes through, whether the human is sitting at the TUI's
//! confirmation modal (`src/ui/confirmation.rs`) or POSTing a decision
//! back to the web dashboard's SSE stream.
//!
//! Grounded on `src/ui/confirmation.rs`'s `ConfirmationType` tiering
//! (none / yes-no / typed) for *why* a decision is being asked for, kept
//! as-is; this module only adds the *transport* the teacher never
//! needed because its TUI was the only surface that could ever approve
//! anything.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::safety::SafetyClass;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub session_id: String,
    pub command: String,
    pub safety_class: SafetyClass,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    Approved,
    Denied,
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("no pending approval request with id `{0}`")]
    UnknownRequest(String),

    #[error("approval request `{0}` timed out waiting for a decision")]
    TimedOut(String),

    #[error("approval channel closed before a decision arrived")]
    ChannelClosed,
}

/// Default approval timeout: long enough for a human to notice a
/// prompt, short enough that a forgotten one doesn't wedge a session.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Anything that can be asked to approve a tool call and awaited for a
/// decision. The agent loop depends only on this trait, not on which
/// surface (TUI, web, auto-decider) is actually deciding.
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision, ApprovalError>;
}

/// The real implementation: a pending-request table keyed by request
/// id, each with a [`oneshot::Receiver`] the caller awaits. A UI surface
/// resolves a request by calling [`Self::submit_decision`] with the same
/// id - the TUI does this from its confirmation modal's keypress
/// handler, the web dashboard does it from a POST handler triggered by
/// the browser's button click on an SSE-pushed prompt.
pub struct InProcessApprovalChannel {
    pending: Mutex<HashMap<String, oneshot::Sender<ApprovalDecision>>>,
    timeout: Duration,
}

impl InProcessApprovalChannel {
    pub fn new(timeout: Duration) -> Self {
        Self { pending: Mutex::new(HashMap::new()), timeout }
    }

    pub fn submit_decision(&self, request_id: &str, decision: ApprovalDecision) -> Result<(), ApprovalError> {
        let sender = self
            .pending
            .lock()
            .remove(request_id)
            .ok_or_else(|| ApprovalError::UnknownRequest(request_id.to_string()))?;
        sender.send(decision).map_err(|_| ApprovalError::ChannelClosed)
    }
}

impl Default for InProcessApprovalChannel {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_TIMEOUT)
    }
}

#[async_trait]
impl ApprovalChannel for InProcessApprovalChannel {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision, ApprovalError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request.id.clone(), tx);

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(_)) => Err(ApprovalError::ChannelClosed),
            Err(_) => {
                self.pending.lock().remove(&request.id);
                Err(ApprovalError::TimedOut(request.id))
            }
        }
    }
}

/// Approves every read-only request and denies everything else without
/// asking a human. Used in tests and for headless/CI runs where no
/// approval surface is attached.
pub struct AutoDecider {
    pub auto_approve_read_only: bool,
}

impl Default for AutoDecider {
    fn default() -> Self {
        Self { auto_approve_read_only: true }
    }
}

#[async_trait]
impl ApprovalChannel for AutoDecider {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision, ApprovalError> {
        if self.auto_approve_read_only && request.safety_class == SafetyClass::ReadOnly {
            Ok(ApprovalDecision::Approved)
        } else {
            Ok(ApprovalDecision::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(class: SafetyClass) -> ApprovalRequest {
        ApprovalRequest {
            id: "req-1".to_string(),
            session_id: "s1".to_string(),
            command: "kubectl get pods".to_string(),
            safety_class: class,
            reason: "read only".to_string(),
        }
    }

    #[tokio::test]
    async fn submit_decision_resolves_pending_request() {
        let channel = InProcessApprovalChannel::new(Duration::from_secs(5));
        let req = request(SafetyClass::Write);

        let channel = std::sync::Arc::new(channel);
        let waiter = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.request_approval(req).await })
        };

        tokio::task::yield_now().await;
        channel.submit_decision("req-1", ApprovalDecision::Approved).unwrap();

        let decision = waiter.await.unwrap().unwrap();
        assert_eq!(decision, ApprovalDecision::Approved);
    }

    #[tokio::test]
    async fn request_times_out_without_a_decision() {
        let channel = InProcessApprovalChannel::new(Duration::from_millis(20));
        let result = channel.request_approval(request(SafetyClass::Dangerous)).await;
        assert!(matches!(result, Err(ApprovalError::TimedOut(_))));
    }

    #[tokio::test]
    async fn auto_decider_approves_read_only_only() {
        let decider = AutoDecider::default();
        assert_eq!(
            decider.request_approval(request(SafetyClass::ReadOnly)).await.unwrap(),
            ApprovalDecision::Approved
        );
        assert_eq!(
            decider.request_approval(request(SafetyClass::Write)).await.unwrap(),
            ApprovalDecision::Denied
        );
    }

    #[tokio::test]
    async fn unknown_request_id_errors() {
        let channel = InProcessApprovalChannel::new(Duration::from_secs(1));
        assert!(matches!(
            channel.submit_decision("nope", ApprovalDecision::Approved),
            Err(ApprovalError::UnknownRequest(_))
        ));
    }
}
