use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::approval::{ApprovalChannel, ApprovalDecision, ApprovalRequest};
use crate::llm::Provider;
use crate::safety::{self, SafetyPolicy};
use crate::session::{ApprovalRecord, Message, SessionHandle, ToolExecutionRecord};
use crate::tools::{ToolExecutionContext, ToolRegistry};

use super::state::{AgentEvent, AgentPhase};
use super::AgentError;

/// Maximum wall-clock time for one turn, mirroring the teacher's
/// `MAX_EXECUTION_TIME` in `src/agent/agent_loop.rs`.
const MAX_TURN_DURATION: Duration = Duration::from_secs(300);

/// Drives one conversation: pulls the transcript from the session
/// store, calls the provider, classifies and gates any tool calls it
/// returns, dispatches the approved ones, and repeats until the model
/// stops asking for tools, the turn is cancelled, or the loop's budget
/// runs out.
pub struct AgentLoop {
    pub provider: Arc<dyn Provider>,
    pub registry: Arc<ToolRegistry>,
    pub approval: Arc<dyn ApprovalChannel>,
    pub safety_policy: SafetyPolicy,
    pub tool_context: ToolExecutionContext,
    /// Maximum number of provider round-trips (think -> act -> observe)
    /// within a single turn. `None` means unbounded - the turn still
    /// ends, just by the model stopping on its own, a cancellation, or
    /// `MAX_TURN_DURATION` wall-clock timing it out.
    pub max_turns: Option<usize>,
}

impl AgentLoop {
    /// Runs a turn to completion with no external cancellation source
    /// beyond the turn's own wall-clock and round-trip budgets.
    pub async fn run_turn(
        &self,
        session: &SessionHandle,
        user_input: String,
        events: Option<UnboundedSender<AgentEvent>>,
    ) -> Result<String, AgentError> {
        self.run_turn_with_cancellation(session, user_input, events, CancellationToken::new()).await
    }

    /// Same as [`Self::run_turn`], but the caller supplies the
    /// cancellation token - tripping it from outside (a user cancelling
    /// mid-turn, a supervisor shutting down) unwinds the in-flight
    /// provider call or tool execution instead of leaking it.
    pub async fn run_turn_with_cancellation(
        &self,
        session: &SessionHandle,
        user_input: String,
        events: Option<UnboundedSender<AgentEvent>>,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        let now = chrono::Utc::now();
        let lease = session.submit(Message::user(user_input, now)).await;
        let started = std::time::Instant::now();

        let result = self.drive_turn(session, &events, started, &cancel).await;

        lease.finish().await;
        result
    }

    async fn drive_turn(
        &self,
        session: &SessionHandle,
        events: &Option<UnboundedSender<AgentEvent>>,
        started: std::time::Instant,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        emit(events, AgentEvent::PhaseChanged(AgentPhase::Running));

        let mut round_trips: usize = 0;

        loop {
            if cancel.is_cancelled() {
                emit(events, AgentEvent::PhaseChanged(AgentPhase::Cancelled));
                return Err(AgentError::Cancelled);
            }

            if started.elapsed() > MAX_TURN_DURATION {
                emit(events, AgentEvent::PhaseChanged(AgentPhase::Error));
                return Err(AgentError::TurnTimedOut);
            }

            if let Some(max_turns) = self.max_turns {
                if round_trips >= max_turns {
                    let message = format!("Turn budget exhausted after {} tool round-trips.", max_turns);
                    session.append_message(Message::assistant(message.clone(), Vec::new(), chrono::Utc::now())).await;
                    emit(events, AgentEvent::AssistantText(message.clone()));
                    emit(events, AgentEvent::PhaseChanged(AgentPhase::Done));
                    emit(events, AgentEvent::TurnFinished { content: message.clone() });
                    return Ok(message);
                }
            }
            round_trips += 1;

            let messages = session.messages().await;
            let tools = self.registry.definitions();
            let response = self.provider.chat(&messages, &tools, None, cancel.clone()).await?;

            if !response.content.is_empty() {
                emit(events, AgentEvent::AssistantText(response.content.clone()));
            }

            if response.tool_calls.is_empty() {
                session.append_message(Message::assistant(response.content.clone(), Vec::new(), chrono::Utc::now())).await;
                emit(events, AgentEvent::PhaseChanged(AgentPhase::Done));
                emit(events, AgentEvent::TurnFinished { content: response.content.clone() });
                return Ok(response.content);
            }

            session
                .append_message(Message::assistant(response.content.clone(), response.tool_calls.clone(), chrono::Utc::now()))
                .await;

            emit(events, AgentEvent::PhaseChanged(AgentPhase::ToolAnalysis));

            for call in &response.tool_calls {
                self.handle_tool_call(session, call, events, cancel).await?;
            }
        }
    }

    async fn handle_tool_call(
        &self,
        session: &SessionHandle,
        call: &crate::tools::ToolCall,
        events: &Option<UnboundedSender<AgentEvent>>,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let command = self
            .registry
            .command_for_safety_check(&call.name, &call.arguments)
            .map_err(|e| AgentError::ToolRegistry(e))?;

        let outcome = safety::classify(&command, &self.safety_policy)?;

        emit(
            events,
            AgentEvent::ToolCallProposed { call: call.clone(), safety_class: outcome.class, reason: outcome.reason.clone() },
        );

        let mut record = ToolExecutionRecord {
            call: call.clone(),
            safety_class: outcome.class,
            safety_reason: outcome.reason.clone(),
            approval: ApprovalRecord::NotRequired,
            result: None,
            started_at: chrono::Utc::now(),
            finished_at: None,
        };

        if self.safety_policy.block_dangerous && outcome.class == crate::safety::SafetyClass::Dangerous {
            record.approval = ApprovalRecord::Denied { by: "policy".to_string(), reason: Some("blocked by safety policy".to_string()) };
            record.finished_at = Some(chrono::Utc::now());
            session.append_tool_execution(record).await;
            emit(events, AgentEvent::ToolCallDenied { call_id: call.id.clone(), reason: "blocked by safety policy".to_string() });
            session
                .append_message(Message::tool_result(&call.id, "denied: command is classified dangerous and policy blocks it", chrono::Utc::now()))
                .await;
            return Ok(());
        }

        let needs_approval = match outcome.class {
            crate::safety::SafetyClass::ReadOnly => !self.safety_policy.auto_approve_readonly,
            crate::safety::SafetyClass::Write => self.safety_policy.require_approval_for_write,
            crate::safety::SafetyClass::Interactive | crate::safety::SafetyClass::Dangerous => true,
        };

        if needs_approval {
            emit(events, AgentEvent::PhaseChanged(AgentPhase::WaitingForApproval));
            record.approval = ApprovalRecord::Pending;
            session.append_tool_execution(record.clone()).await;

            let request = ApprovalRequest {
                id: call.id.clone(),
                session_id: session.id().to_string(),
                command: command.clone(),
                safety_class: outcome.class,
                reason: outcome.reason.clone(),
            };

            let decision = self.approval.request_approval(request).await;
            match decision {
                Ok(ApprovalDecision::Approved) => {
                    session.update_tool_execution(&call.id, |r| r.approval = ApprovalRecord::Approved { by: "user".to_string() }).await;
                }
                Ok(ApprovalDecision::Denied) | Err(_) => {
                    let reason = match &decision {
                        Err(e) => e.to_string(),
                        _ => "denied by approver".to_string(),
                    };
                    session
                        .update_tool_execution(&call.id, |r| {
                            r.approval = ApprovalRecord::Denied { by: "user".to_string(), reason: Some(reason.clone()) };
                            r.finished_at = Some(chrono::Utc::now());
                        })
                        .await;
                    emit(events, AgentEvent::ToolCallDenied { call_id: call.id.clone(), reason: reason.clone() });
                    session.append_message(Message::tool_result(&call.id, format!("denied: {}", reason), chrono::Utc::now())).await;
                    emit(events, AgentEvent::PhaseChanged(AgentPhase::ToolAnalysis));
                    return Ok(());
                }
            }
            emit(events, AgentEvent::PhaseChanged(AgentPhase::ToolAnalysis));
        } else {
            session.append_tool_execution(record).await;
        }

        let result = self.registry.dispatch(call, &self.tool_context, cancel.clone()).await;
        session
            .update_tool_execution(&call.id, |r| {
                r.result = Some(result.clone());
                r.finished_at = Some(chrono::Utc::now());
            })
            .await;

        emit(events, AgentEvent::ToolCallResult { call_id: call.id.clone(), output: result.output.clone(), is_error: result.is_error });
        session.append_message(Message::tool_result(&call.id, result.output, chrono::Utc::now())).await;

        Ok(())
    }
}

fn emit(sink: &Option<UnboundedSender<AgentEvent>>, event: AgentEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event);
    }
}
