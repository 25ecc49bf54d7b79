use serde::{Deserialize, Serialize};

/// Who produced a [`Message`]. Mirrors the roles every provider in
/// `src/llm/` speaks on the wire, so a stored transcript can be replayed
/// back to any of them without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: uuid::Uuid,
    pub role: MessageRole,
    pub content: String,
    pub tool_calls: Vec<crate::tools::ToolCall>,
    pub tool_call_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>, created_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            created_at,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        tool_calls: Vec<crate::tools::ToolCall>,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            created_at,
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        content: impl Into<String>,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
            created_at,
        }
    }
}

/// One tool call's full lifecycle, as recorded for audit and for replay
/// into a transcript: the safety class it was assigned, whether (and by
/// whom) it was approved, and its result once it ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub call: crate::tools::ToolCall,
    pub safety_class: crate::safety::SafetyClass,
    pub safety_reason: String,
    pub approval: ApprovalRecord,
    pub result: Option<crate::tools::ToolResult>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ApprovalRecord {
    NotRequired,
    Pending,
    Approved { by: String },
    Denied { by: String, reason: Option<String> },
    TimedOut,
}
