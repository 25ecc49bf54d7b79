use crate::agent::AgentEvent;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Reasoning viewer for displaying the agent loop's live event stream:
/// assistant text, proposed/denied tool calls, and their results.
pub struct ReasoningViewer {
    events: Vec<AgentEvent>,
}

impl ReasoningViewer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: AgentEvent) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn line_for(event: &AgentEvent) -> Line<'static> {
        match event {
            AgentEvent::PhaseChanged(phase) => Line::from(Span::styled(
                format!("phase: {phase}"),
                Style::default().fg(Color::DarkGray),
            )),
            AgentEvent::AssistantText(text) => {
                Line::from(vec![Span::styled("assistant: ", Style::default().add_modifier(Modifier::BOLD)), Span::raw(text.clone())])
            }
            AgentEvent::ToolCallProposed { call, safety_class, reason } => Line::from(vec![
                Span::styled("tool: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Span::styled(call.name.clone(), Style::default().fg(Color::Green)),
                Span::raw(format!(" [{safety_class}] {reason}")),
            ]),
            AgentEvent::ToolCallDenied { call_id, reason } => Line::from(vec![
                Span::styled("denied: ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                Span::raw(format!("{call_id} ({reason})")),
            ]),
            AgentEvent::ToolCallResult { call_id, output, is_error } => {
                let color = if *is_error { Color::Red } else { Color::White };
                let preview = if output.len() > 100 { format!("{}...", &output[..100]) } else { output.clone() };
                Line::from(vec![
                    Span::styled("result: ", Style::default().fg(color).add_modifier(Modifier::BOLD)),
                    Span::raw(format!("{call_id}: {preview}")),
                ])
            }
            AgentEvent::TurnFinished { content } => {
                Line::from(vec![Span::styled("done: ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)), Span::raw(content.clone())])
            }
        }
    }

    /// Render full reasoning trace.
    pub fn render_full(&self, f: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self.events.iter().map(Self::line_for).collect();
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Agent Reasoning Trace"))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    /// Render compact view (for sidebar): the last 5 events only.
    pub fn render_compact(&self, f: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self.events.iter().rev().take(5).rev().map(Self::line_for).collect();
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Recent Events"))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }
}

impl Default for ReasoningViewer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyClass;
    use crate::tools::ToolCall;

    #[test]
    fn reasoning_viewer_tracks_pushed_events() {
        let mut viewer = ReasoningViewer::new();
        viewer.push(AgentEvent::ToolCallProposed {
            call: ToolCall { id: "1".to_string(), name: "kubectl_get".to_string(), arguments: serde_json::json!({}) },
            safety_class: SafetyClass::ReadOnly,
            reason: "listing pods".to_string(),
        });
        assert_eq!(viewer.events.len(), 1);
        viewer.clear();
        assert!(viewer.events.is_empty());
    }
}
