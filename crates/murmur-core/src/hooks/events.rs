use serde::{Deserialize, Serialize};

use crate::error::MurmurError;

/// The closed set of boundaries a hook can intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// Swarm run begins
    SwarmStart,
    /// Swarm run ends
    SwarmStop,
    /// First user message enters the swarm
    FirstMessage,
    /// A user prompt was submitted to an agent
    UserPrompt,
    /// One model response was received inside the reasoning loop
    AgentStep,
    /// An agent's turn completed
    AgentStop,
    /// Before a tool executes
    PreToolUse,
    /// After a tool executed
    PostToolUse,
    /// Before a delegation recurses into another agent
    PreDelegation,
    /// After a delegated agent returned
    PostDelegation,
    /// Conversation is approaching its context budget
    ContextWarning,
    /// A breakpointed tool is about to run
    BreakpointEnter,
    /// A breakpointed tool finished
    BreakpointExit,
}

impl HookEvent {
    pub fn all() -> &'static [HookEvent] {
        &[
            HookEvent::SwarmStart,
            HookEvent::SwarmStop,
            HookEvent::FirstMessage,
            HookEvent::UserPrompt,
            HookEvent::AgentStep,
            HookEvent::AgentStop,
            HookEvent::PreToolUse,
            HookEvent::PostToolUse,
            HookEvent::PreDelegation,
            HookEvent::PostDelegation,
            HookEvent::ContextWarning,
            HookEvent::BreakpointEnter,
            HookEvent::BreakpointExit,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::SwarmStart => "swarm_start",
            HookEvent::SwarmStop => "swarm_stop",
            HookEvent::FirstMessage => "first_message",
            HookEvent::UserPrompt => "user_prompt",
            HookEvent::AgentStep => "agent_step",
            HookEvent::AgentStop => "agent_stop",
            HookEvent::PreToolUse => "pre_tool_use",
            HookEvent::PostToolUse => "post_tool_use",
            HookEvent::PreDelegation => "pre_delegation",
            HookEvent::PostDelegation => "post_delegation",
            HookEvent::ContextWarning => "context_warning",
            HookEvent::BreakpointEnter => "breakpoint_enter",
            HookEvent::BreakpointExit => "breakpoint_exit",
        }
    }

    /// Parse an event name from external configuration.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Self::all()
            .iter()
            .find(|e| e.as_str() == s)
            .copied()
            .ok_or_else(|| MurmurError::InvalidEvent(s.to_string()).into())
    }

    /// Lifecycle events — the only events swarm-level hooks may use.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            HookEvent::SwarmStart | HookEvent::SwarmStop | HookEvent::FirstMessage
        )
    }

    /// Agent-level hooks may use everything except the swarm lifecycle pair.
    pub fn allowed_for_agent(&self) -> bool {
        !matches!(self, HookEvent::SwarmStart | HookEvent::SwarmStop)
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_event() {
        for event in HookEvent::all() {
            assert_eq!(HookEvent::parse(event.as_str()).unwrap(), *event);
        }
    }

    #[test]
    fn parse_rejects_unknown_event() {
        let err = HookEvent::parse("on_fire").unwrap_err();
        assert!(err.to_string().contains("unknown hook event"));
    }

    #[test]
    fn scope_predicates() {
        assert!(HookEvent::SwarmStart.is_lifecycle());
        assert!(!HookEvent::SwarmStart.allowed_for_agent());
        assert!(!HookEvent::SwarmStop.allowed_for_agent());
        // first_message is lifecycle but still usable by agents
        assert!(HookEvent::FirstMessage.is_lifecycle());
        assert!(HookEvent::FirstMessage.allowed_for_agent());
        assert!(!HookEvent::PreToolUse.is_lifecycle());
        assert!(HookEvent::PreToolUse.allowed_for_agent());
    }
}
