use serde_json::Value;

/// Outcome of a hook invocation — exactly one action per result.
///
/// Anything other than `Continue` is decisive: it short-circuits the hook
/// chain and steers the reasoning loop.
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult {
    /// Proceed unchanged. Hooks that only observe return this.
    Continue,
    /// Stop the current operation; the text becomes the visible outcome
    /// (a blocked tool's result, or an assistant message on `user_prompt`).
    Halt(String),
    /// Substitute the value for the operation's input or output.
    /// Pre-events skip execution and use the value as the result;
    /// post-events overwrite the produced result content.
    Replace(Value),
    /// Swap the pending prompt text and let the loop continue with it.
    Reprompt(String),
    /// End this agent's turn with the given message; the delegator (if
    /// any) receives it as an ordinary delegation result.
    FinishAgent(String),
    /// Unwind the entire agent tree; the message becomes the swarm's
    /// final result whatever the current delegation depth.
    FinishSwarm(String),
}

impl HookResult {
    pub fn is_decisive(&self) -> bool {
        !matches!(self, HookResult::Continue)
    }

    /// Action name for structured logging.
    pub fn action(&self) -> &'static str {
        match self {
            HookResult::Continue => "continue",
            HookResult::Halt(_) => "halt",
            HookResult::Replace(_) => "replace",
            HookResult::Reprompt(_) => "reprompt",
            HookResult::FinishAgent(_) => "finish_agent",
            HookResult::FinishSwarm(_) => "finish_swarm",
        }
    }
}
