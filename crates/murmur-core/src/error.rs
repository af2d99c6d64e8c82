use thiserror::Error;

use crate::hooks::HookEvent;

/// Typed error kinds for the swarm engine.
///
/// Most APIs return `anyhow::Result`; these kinds travel inside the
/// `anyhow::Error` so callers that need selective handling (for example
/// `HookExecutor::execute_safe`) can downcast to them.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// A hook event name outside the closed taxonomy.
    #[error("unknown hook event: '{0}'")]
    InvalidEvent(String),

    /// A named hook was registered twice.
    #[error("hook name already registered: '{0}'")]
    DuplicateHookName(String),

    /// A hook definition referenced a name the registry does not know.
    #[error("unresolved named hook: '{0}'")]
    UnresolvedNamedHook(String),

    /// A hook event used in a scope where it is not allowed
    /// (agent hooks cannot use the swarm lifecycle pair, swarm hooks
    /// may only use lifecycle events).
    #[error("event '{event}' is not allowed for {scope} hooks")]
    EventScope { event: HookEvent, scope: &'static str },

    /// A hook matcher that failed to compile as a regex.
    #[error("invalid hook matcher '{pattern}': {source}")]
    InvalidMatcher {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A hook callable raised. Wraps the original error together with the
    /// failing hook's identity for diagnostics; aborts the current turn.
    #[error("hook '{hook}' failed on '{event}' for agent '{agent}': {source}")]
    HookExecution {
        hook: String,
        event: HookEvent,
        agent: String,
        #[source]
        source: anyhow::Error,
    },

    /// Intentional abort raised from inside a hook. The only hook error
    /// kind that `execute_safe` converts into a `Halt` result.
    #[error("hook '{hook}' aborted: {reason}")]
    HookAborted { hook: String, reason: String },
}

impl MurmurError {
    /// Build the intentional-abort error a hook returns to halt the
    /// operation without counting as a failure.
    pub fn abort(hook: &str, reason: &str) -> anyhow::Error {
        MurmurError::HookAborted {
            hook: hook.to_string(),
            reason: reason.to_string(),
        }
        .into()
    }
}
