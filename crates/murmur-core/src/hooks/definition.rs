use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::error::MurmurError;

use super::context::HookContext;
use super::events::HookEvent;
use super::result::HookResult;

/// A hook callable — the code that runs when the event fires.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handler name for diagnostics and error wrapping.
    fn name(&self) -> &str;

    /// Handle the event. `Continue` means "observed, proceed unchanged".
    async fn run(&self, ctx: &mut HookContext) -> Result<HookResult>;
}

/// Adapter turning a plain closure into a `HookHandler`.
///
/// Keeps tests and inline configuration terse without a trait impl per hook.
pub struct FnHook<F>
where
    F: Fn(&mut HookContext) -> Result<HookResult> + Send + Sync,
{
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut HookContext) -> Result<HookResult> + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

#[async_trait]
impl<F> HookHandler for FnHook<F>
where
    F: Fn(&mut HookContext) -> Result<HookResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut HookContext) -> Result<HookResult> {
        (self.f)(ctx)
    }
}

/// Either a direct handler or a symbolic reference resolved through the
/// registry at execution time.
#[derive(Clone)]
pub enum HookCallable {
    Handler(Arc<dyn HookHandler>),
    Named(String),
}

/// One configured hook: event, optional tool-name matcher, priority, callable.
///
/// Never mutated after configuration. Within one event's chain, higher
/// priority runs first; ties preserve registration order.
#[derive(Clone)]
pub struct HookDefinition {
    pub event: HookEvent,
    pub priority: i32,
    pub callable: HookCallable,
    matcher: Option<Regex>,
}

impl HookDefinition {
    pub fn new(event: HookEvent, handler: Arc<dyn HookHandler>) -> Self {
        Self {
            event,
            priority: 0,
            callable: HookCallable::Handler(handler),
            matcher: None,
        }
    }

    /// Definition referencing a named hook registered elsewhere.
    pub fn named(event: HookEvent, name: &str) -> Self {
        Self {
            event,
            priority: 0,
            callable: HookCallable::Named(name.to_string()),
            matcher: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict the hook to tool calls whose name matches the pattern.
    pub fn with_matcher(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| MurmurError::InvalidMatcher {
            pattern: pattern.to_string(),
            source,
        })?;
        self.matcher = Some(regex);
        Ok(self)
    }

    /// Whether this hook applies to the given tool name. Contexts without a
    /// tool name never filter.
    pub fn matches(&self, tool_name: Option<&str>) -> bool {
        match (&self.matcher, tool_name) {
            (Some(matcher), Some(name)) => matcher.is_match(name),
            _ => true,
        }
    }

    /// Confirm a named reference resolves, so dangling names fail at
    /// configuration time instead of mid-turn.
    pub fn validate_named(&self, registry: &super::registry::HookRegistry) -> Result<()> {
        if let HookCallable::Named(name) = &self.callable {
            registry.resolve(name)?;
        }
        Ok(())
    }

    /// Label for logging: the handler name or the named reference.
    pub fn label(&self) -> &str {
        match &self.callable {
            HookCallable::Handler(h) => h.name(),
            HookCallable::Named(n) => n,
        }
    }
}

// Manual impl: the callable is a trait object, so derive is unavailable.
impl std::fmt::Debug for HookDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDefinition")
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("callable", &self.label())
            .field("matcher", &self.matcher.as_ref().map(|m| m.as_str()))
            .finish()
    }
}
