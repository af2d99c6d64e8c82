use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;

use crate::error::MurmurError;

use super::definition::{HookDefinition, HookHandler};
use super::events::HookEvent;

/// Swarm-scoped hook table: named handlers plus per-event default chains.
///
/// Constructed once per swarm and read-mostly afterwards; no mutation
/// happens during execution. Passed explicitly to every executor rather
/// than living in process globals.
pub struct HookRegistry {
    named: DashMap<String, Arc<dyn HookHandler>>,
    defaults: DashMap<HookEvent, Vec<HookDefinition>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            named: DashMap::new(),
            defaults: DashMap::new(),
        }
    }

    /// Register a handler under a symbolic name for later `Named` resolution.
    pub fn register_named(&self, name: &str, handler: Arc<dyn HookHandler>) -> Result<()> {
        if self.named.contains_key(name) {
            return Err(MurmurError::DuplicateHookName(name.to_string()).into());
        }
        self.named.insert(name.to_string(), handler);
        Ok(())
    }

    /// Resolve a named hook, failing loudly if it was never registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn HookHandler>> {
        self.named
            .get(name)
            .map(|h| h.clone())
            .ok_or_else(|| MurmurError::UnresolvedNamedHook(name.to_string()).into())
    }

    /// Add a default hook that fires for every agent on its event.
    pub fn add_default(&self, definition: HookDefinition) {
        self.defaults
            .entry(definition.event)
            .or_default()
            .push(definition);
    }

    /// Default hooks for an event, highest priority first, stable on ties.
    pub fn defaults_for(&self, event: HookEvent) -> Vec<HookDefinition> {
        let mut hooks = self
            .defaults
            .get(&event)
            .map(|h| h.clone())
            .unwrap_or_default();
        hooks.sort_by_key(|d| std::cmp::Reverse(d.priority));
        hooks
    }

    pub fn has_defaults(&self, event: HookEvent) -> bool {
        self.defaults.get(&event).map(|h| !h.is_empty()).unwrap_or(false)
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{FnHook, HookResult};

    fn handler(name: &'static str) -> Arc<dyn HookHandler> {
        Arc::new(FnHook::new(name, |_| Ok(HookResult::Continue)))
    }

    #[test]
    fn named_registration_and_resolution() {
        let registry = HookRegistry::new();
        registry.register_named("audit", handler("audit")).unwrap();

        assert!(registry.resolve("audit").is_ok());
        assert!(registry.resolve("missing").is_err());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let registry = HookRegistry::new();
        registry.register_named("audit", handler("audit")).unwrap();

        let err = registry.register_named("audit", handler("audit")).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn defaults_sorted_by_descending_priority_stable_on_ties() {
        let registry = HookRegistry::new();
        for (name, priority) in [("five", 5), ("one-a", 1), ("ten", 10), ("one-b", 1)] {
            registry.add_default(
                HookDefinition::new(HookEvent::PreToolUse, handler_named(name))
                    .with_priority(priority),
            );
        }

        let labels: Vec<String> = registry
            .defaults_for(HookEvent::PreToolUse)
            .iter()
            .map(|d| d.label().to_string())
            .collect();
        assert_eq!(labels, vec!["ten", "five", "one-a", "one-b"]);
    }

    fn handler_named(name: &str) -> Arc<dyn HookHandler> {
        let owned = name.to_string();
        Arc::new(NamedNoop { name: owned })
    }

    struct NamedNoop {
        name: String,
    }

    #[async_trait::async_trait]
    impl HookHandler for NamedNoop {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _ctx: &mut crate::hooks::HookContext) -> anyhow::Result<HookResult> {
            Ok(HookResult::Continue)
        }
    }

    #[test]
    fn has_defaults_tracks_registration() {
        let registry = HookRegistry::new();
        assert!(!registry.has_defaults(HookEvent::AgentStep));
        registry.add_default(HookDefinition::new(
            HookEvent::AgentStep,
            handler("step"),
        ));
        assert!(registry.has_defaults(HookEvent::AgentStep));
    }
}
