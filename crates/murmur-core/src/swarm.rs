use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::agent::{AgentCore, AgentDefinition, Conversation, TurnOutcome};
use crate::error::MurmurError;
use crate::hooks::{HookContext, HookDefinition, HookEvent, HookExecutor, HookHandler, HookRegistry, HookResult};
use crate::llm::ModelProvider;
use crate::tool::ToolRegistry;

/// Everything the agent cores share: the provider, the tool and hook
/// registries, the agent roster, and the swarm-wide admission semaphore.
pub(crate) struct SwarmShared {
    pub provider: Arc<dyn ModelProvider>,
    pub tools: Arc<ToolRegistry>,
    pub registry: Arc<HookRegistry>,
    pub agents: HashMap<String, Arc<AgentDefinition>>,
    pub global: Option<Arc<Semaphore>>,
    /// Conversations kept alive between delegations for agents configured
    /// with `retain_delegation_history`
    pub retained: DashMap<String, Conversation>,
}

// ============================================================================
// SwarmBuilder
// ============================================================================

/// Assembles a swarm, validating hook scoping and delegation wiring before
/// anything runs.
pub struct SwarmBuilder {
    provider: Option<Arc<dyn ModelProvider>>,
    tools: Arc<ToolRegistry>,
    registry: HookRegistry,
    agents: HashMap<String, Arc<AgentDefinition>>,
    lead: Option<String>,
    global_limit: Option<usize>,
    swarm_hooks: Vec<HookDefinition>,
    errors: Vec<anyhow::Error>,
}

impl SwarmBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Arc::new(ToolRegistry::new()),
            registry: HookRegistry::new(),
            agents: HashMap::new(),
            lead: None,
            global_limit: None,
            swarm_hooks: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Register an agent. Its hook list must only use agent-scope events.
    pub fn agent(mut self, definition: AgentDefinition) -> Self {
        for hook in &definition.hooks {
            if !hook.event.allowed_for_agent() {
                self.errors.push(
                    MurmurError::EventScope {
                        event: hook.event,
                        scope: "agent",
                    }
                    .into(),
                );
            }
        }
        if self
            .agents
            .insert(definition.name.clone(), Arc::new(definition))
            .is_some()
        {
            self.errors
                .push(anyhow!("duplicate agent name in swarm roster"));
        }
        self
    }

    /// The agent that receives the swarm's initial prompt.
    pub fn lead(mut self, name: &str) -> Self {
        self.lead = Some(name.to_string());
        self
    }

    /// Cap on concurrently executing tool tasks across all agents.
    pub fn global_limit(mut self, limit: usize) -> Self {
        self.global_limit = Some(limit);
        self
    }

    /// A lifecycle hook fired once per run (swarm_start, swarm_stop,
    /// first_message). Agent-scope events are rejected here.
    pub fn swarm_hook(mut self, hook: HookDefinition) -> Self {
        if !hook.event.is_lifecycle() {
            self.errors.push(
                MurmurError::EventScope {
                    event: hook.event,
                    scope: "swarm",
                }
                .into(),
            );
        } else {
            self.swarm_hooks.push(hook);
        }
        self
    }

    /// A default hook that joins every agent's chain for its event.
    pub fn all_agents_hook(mut self, hook: HookDefinition) -> Self {
        if !hook.event.allowed_for_agent() {
            self.errors.push(
                MurmurError::EventScope {
                    event: hook.event,
                    scope: "agent",
                }
                .into(),
            );
        } else {
            self.registry.add_default(hook);
        }
        self
    }

    /// Register a handler under a name so hook definitions can reference it
    /// indirectly.
    pub fn named_hook(mut self, name: &str, handler: Arc<dyn HookHandler>) -> Self {
        if let Err(e) = self.registry.register_named(name, handler) {
            self.errors.push(e);
        }
        self
    }

    pub fn build(mut self) -> Result<Swarm> {
        // Report the first accumulated error, not the last; fixing
        // configuration mistakes in the order they were made is less
        // confusing than one-at-a-time from the back.
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        let provider = self
            .provider
            .ok_or_else(|| anyhow!("swarm requires a model provider"))?;

        if self.agents.is_empty() {
            return Err(anyhow!("swarm requires at least one agent"));
        }

        // Delegation targets must exist in the roster.
        for definition in self.agents.values() {
            for delegate in &definition.delegates {
                if !self.agents.contains_key(delegate) {
                    return Err(anyhow!(
                        "agent '{}' delegates to unknown agent '{}'",
                        definition.name,
                        delegate
                    ));
                }
            }
        }

        let lead = match self.lead {
            Some(name) => {
                if !self.agents.contains_key(&name) {
                    return Err(anyhow!("lead agent '{}' is not in the roster", name));
                }
                name
            }
            None if self.agents.len() == 1 => {
                self.agents.keys().next().cloned().unwrap_or_default()
            }
            None => return Err(anyhow!("swarm with multiple agents requires a lead")),
        };

        // Named-hook references in agent and default hook lists must resolve
        // now, not mid-turn.
        let registry = Arc::new(self.registry);
        for definition in self.agents.values() {
            for hook in &definition.hooks {
                hook.validate_named(&registry)?;
            }
        }
        for hook in &self.swarm_hooks {
            hook.validate_named(&registry)?;
        }

        let global = self
            .global_limit
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let shared = Arc::new(SwarmShared {
            provider,
            tools: self.tools,
            registry: registry.clone(),
            agents: self.agents,
            global,
            retained: DashMap::new(),
        });

        Ok(Swarm {
            executor: HookExecutor::new(registry),
            shared,
            lead,
            swarm_hooks: self.swarm_hooks,
        })
    }
}

impl Default for SwarmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Swarm
// ============================================================================

/// A configured agent roster plus shared runtime state. One `run` drives
/// the lead agent through a full turn.
pub struct Swarm {
    shared: Arc<SwarmShared>,
    executor: HookExecutor,
    lead: String,
    swarm_hooks: Vec<HookDefinition>,
}

// Manual impl: the shared state holds trait objects, so derive is
// unavailable.
impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut agents: Vec<&str> = self.shared.agents.keys().map(String::as_str).collect();
        agents.sort_unstable();
        f.debug_struct("Swarm")
            .field("lead", &self.lead)
            .field("agents", &agents)
            .field("swarm_hooks", &self.swarm_hooks.len())
            .finish()
    }
}

impl Swarm {
    pub fn builder() -> SwarmBuilder {
        SwarmBuilder::new()
    }

    pub fn lead_agent(&self) -> &str {
        &self.lead
    }

    /// A standalone core for one agent, for callers that manage multi-turn
    /// conversations themselves.
    pub fn agent_core(&self, name: &str) -> Result<AgentCore> {
        let definition = self
            .shared
            .agents
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown agent '{}'", name))?;
        Ok(AgentCore::new(definition, self.shared.clone()))
    }

    /// Run one swarm turn: lifecycle hooks around the lead agent's full
    /// reasoning loop. Returns the final message, whether the turn ended
    /// normally or via an early finish.
    pub async fn run(&self, prompt: &str) -> Result<String> {
        info!(lead = %self.lead, "Swarm run starting");

        let mut ctx = HookContext::new(HookEvent::SwarmStart, "swarm");
        match self.executor.execute_safe(&mut ctx, &self.swarm_hooks).await? {
            HookResult::Continue | HookResult::Replace(_) | HookResult::Reprompt(_) => {}
            // Any terminal result at swarm_start ends the run before the
            // lead agent spins up.
            HookResult::Halt(text)
            | HookResult::FinishAgent(text)
            | HookResult::FinishSwarm(text) => {
                self.fire_swarm_stop(&text).await;
                return Ok(text);
            }
        }

        let mut ctx = HookContext::new(HookEvent::FirstMessage, "swarm")
            .with_metadata("prompt", json!(prompt));
        let _ = self.executor.execute_safe(&mut ctx, &self.swarm_hooks).await?;

        let mut core = self.agent_core(&self.lead)?;
        let outcome = core.ask(prompt).await;

        match outcome {
            Ok(TurnOutcome::Completed(text)) => {
                self.fire_swarm_stop(&text).await;
                info!(lead = %self.lead, "Swarm run completed");
                Ok(text)
            }
            Ok(TurnOutcome::FinishedSwarm(text)) => {
                self.fire_swarm_stop(&text).await;
                info!(lead = %self.lead, "Swarm run finished early");
                Ok(text)
            }
            Err(e) => {
                self.fire_swarm_stop(&format!("error: {}", e)).await;
                Err(e)
            }
        }
    }

    /// swarm_stop is best-effort: a failing stop hook is logged, never
    /// surfaced over the turn's own outcome.
    async fn fire_swarm_stop(&self, result: &str) {
        let mut ctx =
            HookContext::new(HookEvent::SwarmStop, "swarm").with_metadata("result", json!(result));
        if let Err(e) = self.executor.execute_safe(&mut ctx, &self.swarm_hooks).await {
            warn!(error = %e, "swarm_stop hook failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FnHook;
    use crate::llm::{
        Content, GenerateConfig, Message, ModelResponse, StopReason, ToolSchema, Usage,
    };
    use async_trait::async_trait;

    struct TextProvider(&'static str);

    #[async_trait]
    impl ModelProvider for TextProvider {
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _config: &GenerateConfig,
        ) -> Result<ModelResponse> {
            Ok(ModelResponse {
                content: Content::Text {
                    text: self.0.to_string(),
                },
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
                model: "text".into(),
            })
        }

        fn model_name(&self) -> &str {
            "text"
        }
    }

    fn provider() -> Arc<dyn ModelProvider> {
        Arc::new(TextProvider("done"))
    }

    #[test]
    fn agent_rejects_swarm_scope_hooks() {
        let hook = HookDefinition::new(
            HookEvent::SwarmStart,
            Arc::new(FnHook::new("h", |_| Ok(HookResult::Continue))),
        );
        let err = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("a").with_hook(hook))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("swarm_start"));
    }

    #[test]
    fn swarm_hook_rejects_agent_scope_events() {
        let hook = HookDefinition::new(
            HookEvent::PreToolUse,
            Arc::new(FnHook::new("h", |_| Ok(HookResult::Continue))),
        );
        let err = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("a"))
            .swarm_hook(hook)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("pre_tool_use"));
    }

    #[test]
    fn earliest_configuration_error_wins() {
        let agent_hook = HookDefinition::new(
            HookEvent::SwarmStart,
            Arc::new(FnHook::new("h1", |_| Ok(HookResult::Continue))),
        );
        let swarm_hook = HookDefinition::new(
            HookEvent::PreToolUse,
            Arc::new(FnHook::new("h2", |_| Ok(HookResult::Continue))),
        );
        // two mistakes accumulate; the first one made is the one reported
        let err = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("a").with_hook(agent_hook))
            .swarm_hook(swarm_hook)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("swarm_start"));
        assert!(!err.to_string().contains("pre_tool_use"));
    }

    #[test]
    fn unknown_delegate_fails_build() {
        let err = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("a").with_delegates(&["ghost"]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn multiple_agents_require_a_lead() {
        let err = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("a"))
            .agent(AgentDefinition::new("b"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("lead"));
    }

    #[test]
    fn unresolved_named_hook_fails_build() {
        let hook = HookDefinition::named(HookEvent::PreToolUse, "no-such-hook");
        let err = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("a").with_hook(hook))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no-such-hook"));
    }

    #[tokio::test]
    async fn single_agent_run_returns_final_text() {
        let swarm = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("solo"))
            .build()
            .unwrap();

        assert_eq!(swarm.lead_agent(), "solo");
        assert_eq!(swarm.run("hello").await.unwrap(), "done");
    }

    #[tokio::test]
    async fn swarm_start_finish_skips_the_lead() {
        let hook = HookDefinition::new(
            HookEvent::SwarmStart,
            Arc::new(FnHook::new("gate", |_| {
                Ok(HookResult::FinishSwarm("closed for maintenance".into()))
            })),
        );
        let swarm = Swarm::builder()
            .provider(provider())
            .agent(AgentDefinition::new("solo"))
            .swarm_hook(hook)
            .build()
            .unwrap();

        assert_eq!(swarm.run("hello").await.unwrap(), "closed for maintenance");
    }
}
