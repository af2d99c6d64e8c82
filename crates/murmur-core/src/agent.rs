use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::hooks::{HookContext, HookDefinition, HookEvent, HookExecutor, HookResult};
use crate::llm::{
    complete_with_retry, Content, GenerateConfig, Message, RetryPolicy, StopReason, ToolCall,
    ToolResult,
};
use crate::swarm::SwarmShared;
use crate::tool::{missing_parameters, PermissionLevel, ToolSchemaInfo};

/// Tool-call names with this prefix route to delegation instead of the
/// tool registry.
pub const DELEGATE_PREFIX: &str = "delegate_";

const FIRST_TURN_PREAMBLE: &str = "<system-reminder>\nYou are one agent in a \
multi-agent swarm. Use the provided tools to act; delegate subtasks with the \
delegate_* tools when another agent is better suited. Keep responses focused \
on the task.\n</system-reminder>";

const FIRST_TURN_POSTAMBLE: &str = "<system-reminder>\nAnswer the request \
above. When no further tool use is needed, reply with your final answer \
directly.\n</system-reminder>";

const MAINTENANCE_REMINDER: &str = "<system-reminder>\nThe task list has not \
been touched in a while. If you are tracking work items, bring the task list \
up to date before continuing.\n</system-reminder>";

// ============================================================================
// AgentDefinition
// ============================================================================

/// Immutable per-agent configuration, validated before the core sees it.
/// The core never mutates it.
#[derive(Clone)]
pub struct AgentDefinition {
    /// Agent display name
    pub name: String,
    /// System prompt for the model
    pub system_prompt: String,
    /// Model id (empty = provider default)
    pub model: String,
    /// Max loop iterations per user turn (prevent infinite loops)
    pub max_iterations: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Token budget that triggers `context_warning` at 80%
    pub context_budget: u32,
    /// Tool names to expose to the model (empty = all registered)
    pub tools: Vec<String>,
    /// Agent names this agent may delegate to
    pub delegates: Vec<String>,
    /// This agent's hook list
    pub hooks: Vec<HookDefinition>,
    /// Per-agent cap on concurrent tool calls
    pub local_limit: Option<usize>,
    /// Permission ceiling; tools above it are refused
    pub max_permission: PermissionLevel,
    /// Tool names that fire breakpoint_enter/exit around execution
    pub breakpoints: Vec<String>,
    /// Inject the maintenance reminder every this many messages
    pub reminder_interval: usize,
    /// Delegations to this agent reuse one conversation instead of
    /// starting fresh each time
    pub retain_delegation_history: bool,
    pub retry: RetryPolicy,
}

impl AgentDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            system_prompt: "You are a helpful assistant with access to tools.".to_string(),
            model: String::new(),
            max_iterations: 10,
            temperature: 0.7,
            max_tokens: 4096,
            context_budget: 100_000,
            tools: Vec::new(),
            delegates: Vec::new(),
            hooks: Vec::new(),
            local_limit: None,
            max_permission: PermissionLevel::Execute,
            breakpoints: Vec::new(),
            reminder_interval: 8,
            retain_delegation_history: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_delegates(mut self, delegates: &[&str]) -> Self {
        self.delegates = delegates.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_hook(mut self, hook: HookDefinition) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_local_limit(mut self, limit: usize) -> Self {
        self.local_limit = Some(limit);
        self
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Append-only message log, exclusively owned by one core instance.
/// Delegation creates an independent log for the delegate.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub agent_name: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Cumulative token usage across all model calls in this conversation
    pub cumulative_usage: crate::llm::Usage,
    messages_since_reminder: usize,
}

impl Conversation {
    pub fn new(agent_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_name: agent_name.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            cumulative_usage: crate::llm::Usage::default(),
            messages_since_reminder: 0,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.messages_since_reminder += 1;
        self.updated_at = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_first_turn(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record that a tool ran. Task-list activity restarts the reminder
    /// window, so the reminder comes back after a quiet stretch instead
    /// of being suppressed for the rest of the conversation.
    fn note_tool_use(&mut self, tool_name: &str) {
        if tool_name.contains("task") {
            self.messages_since_reminder = 0;
        }
    }

    fn needs_maintenance_reminder(&self, interval: usize) -> bool {
        interval > 0 && self.messages_since_reminder >= interval
    }

    fn reset_reminder_window(&mut self) {
        self.messages_since_reminder = 0;
    }
}

// ============================================================================
// AgentCore
// ============================================================================

/// How one agent turn ended, as seen by whoever invoked it.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The turn finished normally or via `halt`/`finish_agent`; the string
    /// is the final assistant message.
    Completed(String),
    /// A `finish_swarm` fired somewhere at or below this agent; unwinds
    /// every frame up to the root.
    FinishedSwarm(String),
}

/// Decisive marker carried out of one tool task, resolved after the batch.
#[derive(Debug, Clone)]
enum ControlSignal {
    Halt(String),
    FinishAgent(String),
    FinishSwarm(String),
}

struct CallOutcome {
    result: ToolResult,
    signal: Option<ControlSignal>,
}

/// The per-agent reasoning loop: prompt → model → tools (through hooks and
/// admission control) → repeat, until the model stops calling tools or a
/// hook finishes early.
pub struct AgentCore {
    definition: Arc<AgentDefinition>,
    shared: Arc<SwarmShared>,
    executor: HookExecutor,
    admission: AdmissionController,
    pub conversation: Conversation,
    context_warned: bool,
}

impl AgentCore {
    pub(crate) fn new(definition: Arc<AgentDefinition>, shared: Arc<SwarmShared>) -> Self {
        let executor = HookExecutor::new(shared.registry.clone());
        let admission = AdmissionController::new(shared.global.clone(), definition.local_limit);
        let conversation = Conversation::new(&definition.name);
        Self {
            definition,
            shared,
            executor,
            admission,
            conversation,
            context_warned: false,
        }
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Resume with an existing conversation log.
    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    /// Run one full turn for this prompt.
    ///
    /// Returns a boxed future because turns recurse through delegation;
    /// the type erasure here is what keeps the future type finite and
    /// its `Send` bound provable.
    pub fn ask<'a>(&'a mut self, prompt: &'a str) -> BoxFuture<'a, Result<TurnOutcome>> {
        Box::pin(self.ask_inner(prompt))
    }

    async fn ask_inner(&mut self, prompt: &str) -> Result<TurnOutcome> {
        let prompt_index = self.record_prompt(prompt).await?;

        // user_prompt hooks may rewrite the prompt or end the turn before
        // the model ever sees it.
        let mut ctx = HookContext::new(HookEvent::UserPrompt, &self.definition.name)
            .with_metadata("prompt", json!(prompt));
        match self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?
        {
            HookResult::Continue => {}
            HookResult::Halt(text) => {
                self.conversation.push(Message::assistant_text(&text));
                return self.finish_turn(TurnOutcome::Completed(text)).await;
            }
            HookResult::Replace(value) => {
                self.rewrite_prompt(prompt_index, &render_value(&value));
            }
            HookResult::Reprompt(text) => {
                self.rewrite_prompt(prompt_index, &text);
            }
            HookResult::FinishAgent(text) => {
                return self.finish_turn(TurnOutcome::Completed(text)).await;
            }
            HookResult::FinishSwarm(text) => {
                return self.finish_turn(TurnOutcome::FinishedSwarm(text)).await;
            }
        }

        self.run_loop().await
    }

    /// Append the prompt, wrapped in the fixed reminder blocks on the
    /// conversation's first user turn, with the periodic maintenance
    /// reminder otherwise. Returns the prompt message's index so prompt
    /// rewrites can target it.
    async fn record_prompt(&mut self, prompt: &str) -> Result<usize> {
        if self.conversation.is_first_turn() {
            let mut ctx = HookContext::new(HookEvent::FirstMessage, &self.definition.name)
                .with_metadata("prompt", json!(prompt));
            // Observational: first_message results do not steer the turn.
            let _ = self
                .executor
                .execute_safe(&mut ctx, &self.definition.hooks)
                .await?;

            self.conversation.push(Message::user(FIRST_TURN_PREAMBLE));
            let index = self.conversation.message_count();
            self.conversation.push(Message::user(prompt));
            self.conversation.push(Message::user(FIRST_TURN_POSTAMBLE));
            return Ok(index);
        }

        if self
            .conversation
            .needs_maintenance_reminder(self.definition.reminder_interval)
        {
            debug!(agent = %self.definition.name, "Injecting maintenance reminder");
            self.conversation.push(Message::user(MAINTENANCE_REMINDER));
            self.conversation.reset_reminder_window();
        }

        let index = self.conversation.message_count();
        self.conversation.push(Message::user(prompt));
        Ok(index)
    }

    fn rewrite_prompt(&mut self, index: usize, text: &str) {
        if let Some(message) = self.conversation.messages.get_mut(index) {
            message.content = Content::Text {
                text: text.to_string(),
            };
        }
    }

    /// The automatic loop: call the model, execute any tool calls, feed the
    /// results back, until a final answer or an early finish.
    async fn run_loop(&mut self) -> Result<TurnOutcome> {
        let config = GenerateConfig {
            model: self.definition.model.clone(),
            max_tokens: self.definition.max_tokens,
            temperature: self.definition.temperature,
            system_prompt: Some(self.definition.system_prompt.clone()),
        };
        let tool_schemas = self.advertised_schemas();

        for iteration in 1..=self.definition.max_iterations {
            // Model calls count against the swarm-wide admission cap just
            // like tool tasks; the ticket is released before the batch so
            // a turn never holds two at once.
            let response = {
                let _ticket = self.admission.acquire().await?;
                complete_with_retry(
                    self.shared.provider.as_ref(),
                    &self.conversation.messages,
                    &tool_schemas,
                    &config,
                    &self.definition.retry,
                )
                .await?
            };

            self.conversation.cumulative_usage += response.usage.clone();
            info!(
                agent = %self.definition.name,
                iteration,
                model = %response.model,
                stop_reason = ?response.stop_reason,
                cumulative_tokens = self.conversation.cumulative_usage.total(),
                "Model response received"
            );

            self.check_context_budget().await?;

            self.conversation
                .push(Message::assistant(response.content.clone()));

            // agent_step hooks observe every model response and may finish
            // or redirect the loop.
            let mut ctx = HookContext::new(HookEvent::AgentStep, &self.definition.name)
                .with_metadata("iteration", json!(iteration));
            match self
                .executor
                .execute_safe(&mut ctx, &self.definition.hooks)
                .await?
            {
                HookResult::Continue | HookResult::Replace(_) => {}
                HookResult::Halt(text) => {
                    self.conversation.push(Message::assistant_text(&text));
                    return self.finish_turn(TurnOutcome::Completed(text)).await;
                }
                HookResult::Reprompt(text) => {
                    self.conversation.push(Message::user(&text));
                    continue;
                }
                HookResult::FinishAgent(text) => {
                    return self.finish_turn(TurnOutcome::Completed(text)).await;
                }
                HookResult::FinishSwarm(text) => {
                    return self.finish_turn(TurnOutcome::FinishedSwarm(text)).await;
                }
            }

            let calls: Vec<ToolCall> = response
                .content
                .extract_tool_calls()
                .into_iter()
                .cloned()
                .collect();

            if calls.is_empty() {
                let text = match response.stop_reason {
                    StopReason::MaxTokens => {
                        warn!(agent = %self.definition.name, "Response truncated at max_tokens");
                        response.content.extract_text()
                    }
                    _ => response.content.extract_text(),
                };
                return self.finish_turn(TurnOutcome::Completed(text)).await;
            }

            let outcomes = self.run_batch(&calls).await?;

            // Results integrate in original request order regardless of
            // completion order, so transcripts reproduce across runs.
            for (call, outcome) in calls.iter().zip(&outcomes) {
                self.conversation
                    .push(Message::tool_result(outcome.result.clone()));
                self.conversation.note_tool_use(&call.name);
            }

            // Decisive scan: finish markers win over halts; ties break on
            // the lowest original request index.
            let finish = outcomes.iter().find_map(|o| match &o.signal {
                Some(ControlSignal::FinishAgent(m)) => Some(TurnOutcome::Completed(m.clone())),
                Some(ControlSignal::FinishSwarm(m)) => Some(TurnOutcome::FinishedSwarm(m.clone())),
                _ => None,
            });
            if let Some(outcome) = finish {
                return self.finish_turn(outcome).await;
            }
            let halt = outcomes.iter().find_map(|o| match &o.signal {
                Some(ControlSignal::Halt(m)) => Some(m.clone()),
                _ => None,
            });
            if let Some(text) = halt {
                self.conversation.push(Message::assistant_text(&text));
                return self.finish_turn(TurnOutcome::Completed(text)).await;
            }
        }

        Err(anyhow!(
            "max iterations ({}) reached for agent '{}'",
            self.definition.max_iterations,
            self.definition.name
        ))
    }

    /// Fire `agent_stop` and hand the outcome back. A `finish_swarm` from a
    /// stop hook still escalates; everything else is observational here.
    async fn finish_turn(&mut self, outcome: TurnOutcome) -> Result<TurnOutcome> {
        let result_text = match &outcome {
            TurnOutcome::Completed(t) | TurnOutcome::FinishedSwarm(t) => t.clone(),
        };
        let mut ctx = HookContext::new(HookEvent::AgentStop, &self.definition.name)
            .with_metadata("result", json!(result_text));
        if let HookResult::FinishSwarm(text) = self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?
        {
            return Ok(TurnOutcome::FinishedSwarm(text));
        }
        Ok(outcome)
    }

    /// Fire `context_warning` once when cumulative usage crosses 80% of
    /// the agent's context budget.
    async fn check_context_budget(&mut self) -> Result<()> {
        let total = self.conversation.cumulative_usage.total();
        let threshold = self.definition.context_budget / 10 * 8;
        if self.context_warned || threshold == 0 || total <= threshold {
            return Ok(());
        }
        self.context_warned = true;
        warn!(
            agent = %self.definition.name,
            total_tokens = total,
            budget = self.definition.context_budget,
            "Context approaching limit (80%)"
        );
        let mut ctx = HookContext::new(HookEvent::ContextWarning, &self.definition.name)
            .with_metadata("total_tokens", json!(total))
            .with_metadata("budget", json!(self.definition.context_budget));
        let _ = self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?;
        Ok(())
    }

    /// Tool schemas advertised to the model: the configured tool set plus
    /// one delegation schema per reachable delegate.
    fn advertised_schemas(&self) -> Vec<crate::llm::ToolSchema> {
        let mut schemas = self.shared.tools.schemas(&self.definition.tools);
        for delegate in &self.definition.delegates {
            if let Some(target) = self.shared.agents.get(delegate) {
                schemas.push(crate::llm::ToolSchema {
                    name: format!("{}{}", DELEGATE_PREFIX, delegate),
                    description: format!(
                        "Delegate a task to the '{}' agent: {}",
                        delegate,
                        summary_line(&target.system_prompt)
                    ),
                    input_schema: delegation_parameters(),
                });
            }
        }
        schemas
    }

    // ── Batch execution ────────────────────────────────────────────────

    /// Execute a batch of tool calls: sequentially for one call,
    /// concurrently under admission control for several. Outcomes come
    /// back in original request order.
    async fn run_batch(&self, calls: &[ToolCall]) -> Result<Vec<CallOutcome>> {
        if calls.len() == 1 {
            let outcome = self.execute_call(&calls[0]).await?;
            return Ok(vec![outcome]);
        }

        let futures: Vec<_> = calls.iter().map(|call| self.execute_call(call)).collect();
        let results = join_all(futures).await;

        let mut outcomes = Vec::with_capacity(results.len());
        for result in results {
            outcomes.push(result?);
        }
        Ok(outcomes)
    }

    /// One tool task: the pre→execute→post sequence with hooks at both
    /// edges. Delegations branch off before the tool hooks; they have
    /// their own pair, and never hold an admission ticket themselves
    /// (the delegate's own tool tasks take permits).
    async fn execute_call(&self, call: &ToolCall) -> Result<CallOutcome> {
        if let Some(target) = call.name.strip_prefix(DELEGATE_PREFIX) {
            if self.definition.delegates.iter().any(|d| d == target) {
                return self.execute_delegation(call, target).await;
            }
        }
        self.execute_tool(call).await
    }

    async fn execute_tool(&self, call: &ToolCall) -> Result<CallOutcome> {
        let _ticket = self.admission.acquire().await?;

        let mut ctx = HookContext::new(HookEvent::PreToolUse, &self.definition.name)
            .with_tool_call(call.clone());
        let pre = self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?;

        // Halts and decisive finishes resolve the task right here: the
        // tool does not execute and post_tool_use never gets a result it
        // could rewrite.
        let result = match pre {
            HookResult::Halt(reason) => {
                info!(agent = %self.definition.name, tool = %call.name, reason = %reason, "Tool blocked by hook");
                return Ok(CallOutcome {
                    result: ToolResult::err(call, format!("Blocked by hook: {}", reason)),
                    signal: None,
                });
            }
            HookResult::FinishAgent(text) => {
                return Ok(CallOutcome {
                    result: ToolResult::ok(call, text.clone()),
                    signal: Some(ControlSignal::FinishAgent(text)),
                });
            }
            HookResult::FinishSwarm(text) => {
                return Ok(CallOutcome {
                    result: ToolResult::ok(call, text.clone()),
                    signal: Some(ControlSignal::FinishSwarm(text)),
                });
            }
            HookResult::Replace(value) => ToolResult::ok(call, render_value(&value)),
            HookResult::Reprompt(text) => ToolResult::ok(call, text),
            HookResult::Continue => {
                let breakpoint = self.definition.breakpoints.contains(&call.name);
                if breakpoint {
                    self.fire_breakpoint(HookEvent::BreakpointEnter, call).await?;
                }
                let result = self.invoke_tool(call).await;
                if breakpoint {
                    self.fire_breakpoint(HookEvent::BreakpointExit, call).await?;
                }
                result
            }
        };

        let (result, signal) = self.run_post_tool_hooks(call, result).await?;
        Ok(CallOutcome { result, signal })
    }

    /// Look the tool up and run it. Failures become error results the
    /// model can react to, never hard turn failures.
    async fn invoke_tool(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.shared.tools.get(&call.name) else {
            return ToolResult::err(call, format!("Unknown tool: {}", call.name));
        };

        if tool.permission_level() > self.definition.max_permission {
            return ToolResult::err(
                call,
                format!(
                    "Tool '{}' requires {:?} permission, above this agent's ceiling",
                    call.name,
                    tool.permission_level()
                ),
            );
        }

        // Missing required parameters never abort the turn; the model gets
        // a corrective message and self-corrects next iteration.
        if let Some(message) = missing_parameters(&tool.schema(), &call.parameters) {
            debug!(agent = %self.definition.name, tool = %call.name, "Missing required parameters");
            return ToolResult::err(call, message);
        }

        info!(agent = %self.definition.name, tool = %call.name, id = %call.id, "Executing tool call");
        match tool.execute(call.parameters.clone()).await {
            Ok(value) => ToolResult::ok(call, render_value(&value)),
            Err(e) => {
                warn!(agent = %self.definition.name, tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::err(call, format!("Error: {}", e))
            }
        }
    }

    async fn run_post_tool_hooks(
        &self,
        call: &ToolCall,
        mut result: ToolResult,
    ) -> Result<(ToolResult, Option<ControlSignal>)> {
        let mut ctx = HookContext::new(HookEvent::PostToolUse, &self.definition.name)
            .with_tool_call(call.clone())
            .with_tool_result(result.clone());
        let post = self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?;

        let signal = match post {
            HookResult::Continue => None,
            HookResult::Replace(value) => {
                result.content = Some(render_value(&value));
                result.success = true;
                result.error = None;
                None
            }
            HookResult::Reprompt(text) => {
                result.content = Some(text);
                result.success = true;
                result.error = None;
                None
            }
            HookResult::Halt(text) => Some(ControlSignal::Halt(text)),
            HookResult::FinishAgent(text) => Some(ControlSignal::FinishAgent(text)),
            HookResult::FinishSwarm(text) => Some(ControlSignal::FinishSwarm(text)),
        };
        Ok((result, signal))
    }

    async fn fire_breakpoint(&self, event: HookEvent, call: &ToolCall) -> Result<()> {
        let mut ctx =
            HookContext::new(event, &self.definition.name).with_tool_call(call.clone());
        // Debug events are observational; results are not mapped.
        let _ = self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?;
        Ok(())
    }

    // ── Delegation ─────────────────────────────────────────────────────

    /// Recursively invoke another agent's core, synchronously from this
    /// caller's point of view. The delegate gets a fresh conversation
    /// unless it is configured to retain history.
    async fn execute_delegation(&self, call: &ToolCall, target: &str) -> Result<CallOutcome> {
        let mut ctx = HookContext::new(HookEvent::PreDelegation, &self.definition.name)
            .with_tool_call(call.clone())
            .with_delegation_target(target);
        let pre = self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?;

        match pre {
            HookResult::Halt(reason) => {
                info!(agent = %self.definition.name, delegate = target, reason = %reason, "Delegation blocked by hook");
                return Ok(CallOutcome {
                    result: ToolResult::err(call, format!("Delegation blocked: {}", reason)),
                    signal: None,
                });
            }
            HookResult::Replace(value) => {
                return Ok(CallOutcome {
                    result: ToolResult::ok(call, render_value(&value)),
                    signal: None,
                });
            }
            HookResult::FinishAgent(text) => {
                return Ok(CallOutcome {
                    result: ToolResult::ok(call, text.clone()),
                    signal: Some(ControlSignal::FinishAgent(text)),
                });
            }
            HookResult::FinishSwarm(text) => {
                return Ok(CallOutcome {
                    result: ToolResult::ok(call, text.clone()),
                    signal: Some(ControlSignal::FinishSwarm(text)),
                });
            }
            HookResult::Continue | HookResult::Reprompt(_) => {}
        }

        // Same corrective path as ordinary tools: the advertised schema
        // marks `task` required, so an omitted task feeds back to the
        // model instead of delegating an empty prompt.
        if let Some(message) = missing_parameters(&delegation_schema(&call.name), &call.parameters)
        {
            debug!(agent = %self.definition.name, delegate = target, "Missing delegation parameters");
            return Ok(CallOutcome {
                result: ToolResult::err(call, message),
                signal: None,
            });
        }
        let Some(task) = call.parameters["task"].as_str().map(str::to_string) else {
            return Ok(CallOutcome {
                result: ToolResult::err(
                    call,
                    format!("Parameter 'task' for '{}' must be a string", call.name),
                ),
                signal: None,
            });
        };

        let Some(definition) = self.shared.agents.get(target).cloned() else {
            return Ok(CallOutcome {
                result: ToolResult::err(call, format!("Unknown delegate agent: {}", target)),
                signal: None,
            });
        };

        info!(agent = %self.definition.name, delegate = target, id = %call.id, "Delegating task");

        let mut delegate = AgentCore::new(definition.clone(), self.shared.clone());
        if definition.retain_delegation_history {
            if let Some((_, retained)) = self.shared.retained.remove(target) {
                delegate = delegate.with_conversation(retained);
            }
        }

        let outcome = delegate.ask(&task).await?;

        if definition.retain_delegation_history {
            self.shared
                .retained
                .insert(target.to_string(), delegate.conversation.clone());
        }

        let text = match outcome {
            // finish_swarm propagates unchanged to the root; the post
            // delegation hook is skipped while the tree unwinds.
            TurnOutcome::FinishedSwarm(text) => {
                return Ok(CallOutcome {
                    result: ToolResult::ok(call, text.clone()),
                    signal: Some(ControlSignal::FinishSwarm(text)),
                });
            }
            // finish_agent inside the delegate already terminated only the
            // delegate; its message is an ordinary delegation result here.
            TurnOutcome::Completed(text) => text,
        };

        let mut ctx = HookContext::new(HookEvent::PostDelegation, &self.definition.name)
            .with_tool_call(call.clone())
            .with_delegation_target(target)
            .with_delegation_result(&text);
        let post = self
            .executor
            .execute_safe(&mut ctx, &self.definition.hooks)
            .await?;

        let (text, signal) = match post {
            HookResult::Continue => (text, None),
            HookResult::Replace(value) => (render_value(&value), None),
            HookResult::Reprompt(new_text) => (new_text, None),
            HookResult::Halt(halt_text) => (text, Some(ControlSignal::Halt(halt_text))),
            HookResult::FinishAgent(m) => (text, Some(ControlSignal::FinishAgent(m))),
            HookResult::FinishSwarm(m) => (text, Some(ControlSignal::FinishSwarm(m))),
        };

        Ok(CallOutcome {
            result: ToolResult::ok(call, text),
            signal,
        })
    }
}

/// The parameter schema every delegation tool advertises.
fn delegation_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "task": {
                "type": "string",
                "description": "The task for the delegate, with all context it needs"
            }
        },
        "required": ["task"]
    })
}

fn delegation_schema(name: &str) -> ToolSchemaInfo {
    ToolSchemaInfo {
        name: name.to_string(),
        description: String::new(),
        parameters: delegation_parameters(),
    }
}

/// Render a tool output value as the text the model sees. Bare strings
/// lose their JSON quoting.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn summary_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
