use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::error::MurmurError;

use super::context::HookContext;
use super::definition::{HookCallable, HookDefinition};
use super::registry::HookRegistry;
use super::result::HookResult;

/// Runs hook chains: swarm defaults plus agent hooks, matcher-filtered,
/// priority-ordered, first decisive hook wins.
#[derive(Clone)]
pub struct HookExecutor {
    registry: Arc<HookRegistry>,
}

impl HookExecutor {
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Execute the chain for `ctx.event`.
    ///
    /// Hooks run sequentially in descending priority (defaults before agent
    /// hooks on ties). The first result other than `Continue` stops the
    /// chain and is returned; later hooks are never invoked. A hook that
    /// raises aborts the chain with `HookExecutionError` carrying the
    /// failing hook's identity and event.
    pub async fn execute(
        &self,
        ctx: &mut HookContext,
        agent_hooks: &[HookDefinition],
    ) -> Result<HookResult> {
        let mut chain = self.registry.defaults_for(ctx.event);
        chain.extend(
            agent_hooks
                .iter()
                .filter(|d| d.event == ctx.event)
                .cloned(),
        );

        if let Some(tool_name) = ctx.tool_name().map(str::to_string) {
            chain.retain(|d| d.matches(Some(&tool_name)));
        }

        // Stable sort keeps registration order on equal priorities.
        chain.sort_by_key(|d| std::cmp::Reverse(d.priority));

        for definition in &chain {
            let handler = match &definition.callable {
                HookCallable::Handler(h) => h.clone(),
                HookCallable::Named(name) => self.registry.resolve(name)?,
            };

            let result = handler
                .run(ctx)
                .await
                .map_err(|e| wrap_hook_error(handler.name(), ctx, e))?;

            if result.is_decisive() {
                debug!(
                    hook = handler.name(),
                    event = %ctx.event,
                    agent = %ctx.agent_name,
                    action = result.action(),
                    "Hook chain short-circuited"
                );
                return Ok(result);
            }
        }

        Ok(HookResult::Continue)
    }

    /// Like `execute`, but converts the intentional-abort error kind into a
    /// `Halt` result. All other errors still propagate.
    pub async fn execute_safe(
        &self,
        ctx: &mut HookContext,
        agent_hooks: &[HookDefinition],
    ) -> Result<HookResult> {
        match self.execute(ctx, agent_hooks).await {
            Ok(result) => Ok(result),
            Err(e) => match e.downcast_ref::<MurmurError>() {
                Some(MurmurError::HookAborted { reason, .. }) => {
                    Ok(HookResult::Halt(reason.clone()))
                }
                _ => Err(e),
            },
        }
    }
}

/// Intentional aborts pass through untouched so `execute_safe` can catch
/// them; everything else is wrapped with the hook's identity.
fn wrap_hook_error(hook: &str, ctx: &HookContext, err: anyhow::Error) -> anyhow::Error {
    if matches!(
        err.downcast_ref::<MurmurError>(),
        Some(MurmurError::HookAborted { .. })
    ) {
        return err;
    }
    MurmurError::HookExecution {
        hook: hook.to_string(),
        event: ctx.event,
        agent: ctx.agent_name.clone(),
        source: err,
    }
    .into()
}
