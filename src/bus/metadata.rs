use std::sync::Arc;

use crate::command::Command;
use crate::core::BusError;
use crate::executor::CommandExecutor;
use crate::policy::InterceptionPolicy;

use super::ExecutionContext;

/// Immutable per-command-type dispatch material: the executor plus the
/// combined interception-policy chain.
///
/// Built once per closed command type and cached by the registry; safe for
/// unsynchronized concurrent reads. The chain concatenates, in order: the
/// policies declared on the executor type, the policies declared on the
/// command type, then any policies supplied at registration.
pub struct ExecutorMetadata<C: Command> {
    executor: Arc<dyn CommandExecutor<C>>,
    policies: Vec<Arc<dyn InterceptionPolicy<C>>>,
}

impl<C: Command> ExecutorMetadata<C> {
    pub(crate) fn new(
        executor: Arc<dyn CommandExecutor<C>>,
        registered: Vec<Arc<dyn InterceptionPolicy<C>>>,
    ) -> Self {
        let mut policies = executor.policies();
        policies.extend(C::policies());
        policies.extend(registered);

        Self { executor, policies }
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor<C>> {
        &self.executor
    }

    pub fn policies(&self) -> &[Arc<dyn InterceptionPolicy<C>>] {
        &self.policies
    }

    /// Run the pre-hooks in collection order; the first veto stops the
    /// walk and the dispatch's execution phase.
    pub fn raise_pre_execute(&self, ctx: &ExecutionContext, command: &mut C) -> bool {
        for policy in &self.policies {
            if !policy.pre_execute(ctx, command) {
                log::debug!(
                    "policy '{}' vetoed execution of {}",
                    policy.name(),
                    std::any::type_name::<C>()
                );
                return false;
            }
        }
        true
    }

    /// Run every post-hook in collection order, veto or not.
    pub fn raise_post_execute(
        &self,
        ctx: &ExecutionContext,
        command: &mut C,
        fault: Option<&BusError>,
    ) {
        for policy in &self.policies {
            policy.post_execute(ctx, command, fault);
        }
    }
}
