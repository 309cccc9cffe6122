use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::ExecutionContext;
use crate::command::Command;
use crate::core::Result;
use crate::policy::InterceptionPolicy;

/// The unique handler fulfilling one command type's intent.
///
/// An executor runs at most once per dispatch, after the pre-hook chain
/// allowed execution to proceed. It is the only component that writes the
/// command's result slot.
#[async_trait]
pub trait CommandExecutor<C: Command>: Send + Sync {
    /// Executor name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Interception policies declared on the executor type.
    ///
    /// These head the combined policy chain, in the order returned here.
    fn policies(&self) -> Vec<Arc<dyn InterceptionPolicy<C>>> {
        Vec::new()
    }

    async fn execute(&self, ctx: &ExecutionContext, command: &mut C) -> Result<()>;
}
