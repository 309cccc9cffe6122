pub mod cache;

pub use cache::{CacheAsidePolicy, Cacheable, CommandCache};

use crate::bus::ExecutionContext;
use crate::command::Command;
use crate::core::BusError;

/// A reusable pre/post hook pair attached to a command or its executor.
///
/// Policies are composed into one ordered chain per closed command type (see
/// `ExecutorMetadata`). Hooks are synchronous: nothing in the hook chain
/// suspends, only the executor's own I/O does.
pub trait InterceptionPolicy<C: Command>: Send + Sync {
    /// Policy name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Runs before the executor. Returning `false` vetoes execution: the
    /// remaining pre-hooks and the executor are skipped, but every
    /// post-hook still runs.
    fn pre_execute(&self, ctx: &ExecutionContext, command: &mut C) -> bool;

    /// Runs after the dispatch outcome is known, whether the executor
    /// succeeded, faulted, or was vetoed. `fault` carries the execution
    /// fault, if any.
    fn post_execute(&self, ctx: &ExecutionContext, command: &mut C, fault: Option<&BusError>);
}
