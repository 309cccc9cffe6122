use std::sync::Arc;

use crate::executor::CommandExecutor;
use crate::policy::InterceptionPolicy;

/// An intent-bearing data object dispatched through the bus.
///
/// A command is a plain data holder: the fields describe the intent, and by
/// convention a `result` slot of type [`Command::Output`] receives the
/// outcome. Identity is the concrete closed type; a generic command such as
/// `Add<Customer>` is a distinct command type per instantiation.
///
/// The bus takes ownership of the command for the duration of one dispatch
/// and hands it back (mutated) when the dispatch completes. Only the executor
/// writes the result slot, on successful execution; interception policies may
/// pre-fill it from a cache.
pub trait Command: Send + 'static {
    /// The type of the command's result slot.
    type Output: Send + 'static;

    /// Interception policies declared on the command type itself.
    ///
    /// These run after the executor's declared policies, in the order
    /// returned here.
    fn policies() -> Vec<Arc<dyn InterceptionPolicy<Self>>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// A command that names its own executor type.
///
/// Registering such a command needs no explicit executor instance:
/// `CommandBusBuilder::command::<C>()` constructs `C::Executor` via
/// `Default`. An explicit `register` call for the same command type takes
/// precedence over this declaration.
pub trait HandledCommand: Command + Sized {
    type Executor: CommandExecutor<Self> + Default + 'static;
}
