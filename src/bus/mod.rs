pub mod context;
pub mod metadata;
pub mod registry;

pub use context::{DataBag, ExecutionContext};
pub use metadata::ExecutorMetadata;
pub use registry::ExecutorRegistry;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::command::{Command, HandledCommand};
use crate::core::{BusError, Result};
use crate::engine::{DatabaseEngine, Scope};
use crate::events::EventRegistry;
use crate::executor::CommandExecutor;
use crate::policy::InterceptionPolicy;
use crate::provider::{AnonymousPrincipal, PrincipalProvider};

/// Caller-supplied inline pre-hook; returning `false` vetoes execution.
pub type PreHook<C> = Box<dyn FnMut(&ExecutionContext, &mut C) -> bool + Send>;

/// Caller-supplied inline post-hook; receives the execution fault, if any.
pub type PostHook<C> = Box<dyn FnMut(&ExecutionContext, &mut C, Option<&BusError>) + Send>;

/// Orchestrates one dispatch end to end.
///
/// A dispatch builds an [`ExecutionContext`], resolves the command's
/// executor metadata, walks the pre-hook chain (metadata policies, then
/// event registry, then the inline hook), runs the executor unless vetoed,
/// and walks the mirrored post-hook chain unconditionally. A fault raised
/// by the executor reaches every post-hook and is then returned to the
/// caller unchanged.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use databus::{Command, CommandBus, CommandExecutor, ExecutionContext, Scope};
///
/// struct Ping {
///     result: Option<u64>,
/// }
///
/// impl Command for Ping {
///     type Output = u64;
/// }
///
/// #[derive(Default)]
/// struct PingExecutor;
///
/// #[async_trait]
/// impl CommandExecutor<Ping> for PingExecutor {
///     fn name(&self) -> &'static str {
///         "ping_executor"
///     }
///
///     async fn execute(&self, _ctx: &ExecutionContext, command: &mut Ping) -> databus::Result<()> {
///         command.result = Some(1);
///         Ok(())
///     }
/// }
///
/// let bus = CommandBus::builder().register::<Ping, _>(PingExecutor).build();
///
/// let done = tokio_test::block_on(bus.dispatch(&Scope::new(), Ping { result: None })).unwrap();
/// assert_eq!(done.result, Some(1));
/// ```
pub struct CommandBus {
    registry: ExecutorRegistry,
    events: Arc<EventRegistry>,
    engine: Option<Arc<DatabaseEngine>>,
    principal: Arc<dyn PrincipalProvider>,
}

impl CommandBus {
    pub fn builder() -> CommandBusBuilder {
        CommandBusBuilder::new()
    }

    /// The event registry this bus consults on every dispatch.
    pub fn events(&self) -> &Arc<EventRegistry> {
        &self.events
    }

    pub fn engine(&self) -> Option<&Arc<DatabaseEngine>> {
        self.engine.as_ref()
    }

    pub fn is_registered<C: Command>(&self) -> bool {
        self.registry.is_registered::<C>()
    }

    /// Dispatch a command under the given scope and hand it back mutated.
    pub async fn dispatch<C: Command>(&self, scope: &Scope, command: C) -> Result<C> {
        self.dispatch_with_hooks(scope, command, None, None).await
    }

    /// Dispatch with caller-supplied inline hooks.
    ///
    /// The inline pre-hook runs last in the pre chain; the inline post-hook
    /// runs first in the post chain.
    pub async fn dispatch_with_hooks<C: Command>(
        &self,
        scope: &Scope,
        mut command: C,
        mut before: Option<PreHook<C>>,
        mut after: Option<PostHook<C>>,
    ) -> Result<C> {
        // Resolution failures surface before any hook runs.
        let metadata = self.registry.resolve::<C>()?;

        let ctx = ExecutionContext::new(
            scope.clone(),
            self.engine.clone(),
            self.principal.current_principal(),
        );

        // Pre chain: metadata policies, event registry, inline hook. The
        // first veto stops the walk.
        let mut proceed = metadata.raise_pre_execute(&ctx, &mut command);
        if proceed {
            proceed = self.events.raise_executing(&ctx, &mut command);
        }
        if proceed {
            if let Some(hook) = before.as_mut() {
                proceed = hook(&ctx, &mut command);
            }
        }

        let fault = if proceed {
            match metadata.executor().execute(&ctx, &mut command).await {
                Ok(()) => None,
                Err(err) => {
                    log::warn!(
                        "executor '{}' faulted for {}: {}",
                        metadata.executor().name(),
                        std::any::type_name::<C>(),
                        err
                    );
                    Some(err)
                }
            }
        } else {
            log::debug!(
                "dispatch of {} vetoed before execution",
                std::any::type_name::<C>()
            );
            None
        };

        // Post chain, mirrored, runs in full for every outcome.
        if let Some(hook) = after.as_mut() {
            hook(&ctx, &mut command, fault.as_ref());
        }
        self.events.raise_executed(&ctx, &mut command, fault.as_ref());
        metadata.raise_post_execute(&ctx, &mut command, fault.as_ref());

        match fault {
            Some(err) => Err(err),
            None => Ok(command),
        }
    }

    /// Dispatch on a worker task under a private scope.
    ///
    /// The worker's bound database context is always released after the
    /// dispatch completes — success, fault, or veto — so nothing leaks onto
    /// a reused worker.
    pub fn dispatch_spawned<C: Command>(self: &Arc<Self>, command: C) -> JoinHandle<Result<C>> {
        self.dispatch_spawned_with_hooks(command, None, None)
    }

    pub fn dispatch_spawned_with_hooks<C: Command>(
        self: &Arc<Self>,
        command: C,
        before: Option<PreHook<C>>,
        after: Option<PostHook<C>>,
    ) -> JoinHandle<Result<C>> {
        let bus = Arc::clone(self);
        let span = tracing::debug_span!("dispatch_spawned", command = std::any::type_name::<C>());

        tokio::spawn(
            async move {
                let scope = Scope::new();
                let outcome = bus
                    .dispatch_with_hooks(&scope, command, before, after)
                    .await;

                if let Some(engine) = bus.engine.as_ref() {
                    engine.release(&scope).await;
                }

                outcome
            }
            .instrument(span),
        )
    }
}

/// Builder wiring a [`CommandBus`]: the engine, the event registry, the
/// principal provider, and the executor registrations.
pub struct CommandBusBuilder {
    registry: ExecutorRegistry,
    events: Option<Arc<EventRegistry>>,
    engine: Option<Arc<DatabaseEngine>>,
    principal: Option<Arc<dyn PrincipalProvider>>,
}

impl CommandBusBuilder {
    pub fn new() -> Self {
        Self {
            registry: ExecutorRegistry::new(),
            events: None,
            engine: None,
            principal: None,
        }
    }

    pub fn engine(mut self, engine: Arc<DatabaseEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use a shared event registry instead of a private one.
    pub fn events(mut self, events: Arc<EventRegistry>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn principal(mut self, provider: Arc<dyn PrincipalProvider>) -> Self {
        self.principal = Some(provider);
        self
    }

    /// Register the executor for command type `C`.
    pub fn register<C, E>(self, executor: E) -> Self
    where
        C: Command,
        E: CommandExecutor<C> + 'static,
    {
        self.registry.register::<C, E>(executor);
        self
    }

    /// Register the executor for `C` with extra interception policies.
    pub fn register_with_policies<C, E>(
        self,
        executor: E,
        policies: Vec<Arc<dyn InterceptionPolicy<C>>>,
    ) -> Self
    where
        C: Command,
        E: CommandExecutor<C> + 'static,
    {
        self.registry.register_with_policies::<C, E>(executor, policies);
        self
    }

    /// Register a command that names its own executor type.
    pub fn command<C: HandledCommand>(self) -> Self {
        self.registry.register_handled::<C>();
        self
    }

    pub fn build(self) -> CommandBus {
        CommandBus {
            registry: self.registry,
            events: self.events.unwrap_or_default(),
            engine: self.engine,
            principal: self
                .principal
                .unwrap_or_else(|| Arc::new(AnonymousPrincipal)),
        }
    }
}

impl Default for CommandBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Touch {
        result: Option<u64>,
    }

    impl Command for Touch {
        type Output = u64;
    }

    #[derive(Default)]
    struct TouchExecutor;

    #[async_trait]
    impl CommandExecutor<Touch> for TouchExecutor {
        fn name(&self) -> &'static str {
            "touch_executor"
        }

        async fn execute(&self, _ctx: &ExecutionContext, command: &mut Touch) -> Result<()> {
            command.result = Some(7);
            Ok(())
        }
    }

    impl HandledCommand for Touch {
        type Executor = TouchExecutor;
    }

    struct Unhandled;

    impl Command for Unhandled {
        type Output = ();
    }

    #[tokio::test]
    async fn test_dispatch_writes_result_slot() {
        let bus = CommandBus::builder().command::<Touch>().build();

        let done = bus
            .dispatch(&Scope::new(), Touch { result: None })
            .await
            .unwrap();
        assert_eq!(done.result, Some(7));
    }

    #[tokio::test]
    async fn test_unregistered_command_is_resolution_error() {
        let bus = CommandBus::builder().build();

        assert!(matches!(
            bus.dispatch(&Scope::new(), Unhandled).await,
            Err(BusError::Resolution(_))
        ));
    }

    #[tokio::test]
    async fn test_inline_veto_skips_executor() {
        let bus = CommandBus::builder().command::<Touch>().build();

        let done = bus
            .dispatch_with_hooks(
                &Scope::new(),
                Touch { result: None },
                Some(Box::new(|_, _| false)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(done.result, None);
    }

    #[tokio::test]
    async fn test_metadata_is_reference_stable() {
        let registry = ExecutorRegistry::new();
        registry.register::<Touch, _>(TouchExecutor);

        let first = registry.resolve::<Touch>().unwrap();
        let second = registry.resolve::<Touch>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.resolved_count(), 1);
    }

    #[tokio::test]
    async fn test_spawned_dispatch_completes() {
        let bus = Arc::new(CommandBus::builder().command::<Touch>().build());

        let done = bus
            .dispatch_spawned(Touch { result: None })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.result, Some(7));
    }
}
