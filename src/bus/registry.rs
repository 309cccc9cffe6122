use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::command::{Command, HandledCommand};
use crate::core::{BusError, Result};
use crate::executor::CommandExecutor;
use crate::policy::InterceptionPolicy;

use super::metadata::ExecutorMetadata;

type MetadataFactory = Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Explicit registration map from command type to executor, with memoized
/// per-type dispatch metadata.
///
/// Exactly one executor may be registered per closed command type; a later
/// registration for the same type replaces the earlier one until the type
/// is first resolved. Resolution is first-wins: the metadata built on the
/// first `resolve` call is returned, by identity, for the rest of the
/// process lifetime.
pub struct ExecutorRegistry {
    factories: RwLock<HashMap<TypeId, MetadataFactory>>,
    resolved: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Register the executor for command type `C`.
    pub fn register<C, E>(&self, executor: E)
    where
        C: Command,
        E: CommandExecutor<C> + 'static,
    {
        self.register_with_policies::<C, E>(executor, Vec::new());
    }

    /// Register the executor for `C` together with extra interception
    /// policies appended after the executor- and command-declared ones.
    pub fn register_with_policies<C, E>(
        &self,
        executor: E,
        policies: Vec<Arc<dyn InterceptionPolicy<C>>>,
    ) where
        C: Command,
        E: CommandExecutor<C> + 'static,
    {
        let executor: Arc<dyn CommandExecutor<C>> = Arc::new(executor);
        let factory: MetadataFactory = Box::new(move || {
            Box::new(Arc::new(ExecutorMetadata::new(
                Arc::clone(&executor),
                policies.clone(),
            )))
        });

        self.write_factories().insert(TypeId::of::<C>(), factory);
    }

    /// Register a command that names its own executor type.
    ///
    /// An explicit `register` call for the same command type always wins:
    /// if one is already present this is a no-op, and a later one replaces
    /// the declared executor.
    pub fn register_handled<C: HandledCommand>(&self) {
        if self.is_registered::<C>() {
            return;
        }
        self.register::<C, C::Executor>(C::Executor::default());
    }

    /// Resolve the dispatch metadata for `C`, memoized per closed type.
    ///
    /// An unregistered type is a configuration error, surfaced before any
    /// hook runs and never retried with a different outcome.
    pub fn resolve<C: Command>(&self) -> Result<Arc<ExecutorMetadata<C>>> {
        let key = TypeId::of::<C>();

        if let Some(found) = self.read_resolved().get(&key) {
            return Self::downcast_metadata::<C>(Arc::clone(found));
        }

        // Build outside the resolved lock; under contention the first
        // insert wins and every caller sees that instance.
        let built: Arc<ExecutorMetadata<C>> = {
            let factories = self.read_factories();
            let factory = factories.get(&key).ok_or_else(|| {
                BusError::Resolution(std::any::type_name::<C>().to_string())
            })?;
            *factory()
                .downcast::<Arc<ExecutorMetadata<C>>>()
                .map_err(|_| {
                    BusError::Execution(format!(
                        "Registered factory for {} produced mismatched metadata",
                        std::any::type_name::<C>()
                    ))
                })?
        };

        let mut resolved = self.write_resolved();
        let entry = resolved.entry(key).or_insert_with(|| {
            let erased: Arc<dyn Any + Send + Sync> = built;
            erased
        });
        Self::downcast_metadata::<C>(Arc::clone(entry))
    }

    pub fn is_registered<C: Command>(&self) -> bool {
        self.read_factories().contains_key(&TypeId::of::<C>())
    }

    pub fn registered_count(&self) -> usize {
        self.read_factories().len()
    }

    pub fn resolved_count(&self) -> usize {
        self.read_resolved().len()
    }

    fn downcast_metadata<C: Command>(
        entry: Arc<dyn Any + Send + Sync>,
    ) -> Result<Arc<ExecutorMetadata<C>>> {
        entry.downcast::<ExecutorMetadata<C>>().map_err(|_| {
            BusError::Execution(format!(
                "Metadata cache holds mismatched entry for {}",
                std::any::type_name::<C>()
            ))
        })
    }

    fn read_factories(&self) -> RwLockReadGuard<'_, HashMap<TypeId, MetadataFactory>> {
        match self.factories.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_factories(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, MetadataFactory>> {
        match self.factories.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_resolved(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Arc<dyn Any + Send + Sync>>> {
        match self.resolved.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_resolved(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Arc<dyn Any + Send + Sync>>> {
        match self.resolved.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
