use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bus::ExecutionContext;
use crate::command::Command;
use crate::core::BusError;

/// An externally registered cross-cutting subscriber for one command type.
///
/// Both hooks default to pass-through so a subscriber can implement only
/// the side it cares about.
pub trait CommandEvent<C: Command>: Send + Sync {
    /// Event name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Runs before the executor. Returning `false` vetoes execution.
    fn on_executing(&self, ctx: &ExecutionContext, command: &mut C) -> bool {
        let _ = (ctx, command);
        true
    }

    /// Runs after the dispatch outcome is known.
    fn on_executed(&self, ctx: &ExecutionContext, command: &mut C, fault: Option<&BusError>) {
        let _ = (ctx, command, fault);
    }
}

type Bucket<C> = Vec<Arc<dyn CommandEvent<C>>>;

/// Side-channel pub/sub store keyed by command type.
///
/// Independent of executor resolution: a command type may have zero events,
/// and subscribing never affects which executor runs.
pub struct EventRegistry {
    subscribers: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<C: Command>(&self, event: Arc<dyn CommandEvent<C>>) {
        let mut subscribers = self.write_subscribers();
        let bucket = subscribers
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Box::new(Bucket::<C>::new()));
        if let Some(bucket) = bucket.downcast_mut::<Bucket<C>>() {
            bucket.push(event);
        }
    }

    /// Remove one subscriber by identity. Returns `true` if it was present.
    pub fn unregister<C: Command>(&self, event: &Arc<dyn CommandEvent<C>>) -> bool {
        let mut subscribers = self.write_subscribers();
        let Some(bucket) = subscribers
            .get_mut(&TypeId::of::<C>())
            .and_then(|b| b.downcast_mut::<Bucket<C>>())
        else {
            return false;
        };

        let before = bucket.len();
        bucket.retain(|existing| !Arc::ptr_eq(existing, event));
        bucket.len() != before
    }

    /// Remove every subscriber for the command type; returns how many.
    pub fn unregister_all<C: Command>(&self) -> usize {
        let mut subscribers = self.write_subscribers();
        subscribers
            .remove(&TypeId::of::<C>())
            .and_then(|b| b.downcast::<Bucket<C>>().ok())
            .map_or(0, |bucket| bucket.len())
    }

    pub fn subscriber_count<C: Command>(&self) -> usize {
        self.read_subscribers()
            .get(&TypeId::of::<C>())
            .and_then(|b| b.downcast_ref::<Bucket<C>>())
            .map_or(0, Vec::len)
    }

    /// Notify subscribers before execution, in registration order; stops at
    /// the first veto.
    pub fn raise_executing<C: Command>(&self, ctx: &ExecutionContext, command: &mut C) -> bool {
        for event in self.bucket_snapshot::<C>() {
            if !event.on_executing(ctx, command) {
                log::debug!(
                    "event '{}' vetoed execution of {}",
                    event.name(),
                    std::any::type_name::<C>()
                );
                return false;
            }
        }
        true
    }

    /// Notify every subscriber after the dispatch outcome is known.
    pub fn raise_executed<C: Command>(
        &self,
        ctx: &ExecutionContext,
        command: &mut C,
        fault: Option<&BusError>,
    ) {
        for event in self.bucket_snapshot::<C>() {
            event.on_executed(ctx, command, fault);
        }
    }

    /// Clone the bucket so subscribers can re-enter the registry from a hook.
    fn bucket_snapshot<C: Command>(&self) -> Bucket<C> {
        self.read_subscribers()
            .get(&TypeId::of::<C>())
            .and_then(|b| b.downcast_ref::<Bucket<C>>())
            .cloned()
            .unwrap_or_default()
    }

    fn read_subscribers(
        &self,
    ) -> RwLockReadGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_subscribers(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}
