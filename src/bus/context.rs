use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use tokio::sync::Mutex as AsyncMutex;

use crate::core::{BusError, Result};
use crate::engine::{DatabaseEngine, DbContext, Scope};

/// Free-form per-dispatch key/value bag with case-insensitive keys.
///
/// Policies and events use it to pass markers between their pre and post
/// hooks within one dispatch.
pub struct DataBag {
    entries: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl DataBag {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        self.lock_entries()
            .insert(Self::normalize(key), Box::new(value));
    }

    /// A clone of the value under `key`, or `None` if absent or of a
    /// different type.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        self.lock_entries()
            .get(&Self::normalize(key))
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock_entries().contains_key(&Self::normalize(key))
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock_entries().remove(&Self::normalize(key)).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn normalize(key: &str) -> String {
        key.to_lowercase()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Box<dyn Any + Send + Sync>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Per-dispatch context handed to every hook and to the executor.
///
/// Scoped to exactly one dispatch and never shared across concurrent
/// dispatches. The data bag is created on first access; the engine handle
/// is whatever the bus was built with.
pub struct ExecutionContext {
    scope: Scope,
    principal: Option<String>,
    engine: Option<Arc<DatabaseEngine>>,
    items: OnceCell<DataBag>,
}

impl ExecutionContext {
    pub(crate) fn new(
        scope: Scope,
        engine: Option<Arc<DatabaseEngine>>,
        principal: Option<String>,
    ) -> Self {
        Self {
            scope,
            principal,
            engine,
            items: OnceCell::new(),
        }
    }

    /// The logical scope this dispatch runs under.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The acting principal, if the bus was configured with a provider
    /// that knows one.
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// The per-dispatch data bag, created lazily.
    pub fn items(&self) -> &DataBag {
        self.items.get_or_init(DataBag::new)
    }

    /// Whether the data bag was ever touched during this dispatch.
    pub fn has_items(&self) -> bool {
        self.items.get().is_some_and(|bag| !bag.is_empty())
    }

    /// The database engine behind this dispatch.
    pub fn engine(&self) -> Result<Arc<DatabaseEngine>> {
        self.engine.clone().ok_or_else(|| {
            BusError::Configuration("No database engine configured for this bus".into())
        })
    }

    /// The scope's bound database context, created lazily by the engine.
    pub async fn db(&self) -> Result<Arc<AsyncMutex<DbContext>>> {
        Ok(self.engine()?.context(&self.scope).await)
    }

    /// The scope's bound database context with a transaction opened at the
    /// engine's default isolation level.
    pub async fn db_transaction(&self) -> Result<Arc<AsyncMutex<DbContext>>> {
        self.engine()?.context_transaction(&self.scope).await
    }
}
