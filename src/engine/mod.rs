pub mod config;
pub mod context;
pub mod executor;
pub mod scope;

pub use config::EngineConfig;
pub use context::{ContextState, DbContext};
pub use executor::DatabaseExecutor;
pub use scope::{Scope, ScopeId};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};

use tokio::sync::{Mutex, RwLock};

use crate::core::{BusError, Result};
use crate::provider::{DbCommand, DbProvider, IsolationLevel};

/// Engine-level observer notified around raw command execution.
pub trait DbListener: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_executing(&self, command: &DbCommand) {
        let _ = command;
    }

    fn on_executed(&self, command: &DbCommand, success: bool) {
        let _ = (command, success);
    }
}

/// Process-scoped owner of one configured data source.
///
/// The engine owns the provider (connection factory + dialect) and binds at
/// most one live [`DbContext`] per calling scope. Nested dispatches carrying
/// the same [`Scope`] reuse the bound context, letting several commands
/// share one explicitly opened transaction.
pub struct DatabaseEngine {
    provider: Arc<dyn DbProvider>,
    config: EngineConfig,
    contexts: RwLock<HashMap<ScopeId, Arc<Mutex<DbContext>>>>,
    listeners: StdRwLock<Vec<Arc<dyn DbListener>>>,
    commands_executed: AtomicU64,
}

impl DatabaseEngine {
    pub fn new(provider: Arc<dyn DbProvider>) -> Self {
        Self {
            provider,
            config: EngineConfig::default(),
            contexts: RwLock::new(HashMap::new()),
            listeners: StdRwLock::new(Vec::new()),
            commands_executed: AtomicU64::new(0),
        }
    }

    pub fn with_config(provider: Arc<dyn DbProvider>, config: EngineConfig) -> Result<Self> {
        config.validate().map_err(BusError::Configuration)?;

        let mut engine = Self::new(provider);
        engine.config = config;
        Ok(engine)
    }

    pub fn provider(&self) -> &Arc<dyn DbProvider> {
        &self.provider
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The scope's bound context, created lazily on first request.
    ///
    /// The returned context is not yet open; the connection is established
    /// on first use.
    pub async fn context(&self, scope: &Scope) -> Arc<Mutex<DbContext>> {
        {
            let contexts = self.contexts.read().await;
            if let Some(context) = contexts.get(&scope.id()) {
                return Arc::clone(context);
            }
        }

        let mut contexts = self.contexts.write().await;
        Arc::clone(contexts.entry(scope.id()).or_insert_with(|| {
            log::debug!("binding fresh context to {}", scope);
            Arc::new(Mutex::new(DbContext::new(
                Arc::clone(&self.provider),
                self.config.connect_timeout,
            )))
        }))
    }

    /// `context` followed by opening a transaction at the engine's default
    /// isolation level.
    pub async fn context_transaction(&self, scope: &Scope) -> Result<Arc<Mutex<DbContext>>> {
        self.context_transaction_with(scope, self.config.default_isolation)
            .await
    }

    pub async fn context_transaction_with(
        &self,
        scope: &Scope,
        isolation: IsolationLevel,
    ) -> Result<Arc<Mutex<DbContext>>> {
        let context = self.context(scope).await;
        context.lock().await.open_transaction(isolation).await?;
        Ok(context)
    }

    /// Dispose the scope's bound context and unbind the scope.
    ///
    /// Teardown is best-effort; the scope is unbound unconditionally so the
    /// next request under the same handle gets a fresh context.
    pub async fn release(&self, scope: &Scope) {
        let removed = {
            let mut contexts = self.contexts.write().await;
            contexts.remove(&scope.id())
        };

        if let Some(context) = removed {
            context.lock().await.dispose().await;
            log::debug!("released context for {}", scope);
        }
    }

    /// Dispose every bound context. Intended for engine shutdown.
    pub async fn release_all(&self) {
        let drained: Vec<_> = {
            let mut contexts = self.contexts.write().await;
            contexts.drain().map(|(_, context)| context).collect()
        };

        for context in drained {
            context.lock().await.dispose().await;
        }
    }

    pub async fn is_bound(&self, scope: &Scope) -> bool {
        self.contexts.read().await.contains_key(&scope.id())
    }

    /// Build an executor over a private connection: opened on demand and
    /// closed after the run.
    pub fn executor(&self, command: DbCommand) -> DatabaseExecutor<'_> {
        DatabaseExecutor::unbound(self, command)
    }

    /// Build an executor against the scope's bound context; the connection
    /// is left open for the scope to manage.
    pub async fn executor_in_scope(
        &self,
        scope: &Scope,
        command: DbCommand,
    ) -> DatabaseExecutor<'_> {
        let context = self.context(scope).await;
        DatabaseExecutor::bound(self, command, context)
    }

    pub fn add_listener(&self, listener: Arc<dyn DbListener>) {
        self.write_listeners().push(listener);
    }

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            bound_contexts: self.contexts.read().await.len(),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_command(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn notify_executing(&self, command: &DbCommand) {
        for listener in self.listeners_snapshot() {
            listener.on_executing(command);
        }
    }

    pub(crate) fn notify_executed(&self, command: &DbCommand, success: bool) {
        for listener in self.listeners_snapshot() {
            listener.on_executed(command, success);
        }
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn DbListener>> {
        match self.listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write_listeners(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn DbListener>>> {
        match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Engine statistics snapshot.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub bound_contexts: usize,
    pub commands_executed: u64,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Engine Stats: {} bound context(s), {} command(s) executed",
            self.bound_contexts, self.commands_executed
        )
    }
}
