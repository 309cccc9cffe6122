// ============================================================================
// databus Library
// ============================================================================

pub mod bus;
pub mod command;
pub mod core;
pub mod engine;
pub mod events;
pub mod executor;
pub mod policy;
pub mod prelude;
pub mod provider;
pub mod result;

// Re-export main types for convenience
pub use crate::core::{BusError, Result, Value};

pub use bus::{
    CommandBus, CommandBusBuilder, DataBag, ExecutionContext, ExecutorMetadata,
    ExecutorRegistry, PostHook, PreHook,
};
pub use command::{Command, HandledCommand};
pub use engine::{
    ContextState, DatabaseEngine, DatabaseExecutor, DbContext, DbListener, EngineConfig,
    EngineStats, Scope, ScopeId,
};
pub use events::{CommandEvent, EventRegistry};
pub use executor::CommandExecutor;
pub use policy::{CacheAsidePolicy, Cacheable, CommandCache, InterceptionPolicy};
pub use provider::{
    AnonymousPrincipal, CommandKind, DbCommand, DbConnection, DbParam, DbProvider, FromRow,
    IsolationLevel, PrincipalProvider, SqlDialect,
};
pub use result::{QueryResult, Row};
