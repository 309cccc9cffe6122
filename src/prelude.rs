//! One-stop imports for applications building on the bus.
//!
//! Intended usage in app code:
//! - command + executor definitions,
//! - bus construction and dispatch,
//! - provider seam implementations.

pub use crate::bus::{CommandBus, CommandBusBuilder, ExecutionContext};
pub use crate::command::{Command, HandledCommand};
pub use crate::core::{BusError, Result, Value};
pub use crate::engine::{DatabaseEngine, EngineConfig, Scope};
pub use crate::events::{CommandEvent, EventRegistry};
pub use crate::executor::CommandExecutor;
pub use crate::policy::{CacheAsidePolicy, Cacheable, CommandCache, InterceptionPolicy};
pub use crate::provider::{
    DbCommand, DbConnection, DbProvider, FromRow, IsolationLevel, PrincipalProvider, SqlDialect,
};
pub use crate::result::QueryResult;
