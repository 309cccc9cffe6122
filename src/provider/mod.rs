pub mod command;

pub use command::{CommandKind, DbCommand, DbParam};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Result, Value};
use crate::result::QueryResult;

/// Transaction isolation level requested when opening a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// SQL dialect seam.
///
/// The engine never generates SQL itself; callers that build SQL text ask
/// the provider's dialect for escaping and pagination shape.
pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn escape_identifier(&self, identifier: &str) -> String;

    /// Prefix a bare parameter name with to form a placeholder (e.g. `$`, `@`, `:`).
    fn parameter_prefix(&self) -> &'static str;

    fn paginate(&self, sql: &str, offset: u64, limit: u64) -> String;
}

/// A live physical connection produced by a [`DbProvider`].
#[async_trait]
pub trait DbConnection: Send {
    /// Run a command that modifies data; returns the affected row count.
    async fn execute(&mut self, command: &DbCommand) -> Result<u64>;

    /// Run a command that returns rows.
    async fn query(&mut self, command: &DbCommand) -> Result<QueryResult>;

    async fn begin(&mut self, isolation: IsolationLevel) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Connection factory + dialect: the concrete database driver seam.
///
/// This crate ships no concrete provider; tests and applications supply one.
#[async_trait]
pub trait DbProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn dialect(&self) -> &dyn SqlDialect;

    async fn connect(&self) -> Result<Box<dyn DbConnection>>;
}

/// Row-to-entity binding seam (the entity mapper lives outside this crate).
pub trait FromRow: Sized {
    fn from_row(columns: &[String], row: &[Value]) -> Result<Self>;
}

/// Acting-principal lookup seam.
pub trait PrincipalProvider: Send + Sync {
    fn current_principal(&self) -> Option<String>;
}

/// Default principal provider: no authenticated principal.
#[derive(Debug, Default)]
pub struct AnonymousPrincipal;

impl PrincipalProvider for AnonymousPrincipal {
    fn current_principal(&self) -> Option<String> {
        None
    }
}
