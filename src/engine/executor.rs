use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::core::{BusError, Result, Value};
use crate::provider::{DbCommand, DbConnection, FromRow};
use crate::result::QueryResult;

use super::{DatabaseEngine, DbContext};

enum RawOutcome {
    Count(u64),
    Rows(QueryResult),
}

/// Transient runner for one parameterized command.
///
/// Built without a context, it opens a private connection and closes it
/// after the run. Built against a scope's bound context, it reuses that
/// connection and leaves it open for the scope to manage — this is how a
/// nested dispatch shares the caller's transaction.
pub struct DatabaseExecutor<'a> {
    engine: &'a DatabaseEngine,
    command: DbCommand,
    bound: Option<Arc<Mutex<DbContext>>>,
}

impl<'a> DatabaseExecutor<'a> {
    pub(crate) fn unbound(engine: &'a DatabaseEngine, command: DbCommand) -> Self {
        Self {
            engine,
            command,
            bound: None,
        }
    }

    pub(crate) fn bound(
        engine: &'a DatabaseEngine,
        command: DbCommand,
        context: Arc<Mutex<DbContext>>,
    ) -> Self {
        Self {
            engine,
            command,
            bound: Some(context),
        }
    }

    pub fn command(&self) -> &DbCommand {
        &self.command
    }

    /// Run the command and return the affected row count.
    pub async fn non_query(self) -> Result<u64> {
        match self.run(false).await? {
            RawOutcome::Count(count) => Ok(count),
            RawOutcome::Rows(rows) => Ok(rows.row_count() as u64),
        }
    }

    /// Run the command and return the first cell of the first row.
    pub async fn scalar(self) -> Result<Value> {
        Ok(self.rows().await?.scalar())
    }

    /// Run the command and return the shaped row set.
    pub async fn rows(self) -> Result<QueryResult> {
        match self.run(true).await? {
            RawOutcome::Rows(rows) => Ok(rows),
            RawOutcome::Count(_) => Ok(QueryResult::empty()),
        }
    }

    /// Run the command and bind every row to an entity.
    pub async fn entities<T: FromRow>(self) -> Result<Vec<T>> {
        self.rows().await?.entities()
    }

    /// Run the command and bind the first row, if any.
    pub async fn first_entity<T: FromRow>(self) -> Result<Option<T>> {
        self.rows().await?.first_entity()
    }

    async fn run(self, as_query: bool) -> Result<RawOutcome> {
        self.engine.notify_executing(&self.command);
        let outcome = self.raw(as_query).await;
        if outcome.is_ok() {
            self.engine.record_command();
        }
        self.engine.notify_executed(&self.command, outcome.is_ok());
        outcome
    }

    async fn raw(&self, as_query: bool) -> Result<RawOutcome> {
        let timeout = self
            .command
            .timeout
            .or(self.engine.config().command_timeout);

        match &self.bound {
            Some(context) => {
                let mut guard = context.lock().await;
                guard.open().await?;
                let connection = guard.connection_mut()?;
                Self::submit(connection, &self.command, as_query, timeout).await
            }
            None => {
                let mut context = DbContext::new(
                    Arc::clone(self.engine.provider()),
                    self.engine.config().connect_timeout,
                );

                let outcome = match context.open().await {
                    Ok(()) => match context.connection_mut() {
                        Ok(connection) => {
                            Self::submit(connection, &self.command, as_query, timeout).await
                        }
                        Err(err) => Err(err),
                    },
                    Err(err) => Err(err),
                };

                // Private connection: closed here no matter what happened.
                context.dispose().await;
                outcome
            }
        }
    }

    async fn submit(
        connection: &mut Box<dyn DbConnection>,
        command: &DbCommand,
        as_query: bool,
        timeout: Option<Duration>,
    ) -> Result<RawOutcome> {
        if as_query {
            let rows = Self::with_timeout(timeout, connection.query(command)).await?;
            Ok(RawOutcome::Rows(rows))
        } else {
            let count = Self::with_timeout(timeout, connection.execute(command)).await?;
            Ok(RawOutcome::Count(count))
        }
    }

    async fn with_timeout<T>(
        timeout: Option<Duration>,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| {
                    BusError::Execution(format!("Command timed out after {:?}", limit))
                })?,
            None => operation.await,
        }
    }
}
