use std::sync::Arc;
use std::time::Duration;

use crate::core::{BusError, Result};
use crate::provider::{DbConnection, DbProvider, IsolationLevel};

/// Database context lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Unopened,
    Open,
    InTransaction,
    Closed,
}

/// Owns at most one physical connection on behalf of one scope.
///
/// State machine: Unopened → Open → InTransaction → (commit | rollback) →
/// Open → Closed. Closed is terminal; a scope that needs a connection after
/// release gets a fresh context from the engine.
pub struct DbContext {
    provider: Arc<dyn DbProvider>,
    connection: Option<Box<dyn DbConnection>>,
    state: ContextState,
    connect_timeout: Duration,
}

impl DbContext {
    pub(crate) fn new(provider: Arc<dyn DbProvider>, connect_timeout: Duration) -> Self {
        Self {
            provider,
            connection: None,
            state: ContextState::Unopened,
            connect_timeout,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ContextState::Open | ContextState::InTransaction)
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == ContextState::InTransaction
    }

    /// Open the physical connection if not already open.
    pub async fn open(&mut self) -> Result<()> {
        match self.state {
            ContextState::Open | ContextState::InTransaction => Ok(()),
            ContextState::Closed => Err(BusError::UnsupportedOperation(
                "Context is closed".into(),
            )),
            ContextState::Unopened => {
                let connection =
                    tokio::time::timeout(self.connect_timeout, self.provider.connect())
                        .await
                        .map_err(|_| {
                            BusError::Connection(format!(
                                "Connect to '{}' timed out after {:?}",
                                self.provider.name(),
                                self.connect_timeout
                            ))
                        })??;

                log::debug!("opened connection via provider '{}'", self.provider.name());
                self.connection = Some(connection);
                self.state = ContextState::Open;
                Ok(())
            }
        }
    }

    /// Open the connection if needed, then begin a transaction.
    pub async fn open_transaction(&mut self, isolation: IsolationLevel) -> Result<()> {
        if self.state == ContextState::InTransaction {
            return Err(BusError::UnsupportedOperation(
                "Transaction already active".into(),
            ));
        }

        self.open().await?;
        self.connection_mut()?.begin(isolation).await?;
        self.state = ContextState::InTransaction;
        Ok(())
    }

    /// Commit the active transaction.
    pub async fn commit(&mut self) -> Result<()> {
        if self.state != ContextState::InTransaction {
            return Err(BusError::UnsupportedOperation(
                "No active transaction".into(),
            ));
        }

        self.connection_mut()?.commit().await?;
        self.state = ContextState::Open;
        Ok(())
    }

    /// Rollback the active transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.state != ContextState::InTransaction {
            return Err(BusError::UnsupportedOperation(
                "No active transaction".into(),
            ));
        }

        self.connection_mut()?.rollback().await?;
        self.state = ContextState::Open;
        Ok(())
    }

    /// Close the connection, rolling back an active transaction first.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ContextState::Closed {
            return Ok(());
        }

        if self.state == ContextState::InTransaction {
            self.rollback().await?;
        }

        if let Some(mut connection) = self.connection.take() {
            connection.close().await?;
        }

        self.state = ContextState::Closed;
        Ok(())
    }

    /// Best-effort teardown: always reaches `Closed`, swallowing rollback
    /// and close failures so disposal never masks the dispatch outcome.
    pub async fn dispose(&mut self) {
        if self.state == ContextState::InTransaction {
            if let Err(err) = self.rollback().await {
                log::warn!("rollback during context disposal failed: {}", err);
            }
        }

        if let Some(mut connection) = self.connection.take() {
            if let Err(err) = connection.close().await {
                log::warn!("connection close during context disposal failed: {}", err);
            }
        }

        self.state = ContextState::Closed;
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut Box<dyn DbConnection>> {
        self.connection.as_mut().ok_or_else(|| {
            BusError::Connection("Context has no open connection".into())
        })
    }
}
