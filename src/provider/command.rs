use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Value;

/// How the command text should be interpreted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    Text,
    StoredProcedure,
}

/// A named parameter bound to a database command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbParam {
    pub name: String,
    pub value: Value,
}

impl DbParam {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// A parameterized database command submitted to the engine.
///
/// The text is opaque to this crate; the SQL dialect provider interprets it.
///
/// # Examples
///
/// ```
/// use databus::DbCommand;
///
/// let cmd = DbCommand::text("INSERT INTO customers (name) VALUES ($name)")
///     .param("name", "Ann");
///
/// assert_eq!(cmd.params.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCommand {
    pub text: String,
    pub kind: CommandKind,
    pub params: Vec<DbParam>,
    pub timeout: Option<Duration>,
}

impl DbCommand {
    /// Create a plain-text command.
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            kind: CommandKind::Text,
            params: Vec::new(),
            timeout: None,
        }
    }

    /// Create a stored-procedure command.
    pub fn stored_procedure(name: &str) -> Self {
        Self {
            text: name.to_string(),
            kind: CommandKind::StoredProcedure,
            params: Vec::new(),
            timeout: None,
        }
    }

    /// Bind a named parameter.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.push(DbParam::new(name, value));
        self
    }

    /// Set a per-command timeout, overriding the engine default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn param_value(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}
