use serde::{Deserialize, Serialize};

use crate::core::{BusError, Result, Value};
use crate::provider::FromRow;

pub type Row = Vec<Value>;

/// A shaped query result: column names plus rows of values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First cell of the first row; `Value::Null` for an empty result.
    pub fn scalar(&self) -> Value {
        self.rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Bind every row to an entity via its [`FromRow`] implementation.
    pub fn entities<T: FromRow>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .map(|row| T::from_row(&self.columns, row))
            .collect()
    }

    /// Bind the first row, if any.
    pub fn first_entity<T: FromRow>(&self) -> Result<Option<T>> {
        match self.rows.first() {
            Some(row) => Ok(Some(T::from_row(&self.columns, row)?)),
            None => Ok(None),
        }
    }

    /// Value of the named column in the given row.
    pub fn cell(&self, row: usize, column: &str) -> Result<&Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                BusError::TypeMismatch(format!("Column '{}' not present in result", column))
            })?;

        self.rows
            .get(row)
            .and_then(|r| r.get(index))
            .ok_or_else(|| BusError::Execution(format!("Row {} out of range", row)))
    }
}
