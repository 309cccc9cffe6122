#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use databus::{
    BusError, DbCommand, DbConnection, DbProvider, IsolationLevel, QueryResult, Result, Row,
    SqlDialect, Value,
};

/// Shared state behind every connection handed out by [`MemoryProvider`].
///
/// Command text follows an `op:table` convention (`insert:customers`,
/// `select:customers`); parameters carry the row values. The journal
/// records every connection-level operation for assertions.
#[derive(Default)]
pub struct MemoryBackend {
    connects: AtomicU64,
    closes: AtomicU64,
    fail_next_execute: AtomicBool,
    fail_next_connect: AtomicBool,
    fail_next_close: AtomicBool,
    tables: Mutex<HashMap<String, MemoryTable>>,
    journal: Mutex<Vec<String>>,
}

#[derive(Default, Clone)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map_or_else(Vec::new, |t| t.rows.clone())
    }

    /// Make the next `execute` call fail with an injected fault.
    pub fn fail_next_execute(&self) {
        self.fail_next_execute.store(true, Ordering::SeqCst);
    }

    /// Make the next `connect` call fail.
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Make the next `close` call fail.
    pub fn fail_next_close(&self) {
        self.fail_next_close.store(true, Ordering::SeqCst);
    }

    fn log(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

pub struct MemoryDialect;

impl SqlDialect for MemoryDialect {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn escape_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier)
    }

    fn parameter_prefix(&self) -> &'static str {
        "$"
    }

    fn paginate(&self, sql: &str, offset: u64, limit: u64) -> String {
        format!("{} LIMIT {} OFFSET {}", sql, limit, offset)
    }
}

pub struct MemoryConnection {
    id: u64,
    backend: Arc<MemoryBackend>,
    in_transaction: bool,
}

impl MemoryConnection {
    fn target(command: &DbCommand) -> (&str, &str) {
        command
            .text
            .split_once(':')
            .unwrap_or((command.text.as_str(), ""))
    }
}

#[async_trait]
impl DbConnection for MemoryConnection {
    async fn execute(&mut self, command: &DbCommand) -> Result<u64> {
        if self.backend.fail_next_execute.swap(false, Ordering::SeqCst) {
            return Err(BusError::Execution("injected failure".into()));
        }

        self.backend.log(format!("execute:{}", command.text));

        let (op, table) = Self::target(command);
        match op {
            "insert" => {
                let mut tables = self.backend.tables.lock().unwrap();
                let entry = tables.entry(table.to_string()).or_default();
                if entry.columns.is_empty() {
                    entry.columns = command.params.iter().map(|p| p.name.clone()).collect();
                }
                entry
                    .rows
                    .push(command.params.iter().map(|p| p.value.clone()).collect());
                Ok(1)
            }
            "delete" => {
                let mut tables = self.backend.tables.lock().unwrap();
                let removed = tables
                    .remove(table)
                    .map_or(0, |t| t.rows.len());
                Ok(removed as u64)
            }
            _ => Ok(0),
        }
    }

    async fn query(&mut self, command: &DbCommand) -> Result<QueryResult> {
        self.backend.log(format!("query:{}", command.text));

        let (op, table) = Self::target(command);
        match op {
            "select" => {
                let tables = self.backend.tables.lock().unwrap();
                Ok(tables
                    .get(table)
                    .map(|t| QueryResult::new(t.columns.clone(), t.rows.clone()))
                    .unwrap_or_else(QueryResult::empty))
            }
            "connection_id" => Ok(QueryResult::new(
                vec!["id".into()],
                vec![vec![Value::from(self.id)]],
            )),
            _ => Ok(QueryResult::empty()),
        }
    }

    async fn begin(&mut self, _isolation: IsolationLevel) -> Result<()> {
        self.backend.log("begin".into());
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.backend.log("commit".into());
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.backend.log("rollback".into());
        self.in_transaction = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.backend.fail_next_close.swap(false, Ordering::SeqCst) {
            return Err(BusError::Connection("injected close failure".into()));
        }

        self.backend.log(format!("close:{}", self.id));
        self.backend.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemoryProvider {
    backend: Arc<MemoryBackend>,
    dialect: MemoryDialect,
}

impl MemoryProvider {
    pub fn new(backend: Arc<MemoryBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            dialect: MemoryDialect,
        })
    }
}

#[async_trait]
impl DbProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    async fn connect(&self) -> Result<Box<dyn DbConnection>> {
        if self
            .backend
            .fail_next_connect
            .swap(false, Ordering::SeqCst)
        {
            return Err(BusError::Connection("injected connect failure".into()));
        }

        let id = self.backend.connects.fetch_add(1, Ordering::SeqCst) + 1;
        self.backend.log(format!("connect:{}", id));
        Ok(Box::new(MemoryConnection {
            id,
            backend: Arc::clone(&self.backend),
            in_transaction: false,
        }))
    }
}
