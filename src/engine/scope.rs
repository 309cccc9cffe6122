use std::fmt;

use uuid::Uuid;

/// Identity of one logical scope of execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An explicit handle naming one logical scope of execution.
///
/// The engine binds at most one live database context per scope: every call
/// carrying a clone of the same `Scope` sees the same context (and any
/// transaction the caller opened on it). Releasing the scope on the engine
/// disposes the context; the next request under the same handle gets a
/// fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    id: ScopeId,
}

impl Scope {
    pub fn new() -> Self {
        Self { id: ScopeId::new() }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope:{}", self.id)
    }
}
