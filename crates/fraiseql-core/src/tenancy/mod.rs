//! Tenancy filter: the `_tenant` predicate woven into every statement when
//! the adapter runs in shared-table mode.

use fraiseql_error::{EngineError, Result};

/// The caller's tenant context for one request. `id` is `None` outside
/// shared-table mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantContext {
    id: Option<i64>,
}

impl TenantContext {
    /// A tenant context for shared-table mode.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self { id: Some(id) }
    }

    /// No tenant context (single-tenant / non-shared mode).
    #[must_use]
    pub const fn none() -> Self {
        Self { id: None }
    }

    /// The tenant id, if any.
    #[must_use]
    pub const fn id(&self) -> Option<i64> {
        self.id
    }

    /// Require a tenant id for a shared-table mutation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Structure`] if no tenant id is set: the
    /// planner refuses to emit a shared-table mutation without one.
    pub fn require(&self) -> Result<i64> {
        self.id.ok_or_else(|| EngineError::structure("shared-table mutation requires a tenant id"))
    }
}

/// Render the tenant predicate for a read. Reads of the reserved
/// `_metadata` collection tolerate a null tenant column; all other reads
/// require an exact match.
#[must_use]
pub fn read_predicate(alias: &str, collection_id: &str) -> String {
    if collection_id == "_metadata" {
        format!("({alias}._tenant = ? OR {alias}._tenant IS NULL)")
    } else {
        format!("{alias}._tenant = ?")
    }
}
