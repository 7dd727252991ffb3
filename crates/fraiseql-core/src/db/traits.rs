//! The dialect trait and the external boundary traits.
//!
//! Only the dialect trait has concrete implementations in this crate; the
//! boundary traits exist so the engine can be exercised and tested without
//! a real driver, role provider, or cache.

use async_trait::async_trait;
use fraiseql_error::Result;

use crate::schema::{Attribute, Collection, Index};

/// One row as returned by a [`SqlDriver`] query, already dialect-normalized
/// via [`Dialect::normalize_row`].
pub type Row = std::collections::HashMap<String, crate::schema::Value>;

/// The bit-exact SQL a dialect must emit for every DDL and error-mapping operation.
///
/// Covers row normalization and driver-error classification too.
/// Implemented once per dialect (Postgres, MySQL); the Query Planner and
/// Mutation Planner hold a `&dyn Dialect` and compose, never subclass.
pub trait Dialect: Send + Sync {
    /// The dialect's identifier quote character rendering, e.g. `"users"`
    /// or `` `users` ``.
    fn quote(&self, identifier: &str) -> String;

    /// Map a logical attribute type to its physical column type. Returns
    /// `None` for `virtual` attributes.
    fn map_type(&self, attr_type: crate::schema::AttributeType, size: u32, array: bool) -> Option<String>;

    /// `CREATE TABLE` for the main table.
    fn emit_ddl_create_table(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        shared_tables: bool,
    ) -> Result<String>;

    /// `CREATE TABLE` for the perms side-table, with its `ON DELETE CASCADE` FK.
    fn emit_ddl_create_perms_table(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        shared_tables: bool,
    ) -> Result<String>;

    /// `CREATE INDEX` for one declared index.
    fn emit_ddl_create_index(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        index: &Index,
        shared_tables: bool,
    ) -> Result<String>;

    /// The mandatory GIN (or dialect equivalent) index over `_permissions`.
    fn emit_ddl_create_perms_gin_index(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
    ) -> Result<String>;

    /// `ALTER TABLE ... ADD COLUMN` for one or more attributes in a single statement.
    fn emit_ddl_add_columns(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        attributes: &[Attribute],
        shared_tables: bool,
    ) -> Result<String>;

    /// `ALTER TABLE ... DROP COLUMN`.
    fn emit_ddl_drop_column(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        key: &str,
    ) -> Result<String>;

    /// `ALTER TABLE ... RENAME COLUMN`.
    fn emit_ddl_rename_column(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        from: &str,
        to: &str,
    ) -> Result<String>;

    /// `DROP INDEX` by its mangled physical name.
    fn emit_ddl_drop_index(&self, schema: &str, physical_index_name: &str) -> Result<String>;

    /// `ADD COLUMN` for a relationship's owning-side foreign-key-style column.
    fn emit_ddl_add_relationship_column(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        key: &str,
    ) -> Result<String>;

    /// `CREATE TABLE` for a many-to-many junction table. `_tenant` and its
    /// membership in the primary key are included only when `shared_tables`.
    #[allow(clippy::too_many_arguments)]
    fn emit_ddl_create_junction_table(
        &self,
        schema: &str,
        namespace: &str,
        parent: &Collection,
        child: &Collection,
        key_on_parent: &str,
        key_on_child: &str,
        shared_tables: bool,
    ) -> Result<String>;

    /// The `ON CONFLICT`/`ON DUPLICATE KEY` suffix for a batch upsert: for
    /// each column in `update_cols`, guard the write with tenant ownership
    /// so a cross-tenant collision never overwrites another tenant's row.
    /// When `increment_col` names one of `update_cols`, that column's SET
    /// clause adds to the existing value instead of replacing it.
    fn emit_upsert_clause(
        &self,
        conflict_cols: &[&str],
        update_cols: &[&str],
        increment_col: Option<&str>,
        shared_tables: bool,
    ) -> String;

    /// Map a driver-native error (already reduced to a code + message by
    /// the injected [`SqlDriver`]) onto the engine's [`fraiseql_error::EngineError`] taxonomy.
    fn map_error(&self, code: Option<&str>, message: &str) -> fraiseql_error::EngineError;

    /// Normalize one raw driver row onto reserved-key + attribute [`Row`]
    /// shape: `_uid → $id`, `_id → $sequence`, etc., and parse
    /// `$permissions` (native array or JSON-encoded string) into a
    /// deduplicated list.
    fn normalize_row(&self, raw: &Row) -> Row;
}

/// The SQL driver boundary (§6): executes compiled SQL and manages
/// transactions. No concrete implementation ships in this crate; callers
/// inject one (or a test fake).
#[async_trait]
pub trait SqlDriver: Send + Sync {
    /// Execute one statement with positional `?` parameters.
    async fn query(&self, sql: &str, params: &[crate::db::Param]) -> Result<Vec<Row>>;

    /// Quote a literal for the narrow case where it must appear inside
    /// `ARRAY[...]`.
    fn quote(&self, literal: &str) -> String;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;
}

/// The role provider boundary (§6): the caller's active roles.
pub trait RoleProvider: Send + Sync {
    /// The current caller's ordered role list.
    fn roles(&self) -> Vec<String>;

    /// Whether permission enforcement is enabled at all for this call.
    fn enabled(&self) -> bool;
}

/// The cache boundary (§6, optional): invalidation announcements only; the
/// core never reads from the cache.
pub trait Cache: Send + Sync {
    /// Announce that one document changed.
    fn invalidate_document(&self, collection: &str, id: &str);

    /// Announce that an entire collection changed.
    fn invalidate_collection(&self, collection: &str);
}
