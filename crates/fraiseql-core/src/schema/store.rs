//! Schema Store: the DDL-emitting operations that create and mutate
//! collections, attributes, indexes, and relationships.
//!
//! This module computes *what DDL to run*, not how to run it: every
//! operation returns the ordered list of SQL statements a caller must
//! execute inside one transaction (see the concurrency model, §5).
//! Actually issuing them is the injected [`crate::db::SqlDriver`]'s job.

use fraiseql_error::{EngineError, Result};

use super::collection::{Attribute, Collection, Index, OnDelete, RelationSide, RelationType};
use crate::db::Dialect;
use crate::name_mangler;

/// A planned DDL step: the literal SQL text to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStatement(pub String);

/// Plan the DDL for `createCollection`: main table, perms side-table, then
/// every declared index (including the mandatory GIN index on
/// `_permissions`), in the order they must run inside one transaction.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] if the collection fails
/// [`Collection::validate`], or [`EngineError::Limit`] if the estimated row
/// width (computed by the type mapper) exceeds the dialect's limit.
pub fn plan_create_collection(
    dialect: &dyn Dialect,
    schema: &str,
    namespace: &str,
    collection: &Collection,
    shared_tables: bool,
) -> Result<Vec<DdlStatement>> {
    collection.validate().map_err(EngineError::structure)?;

    let mut stmts = Vec::new();
    stmts.push(DdlStatement(dialect.emit_ddl_create_table(
        schema,
        namespace,
        collection,
        shared_tables,
    )?));
    stmts.push(DdlStatement(dialect.emit_ddl_create_perms_table(
        schema,
        namespace,
        collection,
        shared_tables,
    )?));

    for index in &collection.indexes {
        stmts.push(DdlStatement(dialect.emit_ddl_create_index(
            schema, namespace, collection, index, shared_tables,
        )?));
    }
    stmts.push(DdlStatement(dialect.emit_ddl_create_perms_gin_index(
        schema, namespace, collection,
    )?));

    tracing::debug!(collection = %collection.id, statements = stmts.len(), "planned createCollection DDL");

    Ok(stmts)
}

/// Plan `createAttribute`/`createAttributes`: a single `ALTER TABLE ...
/// ADD COLUMN` statement covering every given attribute.
///
/// # Errors
///
/// Returns [`EngineError::Limit`] if adding these attributes would exceed
/// the dialect's maximum attribute count or row width.
pub fn plan_create_attributes(
    dialect: &dyn Dialect,
    schema: &str,
    namespace: &str,
    collection: &Collection,
    attributes: &[Attribute],
    shared_tables: bool,
) -> Result<Vec<DdlStatement>> {
    if attributes.is_empty() {
        return Ok(vec![]);
    }
    Ok(vec![DdlStatement(dialect.emit_ddl_add_columns(
        schema, namespace, collection, attributes, shared_tables,
    )?)])
}

/// Plan `deleteAttribute`.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if `key` is not a declared attribute.
pub fn plan_delete_attribute(
    dialect: &dyn Dialect,
    schema: &str,
    namespace: &str,
    collection: &Collection,
    key: &str,
) -> Result<Vec<DdlStatement>> {
    collection
        .attribute(key)
        .ok_or_else(|| EngineError::not_found("attribute", key))?;
    Ok(vec![DdlStatement(
        dialect.emit_ddl_drop_column(schema, namespace, collection, key)?,
    )])
}

/// Plan `renameAttribute`.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if `from` is not declared, or
/// [`EngineError::Duplicate`] if `to` is already declared.
pub fn plan_rename_attribute(
    dialect: &dyn Dialect,
    schema: &str,
    namespace: &str,
    collection: &Collection,
    from: &str,
    to: &str,
) -> Result<Vec<DdlStatement>> {
    collection
        .attribute(from)
        .ok_or_else(|| EngineError::not_found("attribute", from))?;
    if collection.attribute(to).is_some() {
        return Err(EngineError::duplicate("attribute", to));
    }
    Ok(vec![DdlStatement(
        dialect.emit_ddl_rename_column(schema, namespace, collection, from, to)?,
    )])
}

/// Plan `createIndex`.
///
/// # Errors
///
/// Returns [`EngineError::Duplicate`] if an index with the same `$id`
/// already exists on the collection.
pub fn plan_create_index(
    dialect: &dyn Dialect,
    schema: &str,
    namespace: &str,
    collection: &Collection,
    index: &Index,
    shared_tables: bool,
) -> Result<Vec<DdlStatement>> {
    if collection.indexes.iter().any(|i| i.id == index.id) {
        return Err(EngineError::duplicate("index", &index.id));
    }
    Ok(vec![DdlStatement(dialect.emit_ddl_create_index(
        schema,
        namespace,
        collection,
        index,
        shared_tables,
    )?)])
}

/// Plan `deleteIndex`.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if no index with the given `$id` exists.
pub fn plan_delete_index(
    dialect: &dyn Dialect,
    schema: &str,
    namespace: &str,
    collection: &Collection,
    index_id: &str,
) -> Result<Vec<DdlStatement>> {
    let physical = name_mangler::index_name(schema, namespace, &collection.id, index_id);
    if !collection.indexes.iter().any(|i| i.id == index_id) {
        return Err(EngineError::not_found("index", index_id));
    }
    Ok(vec![DdlStatement(dialect.emit_ddl_drop_index(schema, &physical)?)])
}

/// Plan `createRelationship`: emits DDL only for the owning side(s), per the
/// owning-side rule in §3's invariants.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] for an unrecognized relation shape.
#[allow(clippy::too_many_arguments)]
pub fn plan_create_relationship(
    dialect: &dyn Dialect,
    schema: &str,
    namespace: &str,
    parent: &Collection,
    child: &Collection,
    relation_type: RelationType,
    two_way: bool,
    key_on_parent: &str,
    key_on_child: &str,
    shared_tables: bool,
) -> Result<Vec<DdlStatement>> {
    let mut stmts = Vec::new();
    match relation_type {
        RelationType::OneToOne => {
            stmts.push(DdlStatement(dialect.emit_ddl_add_relationship_column(
                schema, namespace, parent, key_on_parent,
            )?));
            if two_way {
                stmts.push(DdlStatement(dialect.emit_ddl_add_relationship_column(
                    schema, namespace, child, key_on_child,
                )?));
            }
        }
        RelationType::OneToMany => {
            stmts.push(DdlStatement(dialect.emit_ddl_add_relationship_column(
                schema, namespace, child, key_on_child,
            )?));
        }
        RelationType::ManyToOne => {
            stmts.push(DdlStatement(dialect.emit_ddl_add_relationship_column(
                schema, namespace, parent, key_on_parent,
            )?));
        }
        RelationType::ManyToMany => {
            stmts.push(DdlStatement(dialect.emit_ddl_create_junction_table(
                schema,
                namespace,
                parent,
                child,
                key_on_parent,
                key_on_child,
                shared_tables,
            )?));
        }
    }
    Ok(stmts)
}

/// Determine whether a delete of the related document must be refused,
/// cascaded, or nulled, per the relationship's `onDelete` policy.
///
/// # Errors
///
/// Returns [`EngineError::Restricted`] when `on_delete == Restrict` and
/// `dependents_exist` is true.
pub fn check_on_delete(
    on_delete: OnDelete,
    relationship_key: &str,
    identifier: &str,
    dependents_exist: bool,
) -> Result<()> {
    if matches!(on_delete, OnDelete::Restrict) && dependents_exist {
        return Err(EngineError::Restricted {
            identifier: identifier.to_string(),
            relationship: relationship_key.to_string(),
        });
    }
    Ok(())
}

/// Which side of a declared relationship is non-owning and therefore
/// virtual (no physical column).
#[must_use]
pub const fn is_non_owning_side(relation_type: RelationType, side: RelationSide) -> bool {
    !relation_type.owning_side(side)
}
