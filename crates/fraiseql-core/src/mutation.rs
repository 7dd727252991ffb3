//! Mutation Planner: insert, upsert, update, delete-by-query, and increment.

use std::collections::BTreeSet;

use fraiseql_error::{EngineError, Result};

use crate::db::{Dialect, Param};
use crate::filters::{DialectFamily, Filter};
use crate::name_mangler;
use crate::permissions::RoleSet;
use crate::query::compile_where_clauses;
use crate::schema::{dedup_permissions, Collection, Document, Permission, PermissionType};

/// One compiled mutation: possibly several statements that must run in one
/// transaction (e.g. insert + permission insert).
#[derive(Debug)]
pub struct CompiledMutation {
    /// The statements to execute, in order.
    pub statements: Vec<(String, Vec<Param>)>,
}

fn physical_columns<'a>(collection: &'a Collection, doc: &Document) -> Vec<&'a str> {
    collection
        .attributes
        .iter()
        .filter(|a| a.is_physical() && doc.attributes.contains_key(&a.key))
        .map(|a| a.key.as_str())
        .collect()
}

/// Plan an **insert single** mutation.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] if shared-table mode is active and no
/// tenant id was supplied (the planner refuses to emit a shared-table
/// mutation without one).
#[allow(clippy::too_many_arguments)]
pub fn plan_insert(
    collection: &Collection,
    doc: &Document,
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
) -> Result<CompiledMutation> {
    if shared_tables && tenant_id.is_none() {
        return Err(EngineError::structure("shared-table mutation requires a tenant id"));
    }

    let cols = physical_columns(collection, doc);
    let mut col_names: Vec<String> = vec!["_uid".into(), "_createdAt".into(), "_updatedAt".into(), "_permissions".into()];
    let mut binds: Vec<Param> = vec![
        doc.id.clone().map_or(Param::Null, Param::Text),
        doc.created_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339())),
        doc.updated_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339())),
        Param::TextArray(dedup_permissions(&doc.permissions).iter().map(Permission::to_tuple_string).collect()),
    ];
    if shared_tables {
        col_names.push("_tenant".into());
        binds.push(Param::Int(tenant_id.unwrap_or_default()));
    }
    for c in &cols {
        col_names.push((*c).to_string());
        binds.push(doc.get(c).map_or(Param::Null, Param::from));
    }

    let table = name_mangler::qualified_table(quote, schema, namespace, &collection.id);
    let quoted_cols: Vec<String> = col_names.iter().map(|c| quote(c)).collect();
    let placeholders: Vec<&str> = col_names.iter().map(|_| "?").collect();
    let insert_sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING _id",
        quoted_cols.join(", "),
        placeholders.join(", ")
    );

    let mut statements = vec![(insert_sql, binds)];

    let perms_inserts = plan_permission_inserts(
        collection,
        &doc.permissions,
        quote,
        schema,
        namespace,
        shared_tables,
        tenant_id,
        &Param::LastInsertId,
    );
    statements.extend(perms_inserts);

    tracing::debug!(
        collection = %collection.id,
        statements = statements.len(),
        "compiled insert mutation"
    );

    Ok(CompiledMutation { statements })
}

/// Emit the permission side-table INSERTs for one document, one statement
/// per distinct permission type. `document_ref` is the bind that identifies
/// the row the rows belong to: [`Param::LastInsertId`] for a single insert,
/// [`Param::BatchInsertId`] for a batch insert, or a literal [`Param::Int`]
/// once the `_id` is already known (update-time permission diffs use
/// [`plan_permission_diff_statements`] instead).
#[allow(clippy::too_many_arguments)]
fn plan_permission_inserts(
    collection: &Collection,
    permissions: &[Permission],
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
    document_ref: &Param,
) -> Vec<(String, Vec<Param>)> {
    let deduped = dedup_permissions(permissions);
    let mut by_type: std::collections::BTreeMap<PermissionType, Vec<String>> = std::collections::BTreeMap::new();
    for p in &deduped {
        by_type.entry(p.kind).or_default().push(p.role.clone());
    }

    let perms_table = name_mangler::qualified_perms_table(quote, schema, namespace, &collection.id);
    let mut out = Vec::new();
    for (kind, roles) in by_type {
        if roles.is_empty() {
            continue;
        }
        let mut cols = vec!["_type", "_permissions", "_document"];
        let mut binds = vec![Param::Text(kind.as_str().to_string()), Param::TextArray(roles), document_ref.clone()];
        if shared_tables {
            cols.push("_tenant");
            binds.push(Param::Int(tenant_id.unwrap_or_default()));
        }
        let placeholders: Vec<&str> = cols.iter().map(|_| "?").collect();
        let sql = format!("INSERT INTO {perms_table} ({}) VALUES ({})", cols.join(", "), placeholders.join(", "));
        out.push((sql, binds));
    }
    out
}

/// Plan an **insert batch** mutation: the union of all column sets across
/// the batch, one multi-row INSERT with NULL placeholders for rows missing
/// a given column.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] under the same tenant-id rule as
/// [`plan_insert`].
#[allow(clippy::too_many_arguments)]
pub fn plan_insert_batch(
    collection: &Collection,
    docs: &[Document],
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
) -> Result<CompiledMutation> {
    if shared_tables && tenant_id.is_none() {
        return Err(EngineError::structure("shared-table mutation requires a tenant id"));
    }

    let mut union_cols: BTreeSet<String> = BTreeSet::new();
    for doc in docs {
        for c in physical_columns(collection, doc) {
            union_cols.insert(c.to_string());
        }
    }
    let mut col_names: Vec<String> = vec!["_uid".into(), "_createdAt".into(), "_updatedAt".into(), "_permissions".into()];
    if shared_tables {
        col_names.push("_tenant".into());
    }
    col_names.extend(union_cols.iter().cloned());

    let mut binds: Vec<Param> = Vec::new();
    let mut row_placeholders = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut row_binds = vec![
            doc.id.clone().map_or(Param::Null, Param::Text),
            doc.created_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339())),
            doc.updated_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339())),
            Param::TextArray(dedup_permissions(&doc.permissions).iter().map(Permission::to_tuple_string).collect()),
        ];
        if shared_tables {
            row_binds.push(Param::Int(tenant_id.unwrap_or_default()));
        }
        for c in &union_cols {
            row_binds.push(doc.get(c).map_or(Param::Null, Param::from));
        }
        row_placeholders.push(format!("({})", row_binds.iter().map(|_| "?").collect::<Vec<_>>().join(", ")));
        binds.extend(row_binds);
    }

    let table = name_mangler::qualified_table(quote, schema, namespace, &collection.id);
    let quoted_cols: Vec<String> = col_names.iter().map(|c| quote(c)).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {} RETURNING _id",
        quoted_cols.join(", "),
        row_placeholders.join(", ")
    );

    let mut statements = vec![(sql, binds)];
    for (i, doc) in docs.iter().enumerate() {
        statements.extend(plan_permission_inserts(
            collection,
            &doc.permissions,
            quote,
            schema,
            namespace,
            shared_tables,
            tenant_id,
            &Param::BatchInsertId(i),
        ));
    }

    Ok(CompiledMutation { statements })
}

/// The add/remove/update plan produced by the permission diff algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    /// Permission types present in `new` but not `old`: emit an INSERT.
    pub insert: Vec<(PermissionType, Vec<String>)>,
    /// Permission types present in `old` but not `new`: emit a DELETE.
    pub delete: Vec<PermissionType>,
    /// Permission types present in both, with a changed role set: emit an UPDATE.
    pub update: Vec<(PermissionType, Vec<String>)>,
}

/// Compute the permission diff between a document's existing permission
/// rows and its new `$permissions`.
#[must_use]
pub fn diff_permissions(old: &[Permission], new: &[Permission]) -> PermissionDiff {
    let mut old_by_type: std::collections::BTreeMap<PermissionType, BTreeSet<String>> =
        std::collections::BTreeMap::new();
    for p in dedup_permissions(old) {
        old_by_type.entry(p.kind).or_default().insert(p.role);
    }
    let mut new_by_type: std::collections::BTreeMap<PermissionType, BTreeSet<String>> =
        std::collections::BTreeMap::new();
    for p in dedup_permissions(new) {
        new_by_type.entry(p.kind).or_default().insert(p.role);
    }

    let mut diff = PermissionDiff::default();
    for (kind, roles) in &new_by_type {
        match old_by_type.get(kind) {
            None => diff.insert.push((*kind, roles.iter().cloned().collect())),
            Some(old_roles) if old_roles != roles => {
                diff.update.push((*kind, roles.iter().cloned().collect()));
            }
            Some(_) => {}
        }
    }
    for kind in old_by_type.keys() {
        if !new_by_type.contains_key(kind) {
            diff.delete.push(*kind);
        }
    }
    diff
}

/// Plan a **batch upsert**: one multi-row `INSERT ... ON CONFLICT`
/// (Postgres) / `INSERT ... ON DUPLICATE KEY UPDATE` (MySQL) statement.
///
/// `increment_attribute`, when set, is the single column updated in
/// increment form (`col = col + EXCLUDED.col`); every other physical
/// column present in the batch is replaced wholesale, guarded by tenant
/// ownership in shared-table mode so a cross-tenant `_uid` collision never
/// overwrites another tenant's row.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] under the same tenant-id rule as
/// [`plan_insert`].
#[allow(clippy::too_many_arguments)]
pub fn plan_upsert(
    collection: &Collection,
    docs: &[Document],
    increment_attribute: Option<&str>,
    dialect: &dyn Dialect,
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
) -> Result<CompiledMutation> {
    if shared_tables && tenant_id.is_none() {
        return Err(EngineError::structure("shared-table mutation requires a tenant id"));
    }

    let mut union_cols: BTreeSet<String> = BTreeSet::new();
    for doc in docs {
        for c in physical_columns(collection, doc) {
            union_cols.insert(c.to_string());
        }
    }

    let mut col_names: Vec<String> = vec!["_uid".into(), "_createdAt".into(), "_updatedAt".into(), "_permissions".into()];
    if shared_tables {
        col_names.push("_tenant".into());
    }
    col_names.extend(union_cols.iter().cloned());

    let mut binds: Vec<Param> = Vec::new();
    let mut row_placeholders = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut row_binds = vec![
            doc.id.clone().map_or(Param::Null, Param::Text),
            doc.created_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339())),
            doc.updated_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339())),
            Param::TextArray(dedup_permissions(&doc.permissions).iter().map(Permission::to_tuple_string).collect()),
        ];
        if shared_tables {
            row_binds.push(Param::Int(tenant_id.unwrap_or_default()));
        }
        for c in &union_cols {
            row_binds.push(doc.get(c).map_or(Param::Null, Param::from));
        }
        row_placeholders.push(format!("({})", row_binds.iter().map(|_| "?").collect::<Vec<_>>().join(", ")));
        binds.extend(row_binds);
    }

    let quoted_cols: Vec<String> = col_names.iter().map(|c| quote(c)).collect();
    let conflict_cols: Vec<&str> = if shared_tables { vec!["_uid", "_tenant"] } else { vec!["_uid"] };
    let update_cols: Vec<&str> =
        if let Some(inc) = increment_attribute { vec![inc, "_updatedAt"] } else { union_cols.iter().map(String::as_str).chain(["_updatedAt"]).collect() };
    let upsert_clause = dialect.emit_upsert_clause(&conflict_cols, &update_cols, increment_attribute, shared_tables);

    let table = name_mangler::qualified_table(quote, schema, namespace, &collection.id);
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {} {}",
        quoted_cols.join(", "),
        row_placeholders.join(", "),
        upsert_clause,
    );

    Ok(CompiledMutation { statements: vec![(sql, binds)] })
}

/// Plan an **update single** mutation.
///
/// `UPDATE main SET col=?, ..., _uid=?, _updatedAt=? WHERE _id=? [AND
/// _tenant=?]`, followed by the targeted DELETE/UPDATE/INSERT statements
/// produced by [`diff_permissions`] against the document's existing
/// permission rows.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] under the same tenant-id rule as
/// [`plan_insert`].
#[allow(clippy::too_many_arguments)]
pub fn plan_update_single(
    collection: &Collection,
    sequence_id: i64,
    doc: &Document,
    old_permissions: &[Permission],
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
) -> Result<CompiledMutation> {
    if shared_tables && tenant_id.is_none() {
        return Err(EngineError::structure("shared-table mutation requires a tenant id"));
    }

    let cols = physical_columns(collection, doc);
    let new_permissions = dedup_permissions(&doc.permissions);

    let mut set_clauses: Vec<String> = vec![format!("{} = ?", quote("_uid")), format!("{} = ?", quote("_updatedAt"))];
    let mut binds: Vec<Param> = vec![
        doc.id.clone().map_or(Param::Null, Param::Text),
        doc.updated_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339())),
    ];
    set_clauses.push(format!("{} = ?", quote("_permissions")));
    binds.push(Param::TextArray(new_permissions.iter().map(Permission::to_tuple_string).collect()));
    for c in &cols {
        set_clauses.push(format!("{} = ?", quote(c)));
        binds.push(doc.get(c).map_or(Param::Null, Param::from));
    }

    let table = name_mangler::qualified_table(quote, schema, namespace, &collection.id);
    let mut sql = format!("UPDATE {table} SET {} WHERE {} = ?", set_clauses.join(", "), quote("_id"));
    binds.push(Param::Int(sequence_id));
    if shared_tables {
        sql.push_str(&format!(" AND {} = ?", quote("_tenant")));
        binds.push(Param::Int(tenant_id.unwrap_or_default()));
    }

    let mut statements = vec![(sql, binds)];
    statements.extend(plan_permission_diff_statements(
        collection,
        sequence_id,
        old_permissions,
        &new_permissions,
        quote,
        schema,
        namespace,
        shared_tables,
        tenant_id,
    ));

    tracing::debug!(collection = %collection.id, statements = statements.len(), "compiled update mutation");

    Ok(CompiledMutation { statements })
}

/// Plan an **update batch** mutation: `UPDATE main SET ... WHERE _id IN
/// (?, ...) [AND _tenant=?]`, applying the same attribute values to every
/// targeted row.
///
/// Per spec §9's resolved Open Question, `$permissions` on `doc` is
/// propagated to every id in `skip_permissions_for` is **not** a member of
/// — each such document's permission diff is computed against the row's
/// corresponding entry in `old_permissions_by_id` and appended as its own
/// targeted statements, exactly as [`plan_update_single`] would for one
/// document.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] under the same tenant-id rule as
/// [`plan_insert`].
#[allow(clippy::too_many_arguments)]
pub fn plan_update_batch(
    collection: &Collection,
    ids: &[i64],
    doc: &Document,
    old_permissions_by_id: &std::collections::BTreeMap<i64, Vec<Permission>>,
    skip_permissions_for: &BTreeSet<i64>,
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
) -> Result<CompiledMutation> {
    if shared_tables && tenant_id.is_none() {
        return Err(EngineError::structure("shared-table mutation requires a tenant id"));
    }

    let cols = physical_columns(collection, doc);
    let mut set_clauses: Vec<String> = vec![format!("{} = ?", quote("_updatedAt"))];
    let mut binds: Vec<Param> = vec![doc.updated_at.map_or(Param::Null, |t| Param::Text(t.to_rfc3339()))];
    for c in &cols {
        set_clauses.push(format!("{} = ?", quote(c)));
        binds.push(doc.get(c).map_or(Param::Null, Param::from));
    }

    let table = name_mangler::qualified_table(quote, schema, namespace, &collection.id);
    let id_placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
    let mut sql = format!(
        "UPDATE {table} SET {} WHERE {} IN ({})",
        set_clauses.join(", "),
        quote("_id"),
        id_placeholders.join(", ")
    );
    binds.extend(ids.iter().map(|id| Param::Int(*id)));
    if shared_tables {
        sql.push_str(&format!(" AND {} = ?", quote("_tenant")));
        binds.push(Param::Int(tenant_id.unwrap_or_default()));
    }

    let mut statements = vec![(sql, binds)];

    if !doc.permissions.is_empty() {
        let new_permissions = dedup_permissions(&doc.permissions);
        for id in ids {
            if skip_permissions_for.contains(id) {
                continue;
            }
            let old = old_permissions_by_id.get(id).map_or(&[][..], Vec::as_slice);
            statements.extend(plan_permission_diff_statements(
                collection,
                *id,
                old,
                &new_permissions,
                quote,
                schema,
                namespace,
                shared_tables,
                tenant_id,
            ));
        }
    }

    Ok(CompiledMutation { statements })
}

/// Emit the targeted DELETE/UPDATE/INSERT statements [`diff_permissions`]
/// produces for one document's permission side-table rows.
#[allow(clippy::too_many_arguments)]
fn plan_permission_diff_statements(
    collection: &Collection,
    sequence_id: i64,
    old: &[Permission],
    new: &[Permission],
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
) -> Vec<(String, Vec<Param>)> {
    let diff = diff_permissions(old, new);
    let perms_table = name_mangler::qualified_perms_table(quote, schema, namespace, &collection.id);
    let mut out = Vec::new();

    for kind in &diff.delete {
        let mut sql = format!("DELETE FROM {perms_table} WHERE _document = ? AND _type = ?");
        let mut binds = vec![Param::Int(sequence_id), Param::Text(kind.as_str().to_string())];
        if shared_tables {
            sql.push_str(" AND _tenant = ?");
            binds.push(Param::Int(tenant_id.unwrap_or_default()));
        }
        out.push((sql, binds));
    }

    for (kind, roles) in &diff.update {
        let mut sql = format!("UPDATE {perms_table} SET _permissions = ? WHERE _document = ? AND _type = ?");
        let mut binds = vec![Param::TextArray(roles.clone()), Param::Int(sequence_id), Param::Text(kind.as_str().to_string())];
        if shared_tables {
            sql.push_str(" AND _tenant = ?");
            binds.push(Param::Int(tenant_id.unwrap_or_default()));
        }
        out.push((sql, binds));
    }

    for (kind, roles) in &diff.insert {
        let mut cols = vec!["_type", "_permissions", "_document"];
        let mut binds = vec![Param::Text(kind.as_str().to_string()), Param::TextArray(roles.clone()), Param::Int(sequence_id)];
        if shared_tables {
            cols.push("_tenant");
            binds.push(Param::Int(tenant_id.unwrap_or_default()));
        }
        let placeholders: Vec<&str> = cols.iter().map(|_| "?").collect();
        out.push((format!("INSERT INTO {perms_table} ({}) VALUES ({})", cols.join(", "), placeholders.join(", ")), binds));
    }

    out
}

/// Plan a **delete by query** mutation.
///
/// Reuses the same tenancy/permission/filter `WHERE` assembly
/// `compile_query` uses, compiled as `DELETE ... RETURNING _id, _uid`.
/// Populate joins don't apply to a delete (nothing is being hydrated), so
/// only the filter-bearing `WHERE` clause is reused.
///
/// The perms side-table rows for deleted documents are removed by the
/// main table's `ON DELETE CASCADE` FK (see spec §3); callers that need an
/// explicit independent cleanup statement (e.g. a dialect without a working
/// cascade) can follow up with [`plan_delete_permissions_followup`] using
/// the `_id`s this statement returns.
///
/// # Errors
///
/// Propagates [`EngineError::Query`] from the filter compiler.
#[allow(clippy::too_many_arguments)]
pub fn plan_delete_by_query(
    collection: &Collection,
    filters: &[Filter],
    quote: &dyn Fn(&str) -> String,
    dialect: DialectFamily,
    language: &str,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
    roles: &RoleSet,
) -> Result<CompiledMutation> {
    let (where_clauses, binds) = compile_where_clauses(
        collection, filters, quote, dialect, language, schema, namespace, shared_tables, tenant_id, roles, false,
    )?;
    let where_sql =
        if where_clauses.is_empty() { String::new() } else { format!(" WHERE {}", where_clauses.join(" AND ")) };
    let table = name_mangler::qualified_table(quote, schema, namespace, &collection.id);
    let sql = format!("DELETE FROM {table} AS main{where_sql} RETURNING _id, _uid");

    tracing::debug!(collection = %collection.id, "compiled delete-by-query mutation");

    Ok(CompiledMutation { statements: vec![(sql, binds)] })
}

/// Plan the perms side-table cleanup for a set of deleted `_id`s. Only
/// needed when the dialect's cascade delete can't be relied on; normally
/// the FK on the perms table handles this automatically.
#[must_use]
pub fn plan_delete_permissions_followup(
    collection: &Collection,
    document_ids: &[i64],
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
) -> CompiledMutation {
    let perms_table = name_mangler::qualified_perms_table(quote, schema, namespace, &collection.id);
    let placeholders: Vec<&str> = document_ids.iter().map(|_| "?").collect();
    let mut sql = format!("DELETE FROM {perms_table} WHERE _document IN ({})", placeholders.join(", "));
    let mut binds: Vec<Param> = document_ids.iter().map(|id| Param::Int(*id)).collect();
    if shared_tables {
        sql.push_str(" AND _tenant = ?");
        binds.push(Param::Int(tenant_id.unwrap_or_default()));
    }
    CompiledMutation { statements: vec![(sql, binds)] }
}

/// Plan an **increment** mutation: `UPDATE main SET col = col + ? ,
/// _updatedAt = ? WHERE _uid = ? [AND col <= max] [AND col >= min]`.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn plan_increment(
    collection: &Collection,
    attribute: &str,
    delta: i64,
    uid: &str,
    min: Option<i64>,
    max: Option<i64>,
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    namespace: &str,
) -> CompiledMutation {
    let col = quote(attribute);
    let table = name_mangler::qualified_table(quote, schema, namespace, &collection.id);
    let mut sql = format!("UPDATE {table} SET {col} = {col} + ?, _updatedAt = ? WHERE _uid = ?");
    let mut binds = vec![Param::Int(delta), Param::Text(chrono::Utc::now().to_rfc3339()), Param::Text(uid.to_string())];
    if let Some(max) = max {
        sql.push_str(&format!(" AND {col} <= ?"));
        binds.push(Param::Int(max));
    }
    if let Some(min) = min {
        sql.push_str(&format!(" AND {col} >= ?"));
        binds.push(Param::Int(min));
    }
    CompiledMutation { statements: vec![(sql, binds)] }
}
