//! Query Planner: assembles one `SELECT DISTINCT` statement from a
//! compiled filter, join set, ordering, and cursor.

use fraiseql_error::Result;

use crate::db::Param;
use crate::filters::{compile, DialectFamily, Filter};
use crate::name_mangler;
use crate::permissions::{compile_exists_clause, needs_document_security_join, RoleSet};
use crate::relationship::{compile_joins, JoinClause, PopulateNode};
use crate::schema::{Collection, PermissionType, Value};

/// Sort direction for an order clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl OrderDirection {
    /// The opposite direction (used when flipping for `cursorDirection=before`).
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    const fn comparison_operator(self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }
}

/// Which side of a cursor the caller is paging toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    /// Rows after the cursor, in caller-expected order.
    After,
    /// Rows before the cursor, in caller-expected order.
    Before,
}

/// The full specification of one `find` query.
pub struct QuerySpec<'a> {
    /// The target collection.
    pub collection: &'a Collection,
    /// Root-level filters.
    pub filters: Vec<Filter>,
    /// The populate tree to join.
    pub populate: Vec<PopulateNode>,
    /// Explicitly selected user attributes; empty means all declared attributes.
    pub selections: Vec<String>,
    /// Ordering attributes, parallel to `order_directions`.
    pub order_attributes: Vec<String>,
    /// Ordering directions, parallel to `order_attributes`.
    pub order_directions: Vec<OrderDirection>,
    /// The cursor row, if paginating: ordered `(attribute, value)` pairs
    /// parallel to `order_attributes`.
    pub cursor: Option<Vec<(String, Value)>>,
    /// Which side of the cursor to page toward.
    pub cursor_direction: CursorDirection,
    /// Row limit.
    pub limit: u32,
    /// Row offset (ignored once a cursor is present).
    pub offset: u32,
}

/// A fully compiled `SELECT DISTINCT` statement.
pub struct CompiledQuery {
    /// The SQL text.
    pub sql: String,
    /// The positional bind list, in left-to-right placeholder order.
    pub binds: Vec<Param>,
    /// The root-level join clauses (for row-reassembly after fetch).
    pub joins: Vec<JoinClause>,
    /// Whether the result rows must be reversed after fetch to restore
    /// caller-expected order (true when `cursor_direction == Before`).
    pub reverse_after_fetch: bool,
}

/// Compile one `find` query.
///
/// # Errors
///
/// Propagates [`EngineError::Query`] from the filter compiler and
/// [`EngineError::Limit`] from relationship traversal.
#[allow(clippy::too_many_arguments)]
pub fn compile_query(
    spec: &QuerySpec<'_>,
    quote: &dyn Fn(&str) -> String,
    dialect: DialectFamily,
    language: &str,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
    roles: &RoleSet,
    metadata_read: bool,
) -> Result<CompiledQuery> {
    let (mut where_clauses, mut binds) = compile_where_clauses(
        spec.collection, &spec.filters, quote, dialect, language, schema, namespace, shared_tables, tenant_id, roles, metadata_read,
    )?;

    let table = name_mangler::qualified_table(quote, schema, namespace, &spec.collection.id);

    let joins = compile_joins(
        &spec.populate,
        "main",
        0,
        quote,
        dialect,
        language,
        schema,
        namespace,
        shared_tables,
        tenant_id,
        roles,
        &mut binds,
    )?;

    let (order_attrs, order_dirs) = resolve_order(spec);
    let reverse_after_fetch = spec.cursor_direction == CursorDirection::Before;

    if let Some(cursor_row) = &spec.cursor {
        let cursor_sql = compile_cursor(cursor_row, &order_attrs, &order_dirs, spec.cursor_direction, quote, &mut binds)?;
        if !cursor_sql.is_empty() {
            where_clauses.push(cursor_sql);
        }
    }

    let projection = build_projection(spec, shared_tables, quote);

    let mut join_sql = String::new();
    flatten_joins(&joins, &mut join_sql);

    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };

    let order_sql = if order_attrs.is_empty() {
        String::new()
    } else {
        let rendered: Vec<String> = order_attrs
            .iter()
            .zip(order_dirs.iter())
            .map(|(a, d)| format!("{} {}", quote(a), d.as_sql()))
            .collect();
        format!(" ORDER BY {}", rendered.join(", "))
    };

    binds.push(Param::Int(i64::from(spec.limit)));
    let offset_sql = if spec.cursor.is_none() && spec.offset > 0 {
        binds.push(Param::Int(i64::from(spec.offset)));
        " OFFSET ?".to_string()
    } else {
        String::new()
    };

    let sql = format!(
        "SELECT DISTINCT {projection} FROM {table} AS main{join_sql}{where_sql}{order_sql} LIMIT ?{offset_sql}"
    );

    tracing::debug!(
        collection = %spec.collection.id,
        sql = %crate::db::truncate_for_log(&sql),
        binds = binds.len(),
        "compiled find query"
    );

    Ok(CompiledQuery { sql, binds, joins, reverse_after_fetch })
}

/// Compile the tenancy + permission + filter predicates shared by `find`
/// and delete-by-query.
///
/// Everything that appears in a statement's `WHERE` clause except joins
/// and cursor pagination, which only `find` needs.
#[allow(clippy::too_many_arguments)]
pub fn compile_where_clauses(
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
    metadata_read: bool,
) -> Result<(Vec<String>, Vec<Param>)> {
    let mut binds: Vec<Param> = Vec::new();
    let mut where_clauses: Vec<String> = Vec::new();

    if shared_tables {
        if metadata_read {
            where_clauses.push("(main._tenant = ? OR main._tenant IS NULL)".to_string());
        } else {
            where_clauses.push("main._tenant = ?".to_string());
        }
        if tenant_id.is_none() {
            tracing::warn!(collection = %collection.id, "compiling shared-table statement without a tenant id");
        }
        binds.push(tenant_id.map_or(Param::Null, Param::Int));
    }

    if needs_document_security_join(collection) {
        let perms_table = name_mangler::qualified_perms_table(quote, schema, namespace, &collection.id);
        let (exists_sql, bound_type, bound_roles) = compile_exists_clause(&perms_table, "main", PermissionType::Read, roles);
        where_clauses.push(exists_sql);
        binds.push(Param::Text(bound_type));
        binds.push(Param::TextArray(bound_roles));
    }

    for f in filters {
        let sql = compile(f, quote, dialect, language, &mut binds)?;
        if !sql.is_empty() {
            where_clauses.push(sql);
        }
    }

    Ok((where_clauses, binds))
}

fn flatten_joins(joins: &[JoinClause], out: &mut String) {
    for j in joins {
        out.push(' ');
        out.push_str(&j.sql);
        flatten_joins(&j.children, out);
    }
}

/// Resolve the effective order list: the caller's orders, defaulting to
/// `_id ASC` when empty, with a tie-breaking `_id` appended in the same
/// direction as the last order when not already present.
fn resolve_order(spec: &QuerySpec<'_>) -> (Vec<String>, Vec<OrderDirection>) {
    let mut attrs = spec.order_attributes.clone();
    let mut dirs = spec.order_directions.clone();

    if attrs.is_empty() {
        attrs.push("_id".to_string());
        dirs.push(OrderDirection::Asc);
    }

    if spec.cursor_direction == CursorDirection::Before {
        dirs = dirs.into_iter().map(OrderDirection::flipped).collect();
    }

    if !attrs.iter().any(|a| a == "_id") {
        let tie_dir = *dirs.last().unwrap_or(&OrderDirection::Asc);
        attrs.push("_id".to_string());
        dirs.push(tie_dir);
    }

    (attrs, dirs)
}

/// Compile the cursor predicate: `N` disjoined groups for a multi-attribute
/// cursor, or one comparison for a single `$sequence` cursor.
fn compile_cursor(
    cursor_row: &[(String, Value)],
    order_attrs: &[String],
    order_dirs: &[OrderDirection],
    direction: CursorDirection,
    quote: &dyn Fn(&str) -> String,
    binds: &mut Vec<Param>,
) -> Result<String> {
    if cursor_row.is_empty() {
        return Ok(String::new());
    }

    if cursor_row.len() == 1 && cursor_row[0].0 == "_id" {
        let op = cursor_direction_operator(direction, order_dirs.first().copied().unwrap_or(OrderDirection::Asc));
        binds.push(Param::from(&cursor_row[0].1));
        return Ok(format!("main._id {op} ?"));
    }

    let mut groups = Vec::with_capacity(cursor_row.len());
    for k in 0..cursor_row.len() {
        let mut parts = Vec::with_capacity(k + 1);
        for (attr, value) in cursor_row.iter().take(k) {
            binds.push(Param::from(value));
            parts.push(format!("{} = ?", quote(attr)));
        }
        let (attr_k, value_k) = &cursor_row[k];
        let dir_k = order_dirs
            .iter()
            .zip(order_attrs.iter())
            .find(|(_, a)| *a == attr_k)
            .map_or(OrderDirection::Asc, |(d, _)| *d);
        let op = cursor_direction_operator(direction, dir_k);
        binds.push(Param::from(value_k));
        parts.push(format!("{} {op} ?", quote(attr_k)));
        groups.push(format!("({})", parts.join(" AND ")));
    }
    Ok(format!("({})", groups.join(" OR ")))
}

/// The comparison operator for one cursor term.
///
/// `order_dirs` passed in here already reflects `resolve_order`'s
/// direction flip for `cursorDirection=before`, so the operator follows
/// the (possibly flipped) order direction directly — flipping again here
/// would cancel that adjustment out.
const fn cursor_direction_operator(_direction: CursorDirection, adjusted_order: OrderDirection) -> &'static str {
    adjusted_order.comparison_operator()
}

/// Build the projection list: reserved columns aliased to their
/// dollar-names, a literal `$collection`, `$tenant` in shared-table mode,
/// and explicitly selected user attributes.
fn build_projection(spec: &QuerySpec<'_>, shared_tables: bool, quote: &dyn Fn(&str) -> String) -> String {
    let mut cols = vec![
        "main._uid AS \"$id\"".to_string(),
        "main._id AS \"$sequence\"".to_string(),
        "main._createdAt AS \"$createdAt\"".to_string(),
        "main._updatedAt AS \"$updatedAt\"".to_string(),
        "main._permissions AS \"$permissions\"".to_string(),
        format!("'{}' AS \"$collection\"", spec.collection.id),
    ];
    if shared_tables {
        cols.push("main._tenant AS \"$tenant\"".to_string());
    }

    let selected: Vec<&String> = if spec.selections.is_empty() {
        spec.collection.attributes.iter().filter(|a| a.is_physical()).map(|a| &a.key).collect()
    } else {
        spec.selections.iter().collect()
    };
    for key in selected {
        cols.push(format!("main.{} AS {}", quote(key), quote(key)));
    }

    for node in &spec.populate {
        if !node.authorized {
            continue;
        }
        for sel in &node.selections {
            cols.push(format!(
                "rel_0_0.{} AS {}",
                quote(sel),
                quote(&format!("{}_{}", node.attribute, sel))
            ));
        }
    }

    cols.join(", ")
}
