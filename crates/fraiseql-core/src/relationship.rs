//! Relationship Graph: JOIN emission for populate trees, bounded by
//! `RELATION_MAX_DEPTH`.

use fraiseql_error::{EngineError, Result};

use crate::db::Param;
use crate::filters::{compile, DialectFamily, Filter};
use crate::name_mangler;
use crate::permissions::RoleSet;
use crate::schema::{Collection, RelationSide, RelationType};

/// Maximum traversal depth; cycles are permitted at the schema level but
/// forbidden beyond this bound at traversal time.
pub const RELATION_MAX_DEPTH: u32 = 3;

/// Junction-table metadata for a many-to-many populate node.
///
/// Resolved by the caller from the owning attribute's `RelationshipOptions`
/// (the relationship attribute lives on the parent, not the related
/// collection, so the join compiler cannot derive this on its own).
#[derive(Debug, Clone)]
pub struct JunctionInfo {
    /// The physical junction table name (see [`name_mangler::junction_table_name`]).
    pub table: String,
    /// The FK column referencing the parent side's `_uid`.
    pub parent_fk: String,
    /// The FK column referencing the child side's `_uid`.
    pub child_fk: String,
}

/// One node of a populate tree.
#[derive(Debug, Clone)]
pub struct PopulateNode {
    /// The relationship attribute key on the parent.
    pub attribute: String,
    /// The related collection.
    pub collection: Collection,
    /// Cardinality of the relationship, from the owning attribute's
    /// `RelationshipOptions` on the parent.
    pub relation_type: RelationType,
    /// Which side of the relationship the parent sits on.
    pub side: RelationSide,
    /// Junction-table metadata; set only when `relation_type` is `ManyToMany`.
    pub junction: Option<JunctionInfo>,
    /// Filters to apply to the related rows.
    pub filters: Vec<Filter>,
    /// Attribute keys selected from the related collection.
    pub selections: Vec<String>,
    /// Nested populate nodes.
    pub children: Vec<PopulateNode>,
    /// Whether the caller is authorized to traverse this node; unauthorized
    /// nodes are pruned silently rather than erroring.
    pub authorized: bool,
}

/// One compiled JOIN: its alias and the full `LEFT JOIN ...` clause.
#[derive(Debug, Clone)]
pub struct JoinClause {
    /// The alias assigned to the related table (`rel_{depth}_{index}`).
    pub alias: String,
    /// The complete `LEFT JOIN` SQL text.
    pub sql: String,
    /// The populate node this join was compiled from, for downstream
    /// projection/row-reassembly.
    pub node: PopulateNode,
    /// Nested joins produced by this node's children.
    pub children: Vec<JoinClause>,
}

/// Compile the `LEFT JOIN` clauses for a populate tree rooted at `main`.
///
/// # Errors
///
/// Returns [`EngineError::Limit`] if traversal would exceed
/// [`RELATION_MAX_DEPTH`].
#[allow(clippy::too_many_arguments)]
pub fn compile_joins(
    nodes: &[PopulateNode],
    parent_alias: &str,
    depth: u32,
    quote: &dyn Fn(&str) -> String,
    dialect: DialectFamily,
    language: &str,
    schema: &str,
    namespace: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
    roles: &RoleSet,
    binds: &mut Vec<Param>,
) -> Result<Vec<JoinClause>> {
    if depth > RELATION_MAX_DEPTH {
        return Err(EngineError::limit(format!(
            "relationship traversal exceeds RELATION_MAX_DEPTH ({RELATION_MAX_DEPTH})"
        )));
    }
    let mut out = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if !node.authorized {
            continue;
        }
        let alias = format!("rel_{depth}_{i}");
        let related = &node.collection;

        let mut predicate = join_predicate(
            parent_alias,
            &alias,
            &node.attribute,
            node.relation_type,
            node.side,
            node.junction.as_ref(),
            schema,
            shared_tables,
            tenant_id,
            quote,
            binds,
        );

        if crate::permissions::needs_document_security_join(related) {
            let perms_table = name_mangler::qualified_perms_table(quote, schema, namespace, &related.id);
            let (exists_sql, bound_type, bound_roles) = crate::permissions::compile_exists_clause(
                &perms_table,
                &alias,
                crate::schema::PermissionType::Read,
                roles,
            );
            predicate.push_str(&format!(" AND {exists_sql}"));
            binds.push(Param::Text(bound_type));
            binds.push(Param::TextArray(bound_roles));
        }

        if shared_tables {
            predicate.push_str(&format!(" AND ({alias}._tenant = ? OR {alias}._tenant IS NULL)"));
            binds.push(tenant_id.map_or(Param::Null, Param::Int));
        }

        let mut filter_binds = Vec::new();
        let mut filter_sql_parts = Vec::new();
        for f in &node.filters {
            let sql = compile(f, quote, dialect, language, &mut filter_binds)?;
            if !sql.is_empty() {
                filter_sql_parts.push(sql);
            }
        }
        if !filter_sql_parts.is_empty() {
            predicate.push_str(" AND ");
            predicate.push_str(&filter_sql_parts.join(" AND "));
            binds.extend(filter_binds);
        }

        let table = name_mangler::qualified_table(quote, schema, namespace, &related.id);
        let sql = format!("LEFT JOIN {table} AS {alias} ON {predicate}");

        let children = compile_joins(
            &node.children,
            &alias,
            depth + 1,
            quote,
            dialect,
            language,
            schema,
            namespace,
            shared_tables,
            tenant_id,
            roles,
            binds,
        )?;

        out.push(JoinClause { alias, sql, node: node.clone(), children });
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn join_predicate(
    parent_alias: &str,
    child_alias: &str,
    attribute: &str,
    relation_type: RelationType,
    side: RelationSide,
    junction: Option<&JunctionInfo>,
    schema: &str,
    shared_tables: bool,
    tenant_id: Option<i64>,
    quote: &dyn Fn(&str) -> String,
    binds: &mut Vec<Param>,
) -> String {
    let attr_col = quote(attribute);
    match (relation_type, side) {
        (RelationType::OneToOne | RelationType::ManyToOne, RelationSide::Parent) => {
            format!("{parent_alias}.{attr_col} = {child_alias}._uid")
        }
        (RelationType::OneToOne | RelationType::ManyToOne, RelationSide::Child) => {
            format!("{parent_alias}._uid = {child_alias}.{attr_col}")
        }
        (RelationType::OneToMany, RelationSide::Parent) => {
            format!("{parent_alias}._uid = {child_alias}.{attr_col}")
        }
        (RelationType::OneToMany, RelationSide::Child) => {
            format!("{parent_alias}.{attr_col} = {child_alias}._uid")
        }
        (RelationType::ManyToMany, _) => {
            let junction = junction.expect("many-to-many populate node must carry junction info");
            let table = name_mangler::qualified_physical(quote, schema, &junction.table);
            let parent_fk = quote(&junction.parent_fk);
            let child_fk = quote(&junction.child_fk);
            let mut sql = format!(
                "EXISTS (SELECT 1 FROM {table} jt WHERE jt.{parent_fk} = {parent_alias}._uid AND jt.{child_fk} = {child_alias}._uid"
            );
            if shared_tables {
                sql.push_str(" AND jt._tenant = ?");
                binds.push(tenant_id.map_or(Param::Null, Param::Int));
            }
            sql.push(')');
            sql
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name_mangler::quote_postgres;
    use crate::schema::Collection;

    fn related_collection() -> Collection {
        Collection {
            id: "posts".into(),
            name: "posts".into(),
            document_security: false,
            permissions: vec![],
            attributes: vec![],
            indexes: vec![],
        }
    }

    fn many_to_one_node() -> PopulateNode {
        PopulateNode {
            attribute: "author".into(),
            collection: related_collection(),
            relation_type: RelationType::ManyToOne,
            side: RelationSide::Parent,
            junction: None,
            filters: vec![],
            selections: vec![],
            children: vec![],
            authorized: true,
        }
    }

    #[test]
    fn root_depth_aliases_are_rel_0_n() {
        let nodes = vec![many_to_one_node()];
        let roles = RoleSet::new(vec!["any".into()]);
        let mut binds = vec![];
        let joins = compile_joins(
            &nodes, "main", 0, &quote_postgres, DialectFamily::Postgres, "english", "public", "ns", false, None, &roles, &mut binds,
        )
        .unwrap();
        assert_eq!(joins[0].alias, "rel_0_0");
        assert!(joins[0].sql.starts_with("LEFT JOIN \"public\".\"ns_posts\" AS rel_0_0 ON"));
    }

    #[test]
    fn many_to_one_join_predicate_matches_parent_column_to_child_uid() {
        let nodes = vec![many_to_one_node()];
        let roles = RoleSet::new(vec!["any".into()]);
        let mut binds = vec![];
        let joins = compile_joins(
            &nodes, "main", 0, &quote_postgres, DialectFamily::Postgres, "english", "public", "ns", false, None, &roles, &mut binds,
        )
        .unwrap();
        assert!(joins[0].sql.contains("main.\"author\" = rel_0_0._uid"));
    }

    #[test]
    fn unauthorized_nodes_are_pruned() {
        let mut node = many_to_one_node();
        node.authorized = false;
        let roles = RoleSet::new(vec![]);
        let mut binds = vec![];
        let joins = compile_joins(
            &[node], "main", 0, &quote_postgres, DialectFamily::Postgres, "english", "public", "ns", false, None, &roles, &mut binds,
        )
        .unwrap();
        assert!(joins.is_empty());
    }

    #[test]
    fn depth_beyond_max_raises_limit_error() {
        let nodes = vec![many_to_one_node()];
        let roles = RoleSet::new(vec![]);
        let mut binds = vec![];
        let err = compile_joins(
            &nodes,
            "main",
            RELATION_MAX_DEPTH + 1,
            &quote_postgres,
            DialectFamily::Postgres,
            "english",
            "public",
            "ns",
            false,
            None,
            &roles,
            &mut binds,
        )
        .unwrap_err();
        assert_eq!(err.kind(), fraiseql_error::ErrorKind::Limit);
    }

    #[test]
    fn shared_table_mode_adds_tenant_predicate() {
        let nodes = vec![many_to_one_node()];
        let roles = RoleSet::new(vec![]);
        let mut binds = vec![];
        let joins = compile_joins(
            &nodes, "main", 0, &quote_postgres, DialectFamily::Postgres, "english", "public", "ns", true, Some(7), &roles, &mut binds,
        )
        .unwrap();
        assert!(joins[0].sql.contains("_tenant = ? OR rel_0_0._tenant IS NULL"));
        assert_eq!(binds, vec![Param::Int(7)]);
    }

    #[test]
    fn many_to_many_join_emits_junction_exists_clause() {
        let node = PopulateNode {
            attribute: "friends".into(),
            collection: related_collection(),
            relation_type: RelationType::ManyToMany,
            side: RelationSide::Parent,
            junction: Some(JunctionInfo {
                table: name_mangler::junction_table_name("users", "users", "friends", "friendOf"),
                parent_fk: "friends_fk".into(),
                child_fk: "friendOf_fk".into(),
            }),
            filters: vec![],
            selections: vec![],
            children: vec![],
            authorized: true,
        };
        let roles = RoleSet::new(vec![]);
        let mut binds = vec![];
        let joins = compile_joins(
            &[node], "main", 0, &quote_postgres, DialectFamily::Postgres, "english", "public", "ns", true, Some(3), &roles, &mut binds,
        )
        .unwrap();
        assert!(joins[0].sql.contains("EXISTS (SELECT 1 FROM \"public\".\"_users_users_friends_friendOf\" jt"));
        assert!(joins[0].sql.contains("jt.\"friends_fk\" = main._uid"));
        assert!(joins[0].sql.contains("jt.\"friendOf_fk\" = rel_0_0._uid"));
        assert!(joins[0].sql.contains("jt._tenant = ?"));
        assert_eq!(binds.first(), Some(&Param::Int(3)));
    }
}
