//! Integration tests exercising the six concrete scenarios from the
//! testable-properties section, end to end through the compiler modules,
//! against a fake driver that never touches a real database.
#![cfg(test)]
#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use fraiseql_core::db::{Dialect, Param, Postgres, Row, SqlDriver};
use fraiseql_core::mutation::plan_insert;
use fraiseql_core::name_mangler;
use fraiseql_core::permissions::RoleSet;
use fraiseql_core::query::{compile_query, CursorDirection, OrderDirection, QuerySpec};
use fraiseql_core::relationship::{compile_joins, JunctionInfo, PopulateNode};
use fraiseql_core::schema::collection::{
    Attribute, AttributeType, Collection, Index, IndexOrder, IndexType, RelationSide, RelationType,
};
use fraiseql_core::schema::store::plan_create_relationship;
use fraiseql_core::schema::Document;
use fraiseql_error::ErrorKind;

/// Records unique `(collection, column, value)` triples and raises the
/// dialect's duplicate-key error on a repeat insert, simulating exactly
/// enough of a unique index to drive scenario 1 without a real database.
struct FakeSqlDriver {
    seen_emails: Mutex<HashSet<String>>,
}

impl FakeSqlDriver {
    fn new() -> Self {
        Self { seen_emails: Mutex::new(HashSet::new()) }
    }
}

#[async_trait]
impl SqlDriver for FakeSqlDriver {
    async fn query(&self, sql: &str, params: &[Param]) -> fraiseql_error::Result<Vec<Row>> {
        if sql.starts_with("INSERT") {
            if let Some(Param::Text(email)) = params.iter().find(|p| matches!(p, Param::Text(s) if s.contains('@'))) {
                if !self.seen_emails.lock().unwrap().insert(email.clone()) {
                    return Err(Postgres.map_error(Some("23505"), "duplicate key value violates unique constraint"));
                }
            }
        }
        Ok(vec![])
    }

    fn quote(&self, literal: &str) -> String {
        format!("'{literal}'")
    }

    async fn ping(&self) -> fraiseql_error::Result<()> {
        Ok(())
    }
}

fn quote_postgres(s: &str) -> String {
    format!("\"{s}\"")
}

fn users_collection() -> Collection {
    Collection {
        id: "users".into(),
        name: "users".into(),
        document_security: false,
        permissions: vec![],
        attributes: vec![
            Attribute {
                id: "a1".into(),
                key: "name".into(),
                attr_type: AttributeType::String,
                size: 100,
                required: true,
                default: None,
                array: false,
                signed: false,
                options: None,
                filters: vec![],
            },
            Attribute {
                id: "a2".into(),
                key: "email".into(),
                attr_type: AttributeType::String,
                size: 255,
                required: true,
                default: None,
                array: false,
                signed: false,
                options: None,
                filters: vec![],
            },
            Attribute {
                id: "a3".into(),
                key: "age".into(),
                attr_type: AttributeType::Integer,
                size: 4,
                required: false,
                default: None,
                array: false,
                signed: true,
                options: None,
                filters: vec![],
            },
        ],
        indexes: vec![Index {
            id: "email_unique".into(),
            index_type: IndexType::Unique,
            attributes: vec!["email".into()],
            orders: vec![IndexOrder::Asc],
        }],
    }
}

#[tokio::test]
async fn scenario_1_duplicate_unique_index_raises_duplicate() {
    let collection = users_collection();
    let driver = FakeSqlDriver::new();

    let mut first = Document::new();
    first.set("name", "a").set("email", "a@x");
    let compiled_first = plan_insert(&collection, &first, &quote_postgres, "public", "ns", false, None).unwrap();
    for (sql, binds) in &compiled_first.statements {
        driver.query(sql, binds).await.unwrap();
    }

    let mut second = Document::new();
    second.set("name", "b").set("email", "a@x");
    let compiled_second = plan_insert(&collection, &second, &quote_postgres, "public", "ns", false, None).unwrap();
    let mut result = Ok(vec![]);
    for (sql, binds) in &compiled_second.statements {
        result = driver.query(sql, binds).await;
        if result.is_err() {
            break;
        }
    }

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);
}

fn posts_collection() -> Collection {
    Collection {
        id: "posts".into(),
        name: "posts".into(),
        document_security: false,
        permissions: vec![],
        attributes: vec![
            Attribute {
                id: "p1".into(),
                key: "title".into(),
                attr_type: AttributeType::String,
                size: 200,
                required: true,
                default: None,
                array: false,
                signed: false,
                options: None,
                filters: vec![],
            },
            Attribute {
                id: "p2".into(),
                key: "author".into(),
                attr_type: AttributeType::Relationship,
                size: 255,
                required: true,
                default: None,
                array: false,
                signed: false,
                options: None,
                filters: vec![],
            },
        ],
        indexes: vec![],
    }
}

#[test]
fn scenario_2_populate_join_aliases_author_relationship() {
    let posts = posts_collection();
    let roles = RoleSet::new(vec!["any".into()]);
    let node = PopulateNode {
        attribute: "author".into(),
        collection: users_collection(),
        relation_type: RelationType::ManyToOne,
        side: RelationSide::Parent,
        junction: None,
        filters: vec![],
        selections: vec!["name".into()],
        children: vec![],
        authorized: true,
    };
    let mut binds = Vec::new();
    let joins = compile_joins(
        &[node],
        "main",
        0,
        &quote_postgres,
        fraiseql_core::filters::DialectFamily::Postgres,
        "english",
        "public",
        "ns",
        false,
        None,
        &roles,
        &mut binds,
    )
    .unwrap();

    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].alias, "rel_0_0");
    assert!(joins[0].sql.contains("LEFT JOIN"));
    assert!(joins[0].sql.contains("main.\"author\" = rel_0_0._uid"));

    let spec = QuerySpec {
        collection: &posts,
        filters: vec![],
        populate: vec![PopulateNode {
            attribute: "author".into(),
            collection: users_collection(),
            relation_type: RelationType::ManyToOne,
            side: RelationSide::Parent,
            junction: None,
            filters: vec![],
            selections: vec!["name".into()],
            children: vec![],
            authorized: true,
        }],
        selections: vec![],
        order_attributes: vec!["title".into()],
        order_directions: vec![OrderDirection::Asc],
        cursor: None,
        cursor_direction: CursorDirection::After,
        limit: 10,
        offset: 0,
    };
    let compiled = compile_query(
        &spec,
        &quote_postgres,
        fraiseql_core::filters::DialectFamily::Postgres,
        "english",
        "public",
        "ns",
        false,
        None,
        &roles,
        false,
    )
    .unwrap();
    assert!(compiled.sql.contains("AS \"author_name\""));
    assert!(compiled.sql.starts_with("SELECT DISTINCT"));
}

#[test]
fn scenario_3_shared_table_tenant_isolation_binds_distinct_tenants() {
    let users = users_collection();
    let roles = RoleSet::new(vec!["any".into()]);

    let mut doc = Document::new();
    doc.set("name", "a").set("email", "a@x");
    let insert_for_7 = plan_insert(&users, &doc, &quote_postgres, "public", "ns", true, Some(7)).unwrap();
    assert!(matches!(insert_for_7.statements[0].1[4], Param::Int(7)));
    assert!(insert_for_7.statements[0].0.contains("\"public\".\"ns_users\""));

    let spec = QuerySpec {
        collection: &users,
        filters: vec![],
        populate: vec![],
        selections: vec![],
        order_attributes: vec![],
        order_directions: vec![],
        cursor: None,
        cursor_direction: CursorDirection::After,
        limit: 10,
        offset: 0,
    };
    let compiled_for_8 = compile_query(
        &spec,
        &quote_postgres,
        fraiseql_core::filters::DialectFamily::Postgres,
        "english",
        "public",
        "ns",
        true,
        Some(8),
        &roles,
        false,
    )
    .unwrap();
    assert!(compiled_for_8.sql.contains("main._tenant = ?"));
    assert!(matches!(compiled_for_8.binds[0], Param::Int(8)));
}

#[test]
fn scenario_4_placeholder_order_matches_spec() {
    use fraiseql_core::filters::{Filter, Op};

    let posts = posts_collection();
    let roles = RoleSet::new(vec!["any".into()]);
    let spec = QuerySpec {
        collection: &posts,
        filters: vec![
            Filter::Leaf {
                attr: "status".into(),
                op: Op::Eq,
                values: vec!["draft".into(), "review".into()],
                array_attr: false,
            },
            Filter::Leaf {
                attr: "views".into(),
                op: Op::Gt,
                values: vec!["100".into()],
                array_attr: false,
            },
        ],
        populate: vec![],
        selections: vec![],
        order_attributes: vec!["views".into()],
        order_directions: vec![OrderDirection::Desc],
        cursor: None,
        cursor_direction: CursorDirection::After,
        limit: 25,
        offset: 0,
    };
    let first = compile_query(
        &spec,
        &quote_postgres,
        fraiseql_core::filters::DialectFamily::Postgres,
        "english",
        "public",
        "ns",
        false,
        None,
        &roles,
        false,
    )
    .unwrap();
    let second = compile_query(
        &spec,
        &quote_postgres,
        fraiseql_core::filters::DialectFamily::Postgres,
        "english",
        "public",
        "ns",
        false,
        None,
        &roles,
        false,
    )
    .unwrap();

    assert_eq!(first.sql, second.sql, "recompiling identical inputs must be deterministic");
    assert_eq!(first.binds.len(), 4);
    assert!(matches!(&first.binds[0], Param::Text(v) if v == "draft"));
    assert!(matches!(&first.binds[1], Param::Text(v) if v == "review"));
    assert!(matches!(&first.binds[2], Param::Text(v) if v == "100"));
    assert!(matches!(first.binds[3], Param::Int(25)));
}

#[test]
fn scenario_5_permission_diff_deletes_one_updates_one_inserts_none() {
    use fraiseql_core::mutation::diff_permissions;
    use fraiseql_core::schema::{Permission, PermissionType};

    let old = vec![
        Permission { kind: PermissionType::Read, role: "user:1".into() },
        Permission { kind: PermissionType::Update, role: "user:1".into() },
    ];
    let new = vec![
        Permission { kind: PermissionType::Read, role: "user:1".into() },
        Permission { kind: PermissionType::Read, role: "user:2".into() },
    ];
    let diff = diff_permissions(&old, &new);

    assert!(diff.insert.is_empty());
    assert_eq!(diff.delete.len(), 1);
    assert_eq!(diff.delete[0], PermissionType::Update);
    assert_eq!(diff.update.len(), 1);
    assert_eq!(diff.update[0].0, PermissionType::Read);
    assert_eq!(diff.update[0].1, vec!["user:1".to_string(), "user:2".to_string()]);
}

#[test]
fn scenario_6_many_to_many_junction_and_nested_aliases() {
    let users = users_collection();
    let stmts = plan_create_relationship(
        &Postgres,
        "public",
        "ns",
        &users,
        &users,
        RelationType::ManyToMany,
        true,
        "friends",
        "friendOf",
        true,
    )
    .unwrap();
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].0.contains("friends_fk"));
    assert!(stmts[0].0.contains("friendOf_fk"));
    assert!(stmts[0].0.contains("PRIMARY KEY"));
    assert!(stmts[0].0.contains("_tenant"));

    let roles = RoleSet::new(vec!["any".into()]);
    let junction = JunctionInfo {
        table: name_mangler::junction_table_name("users", "users", "friends", "friendOf"),
        parent_fk: "friends_fk".into(),
        child_fk: "friendOf_fk".into(),
    };
    let leaf = PopulateNode {
        attribute: "friends".into(),
        collection: users_collection(),
        relation_type: RelationType::ManyToMany,
        side: RelationSide::Parent,
        junction: Some(junction.clone()),
        filters: vec![],
        selections: vec![],
        children: vec![],
        authorized: true,
    };
    let root = PopulateNode {
        attribute: "friends".into(),
        collection: users_collection(),
        relation_type: RelationType::ManyToMany,
        side: RelationSide::Parent,
        junction: Some(junction),
        filters: vec![],
        selections: vec![],
        children: vec![leaf],
        authorized: true,
    };
    let mut binds = Vec::new();
    let joins = compile_joins(
        &[root],
        "main",
        0,
        &quote_postgres,
        fraiseql_core::filters::DialectFamily::Postgres,
        "english",
        "public",
        "ns",
        true,
        Some(3),
        &roles,
        &mut binds,
    )
    .unwrap();

    assert_eq!(joins[0].alias, "rel_0_0");
    assert!(joins[0].sql.contains("EXISTS (SELECT 1 FROM \"public\".\"_users_users_friends_friendOf\" jt"));
    assert_eq!(joins[0].children[0].alias, "rel_1_0");
    assert!(joins[0].children[0].sql.contains("jt.\"friends_fk\" = rel_0_0._uid"));
}
