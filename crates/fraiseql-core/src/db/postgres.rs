//! The Postgres dialect: concrete SQL text emission, no connection or pooling.

use fraiseql_error::{EngineError, Result};

use super::traits::{Dialect, Row};
use crate::name_mangler;
use crate::schema::{Attribute, AttributeType, Collection, Index, IndexOrder, IndexType, Value};
use crate::type_mapper;

/// Postgres dialect adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Postgres;

impl Postgres {
    fn q(self, name: &str) -> String {
        name_mangler::quote_postgres(name)
    }

    fn qualified_table(self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.q(schema), self.q(table))
    }

    fn column_ddl(self, attr: &Attribute) -> Result<String> {
        let ty = self
            .map_type(attr.attr_type, attr.size, attr.array)
            .ok_or_else(|| EngineError::structure(format!("attribute '{}' has no physical column", attr.key)))?;
        let not_null = if attr.required { " NOT NULL" } else { "" };
        Ok(format!("{} {ty}{not_null}", self.q(&attr.key)))
    }
}

impl Dialect for Postgres {
    fn quote(&self, identifier: &str) -> String {
        self.q(identifier)
    }

    fn map_type(&self, attr_type: AttributeType, size: u32, array: bool) -> Option<String> {
        type_mapper::postgres_column_type(attr_type, size, array)
    }

    fn emit_ddl_create_table(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        shared_tables: bool,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        let mut cols = vec![
            "_id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY".to_string(),
            "_uid VARCHAR(255) NOT NULL".to_string(),
            "_createdAt TIMESTAMP WITH TIME ZONE NOT NULL".to_string(),
            "_updatedAt TIMESTAMP WITH TIME ZONE NOT NULL".to_string(),
            "_permissions TEXT[] NOT NULL DEFAULT '{}'".to_string(),
        ];
        if shared_tables {
            cols.push("_tenant BIGINT".to_string());
        }
        for attr in &collection.attributes {
            if attr.is_physical() {
                cols.push(self.column_ddl(attr)?);
            }
        }
        let unique_cols = if shared_tables { "_tenant, _uid" } else { "_uid" };
        cols.push(format!("UNIQUE ({unique_cols})"));
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.qualified_table(schema, &table),
            cols.join(", ")
        ))
    }

    fn emit_ddl_create_perms_table(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        shared_tables: bool,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        let perms_table = name_mangler::perms_table_name(namespace, &collection.id);
        let mut cols = vec![
            "_id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY".to_string(),
            "_type VARCHAR(12) NOT NULL".to_string(),
            "_permissions TEXT[] NOT NULL DEFAULT '{}'".to_string(),
            format!(
                "_document BIGINT NOT NULL REFERENCES {}(_id) ON DELETE CASCADE",
                self.qualified_table(schema, &table)
            ),
        ];
        let unique_cols = if shared_tables {
            cols.push("_tenant BIGINT".to_string());
            "_document, _tenant, _type"
        } else {
            "_document, _type"
        };
        cols.push(format!("UNIQUE ({unique_cols})"));
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.qualified_table(schema, &perms_table),
            cols.join(", ")
        ))
    }

    fn emit_ddl_create_perms_gin_index(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
    ) -> Result<String> {
        let perms_table = name_mangler::perms_table_name(namespace, &collection.id);
        let index_name = name_mangler::index_name(schema, namespace, &perms_table, "_permissions_gin");
        Ok(format!(
            "CREATE INDEX {} ON {} USING GIN (_permissions)",
            self.q(&index_name),
            self.qualified_table(schema, &perms_table)
        ))
    }

    fn emit_ddl_create_index(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        index: &Index,
        shared_tables: bool,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        let physical = name_mangler::index_name(schema, namespace, &table, &index.id);

        let uses_array = index.attributes.iter().any(|key| {
            collection.attribute(key).is_some_and(|a| a.array)
        });

        if index.index_type == IndexType::FullText {
            let cols = index
                .attributes
                .iter()
                .map(|k| self.q(k))
                .collect::<Vec<_>>()
                .join(" || ' ' || ");
            return Ok(format!(
                "CREATE INDEX {} ON {} USING GIN (to_tsvector('english', {cols}))",
                self.q(&physical),
                self.qualified_table(schema, &table)
            ));
        }

        if uses_array {
            let cols = index.attributes.iter().map(|k| self.q(k)).collect::<Vec<_>>().join(", ");
            return Ok(format!(
                "CREATE INDEX {} ON {} USING GIN ({cols})",
                self.q(&physical),
                self.qualified_table(schema, &table)
            ));
        }

        let unique = if index.index_type == IndexType::Unique { "UNIQUE " } else { "" };
        let mut cols: Vec<String> = Vec::new();
        if shared_tables {
            cols.push("_tenant".to_string());
        }
        for (key, order) in index.attributes.iter().zip(index.orders.iter()) {
            let dir = match order {
                IndexOrder::Asc => "ASC",
                IndexOrder::Desc => "DESC",
            };
            cols.push(format!("{} {dir}", self.q(key)));
        }
        Ok(format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            self.q(&physical),
            self.qualified_table(schema, &table),
            cols.join(", ")
        ))
    }

    fn emit_ddl_add_columns(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        attributes: &[Attribute],
        _shared_tables: bool,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        let mut adds = Vec::with_capacity(attributes.len());
        for attr in attributes {
            if attr.is_physical() {
                adds.push(format!("ADD COLUMN {}", self.column_ddl(attr)?));
            }
        }
        Ok(format!(
            "ALTER TABLE {} {}",
            self.qualified_table(schema, &table),
            adds.join(", ")
        ))
    }

    fn emit_ddl_drop_column(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        key: &str,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.qualified_table(schema, &table),
            self.q(key)
        ))
    }

    fn emit_ddl_rename_column(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        from: &str,
        to: &str,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        Ok(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.qualified_table(schema, &table),
            self.q(from),
            self.q(to)
        ))
    }

    fn emit_ddl_drop_index(&self, schema: &str, physical_index_name: &str) -> Result<String> {
        Ok(format!(
            "DROP INDEX {}.{}",
            self.q(schema),
            self.q(physical_index_name)
        ))
    }

    fn emit_ddl_add_relationship_column(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        key: &str,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {} VARCHAR(255)",
            self.qualified_table(schema, &table),
            self.q(key)
        ))
    }

    fn emit_ddl_create_junction_table(
        &self,
        schema: &str,
        _namespace: &str,
        parent: &Collection,
        child: &Collection,
        key_on_parent: &str,
        key_on_child: &str,
        shared_tables: bool,
    ) -> Result<String> {
        let junction = name_mangler::junction_table_name(&parent.id, &child.id, key_on_parent, key_on_child);
        let parent_fk = format!("{key_on_parent}_fk");
        let child_fk = format!("{key_on_child}_fk");
        let tenant_col = if shared_tables { ", _tenant BIGINT" } else { "" };
        let pk_cols = if shared_tables {
            format!("_tenant, {}, {}", self.q(&parent_fk), self.q(&child_fk))
        } else {
            format!("{}, {}", self.q(&parent_fk), self.q(&child_fk))
        };
        Ok(format!(
            "CREATE TABLE {} ({} VARCHAR(255) NOT NULL, {} VARCHAR(255) NOT NULL{tenant_col}, PRIMARY KEY ({pk_cols}))",
            self.qualified_table(schema, &junction),
            self.q(&parent_fk),
            self.q(&child_fk),
        ))
    }

    fn emit_upsert_clause(
        &self,
        conflict_cols: &[&str],
        update_cols: &[&str],
        increment_col: Option<&str>,
        shared_tables: bool,
    ) -> String {
        let conflict = conflict_cols.iter().map(|c| self.q(c)).collect::<Vec<_>>().join(", ");
        let assignments: Vec<String> = update_cols
            .iter()
            .map(|c| {
                let col = self.q(c);
                let rhs = if Some(*c) == increment_col {
                    format!("{col} + EXCLUDED.{col}")
                } else {
                    format!("EXCLUDED.{col}")
                };
                if shared_tables {
                    let tenant = self.q("_tenant");
                    format!("{col} = CASE WHEN {tenant} = EXCLUDED.{tenant} THEN {rhs} ELSE {col} END")
                } else {
                    format!("{col} = {rhs}")
                }
            })
            .collect();
        format!("ON CONFLICT ({conflict}) DO UPDATE SET {}", assignments.join(", "))
    }

    fn map_error(&self, code: Option<&str>, message: &str) -> EngineError {
        match code {
            Some("23505") => EngineError::Duplicate { what: "row".into(), identifier: message.to_string() },
            Some("42P07" | "42701") => {
                EngineError::Duplicate { what: "object".into(), identifier: message.to_string() }
            }
            Some("42P01" | "42703") => {
                EngineError::NotFound { what: "object".into(), identifier: message.to_string() }
            }
            Some("22001") => EngineError::Truncate { attribute: message.to_string(), limit: 0 },
            Some("57014") => EngineError::Timeout { timeout_ms: 0 },
            Some(code) => EngineError::Database { message: message.to_string(), code: Some(code.to_string()) },
            None => EngineError::database(message),
        }
    }

    fn normalize_row(&self, raw: &Row) -> Row {
        normalize_reserved_columns(raw)
    }
}

/// Shared reserved-column remapping used by both dialects: `_uid → $id`,
/// `_id → $sequence`, etc. `$permissions` is deduplicated after parsing.
pub(crate) fn normalize_reserved_columns(raw: &Row) -> Row {
    let mut out = Row::new();
    for (key, value) in raw {
        let mapped = match key.as_str() {
            "_uid" => "$id",
            "_id" => "$sequence",
            "_createdAt" => "$createdAt",
            "_updatedAt" => "$updatedAt",
            "_tenant" => "$tenant",
            "_permissions" => "$permissions",
            other => other,
        };
        out.insert(mapped.to_string(), value.clone());
    }
    if let Some(Value::Array(items)) = out.get("$permissions") {
        let mut seen = std::collections::BTreeSet::new();
        let mut deduped = Vec::new();
        for item in items {
            if let Value::String(s) = item {
                if seen.insert(s.clone()) {
                    deduped.push(Value::String(s.clone()));
                }
            }
        }
        out.insert("$permissions".to_string(), Value::Array(deduped));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Permission, PermissionType};

    fn string_attr(id: &str, key: &str, required: bool) -> Attribute {
        Attribute {
            id: id.into(),
            key: key.into(),
            attr_type: AttributeType::String,
            size: 100,
            required,
            default: None,
            array: false,
            signed: false,
            options: None,
            filters: vec![],
        }
    }

    fn users_collection() -> Collection {
        Collection {
            id: "users".into(),
            name: "users".into(),
            document_security: false,
            permissions: vec![Permission { kind: PermissionType::Read, role: "any".into() }],
            attributes: vec![string_attr("a1", "name", true)],
            indexes: vec![],
        }
    }

    #[test]
    fn create_table_includes_reserved_and_physical_columns() {
        let pg = Postgres;
        let sql = pg.emit_ddl_create_table("public", "ns", &users_collection(), false).unwrap();
        assert!(sql.starts_with("CREATE TABLE \"public\".\"ns_users\""));
        assert!(sql.contains("\"name\" VARCHAR(100) NOT NULL"));
        assert!(sql.contains("_uid VARCHAR(255) NOT NULL"));
        assert!(!sql.contains("_tenant"));
    }

    #[test]
    fn create_table_shared_mode_adds_tenant_column() {
        let pg = Postgres;
        let sql = pg.emit_ddl_create_table("public", "ns", &users_collection(), true).unwrap();
        assert!(sql.contains("_tenant BIGINT"));
        assert!(sql.contains("UNIQUE (_tenant, _uid)"));
    }

    #[test]
    fn junction_table_omits_tenant_when_not_shared() {
        let pg = Postgres;
        let sql = pg
            .emit_ddl_create_junction_table("public", "ns", &users_collection(), &users_collection(), "friends", "friendOf", false)
            .unwrap();
        assert!(!sql.contains("_tenant"));
        assert!(sql.contains("PRIMARY KEY (\"friends_fk\", \"friendOf_fk\")"));
    }

    #[test]
    fn junction_table_adds_tenant_to_pk_when_shared() {
        let pg = Postgres;
        let sql = pg
            .emit_ddl_create_junction_table("public", "ns", &users_collection(), &users_collection(), "friends", "friendOf", true)
            .unwrap();
        assert!(sql.contains("_tenant BIGINT"));
        assert!(sql.contains("PRIMARY KEY (_tenant, \"friends_fk\", \"friendOf_fk\")"));
    }

    #[test]
    fn perms_table_has_cascade_fk() {
        let pg = Postgres;
        let sql = pg.emit_ddl_create_perms_table("public", "ns", &users_collection(), false).unwrap();
        assert!(sql.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn index_name_is_sha1_truncated() {
        let pg = Postgres;
        let index = Index {
            id: "idx1".into(),
            index_type: IndexType::Unique,
            attributes: vec!["name".into()],
            orders: vec![IndexOrder::Asc],
        };
        let sql = pg.emit_ddl_create_index("public", "ns", &users_collection(), &index, false).unwrap();
        assert!(sql.starts_with("CREATE UNIQUE INDEX \""));
        assert!(sql.contains("\"name\" ASC"));
    }

    #[test]
    fn normalize_row_maps_reserved_columns_and_dedupes_permissions() {
        let mut raw = Row::new();
        raw.insert("_uid".into(), Value::String("abc".into()));
        raw.insert(
            "_permissions".into(),
            Value::Array(vec![
                Value::String("read(any)".into()),
                Value::String("read(any)".into()),
            ]),
        );
        let normalized = normalize_reserved_columns(&raw);
        assert_eq!(normalized.get("$id"), Some(&Value::String("abc".into())));
        if let Some(Value::Array(items)) = normalized.get("$permissions") {
            assert_eq!(items.len(), 1);
        } else {
            panic!("expected array");
        }
    }

    #[test]
    fn map_error_classifies_unique_violation() {
        let pg = Postgres;
        let err = pg.map_error(Some("23505"), "duplicate key");
        assert_eq!(err.kind(), fraiseql_error::ErrorKind::Duplicate);
    }
}
