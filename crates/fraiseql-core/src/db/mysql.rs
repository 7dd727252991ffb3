//! The MySQL dialect: concrete SQL text emission, no connection or pooling.

use fraiseql_error::{EngineError, Result};

use super::postgres::normalize_reserved_columns;
use super::traits::{Dialect, Row};
use crate::name_mangler;
use crate::schema::{Attribute, AttributeType, Collection, Index, IndexOrder, IndexType};
use crate::type_mapper;

/// MySQL dialect adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySql;

impl MySql {
    fn q(self, name: &str) -> String {
        name_mangler::quote_mysql(name)
    }

    fn column_ddl(self, attr: &Attribute) -> Result<String> {
        let ty = self
            .map_type(attr.attr_type, attr.size, attr.array)
            .ok_or_else(|| EngineError::structure(format!("attribute '{}' has no physical column", attr.key)))?;
        let not_null = if attr.required { " NOT NULL" } else { "" };
        Ok(format!("{} {ty}{not_null}", self.q(&attr.key)))
    }

    fn table(self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.q(schema), self.q(table))
    }
}

impl Dialect for MySql {
    fn quote(&self, identifier: &str) -> String {
        self.q(identifier)
    }

    fn map_type(&self, attr_type: AttributeType, size: u32, array: bool) -> Option<String> {
        type_mapper::mysql_column_type(attr_type, size, array)
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
            "_id BIGINT AUTO_INCREMENT PRIMARY KEY".to_string(),
            "_uid VARCHAR(255) NOT NULL".to_string(),
            "_createdAt TIMESTAMP NOT NULL".to_string(),
            "_updatedAt TIMESTAMP NOT NULL".to_string(),
            "_permissions JSON NOT NULL".to_string(),
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
        cols.push(format!("UNIQUE KEY ({unique_cols})"));
        Ok(format!("CREATE TABLE {} ({})", self.table(schema, &table), cols.join(", ")))
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
            "_id BIGINT AUTO_INCREMENT PRIMARY KEY".to_string(),
            "_type VARCHAR(12) NOT NULL".to_string(),
            "_permissions JSON NOT NULL".to_string(),
            format!(
                "_document BIGINT NOT NULL, FOREIGN KEY (_document) REFERENCES {}(_id) ON DELETE CASCADE",
                self.table(schema, &table)
            ),
        ];
        let unique_cols = if shared_tables {
            cols.push("_tenant BIGINT".to_string());
            "_document, _tenant, _type"
        } else {
            "_document, _type"
        };
        cols.push(format!("UNIQUE KEY ({unique_cols})"));
        Ok(format!("CREATE TABLE {} ({})", self.table(schema, &perms_table), cols.join(", ")))
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
            "ALTER TABLE {} ADD INDEX {} ((CAST(_permissions AS CHAR(512) ARRAY)))",
            self.table(schema, &perms_table),
            self.q(&index_name)
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

        if index.index_type == IndexType::FullText {
            let cols = index.attributes.iter().map(|k| self.q(k)).collect::<Vec<_>>().join(", ");
            return Ok(format!(
                "ALTER TABLE {} ADD FULLTEXT INDEX {} ({cols})",
                self.table(schema, &table),
                self.q(&physical)
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
            self.table(schema, &table),
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
        Ok(format!("ALTER TABLE {} {}", self.table(schema, &table), adds.join(", ")))
    }

    fn emit_ddl_drop_column(
        &self,
        schema: &str,
        namespace: &str,
        collection: &Collection,
        key: &str,
    ) -> Result<String> {
        let table = name_mangler::table_name(namespace, &collection.id);
        Ok(format!("ALTER TABLE {} DROP COLUMN {}", self.table(schema, &table), self.q(key)))
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
            self.table(schema, &table),
            self.q(from),
            self.q(to)
        ))
    }

    fn emit_ddl_drop_index(&self, schema: &str, physical_index_name: &str) -> Result<String> {
        Ok(format!("DROP INDEX {} ON {}", self.q(physical_index_name), self.q(schema)))
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
            self.table(schema, &table),
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
            self.table(schema, &junction),
            self.q(&parent_fk),
            self.q(&child_fk),
        ))
    }

    fn emit_upsert_clause(
        &self,
        _conflict_cols: &[&str],
        update_cols: &[&str],
        increment_col: Option<&str>,
        shared_tables: bool,
    ) -> String {
        let assignments: Vec<String> = update_cols
            .iter()
            .map(|c| {
                let col = self.q(c);
                let rhs = if Some(*c) == increment_col {
                    format!("{col} + VALUES({col})")
                } else {
                    format!("VALUES({col})")
                };
                if shared_tables {
                    let tenant = self.q("_tenant");
                    format!("{col} = IF({tenant} = VALUES({tenant}), {rhs}, {col})")
                } else {
                    format!("{col} = {rhs}")
                }
            })
            .collect();
        format!("ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
    }

    fn map_error(&self, code: Option<&str>, message: &str) -> EngineError {
        match code {
            Some("1062") => EngineError::Duplicate { what: "row".into(), identifier: message.to_string() },
            Some("1050" | "1060" | "1061") => {
                EngineError::Duplicate { what: "object".into(), identifier: message.to_string() }
            }
            Some("1146" | "1054") => {
                EngineError::NotFound { what: "object".into(), identifier: message.to_string() }
            }
            Some("1406") => EngineError::Truncate { attribute: message.to_string(), limit: 0 },
            Some("3024" | "1969") => EngineError::Timeout { timeout_ms: 0 },
            Some(code) => EngineError::Database { message: message.to_string(), code: Some(code.to_string()) },
            None => EngineError::database(message),
        }
    }

    fn normalize_row(&self, raw: &Row) -> Row {
        normalize_reserved_columns(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Permission;
    use crate::schema::PermissionType;

    fn users_collection() -> Collection {
        Collection {
            id: "users".into(),
            name: "users".into(),
            document_security: false,
            permissions: vec![Permission { kind: PermissionType::Read, role: "any".into() }],
            attributes: vec![Attribute {
                id: "a1".into(),
                key: "name".into(),
                attr_type: AttributeType::String,
                size: 100,
                required: true,
                default: None,
                array: true,
                signed: false,
                options: None,
                filters: vec![],
            }],
            indexes: vec![],
        }
    }

    #[test]
    fn array_attribute_is_promoted_to_json() {
        let my = MySql;
        let sql = my.emit_ddl_create_table("public", "ns", &users_collection(), false).unwrap();
        assert!(sql.contains("`name` JSON NOT NULL"));
    }

    #[test]
    fn junction_table_omits_tenant_when_not_shared() {
        let my = MySql;
        let sql = my
            .emit_ddl_create_junction_table("public", "ns", &users_collection(), &users_collection(), "friends", "friendOf", false)
            .unwrap();
        assert!(!sql.contains("_tenant"));
        assert!(sql.contains("PRIMARY KEY (`friends_fk`, `friendOf_fk`)"));
    }

    #[test]
    fn junction_table_adds_tenant_to_pk_when_shared() {
        let my = MySql;
        let sql = my
            .emit_ddl_create_junction_table("public", "ns", &users_collection(), &users_collection(), "friends", "friendOf", true)
            .unwrap();
        assert!(sql.contains("_tenant BIGINT"));
        assert!(sql.contains("PRIMARY KEY (_tenant, `friends_fk`, `friendOf_fk`)"));
    }

    #[test]
    fn map_error_classifies_duplicate_key() {
        let my = MySql;
        let err = my.map_error(Some("1062"), "dup");
        assert_eq!(err.kind(), fraiseql_error::ErrorKind::Duplicate);
    }

    #[test]
    fn fulltext_index_uses_mysql_syntax() {
        let my = MySql;
        let index = Index {
            id: "idx1".into(),
            index_type: IndexType::FullText,
            attributes: vec!["name".into()],
            orders: vec![IndexOrder::Asc],
        };
        let sql = my.emit_ddl_create_index("public", "ns", &users_collection(), &index, false).unwrap();
        assert!(sql.contains("ADD FULLTEXT INDEX"));
    }
}
