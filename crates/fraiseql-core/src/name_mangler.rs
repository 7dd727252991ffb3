//! Identifier sanitization, quoting, and physical name derivation.
//!
//! Grounded on the teacher's `db::identifier` quoting helpers, generalized
//! to the two dialects this engine supports and extended with the
//! sha1-truncated physical index naming scheme this data model requires.

use sha1::{Digest, Sha1};

use fraiseql_error::{EngineError, Result};

/// Sanitize a caller-supplied identifier: keep only `[A-Za-z0-9_-]`.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] if the result is empty.
pub fn sanitize(name: &str) -> Result<String> {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return Err(EngineError::structure(format!(
            "identifier '{name}' sanitizes to empty"
        )));
    }
    Ok(cleaned)
}

/// Quote a single identifier component for Postgres (`"..."`).
#[must_use]
pub fn quote_postgres(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a single identifier component for MySQL (`` `...` ``).
#[must_use]
pub fn quote_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a dot-separated identifier path, one component at a time.
#[must_use]
pub fn quote_path(path: &str, quote_one: impl Fn(&str) -> String) -> String {
    path.split('.').map(quote_one).collect::<Vec<_>>().join(".")
}

/// The physical main-table name: `{namespace}_{collectionId}`.
#[must_use]
pub fn table_name(namespace: &str, collection_id: &str) -> String {
    format!("{namespace}_{collection_id}")
}

/// The physical perms side-table name: `{namespace}_{collectionId}_perms`.
#[must_use]
pub fn perms_table_name(namespace: &str, collection_id: &str) -> String {
    format!("{namespace}_{collection_id}_perms")
}

/// The physical junction-table name for a many-to-many relationship.
#[must_use]
pub fn junction_table_name(
    parent_seq: &str,
    child_seq: &str,
    attribute: &str,
    two_way_key: &str,
) -> String {
    format!("_{parent_seq}_{child_seq}_{attribute}_{two_way_key}")
}

/// The schema-qualified, quoted main table reference: `{schema}.{namespace}_{id}`,
/// each component quoted separately per §4.A.
#[must_use]
pub fn qualified_table(quote: &dyn Fn(&str) -> String, schema: &str, namespace: &str, collection_id: &str) -> String {
    format!("{}.{}", quote(schema), quote(&table_name(namespace, collection_id)))
}

/// The schema-qualified, quoted perms side-table reference.
#[must_use]
pub fn qualified_perms_table(quote: &dyn Fn(&str) -> String, schema: &str, namespace: &str, collection_id: &str) -> String {
    format!("{}.{}", quote(schema), quote(&perms_table_name(namespace, collection_id)))
}

/// The schema-qualified, quoted reference to an already-mangled physical
/// table name (e.g. a junction table from [`junction_table_name`]).
#[must_use]
pub fn qualified_physical(quote: &dyn Fn(&str) -> String, schema: &str, physical_name: &str) -> String {
    format!("{}.{}", quote(schema), quote(physical_name))
}

/// Physical index name: `sha1(schema_namespace_table_name)[0..40]`, kept
/// within backend identifier-length limits and unique across collections
/// sharing a schema.
#[must_use]
pub fn index_name(schema: &str, namespace: &str, table: &str, name: &str) -> String {
    let input = format!("{schema}_{namespace}_{table}_{name}");
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(digest);
    hex[..40.min(hex.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize("foo bar!baz").unwrap(), "foobarbaz");
    }

    #[test]
    fn sanitize_rejects_all_disallowed_input() {
        assert!(sanitize("!!!").is_err());
    }

    #[test]
    fn quote_postgres_escapes_embedded_quote() {
        assert_eq!(quote_postgres(r#"foo"bar"#), "\"foo\"\"bar\"");
    }

    #[test]
    fn quote_mysql_wraps_in_backticks() {
        assert_eq!(quote_mysql("foo"), "`foo`");
    }

    #[test]
    fn quote_path_quotes_each_component() {
        assert_eq!(quote_path("public.users", quote_postgres), "\"public\".\"users\"");
    }

    #[test]
    fn index_name_is_40_hex_chars_and_deterministic() {
        let a = index_name("public", "ns", "ns_users", "email_idx");
        let b = index_name("public", "ns", "ns_users", "email_idx");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn index_name_differs_per_collection() {
        let a = index_name("public", "ns", "ns_users", "email_idx");
        let b = index_name("public", "ns", "ns_posts", "email_idx");
        assert_ne!(a, b);
    }

    #[test]
    fn qualified_table_quotes_schema_and_mangled_name_separately() {
        assert_eq!(qualified_table(&quote_postgres, "public", "ns", "users"), "\"public\".\"ns_users\"");
    }

    #[test]
    fn qualified_perms_table_appends_perms_suffix() {
        assert_eq!(qualified_perms_table(&quote_postgres, "public", "ns", "users"), "\"public\".\"ns_users_perms\"");
    }
}
