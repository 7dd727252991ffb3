//! Role Set & Permission Grammar: the `allows` predicate and the compiled
//! `EXISTS` subquery used to enforce it at the SQL level.

use crate::schema::{Collection, Permission, PermissionType};

/// The caller's active roles, in the order the role provider returned them.
#[derive(Debug, Clone, Default)]
pub struct RoleSet {
    roles: Vec<String>,
}

impl RoleSet {
    /// Build a role set from an ordered role list.
    #[must_use]
    pub const fn new(roles: Vec<String>) -> Self {
        Self { roles }
    }

    /// The roles, in order.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Whether any of the given permission's role matches a role in this set.
    #[must_use]
    pub fn overlaps(&self, permissions: &[Permission], kind: PermissionType) -> bool {
        permissions
            .iter()
            .any(|p| p.kind == kind && self.roles.iter().any(|r| r == &p.role))
    }
}

/// Collection-level gate: true if the collection's own `$permissions` grant
/// `kind` to any role in `roles` — checked in-process, never compiled into
/// SQL.
#[must_use]
pub fn collection_allows(collection: &Collection, kind: PermissionType, roles: &RoleSet) -> bool {
    roles.overlaps(&collection.permissions, kind)
}

/// Whether document-level permission enforcement is needed at all.
///
/// Only when `documentSecurity` is set does the compiler need to join the
/// `EXISTS` subquery against the perms side-table.
#[must_use]
pub const fn needs_document_security_join(collection: &Collection) -> bool {
    collection.document_security
}

/// Render the `EXISTS` subquery fragment restricting rows to those with a matching permission.
///
/// The perms side-table must hold a `(type, role ∈ roles)` row; binds the
/// permission type and the role array as the next two positional
/// parameters.
///
/// Returns `(sql_fragment, bound_type, bound_roles)`; the caller appends
/// `bound_type` then `bound_roles` to the shared bind list, in that order,
/// matching the left-to-right placeholder order in the fragment.
pub fn compile_exists_clause(
    perms_table: &str,
    main_alias: &str,
    kind: PermissionType,
    roles: &RoleSet,
) -> (String, String, Vec<String>) {
    let sql = format!(
        "EXISTS (SELECT 1 FROM {perms_table} p WHERE p._document = {main_alias}._id AND p._type = ? AND p._permissions && ARRAY[?])"
    );
    (sql, kind.as_str().to_string(), roles.roles().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Collection;

    fn empty_collection(document_security: bool, perms: Vec<Permission>) -> Collection {
        Collection {
            id: "users".into(),
            name: "users".into(),
            document_security,
            permissions: perms,
            attributes: vec![],
            indexes: vec![],
        }
    }

    #[test]
    fn collection_allows_true_when_role_matches() {
        let perms = vec![Permission { kind: PermissionType::Read, role: "any".into() }];
        let collection = empty_collection(false, perms);
        let roles = RoleSet::new(vec!["any".into()]);
        assert!(collection_allows(&collection, PermissionType::Read, &roles));
    }

    #[test]
    fn collection_allows_false_when_no_role_matches() {
        let perms = vec![Permission { kind: PermissionType::Read, role: "admin".into() }];
        let collection = empty_collection(false, perms);
        let roles = RoleSet::new(vec!["user:1".into()]);
        assert!(!collection_allows(&collection, PermissionType::Read, &roles));
    }

    #[test]
    fn document_security_join_needed_only_when_flagged() {
        assert!(needs_document_security_join(&empty_collection(true, vec![])));
        assert!(!needs_document_security_join(&empty_collection(false, vec![])));
    }

    #[test]
    fn compile_exists_clause_binds_type_then_roles() {
        let roles = RoleSet::new(vec!["user:1".into(), "team:2".into()]);
        let (sql, bound_type, bound_roles) =
            compile_exists_clause("ns_users_perms", "main", PermissionType::Read, &roles);
        assert!(sql.starts_with("EXISTS (SELECT 1"));
        assert_eq!(bound_type, "read");
        assert_eq!(bound_roles, vec!["user:1".to_string(), "team:2".to_string()]);
    }
}
