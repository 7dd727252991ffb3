//! Documents and the dynamic attribute bag that backs them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A tagged value stored in a document's attribute map.
///
/// Backend-native types (JSONB, native arrays, timestamps, ...) are
/// normalized onto this sum by each dialect's `normalize_row`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer (covers `SMALLINT`/`INTEGER`/`BIGINT`).
    Int(i64),
    /// Floating point (`DOUBLE PRECISION`).
    Float(f64),
    /// Text.
    String(String),
    /// Timestamp with time zone.
    Timestamp(DateTime<Utc>),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(uuid::Uuid),
    /// Arbitrary JSON (the `json` attribute type).
    Json(serde_json::Value),
    /// An array of values (an `array=true` attribute).
    Array(Vec<Value>),
    /// A nested document, produced by populating a relationship.
    Doc(Document),
}

impl Value {
    /// True if this value is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A permission tuple rendered as `type(role)`, e.g. `read(user:42)`.
///
/// `$permissions` is a *set*: duplicates are collapsed on write.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    /// Permission type: `read`, `create`, `update`, or `delete`.
    pub kind: PermissionType,
    /// The role string, e.g. `any`, `user:42`, `team:9/owner`.
    pub role: String,
}

/// The four permission types a collection or document can grant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    /// Read access.
    Read,
    /// Create access.
    Create,
    /// Update access.
    Update,
    /// Delete access.
    Delete,
}

impl PermissionType {
    /// The literal token used inside `type(role)` strings and the
    /// perms side-table's `_type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// All four permission types, in declaration order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Read, Self::Create, Self::Update, Self::Delete]
    }
}

impl Permission {
    /// Render as the canonical `type(role)` string, with embedded double
    /// quotes stripped per spec (storage normalization).
    #[must_use]
    pub fn to_tuple_string(&self) -> String {
        format!("{}({})", self.kind.as_str(), self.role.replace('"', ""))
    }

    /// Parse a `type(role)` string into a [`Permission`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string does not match `^(read|create|update|delete)\((.+)\)$`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let open = s.find('(').ok_or_else(|| format!("malformed permission: {s}"))?;
        if !s.ends_with(')') {
            return Err(format!("malformed permission: {s}"));
        }
        let kind_str = &s[..open];
        let role = &s[open + 1..s.len() - 1];
        if role.is_empty() {
            return Err(format!("empty role in permission: {s}"));
        }
        let kind = match kind_str {
            "read" => PermissionType::Read,
            "create" => PermissionType::Create,
            "update" => PermissionType::Update,
            "delete" => PermissionType::Delete,
            other => return Err(format!("unknown permission type: {other}")),
        };
        Ok(Self { kind, role: role.replace('"', "") })
    }
}

/// Deduplicate a sequence of permission tuples, preserving first-seen order.
#[must_use]
pub fn dedup_permissions(perms: &[Permission]) -> Vec<Permission> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(perms.len());
    for p in perms {
        let key = p.to_tuple_string();
        if seen.insert(key) {
            out.push(p.clone());
        }
    }
    out
}

/// An ordered mapping from attribute name to [`Value`], plus the document's
/// reserved keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// External string identifier, unique within a collection (and within a
    /// tenant in shared-table mode). Maximum length 255.
    #[serde(rename = "$id")]
    pub id: Option<String>,
    /// Internal monotonic integer identifier assigned by the store on insert.
    #[serde(rename = "$sequence")]
    pub sequence: Option<i64>,
    /// The owning collection's id.
    #[serde(rename = "$collection")]
    pub collection: Option<String>,
    /// Tenant id; present only in shared-table mode.
    #[serde(rename = "$tenant")]
    pub tenant: Option<i64>,
    /// Creation timestamp.
    #[serde(rename = "$createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last-update timestamp.
    #[serde(rename = "$updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Ordered, deduplicated permission tuples.
    #[serde(rename = "$permissions")]
    pub permissions: Vec<Permission>,
    /// User-declared attributes, in insertion order.
    #[serde(flatten)]
    pub attributes: IndexMap<String, Value>,
}

impl Document {
    /// An empty document with no reserved keys set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) an attribute value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Fetch an attribute value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Maximum length, in bytes, of `$id`.
    pub const MAX_ID_LEN: usize = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_round_trips_through_tuple_string() {
        let p = Permission { kind: PermissionType::Read, role: "user:42".into() };
        assert_eq!(p.to_tuple_string(), "read(user:42)");
        let parsed = Permission::parse("read(user:42)").unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn permission_parse_rejects_empty_role() {
        assert!(Permission::parse("read()").is_err());
    }

    #[test]
    fn permission_parse_strips_embedded_quotes() {
        let parsed = Permission::parse(r#"read(user:"42")"#).unwrap();
        assert_eq!(parsed.role, "user:42");
    }

    #[test]
    fn dedup_permissions_collapses_duplicates_preserving_order() {
        let perms = vec![
            Permission { kind: PermissionType::Read, role: "user:1".into() },
            Permission { kind: PermissionType::Update, role: "user:1".into() },
            Permission { kind: PermissionType::Read, role: "user:1".into() },
        ];
        let deduped = dedup_permissions(&perms);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].kind, PermissionType::Read);
        assert_eq!(deduped[1].kind, PermissionType::Update);
    }

    #[test]
    fn document_set_and_get_round_trip() {
        let mut doc = Document::new();
        doc.set("name", "ada").set("age", 36i64);
        assert_eq!(doc.get("name"), Some(&Value::String("ada".into())));
        assert_eq!(doc.get("age"), Some(&Value::Int(36)));
    }
}
