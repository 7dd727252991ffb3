//! Collections, attributes, indexes, and the relationship metadata attached
//! to relationship-typed attributes.

use serde::{Deserialize, Serialize};

use super::document::Permission;

/// Logical attribute type. `Virtual` contributes no physical column;
/// `Relationship` contributes one only on the owning side (see
/// [`RelationType::owning_side`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    /// Variable-length text.
    String,
    /// Signed integer.
    Integer,
    /// Floating point.
    Float,
    /// Boolean.
    Boolean,
    /// Timestamp with time zone.
    Timestamptz,
    /// Arbitrary JSON document.
    Json,
    /// UUID.
    Uuid,
    /// A relationship to another collection.
    Relationship,
    /// Contributes no column; computed or client-side only.
    Virtual,
}

/// Cardinality of a relationship attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    /// One parent document relates to exactly one child document.
    OneToOne,
    /// One parent document relates to many child documents.
    OneToMany,
    /// Many parent documents relate to one child document.
    ManyToOne,
    /// Many parent documents relate to many child documents via a junction table.
    ManyToMany,
}

impl RelationType {
    /// Whether the given side of this relationship type owns the physical
    /// foreign-key-style column (or, for `ManyToMany`, whether a junction
    /// table is required — always true, same for both sides).
    ///
    /// Owning side: `OneToOne` parent; `ManyToOne` parent; `OneToMany` child;
    /// `ManyToMany` neither (both map to the junction table).
    #[must_use]
    pub const fn owning_side(self, side: RelationSide) -> bool {
        match (self, side) {
            (Self::OneToOne | Self::ManyToOne, RelationSide::Parent) => true,
            (Self::OneToMany, RelationSide::Child) => true,
            (Self::ManyToMany, _) => false,
            _ => false,
        }
    }
}

/// Which side of a relationship attribute this attribute declaration sits on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationSide {
    /// The parent side.
    Parent,
    /// The child side.
    Child,
}

/// Deletion policy applied when the related document is deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnDelete {
    /// Cascade the delete to related documents.
    Cascade,
    /// Set the relationship column to null.
    SetNull,
    /// Refuse the delete (raises [`fraiseql_error::EngineError::Restricted`]).
    Restrict,
}

/// Relationship-specific metadata carried by a `Relationship` attribute's
/// `options`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipOptions {
    /// The related collection's id.
    pub related_collection: String,
    /// Cardinality of the relationship.
    pub relation_type: RelationType,
    /// Whether the inverse side is also materialized as a (virtual or
    /// physical) attribute.
    pub two_way: bool,
    /// The attribute key used on the inverse side, when `two_way` is set.
    pub two_way_key: Option<String>,
    /// Which side this attribute declaration is on.
    pub side: RelationSide,
    /// Deletion policy.
    pub on_delete: OnDelete,
}

/// A typed field declaration within a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    /// Internal attribute id.
    #[serde(rename = "$id")]
    pub id: String,
    /// The attribute's key (column name once mangled).
    pub key: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Declared size: string length, or integer byte width (2/4/8).
    pub size: u32,
    /// Whether a value is required on create.
    pub required: bool,
    /// Default value, if any.
    pub default: Option<super::document::Value>,
    /// Whether this attribute holds an array of values.
    pub array: bool,
    /// Whether an integer attribute is signed.
    pub signed: bool,
    /// Relationship metadata; set only when `attr_type == Relationship`.
    pub options: Option<RelationshipOptions>,
    /// Filter/transform identifiers applied on read (opaque to the engine;
    /// validated and applied by a boundary validator, not this crate).
    pub filters: Vec<String>,
}

impl Attribute {
    /// Whether this attribute contributes a physical column to the main
    /// table: every attribute does, except `Virtual` attributes and the
    /// non-owning side of a relationship.
    #[must_use]
    pub fn is_physical(&self) -> bool {
        match self.attr_type {
            AttributeType::Virtual => false,
            AttributeType::Relationship => self
                .options
                .as_ref()
                .is_some_and(|o| o.relation_type.owning_side(o.side)),
            _ => true,
        }
    }
}

/// Sort order for an indexed attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// The kind of physical index to create.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexType {
    /// A plain B-tree (or dialect equivalent) index.
    Key,
    /// A unique constraint/index.
    Unique,
    /// A full-text index (GIN over `to_tsvector` on Postgres, `FULLTEXT` on MySQL).
    FullText,
}

/// An index declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Internal index id.
    #[serde(rename = "$id")]
    pub id: String,
    /// Index kind.
    #[serde(rename = "type")]
    pub index_type: IndexType,
    /// Attribute keys the index covers, in order.
    pub attributes: Vec<String>,
    /// Per-attribute sort order, parallel to `attributes`.
    pub orders: Vec<IndexOrder>,
}

/// A named set of documents with a shared schema, stored as a document in
/// the reserved `_metadata` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Internal collection id (used to derive the physical table name).
    pub id: String,
    /// Human-facing name.
    pub name: String,
    /// Whether row-level document permissions are enforced for this collection.
    pub document_security: bool,
    /// Collection-level permission tuples.
    #[serde(rename = "$permissions")]
    pub permissions: Vec<Permission>,
    /// Declared attributes, in order.
    pub attributes: Vec<Attribute>,
    /// Declared indexes, in order.
    pub indexes: Vec<Index>,
}

impl Collection {
    /// Look up a declared attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }

    /// Validate the cross-referencing invariants from the data model:
    /// every declared index references only declared attribute keys, and
    /// no two attributes share a `$id`.
    ///
    /// # Errors
    ///
    /// Returns `Err` describing the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen_ids = std::collections::HashSet::new();
        for attr in &self.attributes {
            if !seen_ids.insert(&attr.id) {
                return Err(format!("duplicate attribute id: {}", attr.id));
            }
        }
        for index in &self.indexes {
            for key in &index.attributes {
                if self.attribute(key).is_none() {
                    return Err(format!(
                        "index '{}' references unknown attribute '{key}'",
                        index.id
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_attr(id: &str, key: &str) -> Attribute {
        Attribute {
            id: id.into(),
            key: key.into(),
            attr_type: AttributeType::String,
            size: 255,
            required: false,
            default: None,
            array: false,
            signed: false,
            options: None,
            filters: vec![],
        }
    }

    #[test]
    fn owning_side_matches_spec_table() {
        assert!(RelationType::OneToOne.owning_side(RelationSide::Parent));
        assert!(!RelationType::OneToOne.owning_side(RelationSide::Child));
        assert!(RelationType::ManyToOne.owning_side(RelationSide::Parent));
        assert!(RelationType::OneToMany.owning_side(RelationSide::Child));
        assert!(!RelationType::OneToMany.owning_side(RelationSide::Parent));
        assert!(!RelationType::ManyToMany.owning_side(RelationSide::Parent));
        assert!(!RelationType::ManyToMany.owning_side(RelationSide::Child));
    }

    #[test]
    fn virtual_attribute_is_never_physical() {
        let mut attr = string_attr("a1", "ghost");
        attr.attr_type = AttributeType::Virtual;
        assert!(!attr.is_physical());
    }

    #[test]
    fn non_owning_relationship_side_is_not_physical() {
        let mut attr = string_attr("a1", "author");
        attr.attr_type = AttributeType::Relationship;
        attr.options = Some(RelationshipOptions {
            related_collection: "users".into(),
            relation_type: RelationType::OneToMany,
            two_way: true,
            two_way_key: Some("posts".into()),
            side: RelationSide::Parent,
            on_delete: OnDelete::Cascade,
        });
        assert!(!attr.is_physical());
    }

    #[test]
    fn validate_rejects_index_on_unknown_attribute() {
        let collection = Collection {
            id: "users".into(),
            name: "users".into(),
            document_security: false,
            permissions: vec![],
            attributes: vec![string_attr("a1", "email")],
            indexes: vec![Index {
                id: "idx1".into(),
                index_type: IndexType::Unique,
                attributes: vec!["missing".into()],
                orders: vec![IndexOrder::Asc],
            }],
        };
        assert!(collection.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_attribute_ids() {
        let collection = Collection {
            id: "users".into(),
            name: "users".into(),
            document_security: false,
            permissions: vec![],
            attributes: vec![string_attr("a1", "email"), string_attr("a1", "name")],
            indexes: vec![],
        };
        assert!(collection.validate().is_err());
    }
}
