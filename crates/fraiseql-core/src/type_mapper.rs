//! Logical attribute type → physical column type mapping, and row-width
//! estimation for the per-collection width limit.

use crate::schema::{AttributeType, Collection};

/// A dialect's physical column type rendering is dialect-specific, but the
/// *estimated width in bytes* used for the row-width limit is shared.
#[must_use]
pub fn estimated_width(attr_type: AttributeType, size: u32, array: bool) -> u32 {
    let base = match attr_type {
        AttributeType::String => {
            if size == 0 {
                256
            } else {
                size.min(65_535)
            }
        }
        AttributeType::Integer => match size {
            0..=2 => 2,
            3..=4 => 4,
            _ => 8,
        },
        AttributeType::Float => 8,
        AttributeType::Boolean => 1,
        AttributeType::Timestamptz => 8,
        AttributeType::Json => 256,
        AttributeType::Uuid => 16,
        AttributeType::Relationship => 255,
        AttributeType::Virtual => 0,
    };
    if array {
        base.saturating_mul(4)
    } else {
        base
    }
}

/// Postgres physical column type for a given attribute shape.
///
/// Returns `None` for `Virtual` (and the non-owning side of a relationship,
/// which the caller filters out before calling this).
#[must_use]
pub fn postgres_column_type(attr_type: AttributeType, size: u32, array: bool) -> Option<String> {
    let base = match attr_type {
        AttributeType::String => {
            if size == 0 || size > 255 {
                "TEXT".to_string()
            } else {
                format!("VARCHAR({size})")
            }
        }
        AttributeType::Integer => match size {
            0..=2 => "SMALLINT".to_string(),
            3..=4 => "INTEGER".to_string(),
            _ => "BIGINT".to_string(),
        },
        AttributeType::Float => "DOUBLE PRECISION".to_string(),
        AttributeType::Boolean => "BOOLEAN".to_string(),
        AttributeType::Timestamptz => "TIMESTAMP WITH TIME ZONE".to_string(),
        AttributeType::Json => "JSONB".to_string(),
        AttributeType::Uuid => "UUID".to_string(),
        AttributeType::Relationship => "VARCHAR(255)".to_string(),
        AttributeType::Virtual => return None,
    };
    Some(if array { format!("{base}[]") } else { base })
}

/// MySQL physical column type. An `array=true` attribute is promoted to
/// `JSON` rather than carrying a dialect-native array type.
#[must_use]
pub fn mysql_column_type(attr_type: AttributeType, size: u32, array: bool) -> Option<String> {
    if array {
        return match attr_type {
            AttributeType::Virtual => None,
            _ => Some("JSON".to_string()),
        };
    }
    let base = match attr_type {
        AttributeType::String => {
            if size == 0 || size > 255 {
                "TEXT".to_string()
            } else {
                format!("VARCHAR({size})")
            }
        }
        AttributeType::Integer => match size {
            0..=2 => "SMALLINT".to_string(),
            3..=4 => "INT".to_string(),
            _ => "BIGINT".to_string(),
        },
        AttributeType::Float => "DOUBLE".to_string(),
        AttributeType::Boolean => "TINYINT(1)".to_string(),
        AttributeType::Timestamptz => "TIMESTAMP".to_string(),
        AttributeType::Json => "JSON".to_string(),
        AttributeType::Uuid => "CHAR(36)".to_string(),
        AttributeType::Relationship => "VARCHAR(255)".to_string(),
        AttributeType::Virtual => return None,
    };
    Some(base)
}

/// Sum the estimated width of every physical attribute on a collection,
/// plus the fixed reserved columns (`_id`, `_uid`, `_createdAt`,
/// `_updatedAt`, `_permissions`).
#[must_use]
pub fn estimated_row_width(collection: &Collection, shared_tables: bool) -> u32 {
    const RESERVED: u32 = 8 + 255 + 8 + 8 + 256;
    let tenant = if shared_tables { 8 } else { 0 };
    let attrs: u32 = collection
        .attributes
        .iter()
        .filter(|a| a.is_physical())
        .map(|a| estimated_width(a.attr_type, a.size, a.array))
        .sum();
    RESERVED + tenant + attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_short_string_is_varchar() {
        assert_eq!(postgres_column_type(AttributeType::String, 100, false).unwrap(), "VARCHAR(100)");
    }

    #[test]
    fn postgres_long_string_is_text() {
        assert_eq!(postgres_column_type(AttributeType::String, 1000, false).unwrap(), "TEXT");
    }

    #[test]
    fn postgres_integer_sizes_map_correctly() {
        assert_eq!(postgres_column_type(AttributeType::Integer, 2, false).unwrap(), "SMALLINT");
        assert_eq!(postgres_column_type(AttributeType::Integer, 4, false).unwrap(), "INTEGER");
        assert_eq!(postgres_column_type(AttributeType::Integer, 8, false).unwrap(), "BIGINT");
    }

    #[test]
    fn postgres_array_flag_appends_brackets() {
        assert_eq!(postgres_column_type(AttributeType::Integer, 4, true).unwrap(), "INTEGER[]");
    }

    #[test]
    fn postgres_virtual_has_no_column() {
        assert!(postgres_column_type(AttributeType::Virtual, 0, false).is_none());
    }

    #[test]
    fn mysql_array_promotes_to_json() {
        assert_eq!(mysql_column_type(AttributeType::Integer, 4, true).unwrap(), "JSON");
    }

    #[test]
    fn mysql_non_array_uses_native_types() {
        assert_eq!(mysql_column_type(AttributeType::Boolean, 0, false).unwrap(), "TINYINT(1)");
    }
}
