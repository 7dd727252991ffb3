//! The bind-parameter type threaded through compilation, decoupled from any
//! concrete wire driver.

use crate::schema::Value;

/// A single positional bind parameter. Distinct from [`Value`] because a
/// compiled statement also binds things no [`Value`] represents on its own
/// (a role array, a permission type literal).
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
    /// An array of text values, bound as `ARRAY[...]` (Postgres) or a JSON
    /// array literal (MySQL).
    TextArray(Vec<String>),
    /// Raw JSON, bound as a `jsonb`/`json` parameter.
    Json(serde_json::Value),
    /// Resolved at execution time to the `_id` returned by the immediately
    /// preceding INSERT/UPDATE statement in the same
    /// [`crate::mutation::CompiledMutation`]. The planner performs no I/O
    /// (§5); the transaction executor that runs these statements in
    /// sequence must substitute the concrete value (Postgres
    /// `RETURNING _id`, or MySQL `LAST_INSERT_ID()`) before binding.
    LastInsertId,
    /// Like [`Param::LastInsertId`], but for the `i`-th row (0-indexed, in
    /// `VALUES` row order) of the immediately preceding multi-row
    /// `INSERT ... RETURNING` statement — used so a batch insert's
    /// permission rows each reference their own document's `_id`.
    BatchInsertId(usize),
}

impl From<&Value> for Param {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(n) => Self::Int(*n),
            Value::Float(f) => Self::Float(*f),
            Value::String(s) => Self::Text(s.clone()),
            Value::Timestamp(t) => Self::Text(t.to_rfc3339()),
            Value::Uuid(u) => Self::Text(u.to_string()),
            Value::Bytes(b) => Self::Text(hex::encode(b)),
            Value::Json(j) => Self::Json(j.clone()),
            Value::Array(items) => {
                let json_items: Vec<serde_json::Value> =
                    items.iter().map(|item| serde_json::Value::from(&Self::from(item))).collect();
                Self::Json(serde_json::Value::Array(json_items))
            }
            Value::Doc(_) => Self::Null,
        }
    }
}

impl From<&Param> for serde_json::Value {
    fn from(p: &Param) -> Self {
        match p {
            Param::Null => Self::Null,
            Param::Bool(b) => Self::Bool(*b),
            Param::Int(n) => Self::Number((*n).into()),
            Param::Float(f) => serde_json::Number::from_f64(*f).map_or(Self::Null, Self::Number),
            Param::Text(s) => Self::String(s.clone()),
            Param::TextArray(items) => Self::Array(items.iter().cloned().map(Self::String).collect()),
            Param::Json(j) => j.clone(),
            // The executor resolves these against a prior statement's result before
            // binding; a literal JSON rendering is never meaningful for them.
            Param::LastInsertId | Param::BatchInsertId(_) => Self::Null,
        }
    }
}

/// The ordered bind list a compiled statement accumulates. Appends happen
/// left-to-right as the compiler walks the AST, matching the textual order
/// of `?` placeholders (the ordering guarantee in §5).
#[derive(Debug, Clone, Default)]
pub struct Binds(pub Vec<Param>);

impl Binds {
    /// An empty bind list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, returning its 1-based position.
    pub fn push(&mut self, param: Param) -> usize {
        self.0.push(param);
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_push_returns_1_based_position() {
        let mut binds = Binds::new();
        assert_eq!(binds.push(Param::Int(1)), 1);
        assert_eq!(binds.push(Param::Int(2)), 2);
    }

    #[test]
    fn value_to_param_maps_scalars() {
        assert_eq!(Param::from(&Value::Int(5)), Param::Int(5));
        assert_eq!(Param::from(&Value::Null), Param::Null);
        assert_eq!(Param::from(&Value::String("x".into())), Param::Text("x".into()));
    }
}
