//! Filter Compiler: `And`/`Or`/`Not`/`Leaf` filter trees compiled to
//! parameterized SQL with a shared, left-to-right bind list.

use fraiseql_error::{EngineError, Result};

use crate::db::Param;
use crate::schema::Value;

/// Filter comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `BETWEEN`
    Between,
    /// `LIKE` with a trailing wildcard.
    StartsWith,
    /// `LIKE` with a leading wildcard.
    EndsWith,
    /// Substring match, or array containment when the attribute is an array.
    Contains,
    /// Full-text search.
    Search,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

/// A leaf-level comparison, or a nested boolean combinator.
#[derive(Debug, Clone)]
pub enum Filter {
    /// `attr op values`.
    Leaf { attr: String, op: Op, values: Vec<Value>, array_attr: bool },
    /// Conjunction of one or more filters.
    And(Vec<Filter>),
    /// Disjunction of one or more filters.
    Or(Vec<Filter>),
    /// Negation of one filter.
    Not(Box<Filter>),
}

/// The SQL dialect family a leaf compiles against, for the two cases where
/// Postgres and MySQL diverge (`contains` on array attributes, `search`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectFamily {
    /// Postgres-specific fragments.
    Postgres,
    /// MySQL-specific fragments.
    MySql,
}

/// Split an attribute reference of the form `col->key` or `col->>key` into
/// `(column, Some(operator, inner_key))`, or `(attr, None)` if there is no
/// JSON path.
fn split_json_path(attr: &str) -> (String, Option<(&'static str, String)>) {
    if let Some(idx) = attr.find("->>") {
        let col = attr[..idx].to_string();
        let key = attr[idx + 3..].to_string();
        return (col, Some(("->>", key)));
    }
    if let Some(idx) = attr.find("->") {
        let col = attr[..idx].to_string();
        let key = attr[idx + 2..].to_string();
        return (col, Some(("->", key)));
    }
    (attr.to_string(), None)
}

fn escape_like_wildcards(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn value_as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("{other:?}"),
    }
}

/// Sanitize a `search` term: drop reserved tokens, append a trailing `*`
/// unless the whole term was quoted (an exact match).
fn sanitize_search_term(raw: &str) -> String {
    const RESERVED: &[&str] = &["AND", "OR", "NOT", "&", "|", "!", "(", ")", ":", "*"];
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        return trimmed.to_string();
    }
    let mut cleaned = trimmed.to_string();
    for token in RESERVED {
        cleaned = cleaned.replace(token, "");
    }
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        cleaned
    } else {
        format!("{cleaned}*")
    }
}

/// Compile a filter tree to a SQL fragment, appending bind parameters to
/// `binds` in left-to-right order. An empty `And`/`Or` group compiles to
/// the empty string.
///
/// # Errors
///
/// Returns [`EngineError::Query`] for arity mismatches (`between` without
/// exactly two values) or for `contains` on a MySQL array attribute (the
/// resolved open question: no silent `LIKE` fallback).
pub fn compile(
    filter: &Filter,
    quote: &dyn Fn(&str) -> String,
    dialect: DialectFamily,
    language: &str,
    binds: &mut Vec<Param>,
) -> Result<String> {
    match filter {
        Filter::And(children) => compile_group(children, "AND", quote, dialect, language, binds),
        Filter::Or(children) => compile_group(children, "OR", quote, dialect, language, binds),
        Filter::Not(inner) => {
            let sql = compile(inner, quote, dialect, language, binds)?;
            if sql.is_empty() {
                Ok(String::new())
            } else {
                Ok(format!("NOT ({sql})"))
            }
        }
        Filter::Leaf { attr, op, values, array_attr } => {
            compile_leaf(attr, *op, values, *array_attr, quote, dialect, language, binds)
        }
    }
}

fn compile_group(
    children: &[Filter],
    joiner: &str,
    quote: &dyn Fn(&str) -> String,
    dialect: DialectFamily,
    language: &str,
    binds: &mut Vec<Param>,
) -> Result<String> {
    let mut parts = Vec::new();
    for child in children {
        let sql = compile(child, quote, dialect, language, binds)?;
        if !sql.is_empty() {
            parts.push(sql);
        }
    }
    if parts.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("({})", parts.join(&format!(" {joiner} "))))
}

#[allow(clippy::too_many_lines)]
fn compile_leaf(
    attr: &str,
    op: Op,
    values: &[Value],
    array_attr: bool,
    quote: &dyn Fn(&str) -> String,
    dialect: DialectFamily,
    language: &str,
    binds: &mut Vec<Param>,
) -> Result<String> {
    let (col, json_path) = split_json_path(attr);
    let col_sql = match &json_path {
        Some((operator, key)) => format!("{}{operator}'{}'", quote(&col), key.replace('\'', "''")),
        None => quote(&col),
    };

    match op {
        Op::Eq | Op::Ne => {
            if values.is_empty() {
                return Err(EngineError::query(attr, "equality filter requires at least one value"));
            }
            for v in values {
                binds.push(Param::from(v));
            }
            if values.len() == 1 {
                let cmp = if op == Op::Eq { "=" } else { "!=" };
                Ok(format!("{col_sql} {cmp} ?"))
            } else {
                let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                let kw = if op == Op::Eq { "IN" } else { "NOT IN" };
                Ok(format!("{col_sql} {kw} ({placeholders})"))
            }
        }
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let v = values.first().ok_or_else(|| EngineError::query(attr, "comparison filter requires one value"))?;
            binds.push(Param::from(v));
            let cmp = match op {
                Op::Lt => "<",
                Op::Le => "<=",
                Op::Gt => ">",
                Op::Ge => ">=",
                _ => unreachable!(),
            };
            Ok(format!("{col_sql} {cmp} ?"))
        }
        Op::Between => {
            if values.len() != 2 {
                return Err(EngineError::query(attr, "between requires exactly two values"));
            }
            binds.push(Param::from(&values[0]));
            binds.push(Param::from(&values[1]));
            Ok(format!("{col_sql} BETWEEN ? AND ?"))
        }
        Op::StartsWith | Op::EndsWith => {
            let v = values.first().ok_or_else(|| EngineError::query(attr, "pattern filter requires one value"))?;
            let escaped = escape_like_wildcards(&value_as_text(v));
            let pattern = if op == Op::StartsWith { format!("{escaped}%") } else { format!("%{escaped}") };
            binds.push(Param::Text(pattern));
            Ok(format!("{col_sql} LIKE ?"))
        }
        Op::Contains => {
            if array_attr {
                let v = values.first().ok_or_else(|| EngineError::query(attr, "contains requires one value"))?;
                match dialect {
                    DialectFamily::Postgres => {
                        binds.push(Param::Json(serde_json::json!([value_as_text(v)])));
                        Ok(format!("{col_sql} @> ?::jsonb"))
                    }
                    DialectFamily::MySql => Err(EngineError::query(
                        attr,
                        "contains on an array attribute is not supported without JSON_OVERLAPS; no LIKE fallback is provided",
                    )),
                }
            } else {
                let v = values.first().ok_or_else(|| EngineError::query(attr, "contains requires one value"))?;
                let escaped = escape_like_wildcards(&value_as_text(v));
                binds.push(Param::Text(format!("%{escaped}%")));
                Ok(format!("{col_sql} LIKE ?"))
            }
        }
        Op::Search => {
            let v = values.first().ok_or_else(|| EngineError::query(attr, "search requires one value"))?;
            let sanitized = sanitize_search_term(&value_as_text(v));
            binds.push(Param::Text(sanitized));
            match dialect {
                DialectFamily::Postgres => {
                    Ok(format!("to_tsvector('{language}', {col_sql}) @@ plainto_tsquery('{language}', ?)"))
                }
                DialectFamily::MySql => Ok(format!("MATCH({col_sql}) AGAINST (? IN BOOLEAN MODE)")),
            }
        }
        Op::IsNull => Ok(format!("{col_sql} IS NULL")),
        Op::IsNotNull => Ok(format!("{col_sql} IS NOT NULL")),
    }
}
