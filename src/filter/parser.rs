//! Parser from JSON filter documents into a [`FilterAst`].
//!
//! Accepted shapes (one key per object):
//!
//! ```text
//! {"field": value}                   implicit equality
//! {"$op": {"field": value}}          $eq $ne $lt $lte $gt $gte $like $ilike
//! {"$in": {"field": [v1, v2]}}       also $nin
//! {"$and": [expr, expr, ...]}        also $or, two or more operands
//! ```

use serde_json::{Map, Value};

use super::ast::{CompareOp, FilterAst, Literal, LogicalOp, Scalar};
use crate::error::{Error, Result};

/// What a top-level object key refers to.
enum Key<'a> {
    Logical(LogicalOp),
    Compare(CompareOp),
    Field(&'a str),
}

fn classify(key: &str) -> Option<Key<'_>> {
    if let Some(op) = LogicalOp::from_keyword(key) {
        return Some(Key::Logical(op));
    }
    if let Some(op) = CompareOp::from_keyword(key) {
        return Some(Key::Compare(op));
    }
    if key.starts_with('$') {
        return None;
    }
    Some(Key::Field(key))
}

/// Parser state.
struct Parser {
    max_depth: usize,
}

impl Parser {
    /// Parse one expression object.
    fn parse_expr(&self, value: &Value, path: &str, depth: usize) -> Result<FilterAst> {
        if depth > self.max_depth {
            return Err(Error::DepthExceeded {
                max: self.max_depth,
            });
        }

        let Value::Object(map) = value else {
            return Err(Error::invalid(
                path,
                format!("expected an object, got {}", kind(value)),
            ));
        };
        let (key, inner) = single_entry(map, path)?;
        let child = format!("{path}.{key}");

        match classify(key) {
            Some(Key::Logical(op)) => self.parse_logical(op, inner, &child, depth),
            Some(Key::Compare(op)) => parse_comparison(op, inner, &child),
            Some(Key::Field(field)) => Ok(FilterAst::Compare {
                op: CompareOp::Eq,
                field: field.to_string(),
                value: parse_literal(CompareOp::Eq, inner, &child)?,
            }),
            None => Err(Error::invalid(path, format!("unknown operator {key}"))),
        }
    }

    /// Parse the operand list of `$and` / `$or`.
    fn parse_logical(
        &self,
        op: LogicalOp,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<FilterAst> {
        let Value::Array(items) = value else {
            return Err(Error::invalid(
                path,
                format!("expected a list of expressions, got {}", kind(value)),
            ));
        };
        if items.len() < 2 {
            return Err(Error::invalid(
                path,
                format!("expected at least 2 operands, got {}", items.len()),
            ));
        }

        let operands = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.parse_expr(item, &format!("{path}[{i}]"), depth + 1))
            .collect::<Result<Vec<_>>>()?;

        Ok(FilterAst::Logical { op, operands })
    }
}

/// Parse `{"field": value}` under an explicit comparison operator.
fn parse_comparison(op: CompareOp, value: &Value, path: &str) -> Result<FilterAst> {
    let Value::Object(map) = value else {
        return Err(Error::invalid(
            path,
            format!("expected a {{field: value}} object, got {}", kind(value)),
        ));
    };
    let (field, literal) = single_entry(map, path)?;
    let child = format!("{path}.{field}");

    Ok(FilterAst::Compare {
        op,
        field: field.to_string(),
        value: parse_literal(op, literal, &child)?,
    })
}

fn single_entry<'a>(map: &'a Map<String, Value>, path: &str) -> Result<(&'a str, &'a Value)> {
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((key, _)), None) if key.is_empty() => {
            Err(Error::invalid(path, "field name is empty"))
        }
        (Some((key, value)), None) => Ok((key.as_str(), value)),
        (None, _) => Err(Error::invalid(path, "empty nested expression")),
        (Some(_), Some(_)) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            Err(Error::invalid(
                path,
                format!("expected exactly one key, got {}", keys.join(", ")),
            ))
        }
    }
}

fn parse_literal(op: CompareOp, value: &Value, path: &str) -> Result<Literal> {
    match value {
        Value::Array(_) if !op.is_set() => Err(Error::invalid(
            path,
            format!("{} does not accept a list value", op.keyword()),
        )),
        Value::Array(items) if items.is_empty() => Err(Error::invalid(
            path,
            format!("{} requires a non-empty list", op.keyword()),
        )),
        Value::Array(items) => items
            .iter()
            .map(|item| parse_scalar(item, path))
            .collect::<Result<Vec<_>>>()
            .map(Literal::List),
        _ if op.is_set() => Err(Error::invalid(
            path,
            format!("{} requires a list value", op.keyword()),
        )),
        other => parse_scalar(other, path).map(Literal::Scalar),
    }
}

fn parse_scalar(value: &Value, path: &str) -> Result<Scalar> {
    match value {
        Value::String(s) => Ok(Scalar::String(s.clone())),
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Integer(i))
            } else if n.is_u64() {
                Err(Error::invalid(path, format!("integer {n} is out of range")))
            } else {
                n.as_f64()
                    .map(Scalar::Float)
                    .ok_or_else(|| Error::invalid(path, format!("unsupported number {n}")))
            }
        }
        Value::Array(_) => Err(Error::invalid(path, "nested lists are not supported")),
        other => Err(Error::invalid(
            path,
            format!("expected a string, number or boolean, got {}", kind(other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Parse a JSON filter document into an AST.
///
/// `null` and `{}` yield [`FilterAst::True`].
pub fn parse_filter(value: &Value, max_depth: usize) -> Result<FilterAst> {
    match value {
        Value::Null => Ok(FilterAst::True),
        Value::Object(map) if map.is_empty() => Ok(FilterAst::True),
        _ => Parser { max_depth }.parse_expr(value, "filter", 1),
    }
}
