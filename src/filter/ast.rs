//! AST types for metadata filters.

use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// Root filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterAst {
    /// Empty filter: `{}`. Compiles to an empty fragment.
    True,

    /// Field comparison: `{"$gt": {"year": 2020}}` or the shorthand `{"year": 2020}`
    Compare {
        op: CompareOp,
        field: String,
        value: Literal,
    },

    /// Boolean combinator: `{"$and": [...]}` or `{"$or": [...]}`
    Logical {
        op: LogicalOp,
        operands: Vec<FilterAst>,
    },
}

/// Comparison operator keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,    // $eq
    Ne,    // $ne
    Lt,    // $lt
    Le,    // $lte
    Gt,    // $gt
    Ge,    // $gte
    Like,  // $like
    ILike, // $ilike
    In,    // $in
    NotIn, // $nin
}

impl CompareOp {
    pub const ALL: [CompareOp; 10] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
        CompareOp::Like,
        CompareOp::ILike,
        CompareOp::In,
        CompareOp::NotIn,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Lt => "$lt",
            CompareOp::Le => "$lte",
            CompareOp::Gt => "$gt",
            CompareOp::Ge => "$gte",
            CompareOp::Like => "$like",
            CompareOp::ILike => "$ilike",
            CompareOp::In => "$in",
            CompareOp::NotIn => "$nin",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.keyword() == keyword)
    }

    /// Set membership operators take a list literal instead of a scalar.
    pub fn is_set(self) -> bool {
        matches!(self, CompareOp::In | CompareOp::NotIn)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "!="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
            CompareOp::Like => write!(f, "like"),
            CompareOp::ILike => write!(f, "ilike"),
            CompareOp::In => write!(f, "in"),
            CompareOp::NotIn => write!(f, "not in"),
        }
    }
}

/// Logical combinator keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And, // $and
    Or,  // $or
}

impl LogicalOp {
    pub fn keyword(self) -> &'static str {
        match self {
            LogicalOp::And => "$and",
            LogicalOp::Or => "$or",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "$and" => Some(LogicalOp::And),
            "$or" => Some(LogicalOp::Or),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "and"),
            LogicalOp::Or => write!(f, "or"),
        }
    }
}

/// A single literal value compared against a metadata field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Integer(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Scalar(Scalar),
    /// Only valid under `$in` / `$nin`
    List(Vec<Scalar>),
}

impl From<Scalar> for Literal {
    fn from(value: Scalar) -> Self {
        Literal::Scalar(value)
    }
}

impl From<Vec<Scalar>> for Literal {
    fn from(values: Vec<Scalar>) -> Self {
        Literal::List(values)
    }
}

impl FilterAst {
    pub fn compare(op: CompareOp, field: impl Into<String>, value: impl Into<Literal>) -> Self {
        FilterAst::Compare {
            op,
            field: field.into(),
            value: value.into(),
        }
    }

    fn scalar(op: CompareOp, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(op, field, Literal::Scalar(value.into()))
    }

    fn set<I, V>(op: CompareOp, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        let values: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        Self::compare(op, field, Literal::List(values))
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::scalar(CompareOp::Eq, field, value)
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::scalar(CompareOp::Ne, field, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::scalar(CompareOp::Lt, field, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::scalar(CompareOp::Le, field, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::scalar(CompareOp::Gt, field, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::scalar(CompareOp::Ge, field, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::scalar(CompareOp::Like, field, pattern.into())
    }

    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::scalar(CompareOp::ILike, field, pattern.into())
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::set(CompareOp::In, field, values)
    }

    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self::set(CompareOp::NotIn, field, values)
    }

    pub fn and(operands: impl IntoIterator<Item = FilterAst>) -> Self {
        FilterAst::Logical {
            op: LogicalOp::And,
            operands: operands.into_iter().collect(),
        }
    }

    pub fn or(operands: impl IntoIterator<Item = FilterAst>) -> Self {
        FilterAst::Logical {
            op: LogicalOp::Or,
            operands: operands.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterAst::True)
    }

    /// Nesting depth; a single comparison has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            FilterAst::True => 0,
            FilterAst::Compare { .. } => 1,
            FilterAst::Logical { operands, .. } => {
                1 + operands.iter().map(FilterAst::depth).max().unwrap_or(0)
            }
        }
    }

    /// Check the invariants the renderer relies on.
    ///
    /// Trees coming out of the JSON parser already satisfy these; trees built
    /// by hand through the constructors above may not.
    pub fn validate(&self, max_depth: usize) -> Result<()> {
        self.validate_at(&mut String::from("filter"), 1, max_depth)
    }

    fn validate_at(&self, path: &mut String, depth: usize, max_depth: usize) -> Result<()> {
        if depth > max_depth {
            return Err(Error::DepthExceeded { max: max_depth });
        }

        match self {
            FilterAst::True if depth == 1 => Ok(()),
            FilterAst::True => Err(Error::invalid(path.as_str(), "empty nested expression")),
            FilterAst::Compare { op, field, value } => {
                let len = path.len();
                path.push('.');
                path.push_str(op.keyword());
                let result = check_comparison(*op, field, value, path);
                path.truncate(len);
                result
            }
            FilterAst::Logical { op, operands } => {
                let len = path.len();
                path.push('.');
                path.push_str(op.keyword());
                if operands.len() < 2 {
                    let reason = format!(
                        "expected at least 2 operands, got {}",
                        operands.len()
                    );
                    return Err(Error::invalid(path.as_str(), reason));
                }
                for (i, operand) in operands.iter().enumerate() {
                    let base = path.len();
                    path.push_str(&format!("[{i}]"));
                    operand.validate_at(path, depth + 1, max_depth)?;
                    path.truncate(base);
                }
                path.truncate(len);
                Ok(())
            }
        }
    }
}

fn check_comparison(op: CompareOp, field: &str, value: &Literal, path: &str) -> Result<()> {
    if field.is_empty() {
        return Err(Error::invalid(path, "field name is empty"));
    }

    match (op.is_set(), value) {
        (true, Literal::List(values)) if values.is_empty() => Err(Error::invalid(
            path,
            format!("{} requires a non-empty list", op.keyword()),
        )),
        (true, Literal::List(values)) => values.iter().try_for_each(|v| check_scalar(v, path)),
        (true, Literal::Scalar(_)) => Err(Error::invalid(
            path,
            format!("{} requires a list value", op.keyword()),
        )),
        (false, Literal::List(_)) => Err(Error::invalid(
            path,
            format!("{} does not accept a list value", op.keyword()),
        )),
        (false, Literal::Scalar(v)) => check_scalar(v, path),
    }
}

fn check_scalar(value: &Scalar, path: &str) -> Result<()> {
    match value {
        Scalar::Float(f) if !f.is_finite() => {
            Err(Error::invalid(path, format!("non-finite number {f}")))
        }
        _ => Ok(()),
    }
}

impl Scalar {
    /// EdgeQL type family; integers and floats share one since int64 casts to float64.
    fn family(&self) -> &'static str {
        match self {
            Scalar::String(_) => "string",
            Scalar::Integer(_) | Scalar::Float(_) => "number",
            Scalar::Bool(_) => "boolean",
        }
    }
}

impl FilterAst {
    /// Reject `$in` / `$nin` lists that mix strings, numbers and booleans.
    ///
    /// Such lists are not valid typed array literals in EdgeQL.
    pub fn check_list_types(&self) -> Result<()> {
        self.check_list_types_at(&mut String::from("filter"))
    }

    fn check_list_types_at(&self, path: &mut String) -> Result<()> {
        match self {
            FilterAst::True => Ok(()),
            FilterAst::Compare {
                op,
                value: Literal::List(values),
                ..
            } => {
                let Some(first) = values.first() else {
                    return Ok(());
                };
                match values.iter().find(|v| v.family() != first.family()) {
                    None => Ok(()),
                    Some(other) => {
                        path.push('.');
                        path.push_str(op.keyword());
                        Err(Error::invalid(
                            path.as_str(),
                            format!(
                                "list mixes {} and {} values",
                                first.family(),
                                other.family()
                            ),
                        ))
                    }
                }
            }
            FilterAst::Compare { .. } => Ok(()),
            FilterAst::Logical { op, operands } => {
                path.push('.');
                path.push_str(op.keyword());
                for (i, operand) in operands.iter().enumerate() {
                    let base = path.len();
                    path.push_str(&format!("[{i}]"));
                    operand.check_list_types_at(path)?;
                    path.truncate(base);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_round_trip() {
        for op in CompareOp::ALL {
            assert_eq!(CompareOp::from_keyword(op.keyword()), Some(op));
        }
        assert_eq!(CompareOp::from_keyword("$and"), None);
        assert_eq!(LogicalOp::from_keyword("$or"), Some(LogicalOp::Or));
        assert_eq!(LogicalOp::from_keyword("$not"), None);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(CompareOp::Le.to_string(), "<=");
        assert_eq!(CompareOp::ILike.to_string(), "ilike");
        assert_eq!(CompareOp::NotIn.to_string(), "not in");
        assert_eq!(LogicalOp::And.to_string(), "and");
    }

    #[test]
    fn test_depth() {
        let ast = FilterAst::and([
            FilterAst::or([FilterAst::equals("a", 1), FilterAst::equals("b", 2)]),
            FilterAst::like("c", "%x%"),
        ]);
        assert_eq!(ast.depth(), 3);
        assert_eq!(FilterAst::True.depth(), 0);
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let ast = FilterAst::and([
            FilterAst::is_in("tags", ["a", "b"]),
            FilterAst::gte("year", 2020),
        ]);
        assert!(ast.validate(32).is_ok());
        assert!(FilterAst::True.validate(32).is_ok());
    }

    #[test]
    fn test_validate_rejects_single_operand() {
        let ast = FilterAst::or([FilterAst::equals("a", 1)]);
        let err = ast.validate(32).unwrap_err();
        assert_eq!(
            err,
            Error::invalid("filter.$or", "expected at least 2 operands, got 1")
        );
    }

    #[test]
    fn test_validate_rejects_list_under_scalar_op() {
        let ast = FilterAst::compare(CompareOp::Gt, "n", vec![Scalar::Integer(1)]);
        assert!(matches!(
            ast.validate(32),
            Err(Error::InvalidFilterExpression { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_scalar_under_set_op() {
        let ast = FilterAst::compare(CompareOp::In, "n", Scalar::Integer(1));
        assert!(ast.validate(32).is_err());

        let empty: Vec<i64> = Vec::new();
        assert!(FilterAst::not_in("n", empty).validate(32).is_err());
    }

    #[test]
    fn test_validate_reports_nested_path() {
        let ast = FilterAst::and([
            FilterAst::equals("a", 1),
            FilterAst::or([FilterAst::equals("b", 1), FilterAst::gt("c", f64::NAN)]),
        ]);
        match ast.validate(32) {
            Err(Error::InvalidFilterExpression { path, .. }) => {
                assert_eq!(path, "filter.$and[1].$or[1].$gt");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_depth_limit() {
        let mut ast = FilterAst::equals("a", 1);
        for _ in 0..5 {
            ast = FilterAst::and([ast, FilterAst::equals("b", 2)]);
        }
        assert_eq!(ast.depth(), 6);
        assert!(ast.validate(6).is_ok());
        assert_eq!(ast.validate(5), Err(Error::DepthExceeded { max: 5 }));
    }

    #[test]
    fn test_empty_operand_rejected() {
        let ast = FilterAst::and([FilterAst::True, FilterAst::equals("a", 1)]);
        assert!(ast.validate(32).is_err());
    }

    #[test]
    fn test_list_types_allow_mixed_numbers() {
        let ast = FilterAst::is_in("n", [Scalar::Integer(1), Scalar::Float(2.5)]);
        assert!(ast.check_list_types().is_ok());
        assert!(FilterAst::equals("a", "x").check_list_types().is_ok());
    }

    #[test]
    fn test_list_types_reject_mixed_families() {
        let ast = FilterAst::and([
            FilterAst::equals("a", 1),
            FilterAst::not_in(
                "n",
                [Scalar::Bool(true), Scalar::from("a"), Scalar::Float(1.5)],
            ),
        ]);
        assert_eq!(
            ast.check_list_types(),
            Err(Error::invalid(
                "filter.$and[1].$nin",
                "list mixes boolean and string values"
            ))
        );
    }
}
