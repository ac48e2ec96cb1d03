//! Renders a [`FilterAst`] into an EdgeQL predicate fragment.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use super::ast::{FilterAst, Literal, Scalar};
use crate::config::{CompileMode, DEFAULT_MAX_DEPTH};

/// Output of a compilation: the fragment and, in parameterized mode, its bound values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CompiledFilter {
    pub fragment: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Scalar>,
}

impl CompiledFilter {
    pub fn is_empty(&self) -> bool {
        self.fragment.is_empty()
    }
}

/// Renderer state. Only sees trees that already passed validation.
pub(crate) struct Renderer {
    mode: CompileMode,
    out: String,
    params: BTreeMap<String, Scalar>,
}

impl Renderer {
    pub fn new(mode: CompileMode) -> Self {
        Renderer {
            mode,
            out: String::new(),
            params: BTreeMap::new(),
        }
    }

    /// Render a validated AST.
    pub fn render(mut self, ast: &FilterAst) -> CompiledFilter {
        self.node(ast);
        CompiledFilter {
            fragment: self.out,
            params: self.params,
        }
    }

    fn node(&mut self, ast: &FilterAst) {
        match ast {
            FilterAst::True => {}
            FilterAst::Compare { op, field, value } => {
                self.accessor(field);
                self.out.push(' ');
                self.out.push_str(&op.to_string());
                self.out.push(' ');
                self.literal(value);
            }
            FilterAst::Logical { op, operands } => {
                self.out.push('(');
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        self.out.push(' ');
                        self.out.push_str(&op.to_string());
                        self.out.push(' ');
                    }
                    self.node(operand);
                }
                self.out.push(')');
            }
        }
    }

    /// `<str>json_get(.metadata, "field")`
    fn accessor(&mut self, field: &str) {
        let field = match self.mode {
            CompileMode::Legacy => Cow::Borrowed(field),
            CompileMode::Escaped | CompileMode::Parameterized => escape(field),
        };
        self.out.push_str("<str>json_get(.metadata, \"");
        self.out.push_str(&field);
        self.out.push_str("\")");
    }

    fn literal(&mut self, value: &Literal) {
        match value {
            Literal::Scalar(scalar) => self.scalar(scalar),
            Literal::List(values) => {
                self.out.push_str("array_unpack([");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.scalar(value);
                }
                self.out.push_str("])");
            }
        }
    }

    fn scalar(&mut self, value: &Scalar) {
        match self.mode {
            CompileMode::Legacy => write_scalar(&mut self.out, value, false),
            CompileMode::Escaped => write_scalar(&mut self.out, value, true),
            CompileMode::Parameterized => self.add_param(value),
        }
    }

    fn add_param(&mut self, value: &Scalar) {
        let name = format!("p{}", self.params.len());
        self.out.push('<');
        self.out.push_str(param_type(value));
        self.out.push_str(">$");
        self.out.push_str(&name);
        self.params.insert(name, value.clone());
    }
}

fn param_type(value: &Scalar) -> &'static str {
    match value {
        Scalar::String(_) => "str",
        Scalar::Integer(_) => "int64",
        Scalar::Float(_) => "float64",
        Scalar::Bool(_) => "bool",
    }
}

fn write_scalar(out: &mut String, value: &Scalar, escaped: bool) {
    match value {
        Scalar::String(s) => {
            out.push('"');
            if escaped {
                out.push_str(&escape(s));
            } else {
                out.push_str(s);
            }
            out.push('"');
        }
        Scalar::Integer(i) => out.push_str(&i.to_string()),
        Scalar::Float(f) => out.push_str(&format_float(*f)),
        Scalar::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
    }
}

/// Decimal form that always keeps a fractional part.
///
/// `2.0`, `0.25`, and `1e21` as `1000000000000000000000.0`.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Escape a value for use inside a double-quoted EdgeQL string.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

impl fmt::Display for FilterAst {
    /// Legacy rendering. Fails with `fmt::Error` when the tree does not validate.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.validate(DEFAULT_MAX_DEPTH).map_err(|_| fmt::Error)?;
        let compiled = Renderer::new(CompileMode::Legacy).render(self);
        f.write_str(&compiled.fragment)
    }
}
