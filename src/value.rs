//! Source spans and the grammar-level value/statement model.
//!
//! This module defines the data the parser (§6.1, a black-box collaborator
//! over the concrete Canon surface grammar) produces: a tree of [`Value`]
//! expressions and a flat sequence of [`Statement`]s per file. Every later
//! pass (variable collection, statement expansion, block dispatch, the
//! generator/action DSL, ...) consumes this shape without needing to know
//! anything about surface syntax.

use serde::{Deserialize, Serialize};

/// A location in a single source file, used to attach diagnostics to the
/// text that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from the start of the file.
    pub offset: usize,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

/// `(file, start, end)` — attached to every statement and carried through
/// diagnostics so every error can be located in the source project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub file: String,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(file: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            file: file.into(),
            start,
            end,
        }
    }

    /// Merges two spans from the same file into one covering both.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            file: self.file.clone(),
            start: if self.start.offset <= other.start.offset {
                self.start
            } else {
                other.start
            },
            end: if self.end.offset >= other.end.offset {
                self.end
            } else {
                other.end
            },
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file, self.start.line, self.start.column
        )
    }
}

/// A grammar-level expression value.
///
/// `Object` preserves insertion order and retains duplicate keys (§4.2): a
/// second occurrence of a key does not overwrite the first, it is merged by
/// the caller into a 2-element array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    /// A bareword in the source, e.g. `culture.id` or a binding `$target`.
    Identifier(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
    Call { name: String, args: Vec<Value> },
}

impl Value {
    pub fn is_identifier(&self) -> bool {
        matches!(self, Value::Identifier(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Value::Call { .. })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Merges a new `(key, value)` pair into an object's entry list per the
    /// duplicate-key rule in §4.2: first collision promotes scalar -> 2
    /// element array, subsequent collisions push.
    pub fn merge_object_entry(entries: &mut Vec<(String, Value)>, key: String, value: Value) {
        if let Some((_, existing)) = entries.iter_mut().find(|(k, _)| *k == key) {
            match existing {
                Value::Array(items) => items.push(value),
                other => {
                    let prior = std::mem::replace(other, Value::Null);
                    *other = Value::Array(vec![prior, value]);
                }
            }
        } else {
            entries.push((key, value));
        }
    }
}

/// The quantifier on an `{inbound,outbound,both}`-style saturation clause or
/// the `{any,or}` / `{all,and}` selector on a `when` block. Kept generic so
/// both §4.9.1 and §4.9.2 can reuse the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    All,
    Any,
}

/// A statement inside a file or block body.
///
/// The grammar yields only `Attribute` and `Block`; the DSL-aware passes
/// (§4.9–4.10) also recognize the DSL-only variants, which the parser
/// produces directly when it recognizes one of the fixed DSL keyword
/// shapes (`pressure ... >= ...`, `... in [...]`, `from ...`, `mutate ...`,
/// `rel ...`) in a statement position.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Attribute {
        key: String,
        labels: Vec<String>,
        value: Value,
        span: Span,
    },
    Block {
        name: String,
        labels: Vec<String>,
        body: Vec<Statement>,
        span: Span,
    },
    /// `pressure p >= 3`, `cap kind npc <= 5`, `prominence min 3`, ...
    Predicate {
        keyword: String,
        subject: String,
        field: Option<String>,
        operator: Operator,
        value: Value,
        span: Span,
    },
    /// `status in [alive dead]`
    In {
        key: String,
        items: Vec<Value>,
        span: Span,
    },
    /// `from $x via friend_of out` or `from graph`
    From {
        source: String,
        relationship: Option<String>,
        direction: Option<String>,
        span: Span,
    },
    /// `mutate pressure p += 1`
    Mutate {
        target: String,
        id: String,
        operator: MutateOp,
        value: Value,
        span: Span,
    },
    /// `rel friend_of $a -> $b strength:0.5`
    Rel {
        kind: String,
        src: String,
        dst: String,
        value: Value,
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> &Span {
        match self {
            Statement::Attribute { span, .. } => span,
            Statement::Block { span, .. } => span,
            Statement::Predicate { span, .. } => span,
            Statement::In { span, .. } => span,
            Statement::From { span, .. } => span,
            Statement::Mutate { span, .. } => span,
            Statement::Rel { span, .. } => span,
        }
    }
}

/// Comparison operator recognized by the predicate sub-grammar (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Operator {
    pub fn from_token(s: &str) -> Option<Operator> {
        match s {
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            "==" => Some(Operator::Eq),
            _ => None,
        }
    }
}

/// `+=` / `-=` on a `mutate` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutateOp {
    Add,
    Sub,
}

/// Reinterprets an object value as a list of synthetic unlabeled attribute
/// statements (§4.2), used when an inline-object body is promoted to a block
/// body (e.g. `subtypes { foo: "Foo" }`).
pub fn object_value_to_statements(entries: &[(String, Value)], span: &Span) -> Vec<Statement> {
    entries
        .iter()
        .map(|(key, value)| Statement::Attribute {
            key: key.clone(),
            labels: Vec::new(),
            value: value.clone(),
            span: span.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_object_entry_promotes_scalar_to_array() {
        let mut entries = vec![("a".to_string(), Value::Number(1.0))];
        Value::merge_object_entry(&mut entries, "a".to_string(), Value::Number(2.0));
        assert_eq!(
            entries[0].1,
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0)])
        );
        Value::merge_object_entry(&mut entries, "a".to_string(), Value::Number(3.0));
        assert_eq!(
            entries[0].1,
            Value::Array(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ])
        );
    }

    #[test]
    fn span_merge_takes_outer_bounds() {
        let file = "p.canon".to_string();
        let a = Span::new(file.clone(), Position::new(0, 1, 1), Position::new(5, 1, 6));
        let b = Span::new(file, Position::new(10, 2, 1), Position::new(20, 2, 11));
        let m = a.merge(&b);
        assert_eq!(m.start.offset, 0);
        assert_eq!(m.end.offset, 20);
    }
}
