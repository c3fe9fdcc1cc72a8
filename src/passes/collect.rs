//! Top-level collector (C5).
//!
//! Flattens container aliases (`generators { ... }` => a sequence of
//! `generator` blocks) and promotes inline-labeled attributes in the
//! inline-item set to synthetic blocks (§4.5).

use crate::diagnostics::DiagnosticSink;
use crate::value::{object_value_to_statements, Statement, Value};

/// Container alias -> singular block name.
const CONTAINER_ALIASES: &[(&str, &str)] = &[
    ("generators", "generator"),
    ("actions", "action"),
    ("pressures", "pressure"),
    ("eras", "era"),
    ("entity_kinds", "entity_kind"),
    ("relationship_kinds", "relationship_kind"),
    ("cultures", "culture"),
    ("tags", "tag"),
    ("axes", "axis"),
    ("systems", "system"),
    ("seed_entities", "seed_entity"),
    ("seed_relationships", "seed_relationship"),
);

/// Top-level attribute keys promotable to a synthetic block when labeled.
const INLINE_ITEM_SET: &[&str] = &["axis", "entity_kind", "relationship_kind", "tag", "seed_relationship"];

pub fn collect_top_level_blocks(statements: Vec<Statement>, diags: &mut DiagnosticSink) -> Vec<Statement> {
    let mut out = Vec::new();
    for stmt in statements {
        match stmt {
            Statement::Block { name, labels, body, span } => {
                if let Some((_, singular)) = CONTAINER_ALIASES.iter().find(|(alias, _)| *alias == name) {
                    for child in body {
                        out.push(rename_child(child, singular));
                    }
                    let _ = (labels, span);
                } else {
                    out.push(Statement::Block { name, labels, body, span });
                }
            }
            Statement::Attribute { key, labels, value, span } if INLINE_ITEM_SET.contains(&key.as_str()) && !labels.is_empty() => {
                let body = synthesize_body(&value, &span);
                out.push(Statement::Block { name: key, labels, body, span });
            }
            Statement::Attribute { key, span, .. } => {
                diags.error(
                    "E0207",
                    format!("top-level attribute '{key}' is not allowed here"),
                    Some(span),
                );
            }
            other => out.push(other),
        }
    }
    out
}

fn rename_child(child: Statement, singular: &str) -> Statement {
    match child {
        Statement::Block { labels, body, span, .. } => Statement::Block {
            name: singular.to_string(),
            labels,
            body,
            span,
        },
        other => other,
    }
}

fn synthesize_body(value: &Value, span: &crate::value::Span) -> Vec<Statement> {
    match value {
        Value::Object(entries) => object_value_to_statements(entries, span),
        other => vec![Statement::Attribute {
            key: "$positional".to_string(),
            labels: Vec::new(),
            value: other.clone(),
            span: span.clone(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Position, Span};

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    #[test]
    fn flattens_container_alias() {
        let stmts = vec![Statement::Block {
            name: "generators".into(),
            labels: vec![],
            body: vec![Statement::Block {
                name: "unused".into(),
                labels: vec!["g1".into()],
                body: vec![],
                span: span(),
            }],
            span: span(),
        }];
        let mut diags = DiagnosticSink::new();
        let out = collect_top_level_blocks(stmts, &mut diags);
        assert_eq!(out.len(), 1);
        match &out[0] {
            Statement::Block { name, .. } => assert_eq!(name, "generator"),
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn promotes_inline_item_attribute() {
        let stmts = vec![Statement::Attribute {
            key: "axis".into(),
            labels: vec!["moral".into()],
            value: Value::Array(vec![Value::Identifier("good".into())]),
            span: span(),
        }];
        let mut diags = DiagnosticSink::new();
        let out = collect_top_level_blocks(stmts, &mut diags);
        assert!(!diags.has_errors());
        match &out[0] {
            Statement::Block { name, labels, .. } => {
                assert_eq!(name, "axis");
                assert_eq!(labels, &vec!["moral".to_string()]);
            }
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn rejects_unlabeled_top_level_attribute() {
        let stmts = vec![Statement::Attribute {
            key: "name".into(),
            labels: vec![],
            value: Value::String("x".into()),
            span: span(),
        }];
        let mut diags = DiagnosticSink::new();
        collect_top_level_blocks(stmts, &mut diags);
        assert!(diags.has_errors());
    }
}
