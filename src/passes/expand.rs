//! Statement expander (C4).
//!
//! Recursive walk over the statements C3 left behind: rejects nested
//! `vars`/`locals`/`def` blocks and otherwise returns each statement
//! unchanged. Purely structural (§4.4): no rewriting beyond removals.

use crate::diagnostics::DiagnosticSink;
use crate::value::Statement;

pub fn expand_statements(statements: Vec<Statement>, diags: &mut DiagnosticSink) -> Vec<Statement> {
    statements
        .into_iter()
        .filter_map(|stmt| expand_statement(stmt, diags))
        .collect()
}

fn expand_statement(stmt: Statement, diags: &mut DiagnosticSink) -> Option<Statement> {
    match stmt {
        Statement::Block { name, labels, body, span } => {
            if matches!(name.as_str(), "vars" | "locals" | "def") {
                diags.error(
                    "E0206",
                    format!("'{name}' block is not allowed here"),
                    Some(span),
                );
                return None;
            }
            let body = expand_statements(body, diags);
            Some(Statement::Block { name, labels, body, span })
        }
        other => Some(other),
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
    fn rejects_nested_vars_block() {
        let stmts = vec![Statement::Block {
            name: "generator".into(),
            labels: vec!["g1".into()],
            body: vec![Statement::Block {
                name: "vars".into(),
                labels: vec![],
                body: vec![],
                span: span(),
            }],
            span: span(),
        }];
        let mut diags = DiagnosticSink::new();
        let out = expand_statements(stmts, &mut diags);
        assert!(diags.has_errors());
        match &out[0] {
            Statement::Block { body, .. } => assert!(body.is_empty()),
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn passes_through_other_statements() {
        let stmts = vec![Statement::Attribute {
            key: "name".into(),
            labels: vec![],
            value: crate::value::Value::String("x".into()),
            span: span(),
        }];
        let mut diags = DiagnosticSink::new();
        let out = expand_statements(stmts, &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(out.len(), 1);
    }
}
