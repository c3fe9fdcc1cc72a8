//! Variable collector (C3).
//!
//! Walks top-level statements only, extracting `vars`/`locals` blocks and
//! `var`/`variable` attributes into a name -> expression map (§4.3).
//! Everything else passes through untouched for C4.

use crate::diagnostics::DiagnosticSink;
use crate::eval::VariableEntry;
use crate::value::{Statement, Value};
use std::collections::HashMap;

pub struct VarCollectionResult {
    pub variables: HashMap<String, VariableEntry>,
    pub remaining: Vec<Statement>,
}

pub fn collect_variables(statements: Vec<Statement>, diags: &mut DiagnosticSink) -> VarCollectionResult {
    let mut variables = HashMap::new();
    let mut remaining = Vec::new();

    for stmt in statements {
        match stmt {
            Statement::Block { name, body, span, .. } if name == "vars" || name == "locals" => {
                for child in body {
                    collect_block_child(child, &mut variables, diags);
                }
                let _ = span;
            }
            Statement::Attribute { key, value, span, .. } if key == "var" || key == "variable" => {
                collect_object_entries(&value, &span, &mut variables, diags);
            }
            Statement::Block { name, span, .. } if name == "def" => {
                diags.error(
                    "E0201",
                    "'def' blocks are not supported",
                    Some(span),
                );
            }
            other => remaining.push(other),
        }
    }

    VarCollectionResult { variables, remaining }
}

fn collect_block_child(
    child: Statement,
    variables: &mut HashMap<String, VariableEntry>,
    diags: &mut DiagnosticSink,
) {
    match child {
        Statement::Attribute { key, labels, value, span } => {
            if !labels.is_empty() {
                diags.error(
                    "E0202",
                    format!("variable '{key}' must be an unlabeled attribute"),
                    Some(span),
                );
                return;
            }
            insert_variable(key, value, span, variables, diags);
        }
        other => {
            diags.error(
                "E0202",
                "vars/locals bodies may only contain unlabeled attributes",
                Some(other.span().clone()),
            );
        }
    }
}

fn collect_object_entries(
    value: &Value,
    span: &crate::value::Span,
    variables: &mut HashMap<String, VariableEntry>,
    diags: &mut DiagnosticSink,
) {
    match value.as_object() {
        Some(entries) => {
            for (key, v) in entries {
                insert_variable(key.clone(), v.clone(), span.clone(), variables, diags);
            }
        }
        None => {
            diags.error(
                "E0203",
                "'var'/'variable' attribute value must be an object literal",
                Some(span.clone()),
            );
        }
    }
}

fn insert_variable(
    name: String,
    value: Value,
    span: crate::value::Span,
    variables: &mut HashMap<String, VariableEntry>,
    diags: &mut DiagnosticSink,
) {
    if name.contains('.') {
        diags.error(
            "E0204",
            format!("variable name '{name}' must not contain '.'"),
            Some(span),
        );
        return;
    }
    if variables.contains_key(&name) {
        diags.error(
            "E0205",
            format!("duplicate variable '{name}'"),
            Some(span),
        );
        return;
    }
    variables.insert(name.clone(), VariableEntry { name, value, span });
}
