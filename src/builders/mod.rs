//! Per-block builders (C9) and their shared helpers (§4.6).

pub mod culture;
pub mod entity_kind;
pub mod naming;
pub mod positional;
pub mod seed;
pub mod system;

use crate::diagnostics::DiagnosticSink;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Span, Statement};
use serde_json::{Map, Value as Json};

/// If `target[key]` is absent, sets it to `label`; else requires it equals
/// `label`, emitting a "mismatch" diagnostic otherwise.
pub fn apply_label_field(
    target: &mut Map<String, Json>,
    key: &str,
    label: &str,
    diags: &mut DiagnosticSink,
    span: &Span,
) {
    match target.get(key) {
        None => {
            target.insert(key.to_string(), Json::String(label.to_string()));
        }
        Some(Json::String(s)) if s == label => {}
        Some(_) => diags.error(
            "E0208",
            format!("'{key}' does not match label \"{label}\""),
            Some(span.clone()),
        ),
    }
}

/// Extracts the flat token array C5 wraps a positional inline-item
/// attribute's remaining tokens in (a single `$positional` attribute),
/// or `None` if `body` is an ordinary block-form body.
pub fn positional_tokens(body: &[Statement]) -> Option<&[crate::value::Value]> {
    match body {
        [Statement::Attribute { key, value, .. }] if key == "$positional" => value.as_array(),
        _ => None,
    }
}

/// Merges a new `(key, value)` pair into a JSON object map using the same
/// duplicate-key rule as `Value::merge_object_entry` (§4.2).
pub fn merge_json_entry(map: &mut Map<String, Json>, key: String, value: Json) {
    match map.get_mut(&key) {
        Some(existing) => match existing {
            Json::Array(items) => items.push(value),
            other => {
                let prior = other.take();
                *other = Json::Array(vec![prior, value]);
            }
        },
        None => {
            map.insert(key, value);
        }
    }
}

/// Folds attributes (value via C7) and nested blocks (recursively built)
/// into a map; a nested block's labels are interpreted as `[id, name?]`
/// with the label/value mismatch rule.
pub fn build_object_from_statements(
    body: &[Statement],
    ctx: &mut EvalContext,
    diags: &mut DiagnosticSink,
) -> Map<String, Json> {
    let mut map = Map::new();
    for stmt in body {
        match stmt {
            Statement::Attribute { key, value, span, .. } => {
                let json = value_to_json(value, span, ctx, diags);
                merge_json_entry(&mut map, key.clone(), json);
            }
            Statement::Block { name, labels, body, span } => {
                let mut obj = build_object_from_statements(body, ctx, diags);
                match labels.as_slice() {
                    [] => {}
                    [id] => apply_label_field(&mut obj, "id", id, diags, span),
                    [id, nm, ..] => {
                        apply_label_field(&mut obj, "id", id, diags, span);
                        apply_label_field(&mut obj, "name", nm, diags, span);
                    }
                }
                merge_json_entry(&mut map, name.clone(), Json::Object(obj));
            }
            other => diags.error(
                "E0209",
                "DSL-only statement outside generator/action context",
                Some(other.span().clone()),
            ),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceRegistry;
    use crate::value::{Position, Value};
    use std::collections::HashMap;

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    #[test]
    fn apply_label_field_sets_absent_field() {
        let mut map = Map::new();
        let mut diags = DiagnosticSink::new();
        apply_label_field(&mut map, "id", "foo", &mut diags, &span());
        assert_eq!(map.get("id"), Some(&Json::String("foo".into())));
        assert!(!diags.has_errors());
    }

    #[test]
    fn apply_label_field_errors_on_mismatch() {
        let mut map = Map::new();
        map.insert("id".to_string(), Json::String("bar".into()));
        let mut diags = DiagnosticSink::new();
        apply_label_field(&mut map, "id", "foo", &mut diags, &span());
        assert!(diags.has_errors());
    }

    #[test]
    fn build_object_folds_attributes_and_nested_blocks() {
        let body = vec![
            Statement::Attribute {
                key: "name".into(),
                labels: vec![],
                value: Value::String("Demo".into()),
                span: span(),
            },
            Statement::Block {
                name: "config".into(),
                labels: vec!["c1".into()],
                body: vec![],
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let map = build_object_from_statements(&body, &mut ctx, &mut diags);
        assert_eq!(map.get("name"), Some(&Json::String("Demo".into())));
        assert!(map.get("config").unwrap().get("id").is_some());
    }
}
