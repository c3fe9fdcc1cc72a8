//! Seed entity and seed relationship builders (§4.6.3, §4.6.4).

use crate::builders::{apply_label_field, build_object_from_statements, positional_tokens};
use crate::diagnostics::DiagnosticSink;
use crate::eval::EvalContext;
use crate::value::{Span, Statement, Value};
use serde_json::{Map, Value as Json};

pub fn build_seed_entity(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut obj = build_object_from_statements(body, ctx, diags);
    if let Some(id) = labels.first() {
        apply_label_field(&mut obj, "id", id, diags, span);
    }

    for key in ["coords", "coordinates"] {
        if let Some(Json::Array(items)) = obj.remove(key) {
            let mut coord = Map::new();
            for (axis, value) in ["x", "y", "z"].iter().zip(items.into_iter()) {
                coord.insert(axis.to_string(), value);
            }
            obj.insert("coords".to_string(), Json::Object(coord));
            break;
        }
    }

    if let Some(Json::Array(tags)) = obj.remove("tags") {
        let mut map = Map::new();
        for tag in tags {
            if let Some(s) = tag.as_str() {
                map.insert(s.to_string(), Json::Bool(true));
            }
        }
        obj.insert("tags".to_string(), Json::Object(map));
    }

    Json::Object(obj)
}

/// Builds a `seed_relationship` from either the line form (flat positional
/// tokens) or a block body. `kind` comes from the block label in the line
/// form.
pub fn build_seed_relationship(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    if let Some(tokens) = positional_tokens(body) {
        let mut out = Map::new();
        let Some(kind) = labels.first() else {
            diags.error("E0217", "seed_relationship requires kind, src, and dst", Some(span.clone()));
            return Json::Object(out);
        };
        out.insert("kind".to_string(), Json::String(kind.clone()));
        let src = tokens.first().and_then(as_string_like);
        let dst = tokens.get(1).and_then(as_string_like);
        let (Some(src), Some(dst)) = (src, dst) else {
            diags.error("E0217", "seed_relationship requires kind, src, and dst", Some(span.clone()));
            return Json::Object(out);
        };
        out.insert("src".to_string(), Json::String(src.to_string()));
        out.insert("dst".to_string(), Json::String(dst.to_string()));
        if let Some(Value::Number(n)) = tokens.get(2) {
            if let Some(num) = serde_json::Number::from_f64(*n) {
                out.insert("strength".to_string(), Json::Number(num));
            }
        }
        return Json::Object(out);
    }

    let mut obj = build_object_from_statements(body, ctx, diags);
    for required in ["kind", "src", "dst"] {
        if !matches!(obj.get(required), Some(Json::String(_))) {
            diags.error(
                "E0217",
                "seed_relationship requires kind, src, and dst",
                Some(span.clone()),
            );
        }
    }
    if let Some(id) = labels.first() {
        apply_label_field(&mut obj, "kind", id, diags, span);
    }
    Json::Object(obj)
}

fn as_string_like(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s),
        Value::Identifier(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceRegistry;
    use crate::value::Position;
    use std::collections::HashMap;

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    #[test]
    fn normalizes_coords_and_tags() {
        let body = vec![
            Statement::Attribute {
                key: "kind".into(),
                labels: vec![],
                value: Value::Identifier("npc".into()),
                span: span(),
            },
            Statement::Attribute {
                key: "coords".into(),
                labels: vec![],
                value: Value::Array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]),
                span: span(),
            },
            Statement::Attribute {
                key: "tags".into(),
                labels: vec![],
                value: Value::Array(vec![Value::Identifier("hero".into())]),
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = build_seed_entity(&[], &body, &span(), &mut ctx, &mut diags);
        assert_eq!(result["coords"]["x"], Json::from(1));
        assert_eq!(result["tags"]["hero"], Json::Bool(true));
    }

    #[test]
    fn builds_line_form_seed_relationship() {
        let labels = vec!["knows".to_string()];
        let body = vec![Statement::Attribute {
            key: "$positional".into(),
            labels: vec![],
            value: Value::Array(vec![
                Value::Identifier("a".into()),
                Value::Identifier("b".into()),
                Value::Number(0.5),
            ]),
            span: span(),
        }];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = build_seed_relationship(&labels, &body, &span(), &mut ctx, &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(result["src"], Json::String("a".into()));
        assert_eq!(result["dst"], Json::String("b".into()));
    }
}
