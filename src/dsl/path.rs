//! Graph-path sub-language (C11, §4.10): `path <check> do … end`.

use crate::diagnostics::DiagnosticSink;
use crate::dsl::GeneratorContext;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Span, Statement, Value};
use serde_json::{json, Map, Value as Json};

fn ident_or_string(v: &Value) -> Option<&str> {
    match v {
        Value::Identifier(s) | Value::String(s) => Some(s),
        _ => None,
    }
}

pub fn lower_path(labels: &[String], body: &[Statement], span: &Span, gctx: &GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let Some(check) = labels.first() else {
        diags.error("E0241", "path requires a <check>", Some(span.clone()));
        return Json::Null;
    };
    let mut steps = Vec::new();
    let mut wheres = Vec::new();
    let mut count = None;

    for stmt in body {
        match stmt {
            Statement::Attribute { key, .. } if key == "step" => steps.push(lower_step(stmt, gctx, diags)),
            Statement::Block { name, .. } if name == "step" => steps.push(lower_step(stmt, gctx, diags)),
            Statement::Attribute { key, .. } if key == "where" => {
                if let Some(w) = lower_where(stmt, gctx, diags) {
                    wheres.push(w);
                }
            }
            Statement::Attribute { key, value, span: s, .. } if key == "count" => {
                count = Some(value_to_json(value, s, ctx, diags));
            }
            other => diags.error("E0241", "unexpected statement in path body", Some(other.span().clone())),
        }
    }

    if matches!(check.as_str(), "count_min" | "count_max") && count.is_none() {
        diags.error("E0242", format!("path '{check}' requires a 'count'"), Some(span.clone()));
    }

    let mut assert = Map::new();
    assert.insert("check".to_string(), Json::String(check.clone()));
    assert.insert("path".to_string(), Json::Array(steps));
    if let Some(c) = count {
        assert.insert("count".to_string(), c);
    }
    if !wheres.is_empty() {
        assert.insert("where".to_string(), Json::Array(wheres));
    }
    json!({ "type": "graph_path", "assert": assert })
}

fn lower_step(stmt: &Statement, gctx: &GeneratorContext, diags: &mut DiagnosticSink) -> Json {
    match stmt {
        Statement::Attribute { labels, value, span, .. } => {
            let Some(via) = labels.first() else {
                diags.error("E0243", "step requires a <via>", Some(span.clone()));
                return Json::Null;
            };
            let tokens = value.as_array().unwrap_or(&[]);
            let mut out = Map::new();
            out.insert("via".to_string(), Json::String(gctx.normalize_ref(via)));
            let Some(direction) = tokens.first().and_then(ident_or_string) else {
                diags.error("E0243", "step requires <direction> <kind> <subtype>", Some(span.clone()));
                return Json::Object(out);
            };
            out.insert("direction".to_string(), Json::String(direction.to_string()));
            if let Some(kind) = tokens.get(1).and_then(ident_or_string) {
                out.insert("kind".to_string(), Json::String(kind.to_string()));
            }
            if let Some(subtype) = tokens.get(2).and_then(ident_or_string) {
                out.insert("subtype".to_string(), Json::String(subtype.to_string()));
            }
            if tokens.get(3).and_then(ident_or_string) == Some("status") {
                if let Some(status) = tokens.get(4).and_then(ident_or_string) {
                    out.insert("status".to_string(), Json::String(status.to_string()));
                }
            }
            Json::Object(out)
        }
        Statement::Block { body, .. } => {
            let mut out = Map::new();
            for child in body {
                let Statement::Attribute { key, labels, value, span: s } = child else { continue };
                match key.as_str() {
                    "via" => {
                        if let Some(via) = value.as_str() {
                            out.insert("via".to_string(), Json::String(gctx.normalize_ref(via)));
                        }
                    }
                    "target" => {
                        let tokens = value.as_array().unwrap_or(&[]);
                        if let Some(kind) = tokens.first().and_then(ident_or_string) {
                            out.insert("kind".to_string(), Json::String(kind.to_string()));
                        }
                        if let Some(subtype) = tokens.get(1).and_then(ident_or_string) {
                            out.insert("subtype".to_string(), Json::String(subtype.to_string()));
                        }
                    }
                    "filter" | "filters" => {
                        out.insert("filter".to_string(), crate::dsl::selection::lower_filter(labels, value, s, gctx, diags));
                    }
                    _ => {
                        if let Some(s) = value.as_str() {
                            out.insert(key.clone(), Json::String(s.to_string()));
                        }
                    }
                }
            }
            Json::Object(out)
        }
        other => {
            diags.error("E0243", "unexpected step statement", Some(other.span().clone()));
            Json::Null
        }
    }
}

fn lower_where(stmt: &Statement, gctx: &GeneratorContext, diags: &mut DiagnosticSink) -> Option<Json> {
    let Statement::Attribute { labels, value, span, .. } = stmt else { return None };
    let Some(wtype) = labels.first() else {
        diags.error("E0244", "where requires a <type>", Some(span.clone()));
        return None;
    };
    let tokens = value.as_array().unwrap_or(&[]);
    let mut out = Map::new();
    out.insert("type".to_string(), Json::String(wtype.clone()));
    match wtype.as_str() {
        "not_self" => {}
        "in" | "not_in" => {
            if let Some(Value::Array(items)) = tokens.first() {
                let set: Vec<Json> = items.iter().filter_map(ident_or_string).map(|s| Json::String(s.to_string())).collect();
                out.insert("set".to_string(), Json::Array(set));
            } else {
                diags.error("E0244", format!("'{wtype}' requires a bracketed set"), Some(span.clone()));
            }
        }
        "has_relationship" | "lacks_relationship" => {
            if let Some(kind) = tokens.first().and_then(ident_or_string) {
                out.insert("relationshipKind".to_string(), Json::String(kind.to_string()));
            }
            if let Some(with) = tokens.get(1).and_then(ident_or_string) {
                out.insert("with".to_string(), Json::String(gctx.normalize_ref(with)));
            }
            if tokens.get(2).and_then(ident_or_string) == Some("direction") {
                if let Some(dir) = tokens.get(3).and_then(ident_or_string) {
                    out.insert("direction".to_string(), Json::String(dir.to_string()));
                }
            }
        }
        "kind" | "subtype" => {
            if let Some(v) = tokens.first().and_then(ident_or_string) {
                out.insert(wtype.clone(), Json::String(v.to_string()));
            }
        }
        other => diags.error("E0244", format!("unknown where constraint '{other}'"), Some(span.clone())),
    }
    Some(Json::Object(out))
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
    fn lowers_exists_path_with_step_and_where() {
        let body = vec![
            Statement::Attribute {
                key: "step".into(),
                labels: vec!["friend_of".into()],
                value: Value::Array(vec![
                    Value::Identifier("out".into()),
                    Value::Identifier("npc".into()),
                    Value::Identifier("noble".into()),
                ]),
                span: span(),
            },
            Statement::Attribute {
                key: "where".into(),
                labels: vec!["not_self".into()],
                value: Value::Array(vec![]),
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let gctx = GeneratorContext::new();
        let result = lower_path(&["exists".to_string()], &body, &span(), &gctx, &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert_eq!(result["assert"]["check"], Json::String("exists".into()));
        assert_eq!(result["assert"]["path"][0]["direction"], Json::String("out".into()));
    }

    #[test]
    fn errors_when_count_check_lacks_count() {
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let gctx = GeneratorContext::new();
        lower_path(&["count_min".to_string()], &[], &span(), &gctx, &mut ctx, &mut diags);
        assert!(diags.has_errors());
    }
}
