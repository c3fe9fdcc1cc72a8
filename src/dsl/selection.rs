//! Selection lowering (§4.9.2): `choose <alias> [from <kind>] do … end`,
//! and the shared selection-body shape reused by `let` variables and
//! `actor`/`target` blocks (§4.9.3, §4.9.7).

use crate::diagnostics::DiagnosticSink;
use crate::dsl::path::lower_path;
use crate::dsl::GeneratorContext;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Operator, Span, Statement, Value};
use serde_json::{Map, Value as Json};

pub fn lower_selection_body(
    from_kind: Option<&str>,
    body: &[Statement],
    span: &Span,
    gctx: &GeneratorContext,
    ctx: &mut EvalContext,
    diags: &mut DiagnosticSink,
) -> Json {
    let mut out = Map::new();
    if let Some(kind) = from_kind {
        out.insert("kind".to_string(), Json::String(kind.to_string()));
        out.insert("strategy".to_string(), Json::String("by_kind".to_string()));
    }
    let mut filters = Vec::new();
    let mut prefer_filters = Vec::new();
    let mut saturation_limits = Vec::new();

    for stmt in body {
        match stmt {
            Statement::Attribute { key, value, span: s, .. } if matches!(key.as_str(), "strategy" | "kinds" | "status" | "subtype" | "pick" | "max") => {
                let mapped = if key == "pick" { "pickStrategy" } else { key.as_str() };
                out.insert(mapped.to_string(), value_to_json(value, s, ctx, diags));
            }
            Statement::In { key, items, span: s } if matches!(key.as_str(), "subtype" | "status") => {
                let arr: Vec<Json> = items.iter().map(|v| value_to_json(v, s, ctx, diags)).collect();
                out.insert(key.clone(), Json::Array(arr));
            }
            Statement::Attribute { key, labels, value, span: s } if key == "filter" => {
                filters.push(lower_filter(labels, value, s, gctx, diags));
            }
            Statement::Attribute { key, labels, value, span: s } if key == "prefer" => {
                prefer_filters.push(lower_filter(labels, value, s, gctx, diags));
            }
            Statement::Block { name, labels, body: pbody, span: s } if name == "path" => {
                filters.push(lower_path(labels, pbody, s, gctx, ctx, diags));
            }
            Statement::Predicate { keyword, subject, operator, value, span: s, .. } if matches!(keyword.as_str(), "inbound" | "outbound" | "both") => {
                if *operator != Operator::Le {
                    diags.error("E0235", "saturation predicates use '<='", Some(s.clone()));
                }
                let n = value_to_json(value, s, ctx, diags);
                let mut limit = Map::new();
                limit.insert("relationshipKind".to_string(), Json::String(subject.clone()));
                limit.insert("direction".to_string(), Json::String(direction_name(keyword)));
                limit.insert("maxCount".to_string(), n);
                saturation_limits.push(Json::Object(limit));
            }
            other => diags.error("E0235", "unexpected statement in selection body", Some(other.span().clone())),
        }
    }

    if !out.contains_key("pickStrategy") {
        diags.error("E0236", "selection requires an explicit 'pickStrategy'", Some(span.clone()));
    }
    if !filters.is_empty() {
        out.insert("filters".to_string(), Json::Array(filters));
    }
    if !prefer_filters.is_empty() {
        out.insert("preferFilters".to_string(), Json::Array(prefer_filters));
    }
    if !saturation_limits.is_empty() {
        out.insert("saturationLimits".to_string(), Json::Array(saturation_limits));
    }
    Json::Object(out)
}

fn direction_name(keyword: &str) -> String {
    match keyword {
        "inbound" => "in",
        "outbound" => "out",
        other => other,
    }
    .to_string()
}

pub(crate) fn lower_filter(labels: &[String], value: &Value, span: &Span, gctx: &GeneratorContext, diags: &mut DiagnosticSink) -> Json {
    if labels.is_empty() {
        if let Value::Object(entries) = value {
            let mut obj = Map::new();
            for (k, v) in entries {
                obj.insert(k.clone(), literal_to_json(v));
            }
            let mut json = Json::Object(obj);
            crate::dsl::normalize_references(&mut json, gctx);
            return json;
        }
        diags.error("E0237", "filter requires a recognized filter type or an object literal", Some(span.clone()));
        return Json::Null;
    }

    let ftype = labels[0].as_str();
    let args = value.as_array().unwrap_or(&[]);
    let mut obj = Map::new();
    obj.insert("type".to_string(), Json::String(ftype.to_string()));
    match ftype {
        "exclude" => {
            if let Some(entity) = args.first().and_then(|v| v.as_str()) {
                obj.insert("entity".to_string(), Json::String(gctx.normalize_ref(entity)));
            }
        }
        "has_relationship" | "lacks_relationship" => {
            if let Some(kind) = args.first().and_then(|v| v.as_str()) {
                obj.insert("relationshipKind".to_string(), Json::String(kind.to_string()));
            }
            if let Some(with) = args.get(1).and_then(|v| v.as_str()) {
                obj.insert("with".to_string(), Json::String(gctx.normalize_ref(with)));
            }
        }
        "has_tag" | "lacks_tag" | "has_any_tag" => {
            let tags: Vec<Json> = args.iter().filter_map(|v| v.as_str()).map(|s| Json::String(s.to_string())).collect();
            obj.insert("tags".to_string(), Json::Array(tags));
        }
        "matches_culture" | "not_matches_culture" | "has_culture" | "not_has_culture" => {
            if let Some(culture) = args.first().and_then(|v| v.as_str()) {
                obj.insert("culture".to_string(), Json::String(gctx.normalize_ref(culture)));
            }
        }
        other => diags.error("E0237", format!("unknown filter type '{other}'"), Some(span.clone())),
    }
    Json::Object(obj)
}

fn literal_to_json(value: &Value) -> Json {
    match value {
        Value::String(s) | Value::Identifier(s) => Json::String(s.clone()),
        Value::Number(n) => serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
        Value::Bool(b) => Json::Bool(*b),
        Value::Null => Json::Null,
        Value::Array(items) => Json::Array(items.iter().map(literal_to_json).collect()),
        Value::Object(entries) => {
            let mut map = Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), literal_to_json(v));
            }
            Json::Object(map)
        }
        Value::Call { .. } => Json::Null,
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
    fn lowers_pick_and_kind_filter() {
        let body = vec![
            Statement::Attribute {
                key: "pick".into(),
                labels: vec![],
                value: Value::Identifier("random".into()),
                span: span(),
            },
            Statement::Attribute {
                key: "filter".into(),
                labels: vec!["has_tag".into()],
                value: Value::Array(vec![Value::Identifier("criminal".into())]),
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let gctx = GeneratorContext::new();
        let result = lower_selection_body(Some("npc"), &body, &span(), &gctx, &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert_eq!(result["pickStrategy"], Json::String("random".into()));
        assert_eq!(result["strategy"], Json::String("by_kind".into()));
        assert_eq!(result["filters"][0]["type"], Json::String("has_tag".into()));
    }

    #[test]
    fn errors_when_pick_strategy_missing() {
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let gctx = GeneratorContext::new();
        lower_selection_body(Some("npc"), &[], &span(), &gctx, &mut ctx, &mut diags);
        assert!(diags.has_errors());
    }
}
