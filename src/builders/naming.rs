//! Naming-family builders (§4.6.7): `domain`, `grammar`, `profile`,
//! `lexeme_spec`, `lexeme`, `lexeme_list`. Each lowers field names into
//! camelCase and normalizes `cultureId`; C12 signature-merges the results
//! and attaches them to cultures (`crate::naming`).

use crate::builders::{apply_label_field, build_object_from_statements};
use crate::diagnostics::DiagnosticSink;
use crate::eval::{parse_resource_reference, resolve_resource_reference, value_to_json, EvalContext};
use crate::value::{Span, Statement, Value};
use serde_json::{Map, Value as Json};

const FIELD_RENAMES: &[(&str, &str)] = &[
    ("length", "lengthRange"),
    ("templates", "syllableTemplates"),
    ("target", "targetCount"),
    ("word_roots", "wordRoots"),
    ("apostrophe_rate", "apostropheRate"),
];

const NESTED_OBJECT_KEYS: &[&str] = &["phonology", "morphology", "style"];

fn build_naming_item(block: &str, labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut rule_lines = Vec::new();
    let mut strategy_groups = Vec::new();
    let mut culture_value = None;
    let mut culture_span = None;
    let mut plain = Vec::new();

    for stmt in body {
        match stmt {
            Statement::Attribute { key, value, span: s, .. } if key == "culture_id" || key == "cultureId" => {
                culture_value = Some(value.clone());
                culture_span = Some(s.clone());
            }
            Statement::Attribute { key, .. } if block == "grammar" && key == "rule" => {
                rule_lines.push(stmt.clone());
            }
            Statement::Block { name, body: sgbody, span: s, .. } if block == "profile" && name == "strategy_group" => {
                strategy_groups.push(build_strategy_group(sgbody, s, ctx, diags));
            }
            other => plain.push(other.clone()),
        }
    }

    let mut obj = build_object_from_statements(&plain, ctx, diags);
    obj = rename_keys(obj);
    apply_quality_filter(&mut obj);
    for key in NESTED_OBJECT_KEYS {
        if let Some(Json::Object(inner)) = obj.get(*key).cloned() {
            obj.insert(key.to_string(), Json::Object(rename_keys(inner)));
        }
    }

    if !rule_lines.is_empty() {
        let mut rules = Map::new();
        for stmt in &rule_lines {
            let Statement::Attribute { labels: rlabels, value, span: s, .. } = stmt else { continue };
            let Some(name) = rlabels.first() else {
                diags.error("E0226", "rule requires a <name>", Some(s.clone()));
                continue;
            };
            let tokens = value.as_array().unwrap_or(&[]);
            let alt: Vec<Json> = tokens.iter().map(|v| value_to_json(v, s, ctx, diags)).collect();
            match rules.get_mut(name) {
                Some(Json::Array(items)) => items.push(Json::Array(alt)),
                _ => {
                    rules.insert(name.clone(), Json::Array(vec![Json::Array(alt)]));
                }
            }
        }
        obj.insert("rules".to_string(), Json::Object(rules));
    }

    if !strategy_groups.is_empty() {
        obj.insert("strategyGroups".to_string(), Json::Array(strategy_groups));
    }

    if let (Some(value), Some(s)) = (culture_value, culture_span) {
        obj.insert("cultureId".to_string(), normalize_culture_id(&value, &s, ctx, diags));
    }

    if let Some(id) = labels.first() {
        apply_label_field(&mut obj, "id", id, diags, span);
    }
    // A second label names the item; if the builder hasn't already been
    // given an explicit 'name' or 'description', the label fills
    // 'description' rather than 'name' when both would otherwise compete
    // for the same positional slot.
    if let Some(second) = labels.get(1) {
        if !obj.contains_key("description") && !obj.contains_key("name") {
            obj.insert("description".to_string(), Json::String(second.clone()));
        }
    }

    Json::Object(obj)
}

fn build_strategy_group(body: &[Statement], _span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut conditions = None;
    let mut strategies = Vec::new();

    for stmt in body {
        match stmt {
            Statement::Block { name, body: cbody, .. } if name == "conditions" => {
                conditions = Some(Json::Object(build_object_from_statements(cbody, ctx, diags)));
            }
            Statement::Attribute { key, labels, value, span: s } if key == "strategy" => {
                let Some(stype) = labels.first() else {
                    diags.error("E0227", "strategy requires a <type>", Some(s.clone()));
                    continue;
                };
                let mut obj = Map::new();
                obj.insert("type".to_string(), Json::String(stype.clone()));
                if let Some(id) = labels.get(1) {
                    if matches!(stype.as_str(), "grammar" | "phonotactic") {
                        let allowed = [stype.clone()];
                        if let Some(resolved) = resolve_resource_reference(id, Some(&allowed), ctx, diags, s) {
                            obj.insert("id".to_string(), Json::String(resolved));
                        }
                    } else {
                        obj.insert("id".to_string(), Json::String(id.clone()));
                    }
                }
                if let Some(entries) = value.as_object() {
                    for (k, v) in entries {
                        obj.insert(k.clone(), value_to_json(v, s, ctx, diags));
                    }
                }
                if !obj.contains_key("weight") {
                    diags.error("E0227", "strategy requires an explicit 'weight'", Some(s.clone()));
                }
                strategies.push(Json::Object(obj));
            }
            _ => {}
        }
    }

    let mut out = Map::new();
    if let Some(c) = conditions {
        out.insert("conditions".to_string(), c);
    }
    out.insert("strategies".to_string(), Json::Array(strategies));
    Json::Object(out)
}

fn rename_key(key: &str) -> String {
    FIELD_RENAMES.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string()).unwrap_or_else(|| key.to_string())
}

fn rename_keys(obj: Map<String, Json>) -> Map<String, Json> {
    let mut out = Map::new();
    for (k, v) in obj {
        out.insert(rename_key(&k), v);
    }
    out
}

fn apply_quality_filter(obj: &mut Map<String, Json>) {
    if let Some(Json::Array(items)) = obj.remove("quality") {
        if items.len() >= 2 {
            let mut qf = Map::new();
            qf.insert("minLength".to_string(), items[0].clone());
            qf.insert("maxLength".to_string(), items[1].clone());
            obj.insert("qualityFilter".to_string(), Json::Object(qf));
        }
    }
}

fn normalize_culture_id(value: &Value, span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let allowed = ["culture".to_string()];
    match value {
        Value::Array(items) => {
            let ids: Vec<Json> = items.iter().filter_map(|item| resolve_one_culture_ref(item, span, ctx, diags, &allowed)).collect();
            Json::Array(ids)
        }
        other => resolve_one_culture_ref(other, span, ctx, diags, &allowed).unwrap_or(Json::Null),
    }
}

fn resolve_one_culture_ref(value: &Value, span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink, allowed: &[String]) -> Option<Json> {
    if let Some(name) = parse_resource_reference(value) {
        resolve_resource_reference(name, Some(allowed), ctx, diags, span).map(Json::String)
    } else {
        value.as_str().map(|s| Json::String(s.to_string()))
    }
}

pub fn build_domain(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    build_naming_item("domain", labels, body, span, ctx, diags)
}

pub fn build_grammar(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    build_naming_item("grammar", labels, body, span, ctx, diags)
}

pub fn build_profile(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    build_naming_item("profile", labels, body, span, ctx, diags)
}

pub fn build_lexeme_spec(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    build_naming_item("lexeme_spec", labels, body, span, ctx, diags)
}

pub fn build_lexeme(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    build_naming_item("lexeme", labels, body, span, ctx, diags)
}

pub fn build_lexeme_list(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    build_naming_item("lexeme_list", labels, body, span, ctx, diags)
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
    fn renames_fields_and_normalizes_culture_id() {
        let body = vec![
            Statement::Attribute {
                key: "length".into(),
                labels: vec![],
                value: Value::Array(vec![Value::Number(3.0), Value::Number(8.0)]),
                span: span(),
            },
            Statement::Attribute {
                key: "culture_id".into(),
                labels: vec![],
                value: Value::String("culture_a".into()),
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = build_domain(&["d1".to_string()], &body, &span(), &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert!(result.get("lengthRange").is_some());
        assert_eq!(result["cultureId"], Json::String("culture_a".into()));
        assert_eq!(result["id"], Json::String("d1".into()));
    }

    #[test]
    fn accumulates_rule_alternatives() {
        let body = vec![
            Statement::Attribute {
                key: "rule".into(),
                labels: vec!["given_name".into()],
                value: Value::Array(vec![Value::Identifier("prefix".into()), Value::Identifier("root".into())]),
                span: span(),
            },
            Statement::Attribute {
                key: "rule".into(),
                labels: vec!["given_name".into()],
                value: Value::Array(vec![Value::Identifier("root".into()), Value::Identifier("suffix".into())]),
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = build_grammar(&["g1".to_string()], &body, &span(), &mut ctx, &mut diags);
        assert_eq!(result["rules"]["given_name"].as_array().unwrap().len(), 2);
    }
}
