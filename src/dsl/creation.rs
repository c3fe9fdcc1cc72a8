//! Creation and relationship lowering (§4.9.4): `create <name> {…}` and
//! `rel <kind> <src> <dst> {…}`.

use crate::diagnostics::DiagnosticSink;
use crate::dsl::GeneratorContext;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Span, Statement, Value};
use serde_json::{Map, Value as Json};

/// Lowers a `create <name> {…}` statement, registering `<name>` as a
/// binding and setting `entityRef` to its normalized form.
pub fn lower_create(stmt: &Statement, gctx: &mut GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Option<Json> {
    match stmt {
        Statement::Attribute { key, labels, value, span } if key == "create" => {
            let Some(name) = labels.first() else {
                diags.error("E0251", "create requires a <name>", Some(span.clone()));
                return None;
            };
            let mut obj = match value {
                Value::Object(_) => value_to_json(value, span, ctx, diags).as_object().cloned().map(Map::from_iter).unwrap_or_default(),
                _ => Map::new(),
            };
            let entity_ref = gctx.declare(name);
            obj.insert("entityRef".to_string(), Json::String(entity_ref));
            Some(Json::Object(obj))
        }
        Statement::Block { name, labels, body, span } if name == "create" => {
            let Some(item_name) = labels.first() else {
                diags.error("E0251", "create requires a <name>", Some(span.clone()));
                return None;
            };
            let mut obj = crate::builders::build_object_from_statements(body, ctx, diags);
            let entity_ref = gctx.declare(item_name);
            obj.insert("entityRef".to_string(), Json::String(entity_ref));
            Some(Json::Object(obj))
        }
        other => {
            diags.error("E0251", "unrecognized create statement", Some(other.span().clone()));
            None
        }
    }
}

/// Lowers a `rel <kind> <src> <dst> {…}` statement (§4.9.4). `src`/`dst`
/// must already be declared bindings or the literal `any`; `strength` is
/// required.
pub fn lower_rel(kind: &str, src: &str, dst: &str, value: &Value, span: &Span, gctx: &GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut obj = Map::new();
    obj.insert("relationshipKind".to_string(), Json::String(kind.to_string()));

    if src != "any" && !gctx.is_bound(src) {
        diags.error("E0252", format!("rel source '{src}' is not a declared binding"), Some(span.clone()));
    }
    if dst != "any" && !gctx.is_bound(dst) {
        diags.error("E0252", format!("rel destination '{dst}' is not a declared binding"), Some(span.clone()));
    }
    obj.insert("src".to_string(), Json::String(gctx.normalize_ref(src)));
    obj.insert("dst".to_string(), Json::String(gctx.normalize_ref(dst)));

    let pairs = flat_kv_pairs(value);
    let mut has_strength = false;
    for (key, v) in pairs {
        if key == "strength" {
            has_strength = true;
        }
        obj.insert(key, value_to_json(&v, span, ctx, diags));
    }
    if !has_strength {
        diags.error("E0253", "rel requires a 'strength'", Some(span.clone()));
    }

    let mut json = Json::Object(obj);
    crate::dsl::normalize_references(&mut json, gctx);
    json
}

/// Parses the flat token array produced for the trailing attributes of a
/// `rel` statement (e.g. `strength : 0.5`) into key/value pairs, dropping
/// the colon placeholders the lexer emits between them.
fn flat_kv_pairs(value: &Value) -> Vec<(String, Value)> {
    let Some(items) = value.as_array() else { return Vec::new() };
    let filtered: Vec<&Value> = items.iter().filter(|v| !matches!(v, Value::Identifier(s) if s == ":")).collect();
    let mut pairs = Vec::new();
    let mut i = 0;
    while i + 1 < filtered.len() {
        match filtered[i].as_str() {
            Some(key) => {
                pairs.push((key.to_string(), filtered[i + 1].clone()));
                i += 2;
            }
            None => i += 1,
        }
    }
    pairs
}
