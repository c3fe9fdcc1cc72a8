//! State-update and action-mutation lowering (§4.9.5): `mutate pressure …`
//! and the action-only attribute mutations (`set_tag`, `remove_tag`, …).

use crate::diagnostics::DiagnosticSink;
use crate::dsl::GeneratorContext;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{MutateOp, Span, Statement, Value};
use serde_json::{Map, Value as Json};

/// Lowers `mutate pressure <id> +=|-= <n>` into
/// `{type:'modify_pressure', pressureId, delta}`, used both for generator
/// `stateUpdates` and action `outcome.mutations` entries.
pub fn lower_mutate(target: &str, id: &str, operator: MutateOp, value: &Value, span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Option<Json> {
    if target != "pressure" {
        diags.error("E0271", format!("unknown mutate target '{target}'"), Some(span.clone()));
        return None;
    }
    let n = value_to_json(value, span, ctx, diags);
    let delta = match (operator, n.as_f64()) {
        (MutateOp::Add, Some(n)) => Json::from(n),
        (MutateOp::Sub, Some(n)) => Json::from(-n),
        _ => {
            diags.error("E0272", "mutate pressure requires a numeric delta", Some(span.clone()));
            Json::Null
        }
    };
    let mut obj = Map::new();
    obj.insert("type".to_string(), Json::String("modify_pressure".into()));
    obj.insert("pressureId".to_string(), Json::String(id.to_string()));
    obj.insert("delta".to_string(), delta);
    Some(Json::Object(obj))
}

/// Lowers the action-only attribute mutations that appear inside
/// `on success do … end`: `set_tag`, `remove_tag`, `change_status`,
/// `adjust_prominence`, `archive_relationship`, `archive_all_relationships`,
/// `update_rate_limit`.
pub fn lower_attribute_mutation(stmt: &Statement, gctx: &GeneratorContext, diags: &mut DiagnosticSink) -> Option<Json> {
    let Statement::Attribute { key, labels, value, span } = stmt else {
        diags.error("E0273", "unrecognized action mutation statement", Some(stmt.span().clone()));
        return None;
    };
    let Some(entity) = labels.first() else {
        diags.error("E0273", format!("'{key}' requires a target"), Some(span.clone()));
        return None;
    };
    let args = value.as_array().unwrap_or(&[]);
    let mut obj = Map::new();
    obj.insert("type".to_string(), Json::String(key.clone()));

    match key.as_str() {
        "set_tag" => {
            obj.insert("entity".to_string(), Json::String(gctx.normalize_ref(entity)));
            if let Some(tag) = args.first().and_then(ident_or_string) {
                obj.insert("tag".to_string(), Json::String(tag.to_string()));
            }
            match args.get(1).and_then(ident_or_string) {
                Some("value") => {
                    if let Some(v) = args.get(2) {
                        obj.insert("value".to_string(), literal_json(v));
                    }
                }
                Some("from") => {
                    if let Some(from) = args.get(2).and_then(ident_or_string) {
                        obj.insert("from".to_string(), Json::String(gctx.normalize_ref(from)));
                    }
                }
                Some(other) => {
                    obj.insert("value".to_string(), Json::String(other.to_string()));
                }
                None => {}
            }
        }
        "remove_tag" => {
            obj.insert("entity".to_string(), Json::String(gctx.normalize_ref(entity)));
            if let Some(tag) = args.first().and_then(ident_or_string) {
                obj.insert("tag".to_string(), Json::String(tag.to_string()));
            }
        }
        "change_status" => {
            obj.insert("entity".to_string(), Json::String(gctx.normalize_ref(entity)));
            if let Some(status) = args.first().and_then(ident_or_string) {
                obj.insert("status".to_string(), Json::String(status.to_string()));
            }
        }
        "adjust_prominence" => {
            obj.insert("entity".to_string(), Json::String(gctx.normalize_ref(entity)));
            if let Some(delta) = args.first() {
                obj.insert("delta".to_string(), literal_json(delta));
            }
        }
        "archive_relationship" => {
            obj.insert("relationshipKind".to_string(), Json::String(entity.clone()));
            if let Some(src) = args.first().and_then(ident_or_string) {
                obj.insert("src".to_string(), Json::String(gctx.normalize_ref(src)));
            }
            if let Some(dst) = args.get(1).and_then(ident_or_string) {
                obj.insert("dst".to_string(), Json::String(gctx.normalize_ref(dst)));
            }
        }
        "archive_all_relationships" => {
            obj.insert("entity".to_string(), Json::String(gctx.normalize_ref(entity)));
            if let Some(kind) = args.first().and_then(ident_or_string) {
                obj.insert("relationshipKind".to_string(), Json::String(kind.to_string()));
            }
        }
        "update_rate_limit" => {
            obj.insert("rateLimitId".to_string(), Json::String(entity.clone()));
            if let Some(v) = args.first() {
                obj.insert("value".to_string(), literal_json(v));
            }
        }
        other => {
            diags.error("E0273", format!("unknown action mutation '{other}'"), Some(span.clone()));
            return None;
        }
    }

    let mut json = Json::Object(obj);
    crate::dsl::normalize_references(&mut json, gctx);
    Some(json)
}

fn ident_or_string(v: &Value) -> Option<&str> {
    match v {
        Value::Identifier(s) | Value::String(s) => Some(s),
        _ => None,
    }
}

fn literal_json(v: &Value) -> Json {
    match v {
        Value::Number(n) => serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
        Value::Bool(b) => Json::Bool(*b),
        Value::Null => Json::Null,
        Value::String(s) | Value::Identifier(s) => Json::String(s.clone()),
        other => Json::String(format!("{other:?}")),
    }
}
