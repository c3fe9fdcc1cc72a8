//! Condition lowering (§4.9.1): `pressure`, `cap`, `relationship_count`,
//! `prominence`, `lacks_tag`, `path`, and passthrough `condition` literals.

use crate::diagnostics::DiagnosticSink;
use crate::dsl::path::lower_path;
use crate::dsl::GeneratorContext;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Operator, Statement};
use serde_json::{json, Map, Value as Json};

pub fn lower_condition(stmt: &Statement, gctx: &GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Option<Json> {
    match stmt {
        Statement::Predicate { keyword, subject, operator, value, span, .. } if keyword == "pressure" => {
            let n = value_to_json(value, span, ctx, diags);
            let mut obj = Map::new();
            obj.insert("type".to_string(), Json::String("pressure".into()));
            obj.insert("pressureId".to_string(), Json::String(subject.clone()));
            apply_bound(&mut obj, *operator, n);
            Some(Json::Object(obj))
        }
        Statement::Predicate { keyword, subject, field, operator, value, span } if keyword == "cap" && subject == "kind" => {
            let Some(kind) = field else {
                diags.error("E0231", "cap requires 'kind <kind>'", Some(span.clone()));
                return None;
            };
            let n = value_to_json(value, span, ctx, diags);
            let mut obj = Map::new();
            obj.insert("type".to_string(), Json::String("entity_count".into()));
            obj.insert("kind".to_string(), Json::String(kind.clone()));
            apply_bound(&mut obj, *operator, n);
            Some(Json::Object(obj))
        }
        Statement::Predicate { keyword, subject, field, operator, value, span } if keyword == "relationship_count" => {
            let n = value_to_json(value, span, ctx, diags);
            let mut obj = Map::new();
            obj.insert("type".to_string(), Json::String("relationship_count".into()));
            obj.insert("relationshipKind".to_string(), Json::String(subject.clone()));
            if let Some(direction) = field {
                obj.insert("direction".to_string(), Json::String(direction.clone()));
            }
            apply_bound(&mut obj, *operator, n);
            Some(Json::Object(obj))
        }
        Statement::Attribute { key, labels, value, span } if key == "prominence" => {
            let Some(bound) = labels.first() else {
                diags.error("E0232", "prominence requires 'min' or 'max'", Some(span.clone()));
                return None;
            };
            let n = value
                .as_array()
                .and_then(|items| items.first())
                .map(|v| value_to_json(v, span, ctx, diags))
                .unwrap_or(Json::Null);
            let mut obj = Map::new();
            obj.insert("type".to_string(), Json::String("prominence".into()));
            match bound.as_str() {
                "min" => {
                    obj.insert("min".to_string(), n);
                }
                "max" => {
                    obj.insert("max".to_string(), n);
                }
                other => diags.error("E0232", format!("unknown prominence bound '{other}'"), Some(span.clone())),
            }
            Some(Json::Object(obj))
        }
        Statement::Attribute { key, labels, value, span } if key == "lacks_tag" => {
            let tag = match value.as_str() {
                Some(s) => s.to_string(),
                None => {
                    diags.error("E0233", "lacks_tag requires a tag", Some(span.clone()));
                    return None;
                }
            };
            let mut obj = Map::new();
            obj.insert("type".to_string(), Json::String("lacks_tag".into()));
            if let Some(entity) = labels.first() {
                obj.insert("entity".to_string(), Json::String(gctx.normalize_ref(entity)));
            }
            obj.insert("tag".to_string(), Json::String(tag));
            Some(Json::Object(obj))
        }
        Statement::Attribute { key, value, span, .. } if key == "condition" => {
            let mut json = value_to_json(value, span, ctx, diags);
            crate::dsl::normalize_references(&mut json, gctx);
            Some(json)
        }
        Statement::Block { name, labels, body, span } if name == "path" => Some(lower_path(labels, body, span, gctx, ctx, diags)),
        other => {
            diags.error("E0234", "unrecognized condition statement", Some(other.span().clone()));
            None
        }
    }
}

fn apply_bound(obj: &mut Map<String, Json>, op: Operator, value: Json) {
    match op {
        Operator::Ge | Operator::Gt => {
            obj.insert("min".to_string(), value);
        }
        Operator::Le | Operator::Lt => {
            obj.insert("max".to_string(), value);
        }
        Operator::Eq => {
            obj.insert("min".to_string(), value.clone());
            obj.insert("max".to_string(), value);
        }
    }
}

/// Lowers a `when`/`constraints` block into `{type:'and'|'or', conditions}`
/// (§4.9.1). `or` is selected by the `any`/`or` label; default is `all`/`and`.
pub fn lower_condition_block(labels: &[String], body: &[Statement], gctx: &GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let op = if labels.iter().any(|l| l == "any" || l == "or") { "or" } else { "and" };
    let conditions: Vec<Json> = body.iter().filter_map(|stmt| lower_condition(stmt, gctx, ctx, diags)).collect();
    json!({ "type": op, "conditions": conditions })
}
