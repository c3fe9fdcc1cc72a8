//! Action body lowering (§4.9.7): `actor`/`target` selection and
//! conditions, `on success`, and the outcome/probability attributes.

use crate::diagnostics::DiagnosticSink;
use crate::dsl::conditions::lower_condition_block;
use crate::dsl::mutate::{lower_attribute_mutation, lower_mutate};
use crate::dsl::selection::lower_selection_body;
use crate::dsl::GeneratorContext;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Span, Statement, Value};
use serde_json::{Map, Value as Json};

/// Lowers a complete action body into the generator/action JSON shape
/// described by §4.9.7, folding in `actor`, `target`, `on success`, and the
/// remaining probability/narrative attributes.
pub fn lower_action_body(body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut gctx = GeneratorContext::new();
    let mut out = Map::new();
    let mut pressure_modifiers = Vec::new();

    for stmt in body {
        match stmt {
            Statement::Block { name, body: abody, span: s, .. } if name == "actor" => {
                out.insert("actor".to_string(), lower_actor(abody, s, &mut gctx, ctx, diags));
            }
            Statement::Block { name, body: tbody, span: s, .. } if name == "target" => {
                out.insert("targeting".to_string(), lower_target(tbody, s, &gctx, ctx, diags));
            }
            Statement::Block { name, labels, body: obody, .. } if name == "on" && labels.iter().any(|l| l == "success") => {
                let mutations = lower_outcome_mutations(obody, &gctx, ctx, diags);
                let mut outcome = out.remove("outcome").and_then(|v| if let Json::Object(m) = v { Some(m) } else { None }).unwrap_or_default();
                outcome.insert("mutations".to_string(), Json::Array(mutations));
                out.insert("outcome".to_string(), Json::Object(outcome));
            }
            Statement::Attribute { key, value, span: s, .. } if matches!(key.as_str(), "narrative" | "description_template") => {
                out.insert("descriptionTemplate".to_string(), value_to_json(value, s, ctx, diags));
            }
            Statement::Attribute { key, value, span: s, .. } if key == "success_chance" => {
                out.insert("successChance".to_string(), value_to_json(value, s, ctx, diags));
            }
            Statement::Attribute { key, value, span: s, .. } if key == "weight" => {
                out.insert("weight".to_string(), value_to_json(value, s, ctx, diags));
            }
            Statement::Attribute { key, labels, value, span: s } if key == "pressure_modifier" => {
                let mut m = Map::new();
                if let Some(pressure_id) = labels.first() {
                    m.insert("pressureId".to_string(), Json::String(pressure_id.clone()));
                }
                m.insert("multiplier".to_string(), value_to_json(value, s, ctx, diags));
                pressure_modifiers.push(Json::Object(m));
            }
            Statement::Attribute { key, labels, value, span: s } if key == "prominence" => {
                apply_prominence_delta(&mut out, labels, value, s, diags);
            }
            other => diags.error("E0281", "unrecognized action statement", Some(other.span().clone())),
        }
    }

    if !pressure_modifiers.is_empty() {
        let mut probability = out.remove("probability").and_then(|v| if let Json::Object(m) = v { Some(m) } else { None }).unwrap_or_default();
        probability.insert("pressureModifiers".to_string(), Json::Array(pressure_modifiers));
        out.insert("probability".to_string(), Json::Object(probability));
    }

    Json::Object(out)
}

fn lower_actor(body: &[Statement], span: &Span, gctx: &mut GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut actor = Map::new();
    for stmt in body {
        match stmt {
            Statement::Block { name, body: cbody, .. } if matches!(name.as_str(), "choose" | "selection") => {
                actor.insert("selection".to_string(), lower_selection_body(None, cbody, span, gctx, ctx, diags));
            }
            Statement::Block { name, labels, body: wbody, .. } if name == "when" => {
                actor.insert("conditions".to_string(), lower_condition_block(labels, wbody, gctx, ctx, diags));
            }
            Statement::Block { name, body: ibody, span: is, .. } if name == "instigator" => {
                let select = lower_selection_body(None, ibody, is, gctx, ctx, diags);
                let mut instigator = Map::new();
                instigator.insert("select".to_string(), select);
                instigator.insert("required".to_string(), Json::Bool(true));
                actor.insert("instigator".to_string(), Json::Object(instigator));
            }
            other => diags.error("E0282", "unrecognized actor statement", Some(other.span().clone())),
        }
    }
    Json::Object(actor)
}

fn lower_target(body: &[Statement], span: &Span, gctx: &GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let nested = body.iter().find_map(|stmt| match stmt {
        Statement::Block { name, body: cbody, .. } if matches!(name.as_str(), "choose" | "selection") => Some(cbody.as_slice()),
        _ => None,
    });
    lower_selection_body(None, nested.unwrap_or(body), span, gctx, ctx, diags)
}

fn lower_outcome_mutations(body: &[Statement], gctx: &GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Vec<Json> {
    body.iter()
        .filter_map(|stmt| match stmt {
            Statement::Mutate { target, id, operator, value, span } => lower_mutate(target, id, *operator, value, span, ctx, diags),
            Statement::Attribute { .. } => lower_attribute_mutation(stmt, gctx, diags),
            other => {
                diags.error("E0283", "unrecognized outcome mutation", Some(other.span().clone()));
                None
            }
        })
        .collect()
}

fn apply_prominence_delta(out: &mut Map<String, Json>, labels: &[String], value: &Value, span: &Span, diags: &mut DiagnosticSink) {
    let Some(subject) = labels.first() else {
        diags.error("E0284", "prominence requires 'actor' or 'target'", Some(span.clone()));
        return;
    };
    let field = match subject.as_str() {
        "actor" => "actorProminenceDelta",
        "target" => "targetProminenceDelta",
        other => {
            diags.error("E0284", format!("unknown prominence subject '{other}'"), Some(span.clone()));
            return;
        }
    };
    let tokens = value.as_array().unwrap_or(&[]);
    let mut delta = Map::new();
    if tokens.first().and_then(ident_or_string) == Some("success") {
        if let Some(Value::Number(n)) = tokens.get(1) {
            delta.insert("success".to_string(), Json::from(*n));
        }
    }
    if tokens.get(2).and_then(ident_or_string) == Some("failure") {
        if let Some(Value::Number(n)) = tokens.get(3) {
            delta.insert("failure".to_string(), Json::from(*n));
        }
    }
    let mut outcome = out.remove("outcome").and_then(|v| if let Json::Object(m) = v { Some(m) } else { None }).unwrap_or_default();
    outcome.insert(field.to_string(), Json::Object(delta));
    out.insert("outcome".to_string(), Json::Object(outcome));
}

fn ident_or_string(v: &Value) -> Option<&str> {
    match v {
        Value::Identifier(s) | Value::String(s) => Some(s),
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
    fn lowers_actor_target_and_outcome() {
        let body = vec![
            Statement::Block {
                name: "actor".into(),
                labels: vec![],
                body: vec![Statement::Block {
                    name: "choose".into(),
                    labels: vec![],
                    body: vec![Statement::Attribute {
                        key: "pick".into(),
                        labels: vec![],
                        value: Value::Identifier("random".into()),
                        span: span(),
                    }],
                    span: span(),
                }],
                span: span(),
            },
            Statement::Attribute {
                key: "success_chance".into(),
                labels: vec![],
                value: Value::Number(0.5),
                span: span(),
            },
            Statement::Attribute {
                key: "prominence".into(),
                labels: vec!["actor".into()],
                value: Value::Array(vec![
                    Value::Identifier("success".into()),
                    Value::Number(2.0),
                    Value::Identifier("failure".into()),
                    Value::Number(-1.0),
                ]),
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = lower_action_body(&body, &span(), &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert_eq!(result["actor"]["selection"]["pickStrategy"], Json::String("random".into()));
        assert_eq!(result["successChance"], Json::from(0.5));
        assert_eq!(result["outcome"]["actorProminenceDelta"]["success"], Json::from(2.0));
        assert_eq!(result["outcome"]["actorProminenceDelta"]["failure"], Json::from(-1.0));
    }
}
