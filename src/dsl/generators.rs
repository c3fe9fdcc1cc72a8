//! Generator body lowering (§4.9, entry point for `generator` blocks):
//! `when`, `choose <alias> [from <kind>] do … end`, `let`, `create`, `rel`,
//! and `mutate pressure` siblings folding into one lowered generator object.

use crate::diagnostics::DiagnosticSink;
use crate::dsl::conditions::lower_condition_block;
use crate::dsl::creation::{lower_create, lower_rel};
use crate::dsl::mutate::lower_mutate;
use crate::dsl::selection::lower_selection_body;
use crate::dsl::variables::lower_let;
use crate::dsl::GeneratorContext;
use crate::eval::EvalContext;
use crate::value::{Span, Statement};
use serde_json::{Map, Value as Json};

pub fn lower_generator_body(body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut gctx = GeneratorContext::new();
    let mut out = Map::new();
    let mut applicability = Vec::new();
    let mut creation = Vec::new();
    let mut relationships = Vec::new();
    let mut state_updates = Vec::new();
    let mut variables = Map::new();

    for stmt in body {
        match stmt {
            Statement::Block { name, labels, body: wbody, .. } if name == "when" => {
                applicability.push(lower_condition_block(labels, wbody, &gctx, ctx, diags));
            }
            Statement::Block { name, labels, body: cbody, span: s } if matches!(name.as_str(), "choose" | "selection") => {
                if let Some(alias) = labels.first() {
                    gctx.declare(alias);
                }
                let from_kind = labels.iter().position(|l| l == "from").and_then(|i| labels.get(i + 1)).map(|s| s.as_str());
                if out.contains_key("selection") {
                    diags.error("E0291", "selection already defined for this generator", Some(s.clone()));
                } else {
                    out.insert("selection".to_string(), lower_selection_body(from_kind, cbody, s, &gctx, ctx, diags));
                }
            }
            Statement::Block { name, labels, body: lbody, span: s } if name == "let" => {
                let (name, entry) = lower_let(labels, lbody, s, &mut gctx, ctx, diags);
                if !name.is_empty() {
                    variables.insert(name, entry);
                }
            }
            Statement::Attribute { key, .. } if key == "create" => {
                if let Some(v) = lower_create(stmt, &mut gctx, ctx, diags) {
                    creation.push(v);
                }
            }
            Statement::Block { name, .. } if name == "create" => {
                if let Some(v) = lower_create(stmt, &mut gctx, ctx, diags) {
                    creation.push(v);
                }
            }
            Statement::Rel { kind, src, dst, value, span: s } => {
                relationships.push(lower_rel(kind, src, dst, value, s, &gctx, ctx, diags));
            }
            Statement::Mutate { target, id, operator, value, span: s } => {
                if let Some(m) = lower_mutate(target, id, *operator, value, s, ctx, diags) {
                    state_updates.push(m);
                }
            }
            other => diags.error("E0291", "unrecognized generator statement", Some(other.span().clone())),
        }
    }

    if !applicability.is_empty() {
        out.insert("applicability".to_string(), Json::Array(applicability));
    }
    if !variables.is_empty() {
        out.insert("variables".to_string(), Json::Object(variables));
    }
    if !creation.is_empty() {
        out.insert("creation".to_string(), Json::Array(creation));
    }
    if !relationships.is_empty() {
        out.insert("relationships".to_string(), Json::Array(relationships));
    }
    if !state_updates.is_empty() {
        out.insert("stateUpdates".to_string(), Json::Array(state_updates));
    }
    let _ = span;
    Json::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceRegistry;
    use crate::value::{Operator, Position, Value};
    use std::collections::HashMap;

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    #[test]
    fn lowers_seed_test_s3_generator() {
        let body = vec![
            Statement::Block {
                name: "when".into(),
                labels: vec![],
                body: vec![Statement::Predicate {
                    keyword: "pressure".into(),
                    subject: "tension".into(),
                    field: None,
                    operator: Operator::Ge,
                    value: Value::Number(3.0),
                    span: span(),
                }],
                span: span(),
            },
            Statement::Block {
                name: "choose".into(),
                labels: vec!["target".to_string(), "from".to_string(), "npc".to_string()],
                body: vec![Statement::Attribute {
                    key: "pick".into(),
                    labels: vec![],
                    value: Value::Identifier("random".into()),
                    span: span(),
                }],
                span: span(),
            },
            Statement::Rel {
                kind: "friend_of".into(),
                src: "target".into(),
                dst: "target".into(),
                value: Value::Array(vec![Value::Identifier("strength".into()), Value::Identifier(":".into()), Value::Number(0.5)]),
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = lower_generator_body(&body, &span(), &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert_eq!(result["applicability"][0]["type"], Json::String("and".into()));
        assert_eq!(result["applicability"][0]["conditions"][0]["pressureId"], Json::String("tension".into()));
        assert_eq!(result["selection"]["kind"], Json::String("npc".into()));
        assert_eq!(result["selection"]["pickStrategy"], Json::String("random".into()));
        assert_eq!(result["relationships"][0]["src"], Json::String("$target".into()));
        assert_eq!(result["relationships"][0]["dst"], Json::String("$target".into()));
        assert_eq!(result["relationships"][0]["strength"], Json::from(0.5));
    }
}
