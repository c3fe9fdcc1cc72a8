//! Variable lowering (§4.9.3): `let <name> do … end`.

use crate::diagnostics::DiagnosticSink;
use crate::dsl::selection::lower_selection_body;
use crate::dsl::GeneratorContext;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Span, Statement};
use serde_json::{Map, Value as Json};

/// Lowers a `let <name> do … end` block into `(name, {select, required?})`.
/// Registers `<name>` as a binding (duplicates are errors).
pub fn lower_let(labels: &[String], body: &[Statement], span: &Span, gctx: &mut GeneratorContext, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> (String, Json) {
    let Some(name) = labels.first() else {
        diags.error("E0261", "let requires a <name>", Some(span.clone()));
        return (String::new(), Json::Null);
    };
    if gctx.is_bound(name) {
        diags.error("E0262", format!("duplicate let binding '{name}'"), Some(span.clone()));
    }
    gctx.declare(name);

    let mut rest = Vec::new();
    let mut from_value = None;
    let mut required = None;

    for stmt in body {
        match stmt {
            Statement::From { source, relationship, direction, .. } => {
                from_value = Some(lower_from(source, relationship.as_deref(), direction.as_deref(), gctx));
            }
            Statement::Attribute { key, value, span: s, .. } if key == "required" => {
                required = Some(value_to_json(value, s, ctx, diags));
            }
            other => rest.push(other.clone()),
        }
    }

    let selection = lower_selection_body(None, &rest, span, gctx, ctx, diags);
    let mut select = match selection {
        Json::Object(m) => m,
        _ => Map::new(),
    };
    if let Some(from) = from_value {
        select.insert("from".to_string(), from);
    }

    let mut entry = Map::new();
    entry.insert("select".to_string(), Json::Object(select));
    if let Some(r) = required {
        entry.insert("required".to_string(), r);
    }
    (name.clone(), Json::Object(entry))
}

fn lower_from(source: &str, relationship: Option<&str>, direction: Option<&str>, gctx: &GeneratorContext) -> Json {
    if source == "graph" {
        return Json::String("graph".to_string());
    }
    let mut obj = Map::new();
    obj.insert("relatedTo".to_string(), Json::String(gctx.normalize_ref(source)));
    if let Some(rel) = relationship {
        obj.insert("relationshipKind".to_string(), Json::String(rel.to_string()));
    }
    if let Some(dir) = direction {
        obj.insert("direction".to_string(), Json::String(dir.to_string()));
    }
    Json::Object(obj)
}
