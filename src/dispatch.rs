//! Block dispatcher (C8, §4.8).
//!
//! Maps each collected top-level block to its target collection or
//! singleton, invoking the matching C9/C10/C11 builder, then enforces
//! singleton uniqueness, per-collection id uniqueness, and final sort
//! order. Naming-family blocks (`domain`/`grammar`/`profile`/
//! `lexeme_spec`/`lexeme`/`lexeme_list`) never reach this pass; C12 pulls
//! them out of the statement list first.

use crate::builders::{apply_label_field, build_object_from_statements, culture, entity_kind, positional, seed, system};
use crate::diagnostics::DiagnosticSink;
use crate::dsl::{actions, generators, is_dsl_body};
use crate::eval::EvalContext;
use crate::value::{Span, Statement};
use serde_json::{Map, Value as Json};

#[derive(Clone, Copy)]
enum Target {
    Singleton { merge_into_root: bool },
    Collection { id_key: Option<&'static str>, sort_key: Option<&'static str> },
}

type Builder = fn(&[String], &[Statement], &Span, &mut EvalContext, &mut DiagnosticSink) -> Json;

struct BlockSpec {
    name: &'static str,
    target_key: &'static str,
    target: Target,
    builder: Builder,
}

fn generic(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut obj = build_object_from_statements(body, ctx, diags);
    if let Some(id) = labels.first() {
        apply_label_field(&mut obj, "id", id, diags, span);
        if let Some(name) = labels.get(1) {
            apply_label_field(&mut obj, "name", name, diags, span);
        }
    }
    Json::Object(obj)
}

fn generator_or_action(body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink, dsl: Builder, plain: Builder) -> Json {
    if is_dsl_body(body) {
        dsl(&[], body, span, ctx, diags)
    } else {
        plain(&[], body, span, ctx, diags)
    }
}

fn build_generator(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut value = generator_or_action(
        body,
        span,
        ctx,
        diags,
        |_, b, s, c, d| generators::lower_generator_body(b, s, c, d),
        build_object_from_statements_wrapped,
    );
    apply_top_labels(&mut value, labels, span, diags);
    value
}

fn build_action(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut value = generator_or_action(
        body,
        span,
        ctx,
        diags,
        |_, b, s, c, d| actions::lower_action_body(b, s, c, d),
        build_object_from_statements_wrapped,
    );
    apply_top_labels(&mut value, labels, span, diags);
    value
}

fn build_object_from_statements_wrapped(_labels: &[String], body: &[Statement], _span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    Json::Object(build_object_from_statements(body, ctx, diags))
}

fn apply_top_labels(value: &mut Json, labels: &[String], span: &Span, diags: &mut DiagnosticSink) {
    let Json::Object(obj) = value else { return };
    if let Some(id) = labels.first() {
        apply_label_field(obj, "id", id, diags, span);
        if let Some(name) = labels.get(1) {
            apply_label_field(obj, "name", name, diags, span);
        }
    }
}

const SPECS: &[BlockSpec] = &[
    BlockSpec {
        name: "project",
        target_key: "project",
        target: Target::Singleton { merge_into_root: true },
        builder: build_object_from_statements_wrapped,
    },
    BlockSpec {
        name: "ui_config",
        target_key: "uiConfig",
        target: Target::Singleton { merge_into_root: false },
        builder: build_object_from_statements_wrapped,
    },
    BlockSpec {
        name: "distribution_targets",
        target_key: "distributionTargets",
        target: Target::Singleton { merge_into_root: false },
        builder: build_object_from_statements_wrapped,
    },
    BlockSpec {
        name: "generator",
        target_key: "generators",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: build_generator,
    },
    BlockSpec {
        name: "action",
        target_key: "actions",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: build_action,
    },
    BlockSpec {
        name: "pressure",
        target_key: "pressures",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: generic,
    },
    BlockSpec {
        name: "era",
        target_key: "eras",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: generic,
    },
    BlockSpec {
        name: "region",
        target_key: "regions",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: generic,
    },
    BlockSpec {
        name: "entity_kind",
        target_key: "entityKinds",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: |l, b, s, c, d| entity_kind::build_entity_kind(l, b, s, c, d),
    },
    BlockSpec {
        name: "relationship_kind",
        target_key: "relationshipKinds",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: |l, b, s, c, d| positional::build_relationship_kind(l, b, s, c, d),
    },
    BlockSpec {
        name: "culture",
        target_key: "cultures",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: |l, b, s, c, d| culture::build_culture(l, b, s, c, d),
    },
    BlockSpec {
        name: "tag",
        target_key: "tagRegistry",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: |l, b, s, c, d| positional::build_tag(l, b, s, c, d),
    },
    BlockSpec {
        name: "axis",
        target_key: "axisDefinitions",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: |l, b, s, c, d| positional::build_axis(l, b, s, c, d),
    },
    BlockSpec {
        name: "system",
        target_key: "systems",
        target: Target::Collection { id_key: None, sort_key: None },
        builder: |l, b, s, c, d| system::build_system(l, b, s, c, d),
    },
    BlockSpec {
        name: "seed_entity",
        target_key: "seedEntities",
        target: Target::Collection { id_key: Some("id"), sort_key: None },
        builder: |l, b, s, c, d| seed::build_seed_entity(l, b, s, c, d),
    },
    BlockSpec {
        name: "seed_relationship",
        target_key: "seedRelationships",
        target: Target::Collection { id_key: None, sort_key: None },
        builder: |l, b, s, c, d| seed::build_seed_relationship(l, b, s, c, d),
    },
];

fn spec_for(name: &str) -> Option<&'static BlockSpec> {
    SPECS.iter().find(|spec| spec.name == name)
}

/// Dispatches every top-level block (post C5, post C12) to its target
/// collection or singleton, producing the root output map before C13
/// validation runs.
pub fn dispatch_blocks(statements: &[Statement], ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut root = Map::new();
    let mut collections: Map<String, Vec<Json>> = Map::new();
    let mut seen_ids: Map<String, std::collections::HashSet<String>> = Map::new();
    let mut sort_keys: Map<String, &'static str> = Map::new();

    for stmt in statements {
        let Statement::Block { name, labels, body, span } = stmt else {
            diags.error("E0255", "unexpected top-level statement", Some(stmt.span().clone()));
            continue;
        };
        if name == "static_page" {
            continue;
        }
        let Some(spec) = spec_for(name) else {
            diags.error("E0254", format!("unknown block name '{name}'"), Some(span.clone()));
            continue;
        };
        let item = (spec.builder)(labels, body, span, ctx, diags);
        match spec.target {
            Target::Singleton { merge_into_root } => {
                if root.contains_key(spec.target_key) && !merge_into_root {
                    diags.error("E0256", format!("'{}' singleton defined more than once", spec.name), Some(span.clone()));
                    continue;
                }
                if merge_into_root {
                    let Json::Object(fields) = item else { continue };
                    for (k, v) in fields {
                        if collections.contains_key(&k) || root.contains_key(&k) {
                            diags.error("E0257", format!("project field '{k}' collides with an existing key"), Some(span.clone()));
                            continue;
                        }
                        root.insert(k, v);
                    }
                    root.insert("__project_seen".to_string(), Json::Bool(true));
                } else if root.contains_key(spec.target_key) {
                    diags.error("E0256", format!("'{}' singleton defined more than once", spec.name), Some(span.clone()));
                } else {
                    root.insert(spec.target_key.to_string(), item);
                }
            }
            Target::Collection { id_key, sort_key } => {
                if let Some(key) = sort_key.or(id_key) {
                    sort_keys.entry(spec.target_key.to_string()).or_insert(key);
                }
                if let Some(key) = id_key {
                    if let Some(Json::String(id)) = item.get(key) {
                        let set = seen_ids.entry(spec.target_key.to_string()).or_default();
                        if !set.insert(id.clone()) {
                            diags.error("E0258", format!("duplicate '{key}' \"{id}\" in {}", spec.target_key), Some(span.clone()));
                        }
                    }
                }
                collections.entry(spec.target_key.to_string()).or_default().push(item);
            }
        }
    }

    if root.remove("__project_seen").is_none() {
        diags.error("E0259", "missing required 'project' block", None);
    }

    for (key, mut items) in collections {
        let sort_key = sort_keys.get(&key).copied().unwrap_or("id");
        items.sort_by(|a, b| {
            let ka = a.get(sort_key).and_then(|v| v.as_str()).unwrap_or("");
            let kb = b.get(sort_key).and_then(|v| v.as_str()).unwrap_or("");
            ka.cmp(kb)
        });
        root.insert(key, Json::Array(items));
    }

    Json::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceRegistry;
    use crate::value::{Position, Value};
    use std::collections::HashMap;

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    fn project_block() -> Statement {
        Statement::Block {
            name: "project".into(),
            labels: vec![],
            body: vec![Statement::Attribute {
                key: "name".into(),
                labels: vec![],
                value: Value::String("Demo".into()),
                span: span(),
            }],
            span: span(),
        }
    }

    #[test]
    fn merges_project_singleton_into_root() {
        let statements = vec![project_block()];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = dispatch_blocks(&statements, &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert_eq!(result["name"], Json::String("Demo".into()));
    }

    #[test]
    fn errors_on_missing_project() {
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        dispatch_blocks(&[], &mut ctx, &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn errors_on_unknown_block_name() {
        let statements = vec![
            project_block(),
            Statement::Block {
                name: "bogus".into(),
                labels: vec![],
                body: vec![],
                span: span(),
            },
        ];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        dispatch_blocks(&statements, &mut ctx, &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn dispatches_and_sorts_pressures_by_id() {
        let mk = |id: &str| Statement::Block {
            name: "pressure".into(),
            labels: vec![id.to_string()],
            body: vec![],
            span: span(),
        };
        let statements = vec![project_block(), mk("zeta"), mk("alpha")];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = dispatch_blocks(&statements, &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert_eq!(result["pressures"][0]["id"], Json::String("alpha".into()));
        assert_eq!(result["pressures"][1]["id"], Json::String("zeta".into()));
    }

    #[test]
    fn errors_on_duplicate_collection_id() {
        let mk = |id: &str| Statement::Block {
            name: "pressure".into(),
            labels: vec![id.to_string()],
            body: vec![],
            span: span(),
        };
        let statements = vec![project_block(), mk("alpha"), mk("alpha")];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        dispatch_blocks(&statements, &mut ctx, &mut diags);
        assert!(diags.has_errors());
    }
}
