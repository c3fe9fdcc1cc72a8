//! Expression evaluator (C7).
//!
//! `value_to_json` walks a [`Value`] AST and produces the lowered JSON form,
//! dispatching to variable lookup, resource reference resolution, and the
//! call library along the way (§4.7). The ambient [`EvalContext`] is an
//! explicit parameter everywhere rather than a global or thread-local, per
//! the design note in spec.md §9 about the source's module-level mutable
//! context.

use crate::diagnostics::DiagnosticSink;
use crate::registry::ResourceRegistry;
use crate::value::{Span, Value};
use serde_json::{Map, Value as Json};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub name: String,
    pub value: Value,
    pub span: Span,
}

/// Threaded through block/DSL lowering for one compilation (§3).
pub struct EvalContext<'a> {
    pub variables: &'a HashMap<String, VariableEntry>,
    pub resources: &'a ResourceRegistry,
    pub allow_ambiguous: bool,
    resolved: HashMap<String, Json>,
    resolving: HashSet<String>,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        variables: &'a HashMap<String, VariableEntry>,
        resources: &'a ResourceRegistry,
        allow_ambiguous: bool,
    ) -> Self {
        Self {
            variables,
            resources,
            allow_ambiguous,
            resolved: HashMap::new(),
            resolving: HashSet::new(),
        }
    }
}

/// Evaluates a grammar-level value into its lowered JSON form.
pub fn value_to_json(
    value: &Value,
    span: &Span,
    ctx: &mut EvalContext,
    diags: &mut DiagnosticSink,
) -> Json {
    match value {
        Value::String(s) => Json::String(s.clone()),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Bool(b) => Json::Bool(*b),
        Value::Null => Json::Null,
        Value::Identifier(name) => eval_identifier(name, span, ctx, diags),
        Value::Array(items) => Json::Array(
            items
                .iter()
                .map(|v| value_to_json(v, span, ctx, diags))
                .collect(),
        ),
        Value::Object(entries) => {
            let mut map = Map::new();
            for (key, v) in entries {
                map.insert(key.clone(), value_to_json(v, span, ctx, diags));
            }
            Json::Object(map)
        }
        Value::Call { name, args } => {
            let evaluated: Vec<Json> = args.iter().map(|a| value_to_json(a, span, ctx, diags)).collect();
            eval_call(name, &evaluated, span, diags)
        }
    }
}

fn eval_identifier(name: &str, span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let path = ["var.", "vars.", "local."]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix));
    let Some(path) = path else {
        return Json::String(name.to_string());
    };
    let mut segments = path.split('.');
    let Some(var_name) = segments.next() else {
        diags.error("E0301", format!("unknown variable path '{name}'"), Some(span.clone()));
        return Json::Null;
    };

    let base = resolve_variable(var_name, span, ctx, diags);
    let mut current = base;
    for segment in segments {
        current = match &current {
            Json::Object(map) => map.get(segment).cloned(),
            Json::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned()),
            _ => None,
        }
        .unwrap_or_else(|| {
            diags.error(
                "E0301",
                format!("unknown variable path '{name}'"),
                Some(span.clone()),
            );
            Json::Null
        });
    }
    current
}

fn resolve_variable(var_name: &str, span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    if let Some(cached) = ctx.resolved.get(var_name) {
        return cached.clone();
    }
    if ctx.resolving.contains(var_name) {
        diags.error(
            "E0302",
            "circular variable reference",
            Some(span.clone()),
        );
        return Json::Null;
    }
    let Some(entry) = ctx.variables.get(var_name) else {
        diags.error(
            "E0301",
            format!("unknown variable path 'var.{var_name}'"),
            Some(span.clone()),
        );
        return Json::Null;
    };
    let raw = entry.value.clone();
    let entry_span = entry.span.clone();
    ctx.resolving.insert(var_name.to_string());
    let value = value_to_json(&raw, &entry_span, ctx, diags);
    ctx.resolving.remove(var_name);
    ctx.resolved.insert(var_name.to_string(), value.clone());
    value
}

/// Recognizes the `<name>.id` resource-reference shape; returns `name` if
/// `value` matches it.
pub fn parse_resource_reference(value: &Value) -> Option<&str> {
    match value {
        Value::Identifier(s) => {
            let mut parts = s.splitn(2, '.');
            let name = parts.next()?;
            let rest = parts.next()?;
            (rest == "id").then_some(name)
        }
        _ => None,
    }
}

/// Resolves a resource reference (§4.7). Returns the identity id on a
/// unique match.
pub fn resolve_resource_reference(
    name: &str,
    allowed_types: Option<&[String]>,
    ctx: &EvalContext,
    diags: &mut DiagnosticSink,
    span: &Span,
) -> Option<String> {
    let matches = ctx.resources.lookup_typed(name, allowed_types);
    match matches.len() {
        0 => {
            diags.error(
                "E0401",
                format!("unknown resource reference '{name}.id'"),
                Some(span.clone()),
            );
            None
        }
        1 => Some(matches[0].id.clone()),
        _ if ctx.allow_ambiguous => Some(name.to_string()),
        _ => {
            diags.error(
                "E0402",
                format!("ambiguous resource reference '{name}.id'"),
                Some(span.clone()),
            );
            None
        }
    }
}

fn eval_call(name: &str, args: &[Json], span: &Span, diags: &mut DiagnosticSink) -> Json {
    let err = |diags: &mut DiagnosticSink, msg: String| {
        diags.error("E0501", msg, Some(span.clone()));
        Json::Null
    };

    match name {
        "if" => {
            if args.len() != 3 {
                return err(diags, "if() requires exactly 3 arguments".into());
            }
            match &args[0] {
                Json::Bool(true) => args[1].clone(),
                Json::Bool(false) => args[2].clone(),
                _ => err(diags, "if() condition must be boolean".into()),
            }
        }
        "coalesce" => args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Json::Null),
        "default" => {
            if args.len() != 2 {
                return err(diags, "default() requires exactly 2 arguments".into());
            }
            if args[0].is_null() { args[1].clone() } else { args[0].clone() }
        }
        "merge" => {
            let mut out = Map::new();
            for arg in args {
                match arg {
                    Json::Object(map) => out.extend(map.clone()),
                    _ => return err(diags, "merge() arguments must be objects".into()),
                }
            }
            Json::Object(out)
        }
        "concat" => {
            let mut out = Vec::new();
            for arg in args {
                match arg {
                    Json::Array(items) => out.extend(items.clone()),
                    _ => return err(diags, "concat() arguments must be arrays".into()),
                }
            }
            Json::Array(out)
        }
        "distinct" => {
            if args.len() != 1 {
                return err(diags, "distinct() requires exactly 1 argument".into());
            }
            let Json::Array(items) = &args[0] else {
                return err(diags, "distinct() argument must be an array".into());
            };
            if items.iter().any(|v| v.is_object() || v.is_array()) {
                return err(diags, "distinct() cannot operate on objects".into());
            }
            let mut seen = Vec::new();
            for item in items {
                if !seen.contains(item) {
                    seen.push(item.clone());
                }
            }
            Json::Array(seen)
        }
        "sort" => {
            if args.len() != 1 {
                return err(diags, "sort() requires exactly 1 argument".into());
            }
            let Json::Array(items) = &args[0] else {
                return err(diags, "sort() argument must be an array".into());
            };
            let mut items = items.clone();
            if items.iter().all(|v| v.is_number()) {
                items.sort_by(|a, b| a.as_f64().partial_cmp(&b.as_f64()).unwrap());
            } else if items.iter().all(|v| v.is_string()) {
                items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            } else {
                return err(diags, "sort() requires all-number or all-string elements".into());
            }
            Json::Array(items)
        }
        "join" => {
            if args.len() != 2 {
                return err(diags, "join() requires exactly 2 arguments".into());
            }
            let Some(sep) = args[0].as_str() else {
                return err(diags, "join() separator must be a string".into());
            };
            let Json::Array(items) = &args[1] else {
                return err(diags, "join() second argument must be an array".into());
            };
            let mut strs = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => strs.push(s.to_string()),
                    None => return err(diags, "join() array must be all strings".into()),
                }
            }
            Json::String(strs.join(sep))
        }
        "upper" | "lower" => {
            if args.len() != 1 {
                return err(diags, format!("{name}() requires exactly 1 argument"));
            }
            let Some(s) = args[0].as_str() else {
                return err(diags, format!("{name}() argument must be a string"));
            };
            Json::String(if name == "upper" { s.to_uppercase() } else { s.to_lowercase() })
        }
        "replace" => {
            if args.len() != 3 {
                return err(diags, "replace() requires exactly 3 arguments".into());
            }
            let (Some(s), Some(from), Some(to)) = (args[0].as_str(), args[1].as_str(), args[2].as_str()) else {
                return err(diags, "replace() arguments must be strings".into());
            };
            Json::String(s.replace(from, to))
        }
        "lookup" => {
            if args.len() < 2 || args.len() > 3 {
                return err(diags, "lookup() requires 2 or 3 arguments".into());
            }
            let (Some(map), Some(key)) = (args[0].as_object(), args[1].as_str()) else {
                return err(diags, "lookup() first argument must be an object".into());
            };
            map.get(key).cloned().unwrap_or_else(|| args.get(2).cloned().unwrap_or(Json::Null))
        }
        "keys" | "values" => {
            if args.len() != 1 {
                return err(diags, format!("{name}() requires exactly 1 argument"));
            }
            let Some(map) = args[0].as_object() else {
                return err(diags, format!("{name}() argument must be an object"));
            };
            if name == "keys" {
                Json::Array(map.keys().map(|k| Json::String(k.clone())).collect())
            } else {
                Json::Array(map.values().cloned().collect())
            }
        }
        "length" => {
            if args.len() != 1 {
                return err(diags, "length() requires exactly 1 argument".into());
            }
            let len = match &args[0] {
                Json::String(s) => s.chars().count(),
                Json::Array(items) => items.len(),
                Json::Object(map) => map.len(),
                _ => return err(diags, "length() argument must be a string, array, or object".into()),
            };
            Json::Number(len.into())
        }
        "and" | "or" => {
            let mut bools = Vec::with_capacity(args.len());
            for arg in args {
                match arg {
                    Json::Bool(b) => bools.push(*b),
                    _ => return err(diags, format!("{name}() arguments must be booleans")),
                }
            }
            let result = if name == "and" { bools.iter().all(|b| *b) } else { bools.iter().any(|b| *b) };
            Json::Bool(result)
        }
        "not" => {
            if args.len() != 1 {
                return err(diags, "not() requires exactly 1 argument".into());
            }
            match args[0] {
                Json::Bool(b) => Json::Bool(!b),
                _ => err(diags, "not() argument must be a boolean".into()),
            }
        }
        other => err(diags, format!("unknown call '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Position;

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    #[test]
    fn evaluates_scalar_literals() {
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        assert_eq!(
            value_to_json(&Value::Number(3.0), &span(), &mut ctx, &mut diags),
            Json::Number(serde_json::Number::from_f64(3.0).unwrap())
        );
    }

    #[test]
    fn resolves_variable_lookup() {
        let mut vars = HashMap::new();
        vars.insert(
            "foo".to_string(),
            VariableEntry {
                name: "foo".to_string(),
                value: Value::Object(vec![("bar".to_string(), Value::Number(7.0))]),
                span: span(),
            },
        );
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = value_to_json(&Value::Identifier("var.foo.bar".into()), &span(), &mut ctx, &mut diags);
        assert_eq!(result, Json::Number(serde_json::Number::from_f64(7.0).unwrap()));
        assert!(!diags.has_errors());
    }

    #[test]
    fn detects_circular_variable_reference() {
        let mut vars = HashMap::new();
        vars.insert(
            "a".to_string(),
            VariableEntry { name: "a".into(), value: Value::Identifier("var.b".into()), span: span() },
        );
        vars.insert(
            "b".to_string(),
            VariableEntry { name: "b".into(), value: Value::Identifier("var.a".into()), span: span() },
        );
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        value_to_json(&Value::Identifier("var.a".into()), &span(), &mut ctx, &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn call_library_if_and_coalesce() {
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let value = Value::Call {
            name: "if".into(),
            args: vec![Value::Bool(true), Value::Number(1.0), Value::Number(2.0)],
        };
        assert_eq!(
            value_to_json(&value, &span(), &mut ctx, &mut diags),
            Json::Number(serde_json::Number::from_f64(1.0).unwrap())
        );
    }

    #[test]
    fn resource_reference_detection() {
        assert_eq!(parse_resource_reference(&Value::Identifier("culture.id".into())), Some("culture"));
        assert_eq!(parse_resource_reference(&Value::Identifier("culture.name".into())), None);
    }
}
