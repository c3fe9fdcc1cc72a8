//! Axis, tag, and relationship-kind inline positional grammars (§4.6.2).
//!
//! These three block kinds can be written either as a single positional
//! line (collected by C5 into a block with one synthetic `$positional`
//! attribute) or as an ordinary `do ... end` block. Both forms funnel
//! through [`crate::builders::build_object_from_statements`] for the
//! block form; the positional form is parsed here token by token.

use crate::builders::{build_object_from_statements, positional_tokens};
use crate::diagnostics::DiagnosticSink;
use crate::eval::EvalContext;
use crate::value::{Span, Statement, Value};
use serde_json::{Map, Value as Json};

fn ident(v: &Value) -> Option<&str> {
    match v {
        Value::Identifier(s) => Some(s),
        _ => None,
    }
}

fn string(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s),
        _ => None,
    }
}

pub fn build_axis(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let Some(id) = labels.first() else {
        diags.error("E0211", "axis requires an id label", Some(span.clone()));
        return Json::Object(Map::new());
    };
    let mut out = Map::new();
    out.insert("id".to_string(), Json::String(id.clone()));

    let Some(tokens) = positional_tokens(body) else {
        let obj = build_object_from_statements(body, ctx, diags);
        out.extend(obj);
        return Json::Object(out);
    };

    let mut idx = 0;
    if let Some(name) = tokens.get(idx).and_then(string) {
        out.insert("name".to_string(), Json::String(name.to_string()));
        idx += 1;
    }
    let Some(low) = tokens.get(idx).and_then(ident) else {
        diags.error("E0211", "axis requires lowTag -> highTag", Some(span.clone()));
        return Json::Object(out);
    };
    idx += 1;
    if tokens.get(idx).and_then(ident) != Some("->") {
        diags.error("E0211", "axis requires '->' between lowTag and highTag", Some(span.clone()));
        return Json::Object(out);
    }
    idx += 1;
    let Some(high) = tokens.get(idx).and_then(ident) else {
        diags.error("E0211", "axis requires a highTag after '->'", Some(span.clone()));
        return Json::Object(out);
    };
    idx += 1;
    out.insert("lowTag".to_string(), Json::String(low.to_string()));
    out.insert("highTag".to_string(), Json::String(high.to_string()));
    if let Some(description) = tokens.get(idx).and_then(string) {
        out.insert("description".to_string(), Json::String(description.to_string()));
    }
    Json::Object(out)
}

pub fn build_tag(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let Some(id) = labels.first() else {
        diags.error("E0212", "tag requires an id label", Some(span.clone()));
        return Json::Object(Map::new());
    };
    let mut out = Map::new();
    out.insert("id".to_string(), Json::String(id.clone()));

    let Some(tokens) = positional_tokens(body) else {
        let obj = build_object_from_statements(body, ctx, diags);
        out.extend(obj);
        return Json::Object(out);
    };

    let mut idx = 0;
    let Some(category) = tokens.get(idx).and_then(ident) else {
        diags.error("E0212", "tag requires <category> <rarity>", Some(span.clone()));
        return Json::Object(out);
    };
    idx += 1;
    let Some(rarity) = tokens.get(idx).and_then(ident) else {
        diags.error("E0212", "tag requires <category> <rarity>", Some(span.clone()));
        return Json::Object(out);
    };
    idx += 1;
    out.insert("category".to_string(), Json::String(category.to_string()));
    out.insert("rarity".to_string(), Json::String(rarity.to_string()));

    if let Some(description) = tokens.get(idx).and_then(string) {
        out.insert("description".to_string(), Json::String(description.to_string()));
        idx += 1;
    }

    while idx < tokens.len() {
        let Some(keyword) = tokens.get(idx).and_then(ident) else {
            diags.error("E0213", "unexpected token in tag grammar", Some(span.clone()));
            break;
        };
        idx += 1;
        match keyword {
            "kinds" | "related" | "conflicts" | "exclusive" | "templates" => {
                let camel = match keyword {
                    "kinds" => "kinds",
                    "related" => "related",
                    "conflicts" => "conflicts",
                    "exclusive" => "exclusive",
                    _ => "templates",
                };
                if let Some(Value::Array(items)) = tokens.get(idx) {
                    out.insert(camel.to_string(), Json::Array(
                        items.iter().filter_map(|v| ident(v).or_else(|| string(v))).map(|s| Json::String(s.to_string())).collect(),
                    ));
                    idx += 1;
                } else {
                    diags.error("E0213", format!("'{keyword}' requires a bracketed list"), Some(span.clone()));
                }
            }
            "usage" => {
                let (Some(min), Some(max)) = (
                    tokens.get(idx).and_then(as_number),
                    tokens.get(idx + 1).and_then(as_number),
                ) else {
                    diags.error("E0214", "'usage' requires <min> <max>", Some(span.clone()));
                    break;
                };
                out.insert("usageMin".to_string(), min);
                out.insert("usageMax".to_string(), max);
                idx += 2;
            }
            "count" => {
                if let Some(n) = tokens.get(idx).and_then(as_number) {
                    out.insert("usageCount".to_string(), n);
                    idx += 1;
                } else {
                    diags.error("E0213", "'count' requires a numeric argument", Some(span.clone()));
                }
            }
            "axis" => {
                out.insert("axis".to_string(), Json::Bool(true));
            }
            "framework" => {
                out.insert("framework".to_string(), Json::Bool(true));
            }
            other => {
                diags.error("E0213", format!("unknown tag keyword '{other}'"), Some(span.clone()));
            }
        }
    }
    Json::Object(out)
}

fn as_number(v: &Value) -> Option<Json> {
    match v {
        Value::Number(n) => serde_json::Number::from_f64(*n).map(Json::Number),
        _ => None,
    }
}

pub fn build_relationship_kind(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let Some(id) = labels.first() else {
        diags.error("E0215", "relationship_kind requires an id label", Some(span.clone()));
        return Json::Object(Map::new());
    };
    let mut out = Map::new();
    out.insert("id".to_string(), Json::String(id.clone()));

    let Some(tokens) = positional_tokens(body) else {
        let obj = build_object_from_statements(body, ctx, diags);
        out.extend(obj);
        return Json::Object(out);
    };

    let mut idx = 0;
    if let Some(description) = tokens.get(idx).and_then(string) {
        out.insert("description".to_string(), Json::String(description.to_string()));
        idx += 1;
    }
    let Some(polarity) = tokens.get(idx).and_then(ident) else {
        diags.error("E0215", "relationship_kind requires <polarity> <decay> <cullable|fixed>", Some(span.clone()));
        return Json::Object(out);
    };
    idx += 1;
    let Some(decay) = tokens.get(idx).and_then(as_number) else {
        diags.error("E0215", "relationship_kind requires a numeric <decay>", Some(span.clone()));
        return Json::Object(out);
    };
    idx += 1;
    let Some(culling) = tokens.get(idx).and_then(ident) else {
        diags.error("E0215", "relationship_kind requires 'cullable' or 'fixed'", Some(span.clone()));
        return Json::Object(out);
    };
    idx += 1;
    out.insert("polarity".to_string(), Json::String(polarity.to_string()));
    out.insert("decay".to_string(), decay);
    out.insert("cullable".to_string(), Json::Bool(culling == "cullable"));

    while idx < tokens.len() {
        let Some(keyword) = tokens.get(idx).and_then(ident) else {
            diags.error("E0216", "unexpected token in relationship_kind grammar", Some(span.clone()));
            break;
        };
        idx += 1;
        match keyword {
            "src" | "dst" => {
                if let Some(Value::Array(items)) = tokens.get(idx) {
                    out.insert(keyword.to_string(), Json::Array(
                        items.iter().filter_map(|v| ident(v).or_else(|| string(v))).map(|s| Json::String(s.to_string())).collect(),
                    ));
                    idx += 1;
                } else {
                    diags.error("E0216", format!("'{keyword}' requires a bracketed list"), Some(span.clone()));
                }
            }
            "verbs" => {
                let (Some(formed), Some(ended)) = (
                    tokens.get(idx).and_then(|v| ident(v).or_else(|| string(v))),
                    tokens.get(idx + 1).and_then(|v| ident(v).or_else(|| string(v))),
                ) else {
                    diags.error("E0216", "'verbs' requires <formed> <ended>", Some(span.clone()));
                    break;
                };
                out.insert("verbFormed".to_string(), Json::String(formed.to_string()));
                out.insert("verbEnded".to_string(), Json::String(ended.to_string()));
                idx += 2;
            }
            "category" | "name" | "desc" => {
                let camel = if keyword == "desc" { "description" } else { keyword };
                if let Some(v) = tokens.get(idx).and_then(|v| ident(v).or_else(|| string(v))) {
                    out.insert(camel.to_string(), Json::String(v.to_string()));
                    idx += 1;
                } else {
                    diags.error("E0216", format!("'{keyword}' requires a value"), Some(span.clone()));
                }
            }
            "symmetric" => {
                out.insert("symmetric".to_string(), Json::Bool(true));
            }
            "framework" => {
                out.insert("framework".to_string(), Json::Bool(true));
            }
            other => diags.error("E0216", format!("unknown relationship_kind keyword '{other}'"), Some(span.clone())),
        }
    }
    Json::Object(out)
}
