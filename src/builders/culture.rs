//! Culture block builder (§4.6.5).
//!
//! Folds attributes/nested blocks into the object and additionally
//! recognizes `axis_bias`/`home_region` positional attributes. Nested
//! `naming` attributes/blocks are rejected — naming resources live at the
//! top level and attach to cultures via C12.

use crate::builders::{apply_label_field, build_object_from_statements};
use crate::diagnostics::DiagnosticSink;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Span, Statement};
use serde_json::{Map, Value as Json};

pub fn build_culture(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut axis_biases = Map::new();
    let mut home_regions = Map::new();
    let mut plain_body = Vec::new();

    for stmt in body {
        match stmt {
            Statement::Attribute { key, labels: attr_labels, value, span: s } if key == "axis_bias" => {
                match (attr_labels.first(), value.as_array()) {
                    (Some(kind), Some(items)) if items.len() == 3 => {
                        let mut coord = Map::new();
                        for (axis, v) in ["x", "y", "z"].iter().zip(items.iter()) {
                            coord.insert(axis.to_string(), value_to_json(v, s, ctx, diags));
                        }
                        axis_biases.insert(kind.clone(), Json::Object(coord));
                    }
                    _ => diags.error(
                        "E0219",
                        "axis_bias requires kind and numeric x y z values",
                        Some(s.clone()),
                    ),
                }
            }
            Statement::Attribute { key, labels: attr_labels, value, span: s } if key == "home_region" => {
                match (attr_labels.first(), value.as_array()) {
                    (Some(kind), Some(items)) => {
                        let regions: Vec<Json> = items.iter().map(|v| value_to_json(v, s, ctx, diags)).collect();
                        home_regions.insert(kind.clone(), Json::Array(regions));
                    }
                    _ => diags.error("E0220", "home_region requires a kind and at least one region", Some(s.clone())),
                }
            }
            Statement::Attribute { key, span: s, .. } if key == "naming" => {
                diags.error("E0221", "'naming' is not allowed inside culture; naming resources are top-level", Some(s.clone()));
            }
            Statement::Block { name, span: s, .. } if name == "naming" => {
                diags.error("E0221", "'naming' is not allowed inside culture; naming resources are top-level", Some(s.clone()));
            }
            other => plain_body.push(other.clone()),
        }
    }

    let mut obj = build_object_from_statements(&plain_body, ctx, diags);
    if let Some(id) = labels.first() {
        apply_label_field(&mut obj, "id", id, diags, span);
    }
    if let Some(name) = labels.get(1) {
        apply_label_field(&mut obj, "name", name, diags, span);
    }
    if !axis_biases.is_empty() {
        obj.insert("axisBiases".to_string(), Json::Object(axis_biases));
    }
    if !home_regions.is_empty() {
        obj.insert("homeRegions".to_string(), Json::Object(home_regions));
    }
    Json::Object(obj)
}
