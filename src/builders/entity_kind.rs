//! Entity kind builder (§4.6.6): `subtypes`, `statuses`,
//! `required_relationships`, `semantic_plane`, `style`.

use crate::builders::{apply_label_field, build_object_from_statements};
use crate::diagnostics::DiagnosticSink;
use crate::eval::{value_to_json, EvalContext};
use crate::value::{Span, Statement, Value};
use serde_json::{json, Map, Value as Json};

pub fn build_entity_kind(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut subtypes = Map::new();
    let mut statuses = Map::new();
    let mut required = Map::new();
    let mut semantic_plane = None;
    let mut style = None;
    let mut plain_body = Vec::new();

    for stmt in body {
        match stmt {
            Statement::Block { name, body: children, .. } if name == "subtypes" => {
                for child in children {
                    collect_subtype_child(child, &mut subtypes, ctx, diags);
                }
            }
            Statement::Block { name, body: children, .. } if name == "statuses" => {
                for child in children {
                    collect_status_child(child, &mut statuses, diags);
                }
            }
            Statement::Block { name, body: children, .. } if name == "required_relationships" => {
                for child in children {
                    collect_required_child(child, &mut required, ctx, diags);
                }
            }
            Statement::Attribute { key, .. } if key == "subtype" => collect_subtype_child(stmt, &mut subtypes, ctx, diags),
            Statement::Attribute { key, .. } if key == "status" => collect_status_child(stmt, &mut statuses, diags),
            Statement::Attribute { key, .. } if key == "required" => collect_required_child(stmt, &mut required, ctx, diags),
            Statement::Block { name, body: children, span: s, .. } if name == "semantic_plane" => {
                semantic_plane = Some(build_semantic_plane(children, s, ctx, diags));
            }
            Statement::Attribute { key, value, span: s, .. } if key == "style" => {
                style = Some(build_style(value, s, ctx, diags));
            }
            Statement::Block { name, body: children, .. } if name == "style" => {
                style = Some(Json::Object(build_object_from_statements(children, ctx, diags)));
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
    if !subtypes.is_empty() {
        obj.insert("subtypes".to_string(), Json::Object(subtypes));
    }
    if !statuses.is_empty() {
        obj.insert("statuses".to_string(), Json::Object(statuses));
    }
    if !required.is_empty() {
        obj.insert("requiredRelationships".to_string(), Json::Object(required));
    }
    if let Some(sp) = semantic_plane {
        obj.insert("semanticPlane".to_string(), sp);
    }
    if let Some(st) = style {
        obj.insert("style".to_string(), st);
    }
    Json::Object(obj)
}

fn collect_subtype_child(child: &Statement, map: &mut Map<String, Json>, ctx: &mut EvalContext, diags: &mut DiagnosticSink) {
    match child {
        Statement::Attribute { key, labels, value, span } if key == "subtype" => {
            let (Some(id), Some(items)) = (labels.first(), value.as_array()) else {
                diags.error("E0223", "subtype requires <id> <name> [authority]", Some(span.clone()));
                return;
            };
            let mut obj = Map::new();
            if let Some(name) = items.first().and_then(|v| v.as_str()) {
                obj.insert("name".to_string(), Json::String(name.to_string()));
            }
            if let Some(authority) = items.get(1).and_then(|v| v.as_str()) {
                obj.insert("authority".to_string(), Json::String(authority.to_string()));
            }
            map.insert(id.clone(), Json::Object(obj));
        }
        Statement::Attribute { key, value, span, .. } => {
            let entry = match value {
                Value::Object(_) => value_to_json(value, span, ctx, diags),
                other => {
                    let mut obj = Map::new();
                    obj.insert("name".to_string(), value_to_json(other, span, ctx, diags));
                    Json::Object(obj)
                }
            };
            map.insert(key.clone(), entry);
        }
        other => diags.error(
            "E0223",
            "unexpected statement inside 'subtypes'",
            Some(other.span().clone()),
        ),
    }
}

fn collect_status_child(child: &Statement, map: &mut Map<String, Json>, diags: &mut DiagnosticSink) {
    let Statement::Attribute { key, labels, value, span } = child else {
        diags.error("E0224", "unexpected statement inside 'statuses'", Some(child.span().clone()));
        return;
    };
    if key != "status" {
        diags.error("E0224", "expected a 'status' entry", Some(span.clone()));
        return;
    }
    let (Some(id), Some(items)) = (labels.first(), value.as_array()) else {
        diags.error("E0224", "status requires <id> <name> <polarity>", Some(span.clone()));
        return;
    };
    let mut obj = Map::new();
    if let Some(name) = items.first().and_then(|v| v.as_str()) {
        obj.insert("name".to_string(), Json::String(name.to_string()));
    }
    if let Some(polarity) = items.get(1).and_then(|v| v.as_str()) {
        obj.insert("polarity".to_string(), Json::String(polarity.to_string()));
    }
    let mut is_terminal = false;
    let mut idx = 2;
    if let Some(verb) = items.get(idx).and_then(|v| v.as_str()) {
        if verb != "terminal" {
            obj.insert("transitionVerb".to_string(), Json::String(verb.to_string()));
            idx += 1;
        }
    }
    if items.get(idx).and_then(|v| v.as_str()) == Some("terminal") {
        is_terminal = true;
    }
    obj.insert("isTerminal".to_string(), Json::Bool(is_terminal));
    map.insert(id.clone(), Json::Object(obj));
}

fn collect_required_child(child: &Statement, map: &mut Map<String, Json>, ctx: &mut EvalContext, diags: &mut DiagnosticSink) {
    match child {
        Statement::Attribute { key, labels, value, span } if key == "required" => {
            let Some(kind) = labels.first() else {
                diags.error("E0225", "required requires a <kind>", Some(span.clone()));
                return;
            };
            let entry = match value.as_array().and_then(|items| items.first()).and_then(|v| v.as_str()) {
                Some(description) => Json::String(description.to_string()),
                None => Json::Bool(true),
            };
            map.insert(kind.clone(), entry);
        }
        Statement::Attribute { key, value, span, .. } => {
            map.insert(key.clone(), value_to_json(value, span, ctx, diags));
        }
        other => diags.error(
            "E0225",
            "unexpected statement inside 'required_relationships'",
            Some(other.span().clone()),
        ),
    }
}

fn build_style(value: &Value, span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    match value {
        Value::String(s) => json!({ "color": s }),
        Value::Array(items) => {
            let mut obj = Map::new();
            let mut i = 0;
            while i + 1 < items.len() {
                if let Some(key) = items[i].as_str() {
                    let key = if key == "name" || key == "display" { "displayName" } else { key };
                    obj.insert(key.to_string(), value_to_json(&items[i + 1], span, ctx, diags));
                }
                i += 2;
            }
            Json::Object(obj)
        }
        other => value_to_json(other, span, ctx, diags),
    }
}

fn build_semantic_plane(children: &[Statement], _span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut axes = Map::new();
    let mut regions = Map::new();

    for stmt in children {
        match stmt {
            Statement::Block { name, body, .. } if name == "axes" => {
                for child in body {
                    if let Statement::Attribute { key, value, span: s, .. } = child {
                        let axis_id = crate::eval::parse_resource_reference(value)
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| {
                                value
                                    .as_str()
                                    .map(|s| s.to_string())
                                    .unwrap_or_else(|| match value_to_json(value, s, ctx, diags) {
                                        Json::String(s) => s,
                                        _ => String::new(),
                                    })
                            });
                        axes.insert(key.clone(), json!({ "axisId": axis_id }));
                    }
                }
            }
            Statement::Block { name, body, .. } if name == "regions" => {
                for region in body {
                    if let Statement::Block { labels, body: rbody, .. } = region {
                        let Some(region_id) = labels.first() else { continue };
                        let mut bounds = None;
                        let mut plain = Vec::new();
                        for rc in rbody {
                            match rc {
                                Statement::Attribute { key, labels: bl, value, span: bs } if key == "bounds" => {
                                    bounds = Some(build_bounds(bl, value, bs, diags));
                                }
                                Statement::Block { name, labels: bl, body: bbody, span: bs } if name == "bounds" => {
                                    bounds = Some(build_bounds_block(bl, bbody, bs, diags));
                                }
                                other => plain.push(other.clone()),
                            }
                        }
                        let mut obj = build_object_from_statements(&plain, ctx, diags);
                        if let Some(b) = bounds {
                            obj.insert("bounds".to_string(), b);
                        }
                        regions.insert(region_id.clone(), Json::Object(obj));
                    }
                }
            }
            _ => {}
        }
    }

    json!({ "axes": axes, "regions": regions })
}

fn build_bounds(labels: &[String], value: &Value, span: &Span, diags: &mut DiagnosticSink) -> Json {
    let shape = labels.first().map(|s| s.as_str()).unwrap_or("");
    let nums: Vec<f64> = value
        .as_array()
        .map(|items| items.iter().filter_map(|v| if let Value::Number(n) = v { Some(*n) } else { None }).collect())
        .unwrap_or_default();

    match shape {
        "circle" if nums.len() >= 3 => json!({ "shape": "circle", "center": {"x": nums[0], "y": nums[1]}, "radius": nums[2] }),
        "rect" if nums.len() >= 4 => json!({ "shape": "rect", "x1": nums[0], "y1": nums[1], "x2": nums[2], "y2": nums[3] }),
        "polygon" if nums.len() >= 4 && nums.len() % 2 == 0 => {
            let points: Vec<Json> = nums.chunks(2).map(|p| json!({"x": p[0], "y": p[1]})).collect();
            json!({ "shape": "polygon", "points": points })
        }
        other => {
            diags.error("E0222", format!("unknown or malformed bounds shape '{other}'"), Some(span.clone()));
            Json::Null
        }
    }
}

/// Block-form `bounds polygon do point x y ... end`; only `polygon` has a
/// block form since `circle`/`rect` are short enough to stay positional.
fn build_bounds_block(labels: &[String], body: &[Statement], span: &Span, diags: &mut DiagnosticSink) -> Json {
    let shape = labels.first().map(|s| s.as_str()).unwrap_or("");
    if shape != "polygon" {
        diags.error("E0222", format!("unknown or malformed bounds shape '{shape}'"), Some(span.clone()));
        return Json::Null;
    }
    let mut points = Vec::new();
    for child in body {
        if let Statement::Attribute { key, value, .. } = child {
            if key == "point" {
                if let (Some(Value::Number(x)), Some(Value::Number(y))) = (value.as_array().and_then(|a| a.first()), value.as_array().and_then(|a| a.get(1))) {
                    points.push(json!({ "x": x, "y": y }));
                    continue;
                }
            }
        }
        diags.error("E0222", "expected 'point <x> <y>' inside block-form bounds", Some(child.span().clone()));
    }
    json!({ "shape": "polygon", "points": points })
}
