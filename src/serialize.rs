//! Canonical serializer (C14, §4.15).
//!
//! Renders the lowered JSON configuration back to Canon source text,
//! one file per singleton/collection. Generic attribute/block emission
//! covers every builder's output; `generator`/`action` entries whose
//! shape matches the DSL (`applicability`/`selection`/`creation`/
//! `relationships`/`stateUpdates` present) are emitted with the DSL
//! surface instead of the generic form, per §4.15's fallback rule.

use serde_json::{Map, Value as Json};

const REFERENCE_KEYS: &[&str] = &["entityRef", "src", "dst", "entity", "with", "relatedTo", "referenceEntity", "catalyzedBy", "inherit", "ref"];
const KEYWORDS: &[&str] = &["do", "end", "true", "false", "null"];

/// A lowered project's top-level collection/singleton keys, in the
/// order their files are written (§4.15's "one file per collection").
pub const SINGLETON_FILES: &[(&str, &str)] = &[("uiConfig", "ui_config"), ("distributionTargets", "distribution_targets")];
pub const COLLECTION_FILES: &[(&str, &str, &str)] = &[
    ("generators", "generators", "generator"),
    ("actions", "actions", "action"),
    ("pressures", "pressures", "pressure"),
    ("eras", "eras", "era"),
    ("regions", "regions", "region"),
    ("entityKinds", "entity_kinds", "entity_kind"),
    ("relationshipKinds", "relationship_kinds", "relationship_kind"),
    ("cultures", "cultures", "culture"),
    ("tagRegistry", "tag_registry", "tag"),
    ("axisDefinitions", "axis_definitions", "axis"),
    ("systems", "systems", "system"),
    ("seedEntities", "seed_entities", "seed_entity"),
    ("seedRelationships", "seed_relationships", "seed_relationship"),
];

/// Serializes the whole lowered project into `(filename, source)` pairs.
/// `root` is expected to be the dispatcher's output with the `project`
/// singleton's fields already merged into it.
pub fn serialize_project(root: &Json) -> Vec<(String, String)> {
    let mut files = Vec::new();
    let reserved: Vec<&str> = SINGLETON_FILES
        .iter()
        .map(|(k, _)| *k)
        .chain(COLLECTION_FILES.iter().map(|(k, _, _)| *k))
        .collect();

    if let Json::Object(map) = root {
        let mut project_fields = Map::new();
        for (k, v) in map {
            if !reserved.contains(&k.as_str()) {
                project_fields.insert(k.clone(), v.clone());
            }
        }
        files.push(("project.canon".to_string(), emit_block("project", &[], &Json::Object(project_fields))));

        for (key, file) in SINGLETON_FILES {
            if let Some(value) = map.get(*key) {
                files.push((format!("{file}.canon"), emit_block(singular_for(key), &[], value)));
            }
        }

        for (key, file, singular) in COLLECTION_FILES {
            if let Some(Json::Array(items)) = map.get(*key) {
                let mut source = String::new();
                for item in items {
                    source.push_str(&emit_collection_item(singular, item));
                    source.push('\n');
                }
                files.push((format!("{file}.canon"), source));
            }
        }
    }
    files
}

fn singular_for(camel_key: &str) -> &'static str {
    match camel_key {
        "uiConfig" => "ui_config",
        "distributionTargets" => "distribution_targets",
        _ => "block",
    }
}

fn emit_collection_item(block_name: &str, item: &Json) -> String {
    if matches!(block_name, "generator" | "action") && is_dsl_shape(item) {
        return emit_dsl_block(block_name, item);
    }
    let Json::Object(map) = item else { return emit_block(block_name, &[], item) };
    let mut labels = Vec::new();
    let mut rest = map.clone();
    if let Some(Json::String(id)) = rest.remove("id") {
        labels.push(id);
    }
    if let Some(Json::String(name)) = rest.remove("name") {
        labels.push(name);
    }
    emit_block(block_name, &labels, &Json::Object(rest))
}

fn is_dsl_shape(item: &Json) -> bool {
    matches!(item, Json::Object(map) if ["applicability", "selection", "creation", "relationships", "stateUpdates", "variables", "actor", "targeting", "outcome"].iter().any(|k| map.contains_key(*k)))
}

fn emit_block(name: &str, labels: &[String], body: &Json) -> String {
    let mut out = String::new();
    out.push_str(name);
    for label in labels {
        out.push(' ');
        out.push_str(&format_token(label));
    }
    out.push_str(" do\n");
    out.push_str(&emit_object_body(body, 1));
    out.push_str("end\n");
    out
}

fn emit_object_body(value: &Json, indent: usize) -> String {
    let Json::Object(map) = value else { return String::new() };
    let mut out = String::new();
    let pad = "  ".repeat(indent);
    for (key, val) in map {
        let rewritten = if REFERENCE_KEYS.contains(&key.as_str()) { strip_ref_prefix(val) } else { val.clone() };
        out.push_str(&pad);
        out.push_str(key);
        out.push(':');
        out.push_str(&emit_value(&rewritten, indent));
        out.push('\n');
    }
    out
}

fn strip_ref_prefix(value: &Json) -> Json {
    match value {
        Json::String(s) => Json::String(s.strip_prefix('$').unwrap_or(s).to_string()),
        Json::Array(items) => Json::Array(items.iter().map(strip_ref_prefix).collect()),
        other => other.clone(),
    }
}

fn emit_value(value: &Json, indent: usize) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::String(s) => format_token(s),
        Json::Array(items) => emit_array(items, indent),
        Json::Object(_) => emit_inline_object(value, indent),
    }
}

fn emit_array(items: &[Json], indent: usize) -> String {
    let all_scalar = items.iter().all(|v| matches!(v, Json::String(_) | Json::Number(_) | Json::Bool(_) | Json::Null));
    if all_scalar && items.len() <= 6 {
        let inline: Vec<String> = items.iter().map(|v| emit_value(v, indent)).collect();
        format!("[{}]", inline.join(" "))
    } else {
        let pad = "  ".repeat(indent + 1);
        let lines: Vec<String> = items.iter().map(|v| format!("{pad}{}", emit_value(v, indent + 1))).collect();
        format!("[\n{}\n{}]", lines.join("\n"), "  ".repeat(indent))
    }
}

fn emit_inline_object(value: &Json, indent: usize) -> String {
    let Json::Object(map) = value else { return "{}".to_string() };
    if map.is_empty() {
        return "{}".to_string();
    }
    let small = map.len() <= 3 && map.values().all(|v| matches!(v, Json::String(_) | Json::Number(_) | Json::Bool(_) | Json::Null));
    if small {
        let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}:{}", emit_value(v, indent))).collect();
        format!("{{ {} }}", pairs.join(", "))
    } else {
        let pad = "  ".repeat(indent + 1);
        let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{pad}{k}:{}", emit_value(v, indent + 1))).collect();
        format!("{{\n{}\n{}}}", pairs.join("\n"), "  ".repeat(indent))
    }
}

fn format_token(s: &str) -> String {
    if is_bare_identifier(s) {
        s.to_string()
    } else {
        quote_string(s)
    }
}

fn is_bare_identifier(s: &str) -> bool {
    if KEYWORDS.contains(&s) || s.is_empty() {
        return false;
    }
    let mut chars = s.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    first_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Best-effort DSL-surface emission for a lowered generator/action
/// object; falls back to plain `key:value` attributes for any field the
/// DSL grammar does not give dedicated syntax to.
fn emit_dsl_block(block_name: &str, item: &Json) -> String {
    let Json::Object(map) = item else { return emit_block(block_name, &[], item) };
    let mut labels = Vec::new();
    let mut rest = map.clone();
    if let Some(Json::String(id)) = rest.remove("id") {
        labels.push(id);
    }
    if let Some(Json::String(name)) = rest.remove("name") {
        labels.push(name);
    }

    let mut out = String::new();
    out.push_str(block_name);
    for label in &labels {
        out.push(' ');
        out.push_str(&format_token(label));
    }
    out.push_str(" do\n");

    if let Some(Json::Array(applicability)) = rest.remove("applicability") {
        for cond in &applicability {
            out.push_str("  when do\n");
            out.push_str(&emit_condition_lines(cond, 2));
            out.push_str("  end\n");
        }
    }
    if let Some(Json::Object(variables)) = rest.remove("variables") {
        for (name, entry) in &variables {
            out.push_str(&format!("  let {name} do\n"));
            if let Json::Object(select) = entry.get("select").cloned().unwrap_or(Json::Null) {
                out.push_str(&emit_object_body(&Json::Object(select), 2));
            }
            out.push_str("  end\n");
        }
    }
    if let Some(selection) = rest.remove("selection").or_else(|| rest.remove("targeting")) {
        out.push_str("  choose target do\n");
        out.push_str(&emit_object_body(&selection, 2));
        out.push_str("  end\n");
    }
    if let Some(Json::Array(creation)) = rest.remove("creation") {
        for c in &creation {
            out.push_str("  create do\n");
            out.push_str(&emit_object_body(c, 2));
            out.push_str("  end\n");
        }
    }
    if let Some(Json::Array(relationships)) = rest.remove("relationships") {
        for r in &relationships {
            let kind = r.get("kind").and_then(|v| v.as_str()).unwrap_or("rel");
            let src = r.get("src").and_then(|v| v.as_str()).unwrap_or("actor");
            let dst = r.get("dst").and_then(|v| v.as_str()).unwrap_or("target");
            let strength = r.get("strength").cloned().unwrap_or(Json::Null);
            out.push_str(&format!(
                "  rel {kind} {} {} strength:{}\n",
                src.strip_prefix('$').unwrap_or(src),
                dst.strip_prefix('$').unwrap_or(dst),
                emit_value(&strength, 1)
            ));
        }
    }
    if let Some(Json::Array(updates)) = rest.remove("stateUpdates") {
        for u in &updates {
            if let (Some(target), Some(id)) = (u.get("target").and_then(|v| v.as_str()), u.get("id").and_then(|v| v.as_str())) {
                let op = u.get("operator").and_then(|v| v.as_str()).unwrap_or("+=");
                let amount = u.get("amount").cloned().unwrap_or(Json::Null);
                out.push_str(&format!("  mutate {target} {id} {op} {}\n", emit_value(&amount, 1)));
            }
        }
    }

    out.push_str(&emit_object_body(&Json::Object(rest), 1));
    out.push_str("end\n");
    out
}

fn emit_condition_lines(cond: &Json, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    if let Some(Json::Array(items)) = cond.get("conditions") {
        let mut out = String::new();
        for c in items {
            out.push_str(&format!("{pad}{}\n", emit_condition_predicate(c)));
        }
        out
    } else {
        format!("{pad}{}\n", emit_condition_predicate(cond))
    }
}

fn emit_condition_predicate(cond: &Json) -> String {
    let id = cond.get("pressureId").and_then(|v| v.as_str()).unwrap_or("");
    let op = cond.get("operator").and_then(|v| v.as_str()).unwrap_or(">=");
    let value = cond.get("value").cloned().unwrap_or(Json::Null);
    format!("pressure {id} {op} {}", emit_value(&value, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emits_simple_block_with_labels() {
        let item = json!({ "id": "alpha", "name": "Alpha", "tags": ["a", "b"] });
        let out = emit_collection_item("pressure", &item);
        assert!(out.starts_with("pressure alpha Alpha do\n"));
        assert!(out.contains("tags:[a b]"));
        assert!(out.trim_end().ends_with("end"));
    }

    #[test]
    fn quotes_non_identifier_strings() {
        assert_eq!(format_token("hello world"), "\"hello world\"");
        assert_eq!(format_token("bare_id"), "bare_id");
    }

    #[test]
    fn strips_dollar_prefix_on_reference_keys() {
        let item = json!({ "id": "g1", "relationships": [], "src": "$target", "applicability": [] });
        let out = emit_collection_item("generator", &item);
        assert!(out.contains("src:target"));
    }

    #[test]
    fn serializes_project_and_collections_into_files() {
        let root = json!({
            "name": "Demo",
            "pressures": [{ "id": "tension" }],
            "uiConfig": { "theme": "dark" },
        });
        let files = serialize_project(&root);
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"project.canon"));
        assert!(names.contains(&"pressures.canon"));
        assert!(names.contains(&"ui_config.canon"));
    }
}
