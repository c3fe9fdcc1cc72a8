//! Naming merger (C12, §4.12).
//!
//! Pulls `domain`/`grammar`/`profile`/`lexeme_spec`/`lexeme`/`lexeme_list`
//! blocks out of the statement list before C8 dispatch, signature-merges
//! entries that share an `id`, and (once `cultures` has been produced by
//! the dispatcher) attaches the merged results under each referenced
//! culture's `naming.*` fields. Warns (`W0106`) rather than erroring
//! when an entry ends up attached to zero cultures.

use crate::builders::naming as naming_builders;
use crate::diagnostics::DiagnosticSink;
use crate::eval::EvalContext;
use crate::value::{Span, Statement};
use serde_json::{Map, Value as Json};

const NAMING_BLOCK_NAMES: &[&str] = &["domain", "grammar", "profile", "lexeme_spec", "lexeme", "lexeme_list"];

pub struct MergedEntry {
    block: &'static str,
    item: Json,
    cultures: Vec<String>,
    span: Span,
}

fn builder_for(block: &str) -> fn(&[String], &[Statement], &Span, &mut EvalContext, &mut DiagnosticSink) -> Json {
    match block {
        "domain" => naming_builders::build_domain,
        "grammar" => naming_builders::build_grammar,
        "profile" => naming_builders::build_profile,
        "lexeme_spec" => naming_builders::build_lexeme_spec,
        "lexeme" => naming_builders::build_lexeme,
        "lexeme_list" => naming_builders::build_lexeme_list,
        _ => unreachable!("builder_for called with non-naming block name"),
    }
}

fn output_key(block: &str) -> &'static str {
    match block {
        "domain" => "domains",
        "grammar" => "grammars",
        "profile" => "profiles",
        "lexeme_spec" => "lexemeSpecs",
        "lexeme" => "lexemes",
        "lexeme_list" => "lexemeLists",
        _ => unreachable!("output_key called with non-naming block name"),
    }
}

/// Separates naming-family blocks out of `statements`, building and
/// signature-merging them (§4.12 steps 1-2), returning the remaining
/// statements plus the merged entries (to be attached after dispatch).
pub fn extract_and_merge_naming_blocks(statements: Vec<Statement>, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> (Vec<Statement>, Vec<MergedEntry>) {
    let mut rest = Vec::new();
    let mut by_id: Map<String, Vec<MergedEntry>> = Map::new();

    for stmt in statements {
        let Statement::Block { name, labels, body, span } = &stmt else {
            rest.push(stmt);
            continue;
        };
        if !NAMING_BLOCK_NAMES.contains(&name.as_str()) {
            rest.push(stmt);
            continue;
        }
        let block: &'static str = NAMING_BLOCK_NAMES.iter().find(|n| **n == name.as_str()).unwrap();
        let mut item = (builder_for(block))(labels, body, span, ctx, diags);
        let cultures = take_culture_id(&mut item);
        if cultures.is_empty() {
            diags.error("E0245", format!("{block} requires a resolvable cultureId"), Some(span.clone()));
            continue;
        }
        let Some(Json::String(id)) = item.get("id").cloned() else {
            diags.error("E0245", format!("{block} requires an id label"), Some(span.clone()));
            continue;
        };

        let bucket = by_id.entry(format!("{block}\0{id}")).or_default();
        let signature = canonical_signature(&item);
        if let Some(existing) = bucket.iter_mut().find(|e| canonical_signature(&e.item) == signature) {
            for c in cultures {
                if !existing.cultures.contains(&c) {
                    existing.cultures.push(c);
                }
            }
        } else if bucket.is_empty() {
            bucket.push(MergedEntry {
                block,
                item,
                cultures,
                span: span.clone(),
            });
        } else {
            diags.error("E0246", format!("duplicate definitions detected for {block} \"{id}\""), Some(bucket[0].span.clone()));
        }
    }

    let merged = by_id.into_values().flatten().collect();
    (rest, merged)
}

fn take_culture_id(item: &mut Json) -> Vec<String> {
    let Json::Object(map) = item else { return Vec::new() };
    match map.remove("cultureId") {
        Some(Json::String(s)) => vec![s],
        Some(Json::Array(items)) => items.into_iter().filter_map(|v| if let Json::String(s) = v { Some(s) } else { None }).collect(),
        _ => Vec::new(),
    }
}

/// Stable-canonical JSON string (sorted keys, recursively) used to detect
/// naming entries that are identical apart from `cultureId`.
fn canonical_signature(value: &Json) -> String {
    fn canon(value: &Json) -> Json {
        match value {
            Json::Object(map) => {
                let mut sorted = Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for k in keys {
                    sorted.insert(k.clone(), canon(&map[k]));
                }
                Json::Object(sorted)
            }
            Json::Array(items) => Json::Array(items.iter().map(canon).collect()),
            other => other.clone(),
        }
    }
    canon(value).to_string()
}

/// Attaches each merged naming entry to every culture it references
/// (§4.12 step 4). `root` must already contain the dispatcher's
/// `cultures` array.
pub fn attach_naming_to_cultures(root: &mut Json, merged: Vec<MergedEntry>, diags: &mut DiagnosticSink) {
    let Json::Object(root_map) = root else { return };
    let Some(Json::Array(cultures)) = root_map.get_mut("cultures") else { return };

    for entry in merged {
        let mut attached = 0;
        for culture_id in &entry.cultures {
            let Some(culture) = cultures.iter_mut().find(|c| c.get("id").and_then(|v| v.as_str()) == Some(culture_id.as_str())) else {
                diags.error("E0247", format!("naming entry references unknown culture \"{culture_id}\""), Some(entry.span.clone()));
                continue;
            };
            let Json::Object(culture_map) = culture else { continue };
            let naming = culture_map.entry("naming").or_insert_with(|| Json::Object(Map::new()));
            let Json::Object(naming_map) = naming else { continue };

            if entry.block == "lexeme_list" {
                let lists = naming_map.entry("lexemeLists").or_insert_with(|| Json::Object(Map::new()));
                let Json::Object(lists_map) = lists else { continue };
                let Json::String(id) = entry.item.get("id").cloned().unwrap_or(Json::Null) else { continue };
                if lists_map.contains_key(&id) {
                    diags.error("E0248", format!("duplicate lexeme_list id \"{id}\" for culture \"{culture_id}\""), Some(entry.span.clone()));
                    continue;
                }
                let mut payload = entry.item.clone();
                if let Json::Object(m) = &mut payload {
                    m.remove("id");
                }
                lists_map.insert(id, payload);
            } else {
                let key = output_key(entry.block);
                let array = naming_map.entry(key).or_insert_with(|| Json::Array(Vec::new()));
                let Json::Array(items) = array else { continue };
                let id = entry.item.get("id").and_then(|v| v.as_str()).map(|s| s.to_string());
                if let Some(id) = &id {
                    if items.iter().any(|i| i.get("id").and_then(|v| v.as_str()) == Some(id.as_str())) {
                        diags.error("E0248", format!("duplicate {} id \"{id}\" for culture \"{culture_id}\"", entry.block), Some(entry.span.clone()));
                        continue;
                    }
                }
                items.push(entry.item.clone());
            }
            attached += 1;
        }
        if attached == 0 {
            let id = entry.item.get("id").and_then(|v| v.as_str()).unwrap_or("?");
            diags.warning("W0106", format!("{} \"{id}\" is attached to zero cultures", entry.block), Some(entry.span.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceRegistry;
    use crate::value::{Position, Value};
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    proptest! {
        /// Two objects built from the same key/value pairs in different
        /// insertion order must canonicalize to the same signature, since
        /// C12 merges entries by structural equality, not by the order
        /// their attributes happened to appear in source.
        #[test]
        fn canonical_signature_ignores_insertion_order(
            mut pairs in proptest::collection::vec(
                (prop::string::string_regex("[a-z]{1,8}").unwrap(), 0i64..1000),
                1..8usize,
            )
        ) {
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs.dedup_by(|a, b| a.0 == b.0);
            let forward: Map<String, Json> = pairs.iter().map(|(k, v)| (k.clone(), Json::from(*v))).collect();
            let mut reversed = pairs.clone();
            reversed.reverse();
            let backward: Map<String, Json> = reversed.iter().map(|(k, v)| (k.clone(), Json::from(*v))).collect();
            prop_assert_eq!(
                canonical_signature(&Json::Object(forward)),
                canonical_signature(&Json::Object(backward))
            );
        }
    }

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    fn domain_block(id: &str, culture: &str) -> Statement {
        Statement::Block {
            name: "domain".into(),
            labels: vec![id.to_string()],
            body: vec![Statement::Attribute {
                key: "culture_id".into(),
                labels: vec![],
                value: Value::String(culture.to_string()),
                span: span(),
            }],
            span: span(),
        }
    }

    #[test]
    fn merges_identical_bodies_across_cultures() {
        let statements = vec![domain_block("given_names", "culture_a"), domain_block("given_names", "culture_b")];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let (rest, merged) = extract_and_merge_naming_blocks(statements, &mut ctx, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert!(rest.is_empty());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].cultures.len(), 2);
    }

    #[test]
    fn attaches_merged_entries_and_flags_unknown_culture() {
        let statements = vec![domain_block("given_names", "culture_a")];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let (_, merged) = extract_and_merge_naming_blocks(statements, &mut ctx, &mut diags);
        let mut root = json!({ "cultures": [{ "id": "culture_a" }] });
        attach_naming_to_cultures(&mut root, merged, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        assert_eq!(root["cultures"][0]["naming"]["domains"][0]["id"], json!("given_names"));
    }

    #[test]
    fn warns_when_every_referenced_culture_is_unknown() {
        let statements = vec![domain_block("given_names", "culture_missing")];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let (_, merged) = extract_and_merge_naming_blocks(statements, &mut ctx, &mut diags);
        let mut root = json!({ "cultures": [{ "id": "culture_a" }] });
        attach_naming_to_cultures(&mut root, merged, &mut diags);
        assert!(diags.has_errors());
        assert!(diags.as_slice().iter().any(|d| d.code == "E0247"));
        assert!(diags.as_slice().iter().any(|d| d.code == "W0106"));
    }

    #[test]
    fn flags_duplicate_id_with_conflicting_signature() {
        let mut b = domain_block("given_names", "culture_a");
        if let Statement::Block { body, .. } = &mut b {
            body.push(Statement::Attribute {
                key: "length".into(),
                labels: vec![],
                value: Value::Array(vec![Value::Number(3.0), Value::Number(5.0)]),
                span: span(),
            });
        }
        let statements = vec![domain_block("given_names", "culture_a"), b];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        extract_and_merge_naming_blocks(statements, &mut ctx, &mut diags);
        assert!(diags.has_errors());
    }
}
