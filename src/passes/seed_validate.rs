//! Seed-relationship validator (C13).
//!
//! After dispatch, every `seedRelationships[i].src`/`.dst` must match a
//! `seedEntities[j].id` (§4.14). Violations are whole-program errors with
//! no span.

use crate::diagnostics::DiagnosticSink;
use serde_json::Value as Json;
use std::collections::HashSet;

pub fn validate_seed_relationships(seed_entities: &[Json], seed_relationships: &[Json], diags: &mut DiagnosticSink) {
    let ids: HashSet<&str> = seed_entities
        .iter()
        .filter_map(|e| e.get("id").and_then(Json::as_str))
        .collect();

    for rel in seed_relationships {
        for field in ["src", "dst"] {
            let Some(value) = rel.get(field).and_then(Json::as_str) else {
                continue;
            };
            if !ids.contains(value) {
                diags.error(
                    "E0601",
                    format!("seed_relationship {field} \"{value}\" does not match any seed_entity id"),
                    None,
                );
            }
        }
    }
}
