//! Generator/action DSL lowering (C10, §4.9). Each generator or action body
//! is a small imperative-looking sub-language (`let`, `choose`, `when`,
//! `actor`, `target`, `on success`, `mutate`, ...) that lowers to the
//! declarative JSON shapes consumed by the runtime. [`GeneratorContext`]
//! tracks the bindings introduced along the way so reference-bearing keys
//! can be normalized consistently (§4.9.6).

pub mod actions;
pub mod conditions;
pub mod creation;
pub mod generators;
pub mod mutate;
pub mod path;
pub mod selection;
pub mod variables;

use crate::value::Statement;
use serde_json::{Map, Value as Json};
use std::collections::HashMap;

/// Keys whose value is a reference to a binding (`$name`) rather than a
/// plain literal; rewritten by [`normalize_references`] wherever they occur
/// in a lowered generator/action object (§4.9.6).
const REFERENCE_KEYS: &[&str] = &["entityRef", "src", "dst", "entity", "with", "relatedTo", "referenceEntity", "catalyzedBy", "inherit", "ref"];

/// Bindings and naming state threaded through one generator or action body.
#[derive(Debug, Clone)]
pub struct GeneratorContext {
    bindings: HashMap<String, String>,
    pub selection_defined: bool,
    pub target_alias: Option<String>,
}

impl GeneratorContext {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert("actor".to_string(), "$actor".to_string());
        bindings.insert("target".to_string(), "$target".to_string());
        GeneratorContext {
            bindings,
            selection_defined: false,
            target_alias: None,
        }
    }

    /// Registers `name` as a known binding and returns its normalized form
    /// (`$name`).
    pub fn declare(&mut self, name: &str) -> String {
        let normalized = format!("${name}");
        self.bindings.insert(name.to_string(), normalized.clone());
        normalized
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Rewrites a bareword token into its binding form if it names a known
    /// binding, leaves `any` untouched, and otherwise passes the token
    /// through unchanged. Dotted paths (`hero.culture`) are rewritten on
    /// their head segment only.
    pub fn normalize_ref(&self, token: &str) -> String {
        if token == "any" {
            return token.to_string();
        }
        if let Some(stripped) = token.strip_prefix('$') {
            let head = stripped.split('.').next().unwrap_or(stripped);
            if self.bindings.contains_key(head) {
                return token.to_string();
            }
        }
        let mut parts = token.splitn(2, '.');
        let head = parts.next().unwrap_or(token);
        let rest = parts.next();
        if let Some(bound) = self.bindings.get(head) {
            match rest {
                Some(r) => format!("{bound}.{r}"),
                None => bound.clone(),
            }
        } else {
            token.to_string()
        }
    }
}

impl Default for GeneratorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively rewrites every [`REFERENCE_KEYS`] value and every `entities`
/// array element in a lowered JSON object against `gctx`'s bindings
/// (§4.9.6). Used for passthrough `condition`/`filter` object literals that
/// otherwise bypass the typed lowering functions.
pub fn normalize_references(value: &mut Json, gctx: &GeneratorContext) {
    match value {
        Json::Object(map) => {
            rewrite_reference_fields(map, gctx);
            for v in map.values_mut() {
                normalize_references(v, gctx);
            }
        }
        Json::Array(items) => {
            for item in items {
                normalize_references(item, gctx);
            }
        }
        _ => {}
    }
}

fn rewrite_reference_fields(map: &mut Map<String, Json>, gctx: &GeneratorContext) {
    for key in REFERENCE_KEYS {
        if let Some(Json::String(s)) = map.get(*key) {
            let rewritten = gctx.normalize_ref(s);
            map.insert(key.to_string(), Json::String(rewritten));
        }
    }
    if let Some(Json::Array(items)) = map.get_mut("entities") {
        for item in items {
            if let Json::String(s) = item {
                *s = gctx.normalize_ref(s);
            }
        }
    }
}

/// True when `body` contains any generator/action-DSL shape: a `when`,
/// `choose`, `let`, or `constraints` block, a `let` attribute, or any of the
/// DSL-only statement variants (§4.9).
pub fn is_dsl_body(body: &[Statement]) -> bool {
    body.iter().any(|stmt| match stmt {
        Statement::Block { name, .. } => matches!(name.as_str(), "when" | "choose" | "let" | "constraints" | "actor" | "target" | "path"),
        Statement::Attribute { key, .. } => key == "let",
        Statement::Predicate { .. } | Statement::In { .. } | Statement::From { .. } | Statement::Mutate { .. } | Statement::Rel { .. } => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_bound_and_dotted_references() {
        let mut gctx = GeneratorContext::new();
        gctx.declare("hero");
        let mut value = json!({ "entityRef": "hero", "src": "hero.culture", "dst": "any" });
        normalize_references(&mut value, &gctx);
        assert_eq!(value["entityRef"], json!("$hero"));
        assert_eq!(value["src"], json!("$hero.culture"));
        assert_eq!(value["dst"], json!("any"));
    }

    #[test]
    fn leaves_unbound_tokens_untouched() {
        let gctx = GeneratorContext::new();
        assert_eq!(gctx.normalize_ref("npc_pool"), "npc_pool");
        assert_eq!(gctx.normalize_ref("actor"), "$actor");
    }
}
