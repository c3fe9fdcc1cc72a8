//! Resource registry (C6).
//!
//! Indexes every block whose name is in the fixed resource-block set by its
//! first label, so `<name>.id` references (§4.7) can be resolved during
//! evaluation. Built once, after C5, and treated as immutable afterward
//! (§3 `EvalContext.resources`).

use crate::value::{Span, Statement};
use std::collections::HashMap;

/// Block names that populate the resource registry (§3).
pub const RESOURCE_BLOCK_NAMES: &[&str] = &[
    "entity_kind",
    "relationship_kind",
    "era",
    "culture",
    "axis",
    "tag",
    "pressure",
    "region",
    "domain",
    "grammar",
    "profile",
    "lexeme_spec",
    "lexeme",
    "lexeme_list",
];

/// Block names whose resource entries are deduplicated by `(type, label)` —
/// the naming family, merged later by C12.
const NAMING_FAMILY: &[&str] = &["domain", "grammar", "profile", "lexeme_spec", "lexeme_list"];

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub name: String,
    pub id: String,
    pub type_: String,
    pub span: Span,
}

#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    entries: HashMap<String, Vec<ResourceEntry>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource block's first label as its id. No-op for
    /// blocks with no label, or (for naming-family blocks) if a block of
    /// the same `(type, label)` pair is already indexed.
    pub fn register(&mut self, type_: &str, id: Option<&str>, span: &Span) {
        let Some(id) = id else { return };
        let bucket = self.entries.entry(id.to_string()).or_default();
        if NAMING_FAMILY.contains(&type_) && bucket.iter().any(|e| e.type_ == type_) {
            return;
        }
        bucket.push(ResourceEntry {
            name: id.to_string(),
            id: id.to_string(),
            type_: type_.to_string(),
            span: span.clone(),
        });
    }

    pub fn lookup(&self, id: &str) -> &[ResourceEntry] {
        self.entries.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn lookup_typed<'a>(&'a self, id: &str, allowed_types: Option<&[String]>) -> Vec<&'a ResourceEntry> {
        self.lookup(id)
            .iter()
            .filter(|e| allowed_types.is_none_or(|types| types.iter().any(|t| t == &e.type_)))
            .collect()
    }
}

/// Builds the registry from the top-level blocks C5 produced, indexing
/// every block whose name is in [`RESOURCE_BLOCK_NAMES`] by its first
/// label (§3, §4.6's `ResourceEntry` paragraph).
pub fn build_registry(statements: &[Statement]) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    for stmt in statements {
        if let Statement::Block { name, labels, span, .. } = stmt {
            if RESOURCE_BLOCK_NAMES.contains(&name.as_str()) {
                registry.register(name, labels.first().map(|s| s.as_str()), span);
            }
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Position;

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    #[test]
    fn registers_and_resolves_by_id() {
        let mut reg = ResourceRegistry::new();
        reg.register("axis", Some("moral"), &span());
        let matches = reg.lookup_typed("moral", None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].type_, "axis");
    }

    #[test]
    fn naming_family_dedupes_by_type_and_label() {
        let mut reg = ResourceRegistry::new();
        reg.register("grammar", Some("g1"), &span());
        reg.register("grammar", Some("g1"), &span());
        assert_eq!(reg.lookup("g1").len(), 1);
    }

    #[test]
    fn ambiguous_when_multiple_types_share_id() {
        let mut reg = ResourceRegistry::new();
        reg.register("axis", Some("x"), &span());
        reg.register("tag", Some("x"), &span());
        assert_eq!(reg.lookup("x").len(), 2);
    }

    #[test]
    fn build_registry_indexes_resource_blocks_and_skips_others() {
        let statements = vec![
            Statement::Block {
                name: "axis".into(),
                labels: vec!["moral".to_string()],
                body: vec![],
                span: span(),
            },
            Statement::Block {
                name: "project".into(),
                labels: vec![],
                body: vec![],
                span: span(),
            },
        ];
        let reg = build_registry(&statements);
        assert_eq!(reg.lookup_typed("moral", None).len(), 1);
    }
}
