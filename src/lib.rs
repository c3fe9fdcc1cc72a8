//! Canon compiler: lowers a declarative block-structured configuration
//! language into a single normalized JSON-shaped project configuration
//! (§2's pipeline) and serializes it back to Canon source text.

pub mod builders;
pub mod diagnostics;
pub mod dispatch;
pub mod dsl;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod naming;
pub mod parser;
pub mod passes;
pub mod registry;
pub mod serialize;
pub mod static_pages;
pub mod value;

use diagnostics::{Diagnostic, DiagnosticSink};
use eval::EvalContext;
use serde_json::Value as Json;
use std::collections::HashMap;

/// A compiler input file (§6.1).
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Tuning knobs beyond what a single call site can express through
/// `allowAmbiguous` (SPEC_FULL.md §F1): a cap on accumulated diagnostics
/// for huge malformed projects, and a global override for ambiguous
/// resource-reference resolution.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub max_diagnostics: Option<usize>,
    pub allow_ambiguous_refs: bool,
}

/// Result of `compile_canon_project`: the lowered config, or `None` if
/// any diagnostic was an error.
pub struct CompileResult {
    pub config: Option<Json>,
    pub diagnostics: Vec<Diagnostic>,
}

/// `compileCanonProject` (§6.2): parses every file, runs the full
/// C3-C13 pipeline, and returns the lowered configuration or the
/// accumulated diagnostics.
pub fn compile_canon_project(files: &[SourceFile], options: &CompileOptions) -> CompileResult {
    tracing::info!(file_count = files.len(), "compiling canon project");
    let mut diags = DiagnosticSink::with_max(options.max_diagnostics);
    let mut statements = Vec::new();

    for file in files {
        let (file_statements, parse_errors) = parser::parse_file(file.path.clone(), &file.content);
        for err in parse_errors {
            diags.error("E0101", err.to_string(), Some(err.span()));
        }
        statements.extend(file_statements);
    }
    tracing::debug!(statement_count = statements.len(), "parsed source files");
    if diags.has_errors() {
        tracing::warn!("compilation failed during parsing");
        return CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        };
    }

    let var_result = passes::vars::collect_variables(statements, &mut diags);
    if diags.has_errors() {
        tracing::warn!("compilation failed during variable collection");
        return CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        };
    }

    let expanded = passes::expand::expand_statements(var_result.remaining, &mut diags);
    if diags.has_errors() {
        tracing::warn!("compilation failed during statement expansion");
        return CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        };
    }

    let collected = passes::collect::collect_top_level_blocks(expanded, &mut diags);
    if diags.has_errors() {
        tracing::warn!("compilation failed during top-level collection");
        return CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        };
    }

    let variables: HashMap<_, _> = var_result.variables;
    let registry = registry::build_registry(&collected);
    let mut ctx = EvalContext::new(&variables, &registry, options.allow_ambiguous_refs);

    let (rest, merged_naming) = naming::extract_and_merge_naming_blocks(collected, &mut ctx, &mut diags);
    if diags.has_errors() {
        tracing::warn!("compilation failed during naming extraction");
        return CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        };
    }

    let mut root = dispatch::dispatch_blocks(&rest, &mut ctx, &mut diags);
    if diags.has_errors() {
        tracing::warn!("compilation failed during block dispatch");
        return CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        };
    }

    naming::attach_naming_to_cultures(&mut root, merged_naming, &mut diags);
    if diags.has_errors() {
        tracing::warn!("compilation failed while attaching naming resources");
        return CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        };
    }

    validate_project(&root, &mut diags);

    let (seed_entities, seed_relationships) = extract_seed_collections(&root);
    passes::seed_validate::validate_seed_relationships(&seed_entities, &seed_relationships, &mut diags);

    if diags.has_errors() {
        tracing::warn!("compilation failed during seed-relationship validation");
        CompileResult {
            config: None,
            diagnostics: diags.into_vec(),
        }
    } else {
        tracing::info!("compilation succeeded");
        CompileResult {
            config: Some(root),
            diagnostics: diags.into_vec(),
        }
    }
}

fn extract_seed_collections(root: &Json) -> (Vec<Json>, Vec<Json>) {
    let entities = root.get("seedEntities").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let relationships = root.get("seedRelationships").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    (entities, relationships)
}

/// Warns (never blocks) on generators/actions with no applicability
/// conditions (SPEC_FULL.md §F3). The companion "naming entry attached
/// to zero cultures" warning lives in `naming::attach_naming_to_cultures`,
/// since it needs the pre-attachment entry list this function never sees.
fn validate_project(root: &Json, diags: &mut DiagnosticSink) {
    for collection in ["generators", "actions"] {
        for entry in root.get(collection).and_then(|v| v.as_array()).into_iter().flatten() {
            let empty = entry.get("applicability").map(|v| v.as_array().is_none_or(|a| a.is_empty())).unwrap_or(true);
            if empty {
                let id = entry.get("id").and_then(|v| v.as_str()).unwrap_or("?");
                diags.warning("W0105", format!("\"{id}\" has no applicability conditions"), None);
            }
        }
    }
}

/// `compileCanonStaticPages` (§6.2).
pub fn compile_canon_static_pages(files: &[static_pages::SourceFile]) -> (Option<Vec<Json>>, Vec<Diagnostic>) {
    static_pages::compile_static_pages(files)
}

/// `serializeCanonProject` (§6.2).
pub fn serialize_canon_project(config: &Json) -> Vec<(String, String)> {
    serialize::serialize_project(config)
}

/// `serializeCanonStaticPages` (§6.2). `page_dir` defaults to `page/`.
pub fn serialize_canon_static_pages(pages: &[Json], page_dir: Option<&str>) -> Vec<(String, String)> {
    static_pages::serialize_static_pages(pages, page_dir.unwrap_or("page"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_project() {
        let files = vec![SourceFile {
            path: "main.canon".into(),
            content: "project do\n  name:\"Demo\"\nend\n".into(),
        }];
        let result = compile_canon_project(&files, &CompileOptions::default());
        assert!(result.diagnostics.iter().all(|d| !d.is_error()), "{:?}", result.diagnostics);
        let config = result.config.expect("expected a config");
        assert_eq!(config["name"], Json::String("Demo".into()));
    }

    #[test]
    fn missing_project_block_is_an_error() {
        let files = vec![SourceFile {
            path: "main.canon".into(),
            content: "pressure tension do\nend\n".into(),
        }];
        let result = compile_canon_project(&files, &CompileOptions::default());
        assert!(result.config.is_none());
        assert!(result.diagnostics.iter().any(|d| d.is_error()));
    }

    #[test]
    fn seed_relationship_dangling_reference_is_an_error() {
        let files = vec![SourceFile {
            path: "main.canon".into(),
            content: "project do\n  name:\"Demo\"\nend\nseed_entity hero do\nend\nseed_relationship friend_of hero ghost 0.5\n".into(),
        }];
        let result = compile_canon_project(&files, &CompileOptions::default());
        assert!(result.config.is_none());
        assert!(result.diagnostics.iter().any(|d| d.code == "E0601"));
    }
}
