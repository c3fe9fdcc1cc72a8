//! Static-page secondary pipeline (§6.2, §6.3).
//!
//! Parses the same source files as the main pipeline but only collects
//! `static_page` blocks, independent of C3-C13. `content:` resolves
//! either a literal string or `read("file.md")` against the input file
//! set (exact path, then longest-suffix match).

use crate::builders::{apply_label_field, build_object_from_statements};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::eval::EvalContext;
use crate::registry::ResourceRegistry;
use crate::value::{Statement, Value};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;

pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// `compileCanonStaticPages`: collects every top-level `static_page`
/// block across `files` into page records, or `None` if any diagnostic
/// is an error.
pub fn compile_static_pages(files: &[SourceFile]) -> (Option<Vec<Json>>, Vec<Diagnostic>) {
    let mut diags = DiagnosticSink::new();
    let vars = HashMap::new();
    let registry = ResourceRegistry::new();
    let mut ctx = EvalContext::new(&vars, &registry, false);
    let mut pages = Vec::new();
    let mut seen_slugs: HashMap<String, usize> = HashMap::new();

    for file in files {
        let (statements, parse_errors) = crate::parser::parse_file(file.path.clone(), &file.content);
        for err in parse_errors {
            diags.error("E0101", err.to_string(), Some(err.span()));
        }
        for stmt in &statements {
            let Statement::Block { name, labels, body, span } = stmt else { continue };
            if name != "static_page" {
                continue;
            }
            let content_attr = body.iter().find(|s| matches!(s, Statement::Attribute { key, .. } if key == "content"));
            let plain_body: Vec<Statement> = body.iter().filter(|s| !matches!(s, Statement::Attribute { key, .. } if key == "content")).cloned().collect();
            let mut obj = build_object_from_statements(&plain_body, &mut ctx, &mut diags);
            if let Some(title) = labels.first() {
                apply_label_field(&mut obj, "title", title, &mut diags, span);
            }

            let content = match content_attr {
                Some(Statement::Attribute { value: Value::Call { name, args }, span: s, .. }) if name == "read" => {
                    let path = args.first().and_then(|v| v.as_str());
                    match path.and_then(|p| resolve_file_content(p, files)) {
                        Some(text) => Some(text),
                        None => {
                            diags.error("E0103", format!("read(\"{}\") does not match any input file", path.unwrap_or("")), Some(s.clone()));
                            None
                        }
                    }
                }
                Some(Statement::Attribute { value, span: s, .. }) => Some(value.as_str().map(str::to_string).unwrap_or_else(|| {
                    diags.warning("W0102", "static_page content did not resolve to a string", Some(s.clone()));
                    String::new()
                })),
                _ => None,
            };
            if let Some(content) = content {
                obj.insert("content".to_string(), Json::String(content));
            }

            let title = obj.get("title").and_then(|v| v.as_str()).unwrap_or("untitled").to_string();
            let slug = obj.remove("slug").and_then(|v| if let Json::String(s) = v { Some(s) } else { None }).unwrap_or_else(|| slugify(&title));
            let slug = disambiguate_slug(slug, &mut seen_slugs);
            obj.insert("slug".to_string(), Json::String(slug));

            pages.push(Json::Object(obj));
        }
    }

    if diags.has_errors() {
        (None, diags.into_vec())
    } else {
        (Some(pages), diags.into_vec())
    }
}

fn resolve_file_content(path: &str, files: &[SourceFile]) -> Option<String> {
    files
        .iter()
        .find(|f| f.path == path)
        .or_else(|| files.iter().find(|f| f.path.ends_with(path)))
        .map(|f| f.content.clone())
}

/// Lowercase-kebab, `[a-z0-9 -]` only, spaces collapsed to `-`, truncated
/// to 100 characters (§6.2).
fn slugify(title: &str) -> String {
    let filtered: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
        .collect();
    let slug: String = filtered.split_whitespace().collect::<Vec<_>>().join("-");
    slug.chars().take(100).collect()
}

fn disambiguate_slug(slug: String, seen: &mut HashMap<String, usize>) -> String {
    match seen.get_mut(&slug) {
        None => {
            seen.insert(slug.clone(), 1);
            slug
        }
        Some(count) => {
            *count += 1;
            format!("{slug}-{count}")
        }
    }
}

/// `serializeCanonStaticPages`: emits `static_pages.canon` plus one
/// content file per page under `page_dir`.
pub fn serialize_static_pages(pages: &[Json], page_dir: &str) -> Vec<(String, String)> {
    let mut files = Vec::new();
    let mut body = String::new();
    for page in pages {
        let Json::Object(map) = page else { continue };
        let title = map.get("title").and_then(|v| v.as_str()).unwrap_or("untitled");
        let slug = map.get("slug").and_then(|v| v.as_str()).unwrap_or("page");
        let content_path = format!("{}/{}.md", page_dir.trim_end_matches('/'), slug);
        if let Some(content) = map.get("content").and_then(|v| v.as_str()) {
            files.push((content_path.clone(), content.to_string()));
        }
        let mut rest = Map::new();
        for (k, v) in map {
            if !matches!(k.as_str(), "content" | "title") {
                rest.insert(k.clone(), v.clone());
            }
        }
        body.push_str(&format!("static_page {title} do\n"));
        body.push_str(&format!("  content:read(\"{content_path}\")\n"));
        for (k, v) in rest {
            body.push_str(&format!("  {k}:{v}\n"));
        }
        body.push_str("end\n\n");
    }
    files.push(("static_pages.canon".to_string(), body));
    files
}
