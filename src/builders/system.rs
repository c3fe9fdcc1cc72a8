//! System block builder (§4.6.1).
//!
//! Header is `system <systemType> <id> [<name>]`. The body's `config.id`/
//! `config.name` (or, if absent, the body's own `id`/`name`) must match the
//! labels. Output is `{systemType, config, enabled?}`.

use crate::builders::{apply_label_field, build_object_from_statements};
use crate::diagnostics::DiagnosticSink;
use crate::eval::EvalContext;
use crate::value::{Span, Statement};
use serde_json::{Map, Value as Json};

pub fn build_system(labels: &[String], body: &[Statement], span: &Span, ctx: &mut EvalContext, diags: &mut DiagnosticSink) -> Json {
    let mut out = Map::new();
    let Some(system_type) = labels.first() else {
        diags.error("E0210", "system requires a systemType label", Some(span.clone()));
        return Json::Object(out);
    };
    out.insert("systemType".to_string(), Json::String(system_type.clone()));

    let mut body_obj = build_object_from_statements(body, ctx, diags);
    let enabled = body_obj.remove("enabled");

    if let Some(id) = labels.get(1) {
        match body_obj.get_mut("config") {
            Some(Json::Object(cfg)) => {
                apply_label_field(cfg, "id", id, diags, span);
                if let Some(name) = labels.get(2) {
                    apply_label_field(cfg, "name", name, diags, span);
                }
            }
            _ => {
                apply_label_field(&mut body_obj, "id", id, diags, span);
                if let Some(name) = labels.get(2) {
                    apply_label_field(&mut body_obj, "name", name, diags, span);
                }
            }
        }
    }

    let config = body_obj.remove("config").unwrap_or(Json::Object(body_obj));
    out.insert("config".to_string(), config);
    if let Some(enabled) = enabled {
        out.insert("enabled".to_string(), enabled);
    }
    Json::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceRegistry;
    use crate::value::Position;
    use std::collections::HashMap;

    fn span() -> Span {
        Span::new("t.canon", Position::default(), Position::default())
    }

    #[test]
    fn builds_system_with_fallback_id() {
        let labels = vec!["economy".to_string(), "sys1".to_string()];
        let body = vec![];
        let vars = HashMap::new();
        let reg = ResourceRegistry::new();
        let mut ctx = EvalContext::new(&vars, &reg, false);
        let mut diags = DiagnosticSink::new();
        let result = build_system(&labels, &body, &span(), &mut ctx, &mut diags);
        assert_eq!(result.get("systemType"), Some(&Json::String("economy".into())));
        assert_eq!(result["config"]["id"], Json::String("sys1".into()));
        assert!(!diags.has_errors());
    }
}
