//! Integration tests for the seed scenarios in spec.md's testable
//! properties section, exercised end to end through
//! `compile_canon_project` rather than any individual pass.

use canonc::{compile_canon_project, CompileOptions, SourceFile};
use pretty_assertions::assert_eq;
use serde_json::Value as Json;

fn file(content: &str) -> Vec<SourceFile> {
    vec![SourceFile {
        path: "main.canon".to_string(),
        content: content.to_string(),
    }]
}

#[test]
fn s1_minimal_project_compiles_to_empty_config() {
    let files = file("project \"p\" do end\n");
    let result = compile_canon_project(&files, &CompileOptions::default());
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let config = result.config.expect("expected a config");
    assert_eq!(config, Json::Object(serde_json::Map::new()));
}

#[test]
fn s2_axis_line_form_lowers_to_axis_definitions() {
    let files = file("project \"p\" do end\naxis moral \"Moral Axis\" good -> evil \"Ethical spectrum\"\n");
    let result = compile_canon_project(&files, &CompileOptions::default());
    assert!(result.diagnostics.iter().all(|d| !d.is_error()), "{:?}", result.diagnostics);
    let config = result.config.expect("expected a config");
    let axes = config["axisDefinitions"].as_array().unwrap();
    assert_eq!(axes.len(), 1);
    assert_eq!(axes[0]["id"], Json::String("moral".into()));
    assert_eq!(axes[0]["name"], Json::String("Moral Axis".into()));
    assert_eq!(axes[0]["lowTag"], Json::String("good".into()));
    assert_eq!(axes[0]["highTag"], Json::String("evil".into()));
    assert_eq!(axes[0]["description"], Json::String("Ethical spectrum".into()));
}

#[test]
fn s3_generator_dsl_happy_path_lowers_applicability_selection_and_relationships() {
    let source = "project \"p\" do end\n\
generator g1 \"G1\" do\n\
  when do\n\
    pressure tension >= 3\n\
  end\n\
  choose target from npc do\n\
    pick:random\n\
  end\n\
  rel friend_of target -> target strength:0.5\n\
end\n";
    let files = file(source);
    let result = compile_canon_project(&files, &CompileOptions::default());
    assert!(result.diagnostics.iter().all(|d| !d.is_error()), "{:?}", result.diagnostics);
    let config = result.config.expect("expected a config");
    let gen = &config["generators"][0];
    assert_eq!(gen["id"], Json::String("g1".into()));
    assert_eq!(gen["name"], Json::String("G1".into()));
    assert_eq!(gen["applicability"][0]["type"], Json::String("and".into()));
    assert_eq!(gen["applicability"][0]["conditions"][0]["type"], Json::String("pressure".into()));
    assert_eq!(gen["applicability"][0]["conditions"][0]["pressureId"], Json::String("tension".into()));
    assert_eq!(gen["applicability"][0]["conditions"][0]["min"], Json::from(3));
    assert_eq!(gen["selection"]["kind"], Json::String("npc".into()));
    assert_eq!(gen["selection"]["pickStrategy"], Json::String("random".into()));
    assert_eq!(gen["relationships"][0]["kind"], Json::String("friend_of".into()));
    assert_eq!(gen["relationships"][0]["src"], Json::String("$target".into()));
    assert_eq!(gen["relationships"][0]["dst"], Json::String("$target".into()));
    assert_eq!(gen["relationships"][0]["strength"], Json::from(0.5));
}

#[test]
fn s4_duplicate_axis_id_is_a_single_error_and_no_config() {
    let files = file(
        "project \"p\" do end\n\
axis foo \"Foo\" a -> b\n\
axis foo \"Foo Again\" c -> d\n",
    );
    let result = compile_canon_project(&files, &CompileOptions::default());
    assert!(result.config.is_none());
    let dup_errors: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.is_error() && d.message.contains("foo") && d.message.contains("axisDefinitions"))
        .collect();
    assert_eq!(dup_errors.len(), 1, "{:?}", result.diagnostics);
}

#[test]
fn s5_naming_merge_attaches_shared_entry_to_both_cultures() {
    let source = "project \"p\" do end\n\
culture culture_a do end\n\
culture culture_b do end\n\
grammar g1 do\n\
  culture_id culture_a.id\n\
end\n\
grammar g1 do\n\
  culture_id culture_b.id\n\
end\n";
    let files = file(source);
    let result = compile_canon_project(&files, &CompileOptions::default());
    assert!(result.diagnostics.iter().all(|d| !d.is_error()), "{:?}", result.diagnostics);
    let config = result.config.expect("expected a config");
    let cultures = config["cultures"].as_array().unwrap();
    assert_eq!(cultures.len(), 2);
    for culture in cultures {
        let grammars = culture["naming"]["grammars"].as_array().expect("naming.grammars present");
        assert_eq!(grammars.len(), 1);
        assert_eq!(grammars[0]["id"], Json::String("g1".into()));
        assert!(grammars[0].get("cultureId").is_none(), "cultureId should be stripped before attachment");
    }
}

#[test]
fn s6_seed_relationship_with_unknown_dst_is_an_error() {
    let source = "project \"p\" do end\n\
seed_entity a do\n\
  kind:x\n\
end\n\
seed_relationship knows a b 0.5\n";
    let files = file(source);
    let result = compile_canon_project(&files, &CompileOptions::default());
    assert!(result.config.is_none());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == "E0601" && d.message.contains("dst") && d.message.contains('b')));
}

#[test]
fn empty_input_is_an_error_not_a_panic() {
    let files = file("");
    let result = compile_canon_project(&files, &CompileOptions::default());
    assert!(result.config.is_none());
    assert!(result.diagnostics.iter().any(|d| d.is_error()));
}
