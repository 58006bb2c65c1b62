//! Integration tests for configuration loading and management.
//!
//! Tests config file parsing by extension, defaults, template resolution and
//! loading errors.

use serde_json::json;
use shotmaker_core::{
    ComponentFormatter, Context, Converter, EngineConfig, ErrorKind, PromptEngine, ShotError,
    TemplateRef, to_representation,
};
use std::fs;
use tempfile::TempDir;

fn entity_engine() -> PromptEngine {
    let formatter = ComponentFormatter::from_fields(["passage", "summary", "entities"])
        .unwrap()
        .with_converter(
            "entities",
            Converter::line_template("name (type)", ["name", "type"], 4).unwrap(),
        )
        .unwrap();
    PromptEngine::new(formatter).unwrap()
}

#[test]
fn test_config_load_from_toml_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.toml");

    let config_content = r#"
template = "default"

[converters.passage]
type = "string"

[converters.rows]
type = "markdown_table"

[converters.entities]
type = "line_template"

[converters.entities.params]
pattern = "name (type)"
fields = ["name", "type"]
indent = 2
"#;
    fs::write(&path, config_content).unwrap();

    let config = EngineConfig::load(&path).unwrap();
    let fields: Vec<_> = config.converters.keys().map(String::as_str).collect();
    assert_eq!(fields, ["passage", "rows", "entities"]);

    let engine = config.build().unwrap();
    let converter = engine.formatter().converter("entities").unwrap();
    assert_eq!(
        converter,
        &Converter::line_template("name (type)", ["name", "type"], 2).unwrap()
    );
}

#[test]
fn test_config_load_from_json_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.json");
    let config = to_representation(&entity_engine());
    fs::write(&path, config.to_json().unwrap()).unwrap();

    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}

#[test]
fn test_config_defaults_when_params_omitted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.toml");
    fs::write(
        &path,
        "[converters.facts]\ntype = \"structured_markup\"\n\n[converters.data]\ntype = \"structured_data\"\n",
    )
    .unwrap();

    let engine = EngineConfig::load(&path).unwrap().build().unwrap();
    assert_eq!(engine.template_ref(), &TemplateRef::Default);

    let written = to_representation(&engine);
    assert_eq!(
        serde_json::Value::Object(written.converters["facts"].params.clone()),
        json!({"root": "root", "item": "item"})
    );
    assert_eq!(
        serde_json::Value::Object(written.converters["data"].params.clone()),
        json!({"pretty": true})
    );
}

#[test]
fn test_relative_template_path_resolved_against_config() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("layout.j2"),
        "{{ intro }}\n{% for e in examples %}## Example {{ loop.index }}\n\n{{ e }}\n\n{% endfor %}## Query\n\n{{ query }}",
    )
    .unwrap();
    let path = temp_dir.path().join("engine.json");
    fs::write(
        &path,
        r#"{"template": {"path": "layout.j2"}, "converters": {"question": {"type": "string"}, "answer": {"type": "string"}}}"#,
    )
    .unwrap();

    let engine = EngineConfig::load(&path).unwrap().build().unwrap();
    assert_eq!(
        engine.template_ref(),
        &TemplateRef::Path(temp_dir.path().join("layout.j2"))
    );
    assert_eq!(engine.required_variables(), ["examples", "intro", "query"]);

    let context = Context::from([("intro".to_string(), "Quiz".to_string())]);
    let shot = json!({"question": "1+1", "answer": "2"});
    let query = json!({"question": "2+2"});
    let prompt = engine
        .generate_prompt(
            &context,
            &[shot.as_object().unwrap().clone()],
            query.as_object().unwrap(),
        )
        .unwrap();
    assert_eq!(
        prompt,
        "Quiz\n## Example 1\n\nQuestion:\n1+1\n\nAnswer:\n2\n\n## Query\n\nQuestion:\n2+2"
    );
    assert_eq!(engine.load(&prompt).unwrap().len(), 2);
}

#[test]
fn test_missing_template_file_fails_build() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.json");
    fs::write(
        &path,
        r#"{"template": {"path": "absent.j2"}, "converters": {"q": {"type": "string"}}}"#,
    )
    .unwrap();

    let err = EngineConfig::load(&path).unwrap().build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Template);
}

#[test]
fn test_config_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let err = EngineConfig::load(temp_dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ShotError::Io { .. }));
}

#[test]
fn test_config_invalid_toml_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.toml");
    fs::write(&path, "invalid { toml").unwrap();

    let err = EngineConfig::load(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_config_duplicate_labels_fail_build() {
    let config = EngineConfig::from_json(
        r#"{"converters": {"summary": {"type": "string"}, "SUMMARY": {"type": "string"}}}"#,
    )
    .unwrap();
    assert!(matches!(
        config.build(),
        Err(ShotError::DuplicateLabel { .. })
    ));
}

#[test]
fn test_config_without_fields_fails_build() {
    let config = EngineConfig::from_json(r#"{"converters": {}}"#).unwrap();
    assert!(matches!(config.build(), Err(ShotError::NoFields)));
}
