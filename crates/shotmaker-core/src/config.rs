//! Configuration codec for prompt engines.
//!
//! An engine's configuration is a portable document naming, per field, the
//! converter type and its construction parameters, plus the layout template
//! reference:
//!
//! ```json
//! {
//!   "template": "default",
//!   "converters": {
//!     "passage": { "type": "string", "params": {} },
//!     "entities": {
//!       "type": "line_template",
//!       "params": { "pattern": "name (type)", "fields": ["name", "type"], "indent": 4 }
//!     }
//!   }
//! }
//! ```
//!
//! Field order in `converters` is the declared field order. Converter types
//! are resolved through a fixed registry; parameters left out of a document
//! take their defaults, and [`to_representation`] always writes them out.

use crate::convert::{
    Converter, DataConverter, LineTemplateConverter, MarkdownTableConverter,
    StringConverter, StructuredDataConverter, StructuredMarkupConverter,
};
use crate::engine::PromptEngine;
use crate::error::{ConvertError, Result, ShotError};
use crate::formatter::ComponentFormatter;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shotmaker_pm::TemplateRef;
use std::path::Path;

/// Converter type and parameters for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterSpec {
    /// Registry name of the converter.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Construction parameters.
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Serializable configuration of a [`PromptEngine`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Layout template reference.
    #[serde(default)]
    pub template: TemplateRef,

    /// Field name → converter, in declared order.
    pub converters: IndexMap<String, ConverterSpec>,
}

impl EngineConfig {
    /// Serializes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::ConfigParse`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ShotError::ConfigParse(e.to_string()))
    }

    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::ConfigParse`] if the text is not a valid document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ShotError::ConfigParse(e.to_string()))
    }

    /// Serializes the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::ConfigParse`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ShotError::ConfigParse(e.to_string()))
    }

    /// Parses a TOML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::ConfigParse`] if the text is not a valid document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ShotError::ConfigParse(e.to_string()))
    }

    /// Reads a configuration file: TOML for a `.toml` extension, JSON
    /// otherwise.
    ///
    /// A relative template path is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Io`] if the file cannot be read and
    /// [`ShotError::ConfigParse`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ShotError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut config = if is_toml {
            Self::from_toml(&text)?
        } else {
            Self::from_json(&text)?
        };

        if let TemplateRef::Path(template) = &mut config.template {
            if template.is_relative() {
                if let Some(dir) = path.parent() {
                    *template = dir.join(&*template);
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            fields = config.converters.len(),
            "loaded engine configuration"
        );
        Ok(config)
    }

    /// Builds the engine this configuration describes.
    ///
    /// # Errors
    ///
    /// See [`from_representation`].
    pub fn build(&self) -> Result<PromptEngine> {
        from_representation(self)
    }
}

/// Captures an engine's configuration.
///
/// Every converter's parameters are written out, defaults included, so the
/// document does not depend on future default changes.
pub fn to_representation(engine: &PromptEngine) -> EngineConfig {
    let converters = engine
        .formatter()
        .converters()
        .iter()
        .map(|(field, converter)| {
            let spec = ConverterSpec {
                type_name: converter.type_name().to_string(),
                params: converter.params(),
            };
            (field.clone(), spec)
        })
        .collect();
    EngineConfig {
        template: engine.template_ref().clone(),
        converters,
    }
}

/// Rebuilds an engine from its configuration.
///
/// # Errors
///
/// Returns [`ShotError::UnknownConverter`] for an unregistered type name,
/// [`ShotError::Configuration`] for missing, unknown or mistyped parameters,
/// the formatter's construction errors, and [`ShotError::Prompt`] if the
/// template cannot be built.
#[tracing::instrument(skip_all, fields(fields = config.converters.len()))]
pub fn from_representation(config: &EngineConfig) -> Result<PromptEngine> {
    let converters = config
        .converters
        .iter()
        .map(|(field, spec)| Ok((field.clone(), build_converter(field, spec)?)))
        .collect::<Result<IndexMap<_, _>>>()?;
    let formatter = ComponentFormatter::new(converters)?;
    PromptEngine::with_template(formatter, &config.template)
}

/// Constructs one converter through the registry.
///
/// # Errors
///
/// See [`from_representation`].
pub fn build_converter(field: &str, spec: &ConverterSpec) -> Result<Converter> {
    let Some((_, constructor)) = REGISTRY
        .iter()
        .find(|(name, _)| *name == spec.type_name)
    else {
        return Err(ShotError::UnknownConverter {
            field: field.to_string(),
            type_name: spec.type_name.clone(),
        });
    };
    constructor(&Params {
        field,
        values: &spec.params,
    })
}

/// Registered converter type names, in registry order.
pub fn converter_types() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(name, _)| *name)
}

type Constructor = fn(&Params<'_>) -> Result<Converter>;

const REGISTRY: &[(&str, Constructor)] = &[
    (StringConverter::TYPE_NAME, build_string),
    (MarkdownTableConverter::TYPE_NAME, build_markdown_table),
    (LineTemplateConverter::TYPE_NAME, build_line_template),
    (StructuredMarkupConverter::TYPE_NAME, build_structured_markup),
    (StructuredDataConverter::TYPE_NAME, build_structured_data),
];

fn build_string(params: &Params<'_>) -> Result<Converter> {
    params.allow(&[])?;
    Ok(Converter::string())
}

fn build_markdown_table(params: &Params<'_>) -> Result<Converter> {
    params.allow(&[])?;
    Ok(Converter::markdown_table())
}

fn build_line_template(params: &Params<'_>) -> Result<Converter> {
    params.allow(&["pattern", "fields", "indent"])?;
    let pattern = params.required("pattern", Params::string)?;
    let fields = params.required("fields", Params::strings)?;
    let indent = params.optional("indent", Params::count)?.unwrap_or(0);
    LineTemplateConverter::new(&pattern, fields, indent)
        .map(Converter::from)
        .map_err(|e| params.invalid(e))
}

fn build_structured_markup(params: &Params<'_>) -> Result<Converter> {
    params.allow(&["root", "item"])?;
    let defaults = StructuredMarkupConverter::default();
    let root = params
        .optional("root", Params::string)?
        .unwrap_or_else(|| defaults.root().to_string());
    let item = params
        .optional("item", Params::string)?
        .unwrap_or_else(|| defaults.item().to_string());
    StructuredMarkupConverter::new(root, item)
        .map(Converter::from)
        .map_err(|e| params.invalid(e))
}

fn build_structured_data(params: &Params<'_>) -> Result<Converter> {
    params.allow(&["pretty"])?;
    let pretty = params.optional("pretty", Params::flag)?.unwrap_or(true);
    Ok(StructuredDataConverter::new(pretty).into())
}

/// Parameters of one field, with typed accessors that report errors
/// against that field.
struct Params<'a> {
    field: &'a str,
    values: &'a Map<String, Value>,
}

impl Params<'_> {
    fn invalid(&self, err: ConvertError) -> ShotError {
        ShotError::Configuration {
            field: self.field.to_string(),
            reason: err.to_string(),
        }
    }

    fn allow(&self, known: &[&str]) -> Result<()> {
        match self.values.keys().find(|k| !known.contains(&k.as_str())) {
            Some(name) => Err(self.invalid(ConvertError::InvalidParam {
                param: name.clone(),
                reason: "not a parameter of this converter".to_string(),
            })),
            None => Ok(()),
        }
    }

    fn optional<T>(
        &self,
        name: &str,
        read: fn(&Value) -> std::result::Result<T, &'static str>,
    ) -> Result<Option<T>> {
        self.values
            .get(name)
            .map(|value| {
                read(value).map_err(|expected| {
                    self.invalid(ConvertError::InvalidParam {
                        param: name.to_string(),
                        reason: format!("expected {expected}"),
                    })
                })
            })
            .transpose()
    }

    fn required<T>(
        &self,
        name: &str,
        read: fn(&Value) -> std::result::Result<T, &'static str>,
    ) -> Result<T> {
        self.optional(name, read)?
            .ok_or_else(|| self.invalid(ConvertError::MissingParam(name.to_string())))
    }

    fn string(value: &Value) -> std::result::Result<String, &'static str> {
        value.as_str().map(str::to_string).ok_or("a string")
    }

    fn strings(value: &Value) -> std::result::Result<Vec<String>, &'static str> {
        const EXPECTED: &str = "a list of strings";
        value
            .as_array()
            .ok_or(EXPECTED)?
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or(EXPECTED))
            .collect()
    }

    fn count(value: &Value) -> std::result::Result<usize, &'static str> {
        const EXPECTED: &str = "a non-negative integer";
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(EXPECTED)
    }

    fn flag(value: &Value) -> std::result::Result<bool, &'static str> {
        value.as_bool().ok_or("a boolean")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Context;
    use crate::error::ErrorKind;
    use crate::formatter::Example;
    use serde_json::json;

    fn engine() -> PromptEngine {
        let formatter = ComponentFormatter::from_fields(["passage", "summary", "entities", "facts"])
            .unwrap()
            .with_converter(
                "entities",
                Converter::line_template("name (type)", ["name", "type"], 4).unwrap(),
            )
            .unwrap()
            .with_converter(
                "facts",
                StructuredMarkupConverter::new("facts", "fact").unwrap().into(),
            )
            .unwrap();
        PromptEngine::new(formatter).unwrap()
    }

    fn render(engine: &PromptEngine) -> String {
        let context = Context::from([
            ("system_prompt".to_string(), "S".to_string()),
            ("task_description".to_string(), "T".to_string()),
        ]);
        let shot = json!({
            "passage": "P1",
            "summary": "S1",
            "entities": [{"name": "E1", "type": "T1"}],
            "facts": {"year": 1999, "tags": ["a", "b"]}
        });
        let query = json!({"passage": "P2"});
        let as_example = |v: Value| -> Example { v.as_object().cloned().unwrap() };
        engine
            .generate_prompt(&context, &[as_example(shot)], &as_example(query))
            .unwrap()
    }

    #[test]
    fn test_representation_writes_defaults() {
        let config = to_representation(&engine());
        let fields: Vec<_> = config.converters.keys().collect();
        assert_eq!(fields, ["passage", "summary", "entities", "facts"]);
        assert_eq!(config.template, TemplateRef::Default);
        assert_eq!(
            Value::Object(config.converters["entities"].params.clone()),
            json!({"pattern": "name (type)", "fields": ["name", "type"], "indent": 4})
        );
        assert_eq!(
            Value::Object(config.converters["facts"].params.clone()),
            json!({"root": "facts", "item": "fact"})
        );
    }

    #[test]
    fn test_json_round_trip_renders_identically() {
        let original = engine();
        let text = to_representation(&original).to_json().unwrap();
        let rebuilt = EngineConfig::from_json(&text).unwrap().build().unwrap();
        assert_eq!(render(&original), render(&rebuilt));
        assert_eq!(to_representation(&rebuilt).to_json().unwrap(), text);
    }

    #[test]
    fn test_toml_round_trip_renders_identically() {
        let original = engine();
        let text = to_representation(&original).to_toml().unwrap();
        let config = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(config, to_representation(&original));
        assert_eq!(render(&original), render(&config.build().unwrap()));
    }

    #[test]
    fn test_document_defaults() {
        let config = EngineConfig::from_json(
            r#"{"converters": {"answer": {"type": "structured_data"}}}"#,
        )
        .unwrap();
        assert_eq!(config.template, TemplateRef::Default);
        let engine = config.build().unwrap();
        assert_eq!(
            engine.formatter().converter("answer"),
            Some(&Converter::structured_data())
        );
    }

    #[test]
    fn test_template_reference_forms() {
        let config = EngineConfig::from_json(
            r#"{"template": {"source": "{{ query }}"}, "converters": {"q": {"type": "string"}}}"#,
        )
        .unwrap();
        assert_eq!(config.template, TemplateRef::Source("{{ query }}".to_string()));
        let json = to_representation(&config.build().unwrap()).to_json().unwrap();
        assert!(json.contains(r#""source": "{{ query }}""#));
    }

    #[test]
    fn test_unknown_converter_type() {
        let config =
            EngineConfig::from_json(r#"{"converters": {"answer": {"type": "yaml"}}}"#).unwrap();
        let err = config.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(
            err,
            ShotError::UnknownConverter { field, type_name } if field == "answer" && type_name == "yaml"
        ));
    }

    #[test]
    fn test_missing_required_param() {
        let config = EngineConfig::from_json(
            r#"{"converters": {"entities": {"type": "line_template", "params": {"fields": ["name"]}}}}"#,
        )
        .unwrap();
        match config.build().unwrap_err() {
            ShotError::Configuration { field, reason } => {
                assert_eq!(field, "entities");
                assert!(reason.contains("pattern"));
            }
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_mistyped_param() {
        let config = EngineConfig::from_json(
            r#"{"converters": {"data": {"type": "structured_data", "params": {"pretty": "yes"}}}}"#,
        )
        .unwrap();
        match config.build().unwrap_err() {
            ShotError::Configuration { field, reason } => {
                assert_eq!(field, "data");
                assert!(reason.contains("pretty"));
                assert!(reason.contains("boolean"));
            }
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_param_rejected() {
        let config = EngineConfig::from_json(
            r#"{"converters": {"text": {"type": "string", "params": {"trim": false}}}}"#,
        )
        .unwrap();
        assert!(matches!(
            config.build(),
            Err(ShotError::Configuration { reason, .. }) if reason.contains("trim")
        ));
    }

    #[test]
    fn test_invalid_pattern_reported_as_configuration() {
        let config = EngineConfig::from_json(
            r#"{"converters": {"e": {"type": "line_template", "params": {"pattern": "name", "fields": ["name", "type"]}}}}"#,
        )
        .unwrap();
        assert_eq!(config.build().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            EngineConfig::from_json("{\"converters\": 3}"),
            Err(ShotError::ConfigParse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml("converters = ["),
            Err(ShotError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_registry_names() {
        let names: Vec<_> = converter_types().collect();
        assert_eq!(
            names,
            ["string", "markdown_table", "line_template", "structured_markup", "structured_data"]
        );
    }
}
