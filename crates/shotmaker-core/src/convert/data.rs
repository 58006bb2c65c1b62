//! Structured data converter: JSON text.

use super::{DataConverter, shape_name};
use crate::error::{ConvertError, ConvertResult};
use serde_json::{Map, Value};

/// Renders a mapping or sequence as JSON and parses it back exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredDataConverter {
    pretty: bool,
}

impl Default for StructuredDataConverter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl StructuredDataConverter {
    /// Registry name.
    pub const TYPE_NAME: &'static str = "structured_data";

    /// Creates a converter that writes indented (`pretty`) or single-line JSON.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Whether output is indented.
    pub fn pretty(&self) -> bool {
        self.pretty
    }
}

impl DataConverter for StructuredDataConverter {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("pretty".to_string(), Value::Bool(self.pretty));
        params
    }

    fn render(&self, value: &Value) -> ConvertResult<String> {
        if !matches!(value, Value::Object(_) | Value::Array(_)) {
            return Err(ConvertError::UnsupportedShape {
                expected: "mapping or sequence",
                found: shape_name(value),
            });
        }
        let text = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        text.map_err(|e| ConvertError::Unrepresentable(e.to_string()))
    }

    fn recover(&self, text: &str) -> ConvertResult<Value> {
        let value: Value = serde_json::from_str(text.trim())?;
        match value {
            Value::Object(_) | Value::Array(_) => Ok(value),
            other => Err(ConvertError::UnsupportedShape {
                expected: "mapping or sequence",
                found: shape_name(&other),
            }),
        }
    }
}
