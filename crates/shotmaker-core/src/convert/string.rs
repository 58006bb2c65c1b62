//! Plain text converter for scalar fields.

use super::{DataConverter, scalar_text, shape_name};
use crate::error::{ConvertError, ConvertResult};
use serde_json::{Map, Value};

/// Renders a scalar as its text form and recovers it as a trimmed string.
///
/// Numbers and booleans render as their JSON text and come back as strings;
/// leading and trailing whitespace does not survive recovery. Text holding a
/// carriage return is rejected, since line splitting would drop it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringConverter;

impl StringConverter {
    /// Registry name.
    pub const TYPE_NAME: &'static str = "string";
}

impl DataConverter for StringConverter {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn render(&self, value: &Value) -> ConvertResult<String> {
        let text = scalar_text(value).ok_or(ConvertError::UnsupportedShape {
            expected: "scalar",
            found: shape_name(value),
        })?;
        if text.contains('\r') {
            return Err(ConvertError::Unrepresentable(format!(
                "text contains a carriage return: {text:?}"
            )));
        }
        Ok(text)
    }

    fn recover(&self, text: &str) -> ConvertResult<Value> {
        Ok(Value::String(text.trim().to_string()))
    }
}
