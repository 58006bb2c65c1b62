//! Data converters: per-field bidirectional codecs.
//!
//! Every converter turns a field value into a text fragment (`render`) and
//! turns that fragment back into the value (`recover`). The two operations
//! are inverses over the value shapes the converter accepts, up to the
//! normalizations documented on each converter.
//!
//! The set of encodings is closed: [`Converter`] is a tagged enum over the
//! concrete converters, and each of them implements [`DataConverter`].

pub mod data;
pub mod line;
pub mod markup;
pub mod string;
pub mod table;

pub use data::StructuredDataConverter;
pub use line::LineTemplateConverter;
pub use markup::StructuredMarkupConverter;
pub use string::StringConverter;
pub use table::MarkdownTableConverter;

use crate::error::{ConvertError, ConvertResult};
use serde_json::{Map, Value};

/// Capability shared by every converter.
pub trait DataConverter {
    /// Registry name of the converter's encoding (e.g. `"line_template"`).
    fn type_name(&self) -> &'static str;

    /// Construction parameters, with defaults written out explicitly.
    ///
    /// Passing these back to the configuration registry builds an equal
    /// converter.
    fn params(&self) -> Map<String, Value>;

    /// Encodes a value as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the value's shape is not accepted, or if it cannot
    /// be encoded so that [`DataConverter::recover`] gives it back.
    fn render(&self, value: &Value) -> ConvertResult<String>;

    /// Decodes text produced by [`DataConverter::render`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not follow the converter's grammar.
    /// A converter never returns a value it did not read from the text.
    fn recover(&self, text: &str) -> ConvertResult<Value>;
}

/// One of the supported field encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum Converter {
    /// Scalar as plain text.
    String(StringConverter),
    /// Sequence of flat mappings as a markdown table.
    MarkdownTable(MarkdownTableConverter),
    /// Sequence of flat mappings, one pattern line per item.
    LineTemplate(LineTemplateConverter),
    /// Mapping or sequence as an XML-style element tree.
    StructuredMarkup(StructuredMarkupConverter),
    /// Mapping or sequence as JSON.
    StructuredData(StructuredDataConverter),
}

impl Converter {
    /// Plain string converter.
    pub fn string() -> Self {
        Converter::String(StringConverter)
    }

    /// Markdown table converter.
    pub fn markdown_table() -> Self {
        Converter::MarkdownTable(MarkdownTableConverter)
    }

    /// Line template converter; see [`LineTemplateConverter::new`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern and fields are inconsistent.
    pub fn line_template<I, S>(pattern: &str, fields: I, indent: usize) -> ConvertResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LineTemplateConverter::new(pattern, fields, indent).map(Converter::LineTemplate)
    }

    /// Structured markup converter with the default element names.
    pub fn structured_markup() -> Self {
        Converter::StructuredMarkup(StructuredMarkupConverter::default())
    }

    /// Pretty-printed structured data converter.
    pub fn structured_data() -> Self {
        Converter::StructuredData(StructuredDataConverter::default())
    }

    fn inner(&self) -> &dyn DataConverter {
        match self {
            Converter::String(c) => c,
            Converter::MarkdownTable(c) => c,
            Converter::LineTemplate(c) => c,
            Converter::StructuredMarkup(c) => c,
            Converter::StructuredData(c) => c,
        }
    }
}

impl DataConverter for Converter {
    fn type_name(&self) -> &'static str {
        self.inner().type_name()
    }

    fn params(&self) -> Map<String, Value> {
        self.inner().params()
    }

    fn render(&self, value: &Value) -> ConvertResult<String> {
        self.inner().render(value)
    }

    fn recover(&self, text: &str) -> ConvertResult<Value> {
        self.inner().recover(text)
    }
}

impl From<StringConverter> for Converter {
    fn from(c: StringConverter) -> Self {
        Converter::String(c)
    }
}

impl From<MarkdownTableConverter> for Converter {
    fn from(c: MarkdownTableConverter) -> Self {
        Converter::MarkdownTable(c)
    }
}

impl From<LineTemplateConverter> for Converter {
    fn from(c: LineTemplateConverter) -> Self {
        Converter::LineTemplate(c)
    }
}

impl From<StructuredMarkupConverter> for Converter {
    fn from(c: StructuredMarkupConverter) -> Self {
        Converter::StructuredMarkup(c)
    }
}

impl From<StructuredDataConverter> for Converter {
    fn from(c: StructuredDataConverter) -> Self {
        Converter::StructuredData(c)
    }
}

/// Human-readable name of a value's shape, for error messages.
pub(crate) fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Text form of a scalar value, or `None` for null and containers.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Borrows a value as a sequence of mappings, reporting the first item that
/// is not a mapping.
pub(crate) fn records<'a>(
    value: &'a Value,
    expected: &'static str,
) -> ConvertResult<Vec<&'a Map<String, Value>>> {
    let Value::Array(items) = value else {
        return Err(ConvertError::UnsupportedShape {
            expected,
            found: shape_name(value),
        });
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(ConvertError::UnsupportedShape {
                expected,
                found: shape_name(other),
            }),
        })
        .collect()
}
