//! Error types for shotmaker operations.
//!
//! Two layers are defined here. [`ConvertError`] is what a single data
//! converter reports: it knows the text or value it was handed but not which
//! field that value belongs to. [`ShotError`] is what the formatter, the
//! prompt engine and the configuration codec report; it carries the field
//! name and, for parse failures, the offending text segment.

use shotmaker_pm::PromptError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a single data converter.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The value's shape is not one the converter accepts.
    #[error("expected {expected}, found {found}")]
    UnsupportedShape {
        /// Shape the converter accepts.
        expected: &'static str,
        /// Shape that was supplied.
        found: &'static str,
    },

    /// The value has an accepted shape but cannot be encoded so that it
    /// decodes back to itself.
    #[error("value cannot be represented: {0}")]
    Unrepresentable(String),

    /// Markdown table text does not have the rendered table structure.
    #[error("table shape mismatch: {0}")]
    TableShape(String),

    /// A line does not match the configured line pattern.
    #[error("line does not match pattern `{pattern}`: {line:?}")]
    LinePattern {
        /// The configured pattern.
        pattern: String,
        /// The offending line, verbatim.
        line: String,
    },

    /// Markup text is not well formed or does not follow the element dialect.
    #[error("malformed markup at byte {position}: {reason}")]
    Markup {
        /// Byte offset in the fragment where parsing stopped.
        position: usize,
        /// What was wrong at that position.
        reason: String,
    },

    /// Structured data text could not be parsed.
    #[error("malformed data fragment: {0}")]
    Data(#[from] serde_json::Error),

    /// A construction parameter is present but unusable.
    #[error("invalid parameter `{param}`: {reason}")]
    InvalidParam {
        /// Parameter name.
        param: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required construction parameter is absent.
    #[error("missing required parameter `{0}`")]
    MissingParam(String),
}

/// Result type alias for converter operations.
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

/// Coarse classification of a [`ShotError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value or example could not be rendered.
    Formatting,
    /// Text did not match the expected layout or converter grammar.
    Parse,
    /// The layout requires variables the caller did not supply.
    Validation,
    /// A formatter or engine could not be constructed from its configuration.
    Configuration,
    /// The template engine failed.
    Template,
    /// Reading a file failed.
    Io,
}

/// Comprehensive error type for shotmaker operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ShotError {
    // Formatting errors
    /// A converter rejected a field's value.
    #[error("failed to format field `{field}`: {source}")]
    Formatting {
        /// Field whose value was rejected.
        field: String,
        /// Converter error.
        #[source]
        source: ConvertError,
    },

    /// An example lacks a declared field.
    #[error("example is missing declared field `{0}`")]
    MissingField(String),

    /// An example or query contains a field the formatter does not declare.
    #[error("field `{0}` is not declared by the formatter")]
    UndeclaredField(String),

    // Parse errors
    /// A converter could not recover a field's value from its section.
    #[error("failed to parse field `{field}`: {source}")]
    Parse {
        /// Field whose section failed.
        field: String,
        /// The section text handed to the converter.
        segment: String,
        /// Converter error.
        #[source]
        source: ConvertError,
    },

    /// A declared field's labeled section is absent or out of order.
    #[error("missing or out-of-order section for field `{0}`")]
    MissingSection(String),

    /// Text appeared where a field label was expected.
    #[error("unexpected text before the first field label: {0:?}")]
    UnexpectedText(String),

    /// A response contained no labeled section at all.
    #[error("no labeled field sections found")]
    NoSections,

    /// A whole prompt does not have the example/query heading structure.
    #[error("prompt structure mismatch: {0}")]
    PromptStructure(String),

    // Validation errors
    /// The layout reads variables that the context does not supply.
    #[error("missing required variables: {}", .missing.join(", "))]
    Validation {
        /// Missing variable names, sorted.
        missing: Vec<String>,
    },

    /// A context key collides with a structural slot.
    #[error("context key `{0}` is reserved for formatted prompt content")]
    ReservedContextKey(String),

    // Configuration errors
    /// A converter could not be constructed for a field.
    #[error("invalid configuration for field `{field}`: {reason}")]
    Configuration {
        /// Field being configured.
        field: String,
        /// What was wrong.
        reason: String,
    },

    /// A configuration names a converter type that is not registered.
    #[error("unknown converter type `{type_name}` for field `{field}`")]
    UnknownConverter {
        /// Field being configured.
        field: String,
        /// Unrecognized type name.
        type_name: String,
    },

    /// Two fields render to the same label line.
    #[error("fields `{first}` and `{second}` share the label `{label}`")]
    DuplicateLabel {
        /// Field declared first.
        first: String,
        /// Field declared second.
        second: String,
        /// The shared label.
        label: String,
    },

    /// A formatter was built without any fields.
    #[error("a formatter needs at least one field")]
    NoFields,

    /// A configuration document could not be parsed or written.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    // Passthrough
    /// Template engine error.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Error reading a file.
    #[error("failed to read {path}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ShotError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShotError::Formatting { .. }
            | ShotError::MissingField(_)
            | ShotError::UndeclaredField(_) => ErrorKind::Formatting,
            ShotError::Parse { .. }
            | ShotError::MissingSection(_)
            | ShotError::UnexpectedText(_)
            | ShotError::NoSections
            | ShotError::PromptStructure(_) => ErrorKind::Parse,
            ShotError::Validation { .. } | ShotError::ReservedContextKey(_) => {
                ErrorKind::Validation
            }
            ShotError::Configuration { .. }
            | ShotError::UnknownConverter { .. }
            | ShotError::DuplicateLabel { .. }
            | ShotError::NoFields
            | ShotError::ConfigParse(_) => ErrorKind::Configuration,
            ShotError::Prompt(_) => ErrorKind::Template,
            ShotError::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Result type alias for shotmaker operations.
pub type Result<T> = std::result::Result<T, ShotError>;
