//! Error types for the layout template crate.

use std::path::PathBuf;

/// Errors that can occur while loading or rendering a layout template.
#[derive(thiserror::Error, Debug)]
pub enum PromptError {
    /// The layout source could not be compiled by the template engine.
    #[error("template syntax error: {0}")]
    TemplateSyntaxError(String),

    /// Error occurred while rendering a layout.
    #[error("template render error: {0}")]
    TemplateRenderError(String),

    /// Failed to read a layout template from the filesystem.
    #[error("template load error: {path}")]
    TemplateLoadError {
        /// Path to the template that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for layout template operations.
pub type Result<T> = std::result::Result<T, PromptError>;
