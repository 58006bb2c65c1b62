//! Shotmaker Core - bidirectional few-shot prompt codec.
//!
//! This crate renders structured examples and a query into one few-shot
//! prompt and recovers structured data from text laid out the same way.
//!
//! # Architecture
//!
//! - [`convert`]: per-field converters between a value and a text fragment
//! - [`formatter`]: whole examples to labeled blocks and back
//! - [`engine`]: context validation, prompt rendering, response and prompt parsing
//! - [`config`]: portable engine configuration (JSON or TOML)
//! - [`splits`]: leave-one-out few-shot splits for offline evaluation
//! - [`error`]: error types and result type alias
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use shotmaker_core::{ComponentFormatter, Context, Converter, PromptEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let formatter = ComponentFormatter::from_fields(["passage", "summary", "entities"])?
//!     .with_converter(
//!         "entities",
//!         Converter::line_template("name (type)", ["name", "type"], 4)?,
//!     )?;
//! let engine = PromptEngine::new(formatter)?;
//!
//! let shot = json!({
//!     "passage": "Example passage 1",
//!     "summary": "Example summary 1",
//!     "entities": [{"name": "Entity1", "type": "Type1"}]
//! });
//! let block = engine.formatter().format_example(shot.as_object().unwrap())?;
//! assert_eq!(
//!     block,
//!     "Passage:\nExample passage 1\n\nSummary:\nExample summary 1\n\nEntities:\n    Entity1 (Type1)"
//! );
//!
//! let context = Context::from([
//!     ("system_prompt".to_string(), "You extract entities.".to_string()),
//!     ("task_description".to_string(), "Summarize the passage.".to_string()),
//! ]);
//! let query = json!({"passage": "Ada Lovelace wrote the first program."});
//! let examples = [shot.as_object().unwrap().clone()];
//! let prompt = engine.generate_prompt(&context, &examples, query.as_object().unwrap())?;
//!
//! let loaded = engine.load(&prompt)?;
//! assert_eq!(loaded.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod splits;

// Re-export core types for convenience
pub use config::{ConverterSpec, EngineConfig, from_representation, to_representation};
pub use convert::{Converter, DataConverter};
pub use engine::{Context, PromptEngine};
pub use error::{ConvertError, ErrorKind, Result, ShotError};
pub use formatter::{ComponentFormatter, Example, label_for};
pub use shotmaker_pm::{LayoutTemplate, TemplateRef};
pub use splits::{FewShotSplits, Split};
