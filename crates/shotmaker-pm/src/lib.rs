//! Layout template crate for shotmaker.
//!
//! This crate owns the template-engine boundary: it compiles the layout that
//! arranges a whole few-shot prompt, reports which variables that layout
//! reads, and renders a slot mapping into text using minijinja.
//!
//! # Examples
//!
//! ```
//! use shotmaker_pm::{LayoutEngine, LayoutSlots, LayoutTemplate};
//!
//! let layout = LayoutTemplate::default_layout()?;
//! let slots = LayoutSlots::new(vec!["Question:\n2+2".to_string()], "Question:\n3+3")
//!     .with_context("system_prompt", "You are a calculator.")
//!     .with_context("task_description", "Answer the question.");
//!
//! let prompt = layout.render(&slots)?;
//! assert!(prompt.contains("## Example 1"));
//! # Ok::<(), shotmaker_pm::PromptError>(())
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod layout;

// Re-export public types for convenience
pub use context::{EXAMPLES_SLOT, LayoutSlots, QUERY_SLOT};
pub use engine::LayoutEngine;
pub use error::{PromptError, Result};
pub use layout::{DEFAULT_LAYOUT, EXAMPLE_HEADING, LayoutTemplate, QUERY_HEADING, TemplateRef};
