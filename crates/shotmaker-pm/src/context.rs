//! Slot mapping handed to the layout template.

use serde::Serialize;
use std::collections::BTreeMap;

/// Name of the structural slot holding the formatted examples.
pub const EXAMPLES_SLOT: &str = "examples";

/// Name of the structural slot holding the formatted query.
pub const QUERY_SLOT: &str = "query";

/// Values supplied to a layout when rendering a prompt.
///
/// Context entries are flattened into the top level of the template
/// namespace, next to the two structural slots `examples` and `query`.
///
/// # Examples
///
/// ```
/// use shotmaker_pm::LayoutSlots;
///
/// let slots = LayoutSlots::new(vec!["Passage:\nfirst".to_string()], "Passage:\nsecond")
///     .with_context("system_prompt", "You are terse.");
/// assert_eq!(slots.examples.len(), 1);
/// assert_eq!(slots.context["system_prompt"], "You are terse.");
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutSlots {
    /// Literal context values, keyed by template variable name.
    #[serde(flatten)]
    pub context: BTreeMap<String, String>,

    /// Formatted example blocks, in presentation order.
    pub examples: Vec<String>,

    /// Formatted query block.
    pub query: String,
}

impl LayoutSlots {
    /// Creates slots for the given formatted examples and query with an empty context.
    #[must_use]
    pub fn new(examples: Vec<String>, query: impl Into<String>) -> Self {
        Self {
            context: BTreeMap::new(),
            examples,
            query: query.into(),
        }
    }

    /// Adds one context value.
    #[must_use]
    pub fn with_context(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }

    /// Replaces the whole context mapping.
    #[must_use]
    pub fn with_context_map(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = context;
        self
    }
}
