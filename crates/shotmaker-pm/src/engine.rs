//! Core layout engine trait definition.

use crate::error::Result;
use serde::Serialize;

/// Trait for layouts that turn a slot mapping into prompt text.
///
/// Implementations own a compiled template and know which top-level
/// variables it reads, so callers can check their inputs before rendering.
///
/// # Examples
///
/// ```
/// use shotmaker_pm::{LayoutEngine, LayoutSlots, LayoutTemplate};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let layout = LayoutTemplate::from_source("{{ intro }}\n{{ query }}")?;
/// assert_eq!(layout.required_variables(), ["intro", "query"]);
///
/// let slots = LayoutSlots::new(Vec::new(), "Q").with_context("intro", "Hi");
/// assert_eq!(layout.render(&slots)?, "Hi\nQ");
/// # Ok(())
/// # }
/// ```
pub trait LayoutEngine {
    /// Top-level variables the layout reads, sorted and deduplicated.
    ///
    /// Names provided by the template environment itself (such as `range`
    /// or `loop`) are not included.
    fn required_variables(&self) -> &[String];

    /// Renders the layout with the provided slots.
    ///
    /// # Errors
    ///
    /// Returns an error if the slots cannot be serialized or if rendering
    /// fails, including when the layout reads a variable that is missing
    /// from `slots`.
    fn render<T: Serialize>(&self, slots: &T) -> Result<String>;
}
