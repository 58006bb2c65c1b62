//! Layout template implementation using minijinja.

use crate::{
    engine::LayoutEngine,
    error::{PromptError, Result},
};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name under which the single layout is registered in the environment.
const LAYOUT_NAME: &str = "layout";

/// Names supplied by the template environment rather than by the caller.
const ENVIRONMENT_NAMES: &[&str] = &["range", "dict", "namespace", "debug", "loop"];

/// Built-in layout: labeled system prompt and task sections, each example
/// under a numbered heading, then the query.
pub const DEFAULT_LAYOUT: &str = "## System

{{ system_prompt }}

## Task

{{ task_description }}
{% for example in examples %}
## Example {{ loop.index }}

{{ example }}
{% endfor %}
## Query

{{ query }}
";

/// Heading prefix that opens every example section of a rendered prompt.
pub const EXAMPLE_HEADING: &str = "## Example";

/// Heading that opens the query section of a rendered prompt.
pub const QUERY_HEADING: &str = "## Query";

/// Identifies which layout a prompt engine renders with.
///
/// Serialized as `"default"`, `{ "path": "..." }` or `{ "source": "..." }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRef {
    /// The built-in [`DEFAULT_LAYOUT`].
    #[default]
    Default,

    /// A template file, read once when the layout is built.
    Path(PathBuf),

    /// Inline template source.
    Source(String),
}

/// A compiled layout template.
///
/// `LayoutTemplate` wraps a minijinja environment holding exactly one
/// template. Undefined variables are errors and output is never escaped, so
/// formatted markup and tables reach the prompt verbatim.
///
/// # Examples
///
/// ```
/// use shotmaker_pm::{LayoutEngine, LayoutTemplate};
///
/// # fn main() -> Result<(), shotmaker_pm::PromptError> {
/// let layout = LayoutTemplate::default_layout()?;
/// assert_eq!(
///     layout.required_variables(),
///     ["examples", "query", "system_prompt", "task_description"]
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LayoutTemplate {
    /// Where the layout source came from.
    reference: TemplateRef,
    /// Sorted top-level variables the layout reads.
    required: Vec<String>,
    /// Minijinja environment for template rendering.
    env: Environment<'static>,
}

impl LayoutTemplate {
    /// Builds the built-in layout.
    ///
    /// # Errors
    ///
    /// Only fails if [`DEFAULT_LAYOUT`] itself does not compile.
    pub fn default_layout() -> Result<Self> {
        Self::compile(TemplateRef::Default, DEFAULT_LAYOUT.to_string())
    }

    /// Compiles a layout from inline source.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::TemplateSyntaxError`] if the source does not compile.
    pub fn from_source(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        Self::compile(TemplateRef::Source(source.clone()), source)
    }

    /// Reads and compiles a layout file.
    ///
    /// The file is read once; later edits to it are not observed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not compile.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|source| PromptError::TemplateLoadError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::compile(TemplateRef::Path(path.to_path_buf()), source)
    }

    /// Builds the layout a [`TemplateRef`] points at.
    ///
    /// # Errors
    ///
    /// See [`LayoutTemplate::from_source`] and [`LayoutTemplate::from_path`].
    pub fn from_ref(reference: &TemplateRef) -> Result<Self> {
        match reference {
            TemplateRef::Default => Self::default_layout(),
            TemplateRef::Path(path) => Self::from_path(path),
            TemplateRef::Source(source) => Self::from_source(source.clone()),
        }
    }

    /// The reference this layout was built from.
    pub fn reference(&self) -> &TemplateRef {
        &self.reference
    }

    fn compile(reference: TemplateRef, source: String) -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_template_owned(LAYOUT_NAME, source)
            .map_err(|e| PromptError::TemplateSyntaxError(e.to_string()))?;

        let required = {
            let tmpl = env
                .get_template(LAYOUT_NAME)
                .map_err(|e| PromptError::TemplateSyntaxError(e.to_string()))?;
            let mut names: Vec<String> = tmpl
                .undeclared_variables(false)
                .into_iter()
                .filter(|name| !ENVIRONMENT_NAMES.contains(&name.as_str()))
                .collect();
            names.sort();
            names
        };

        tracing::debug!(?reference, required = ?required, "compiled layout template");
        Ok(Self {
            reference,
            required,
            env,
        })
    }
}

impl LayoutEngine for LayoutTemplate {
    fn required_variables(&self) -> &[String] {
        &self.required
    }

    fn render<T: Serialize>(&self, slots: &T) -> Result<String> {
        let tmpl = self
            .env
            .get_template(LAYOUT_NAME)
            .map_err(|e| PromptError::TemplateRenderError(e.to_string()))?;
        tmpl.render(slots)
            .map_err(|e| PromptError::TemplateRenderError(format!("{LAYOUT_NAME}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutSlots;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_layout_required_variables() {
        let layout = LayoutTemplate::default_layout().expect("built-in layout compiles");
        assert_eq!(
            layout.required_variables(),
            ["examples", "query", "system_prompt", "task_description"]
        );
        assert_eq!(layout.reference(), &TemplateRef::Default);
    }

    #[test]
    fn test_render_default_layout() {
        let layout = LayoutTemplate::default_layout().expect("built-in layout compiles");
        let slots = LayoutSlots::new(vec!["A:\n1".to_string(), "A:\n2".to_string()], "A:\n3")
            .with_context("system_prompt", "Be brief.")
            .with_context("task_description", "Count.");

        let rendered = layout.render(&slots).expect("render should succeed");
        assert_eq!(
            rendered,
            "## System\n\nBe brief.\n\n## Task\n\nCount.\n\n## Example 1\n\nA:\n1\n\n## Example 2\n\nA:\n2\n\n## Query\n\nA:\n3"
        );
    }

    #[test]
    fn test_render_without_examples() {
        let layout = LayoutTemplate::default_layout().expect("built-in layout compiles");
        let slots = LayoutSlots::new(Vec::new(), "A:\n3")
            .with_context("system_prompt", "S")
            .with_context("task_description", "T");

        let rendered = layout.render(&slots).expect("render should succeed");
        assert_eq!(rendered, "## System\n\nS\n\n## Task\n\nT\n\n## Query\n\nA:\n3");
    }

    #[test]
    fn test_render_does_not_escape_markup() {
        let layout = LayoutTemplate::from_source("{{ query }}").expect("valid layout");
        let slots = LayoutSlots::new(Vec::new(), "<root><a>x &amp; y</a></root>");
        assert_eq!(
            layout.render(&slots).expect("render should succeed"),
            "<root><a>x &amp; y</a></root>"
        );
    }

    #[test]
    fn test_render_missing_variable_is_error() {
        let layout = LayoutTemplate::from_source("{{ greeting }} {{ query }}").expect("valid layout");
        let slots = LayoutSlots::new(Vec::new(), "q");
        match layout.render(&slots) {
            Err(PromptError::TemplateRenderError(_)) => {}
            other => panic!("expected TemplateRenderError, got {other:?}"),
        }
    }

    #[test]
    fn test_environment_names_not_required() {
        let layout = LayoutTemplate::from_source(
            "{% for i in range(3) %}{{ loop.index }}{% endfor %}{{ query }}",
        )
        .expect("valid layout");
        assert_eq!(layout.required_variables(), ["query"]);
    }

    #[test]
    fn test_syntax_error() {
        let result = LayoutTemplate::from_source("{% for x in %}");
        match result {
            Err(PromptError::TemplateSyntaxError(_)) => {}
            other => panic!("expected TemplateSyntaxError, got {other:?}"),
        }
    }

    #[test]
    fn test_from_path() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("layout.j2");
        fs::write(&path, "Intro: {{ intro }}\n{{ query }}").expect("failed to write layout");

        let layout = LayoutTemplate::from_path(&path).expect("layout should load");
        assert_eq!(layout.required_variables(), ["intro", "query"]);
        assert_eq!(layout.reference(), &TemplateRef::Path(path));
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = LayoutTemplate::from_path("/nonexistent/layout.j2");
        match result {
            Err(PromptError::TemplateLoadError { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/layout.j2"));
            }
            other => panic!("expected TemplateLoadError, got {other:?}"),
        }
    }

    #[test]
    fn test_from_ref_source() {
        let reference = TemplateRef::Source("{{ query }}".to_string());
        let layout = LayoutTemplate::from_ref(&reference).expect("layout should build");
        assert_eq!(layout.reference(), &reference);
    }
}
