//! Prompt engine: context validation, prompt rendering and the inverse parse.

use crate::error::{Result, ShotError};
use crate::formatter::{ComponentFormatter, Example};
use shotmaker_pm::{
    EXAMPLE_HEADING, EXAMPLES_SLOT, LayoutEngine, LayoutSlots, LayoutTemplate, QUERY_HEADING,
    QUERY_SLOT, TemplateRef,
};
use std::collections::BTreeMap;

/// Layout variable name → literal value.
pub type Context = BTreeMap<String, String>;

/// Renders few-shot prompts and parses model output with one formatter.
///
/// The engine pairs a [`ComponentFormatter`] with a compiled layout. Both
/// are fixed at construction, so an engine can be shared across threads.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shotmaker_core::{ComponentFormatter, Context, PromptEngine};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = PromptEngine::new(ComponentFormatter::from_fields(["question", "answer"])?)?;
///
/// let context = Context::from([
///     ("system_prompt".to_string(), "You are a tutor.".to_string()),
///     ("task_description".to_string(), "Answer briefly.".to_string()),
/// ]);
/// let shot = json!({"question": "2+2?", "answer": "4"});
/// let query = json!({"question": "3+3?"});
///
/// let prompt = engine.generate_prompt(
///     &context,
///     &[shot.as_object().unwrap().clone()],
///     query.as_object().unwrap(),
/// )?;
/// assert!(prompt.ends_with("## Query\n\nQuestion:\n3+3?"));
///
/// let answer = engine.parse_result("Answer:\n6")?;
/// assert_eq!(answer["answer"], "6");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PromptEngine {
    formatter: ComponentFormatter,
    layout: LayoutTemplate,
}

impl PromptEngine {
    /// Creates an engine that renders with the built-in layout.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Prompt`] if the built-in layout fails to compile.
    pub fn new(formatter: ComponentFormatter) -> Result<Self> {
        Ok(Self::with_layout(formatter, LayoutTemplate::default_layout()?))
    }

    /// Creates an engine that renders with the referenced layout.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::Prompt`] if the layout cannot be read or compiled.
    pub fn with_template(formatter: ComponentFormatter, template: &TemplateRef) -> Result<Self> {
        Ok(Self::with_layout(formatter, LayoutTemplate::from_ref(template)?))
    }

    /// Creates an engine from an already compiled layout.
    pub fn with_layout(formatter: ComponentFormatter, layout: LayoutTemplate) -> Self {
        Self { formatter, layout }
    }

    /// The formatter used for examples, queries and responses.
    pub fn formatter(&self) -> &ComponentFormatter {
        &self.formatter
    }

    /// The compiled layout.
    pub fn layout(&self) -> &LayoutTemplate {
        &self.layout
    }

    /// Where the layout came from.
    pub fn template_ref(&self) -> &TemplateRef {
        self.layout.reference()
    }

    /// Variables the layout reads, including the `examples` and `query` slots.
    pub fn required_variables(&self) -> &[String] {
        self.layout.required_variables()
    }

    /// Checks that `context` supplies every variable the layout reads.
    ///
    /// Extra context keys are allowed. Keys named after the structural slots
    /// are not, since they would shadow the formatted content.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::ReservedContextKey`] for a key named `examples`
    /// or `query`, then [`ShotError::Validation`] listing every missing
    /// variable.
    pub fn validate_context(&self, context: &Context) -> Result<()> {
        if let Some(key) = [EXAMPLES_SLOT, QUERY_SLOT]
            .into_iter()
            .find(|slot| context.contains_key(*slot))
        {
            return Err(ShotError::ReservedContextKey(key.to_string()));
        }

        let missing: Vec<String> = self
            .required_variables()
            .iter()
            .filter(|name| {
                name.as_str() != EXAMPLES_SLOT
                    && name.as_str() != QUERY_SLOT
                    && !context.contains_key(name.as_str())
            })
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ShotError::Validation { missing })
        }
    }

    /// Renders a complete prompt.
    ///
    /// The context is validated before anything is formatted. Output depends
    /// only on the arguments and the engine's configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an incomplete context, a formatting
    /// error when an example or the query cannot be formatted or a value
    /// holds an `## Example N` or `## Query` heading line, and
    /// [`ShotError::Prompt`] if the layout fails to render.
    #[tracing::instrument(skip_all, fields(examples = examples.len()))]
    pub fn generate_prompt(
        &self,
        context: &Context,
        examples: &[Example],
        query: &Example,
    ) -> Result<String> {
        self.validate_context(context)?;

        // Heading lines inside a value would re-segment the prompt on load.
        let blocks = examples
            .iter()
            .map(|example| self.formatter.format_fields(example, true, &is_heading))
            .collect::<Result<Vec<_>>>()?;
        let query = self.formatter.format_fields(query, false, &is_heading)?;

        let slots = LayoutSlots::new(blocks, query).with_context_map(context.clone());
        let prompt = self.layout.render(&slots)?;
        tracing::debug!(bytes = prompt.len(), "rendered prompt");
        Ok(prompt)
    }

    /// Parses a model response into the fields it contains.
    ///
    /// Any subset of declared fields may be present, in declared order.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::NoSections`] when no field label is found and a
    /// parse error when a section cannot be recovered.
    #[tracing::instrument(skip_all, fields(bytes = response.len()))]
    pub fn parse_result(&self, response: &str) -> Result<Example> {
        let fields = self.formatter.parse_fields(response)?;
        if fields.is_empty() {
            return Err(ShotError::NoSections);
        }
        tracing::debug!(fields = fields.len(), "parsed response");
        Ok(fields)
    }

    /// Parses a whole prompt back into its examples and query.
    ///
    /// The prompt is segmented on the `## Example N` and `## Query`
    /// headings. Text before the first heading belongs to the layout and is
    /// ignored; everything after `## Query` is the query. Example segments
    /// are parsed strictly, the query segment leniently.
    ///
    /// Returns the examples in order followed by the query.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::PromptStructure`] when the example numbering does
    /// not run 1..N or no query heading follows, and a parse error when a
    /// segment does not match this engine's formatter.
    #[tracing::instrument(skip_all, fields(bytes = prompt.len()))]
    pub fn load(&self, prompt: &str) -> Result<Vec<Example>> {
        let (examples, query) = split_prompt(prompt)?;

        let mut loaded = examples
            .iter()
            .map(|segment| self.formatter.parse_example(segment))
            .collect::<Result<Vec<_>>>()?;
        loaded.push(self.formatter.parse_fields(&query)?);

        tracing::debug!(examples = loaded.len() - 1, "loaded prompt");
        Ok(loaded)
    }
}

/// Splits a prompt into its example segments and its query segment.
fn split_prompt(prompt: &str) -> Result<(Vec<String>, String)> {
    let mut examples: Vec<Vec<&str>> = Vec::new();
    let mut query: Option<Vec<&str>> = None;

    for line in prompt.lines() {
        if let Some(query) = query.as_mut() {
            query.push(line);
            continue;
        }
        let heading = line.trim_end();
        if heading == QUERY_HEADING {
            query = Some(Vec::new());
        } else if let Some(number) = example_number(heading) {
            let expected = examples.len() + 1;
            if number != expected {
                return Err(ShotError::PromptStructure(format!(
                    "expected `{EXAMPLE_HEADING} {expected}`, found `{heading}`"
                )));
            }
            examples.push(Vec::new());
        } else if let Some(current) = examples.last_mut() {
            current.push(line);
        }
    }

    let Some(query) = query else {
        return Err(ShotError::PromptStructure(format!(
            "no `{QUERY_HEADING}` heading found"
        )));
    };
    Ok((
        examples.iter().map(|lines| lines.join("\n")).collect(),
        query.join("\n"),
    ))
}

/// Whether a line is an example or query heading.
fn is_heading(line: &str) -> bool {
    let line = line.trim_end();
    line == QUERY_HEADING || example_number(line).is_some()
}

/// Returns N for a `## Example N` heading line.
fn example_number(line: &str) -> Option<usize> {
    let digits = line.strip_prefix(EXAMPLE_HEADING)?.strip_prefix(' ')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
