//! Component formatter: whole examples to labeled text blocks and back.
//!
//! A formatted example is a sequence of sections, one per declared field, in
//! declaration order and separated by a blank line. Each section starts with
//! the field's label line (`Entities:`) followed by the converter output:
//!
//! ```text
//! Passage:
//! Example passage 1
//!
//! Entities:
//!     Entity1 (Type1)
//! ```
//!
//! Parsing segments a block on those label lines. A line only counts as a
//! label when it equals the label of a field that has not been seen yet, so
//! a value may contain the label text of an earlier field.

use crate::convert::{Converter, DataConverter};
use crate::error::{ConvertError, Result, ShotError};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Ordered mapping from field name to field value.
pub type Example = Map<String, Value>;

/// Builds the label line for a field: the name title-cased, then `:`.
///
/// The first letter of every run of letters is upper-cased and the rest
/// lower-cased, so `entities` becomes `Entities:` and `task_description`
/// becomes `Task_Description:`.
///
/// # Examples
///
/// ```
/// use shotmaker_core::formatter::label_for;
///
/// assert_eq!(label_for("summary"), "Summary:");
/// assert_eq!(label_for("entity2type"), "Entity2Type:");
/// ```
pub fn label_for(field: &str) -> String {
    let mut label = String::with_capacity(field.len() + 1);
    let mut in_word = false;
    for ch in field.chars() {
        if ch.is_alphabetic() {
            if in_word {
                label.extend(ch.to_lowercase());
            } else {
                label.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            label.push(ch);
            in_word = false;
        }
    }
    label.push(':');
    label
}

/// Formats examples into labeled blocks and parses them back.
///
/// The converter assignment is fixed at construction. Builder methods
/// consume the formatter and return a new one.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shotmaker_core::{ComponentFormatter, Converter};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let formatter = ComponentFormatter::from_fields(["question", "answer"])?
///     .with_converter("answer", Converter::structured_data())?;
///
/// let example = json!({"question": "Primes below 6?", "answer": [2, 3, 5]});
/// let example = example.as_object().unwrap();
///
/// let block = formatter.format_example(example)?;
/// assert_eq!(&formatter.parse_example(&block)?, example);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentFormatter {
    converters: IndexMap<String, Converter>,
    labels: Vec<String>,
}

impl ComponentFormatter {
    /// Creates a formatter from an ordered field → converter assignment.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::NoFields`] for an empty assignment and
    /// [`ShotError::DuplicateLabel`] when two fields share a label line.
    pub fn new(converters: IndexMap<String, Converter>) -> Result<Self> {
        if converters.is_empty() {
            return Err(ShotError::NoFields);
        }
        let labels: Vec<String> = converters.keys().map(|f| label_for(f)).collect();
        let field = |i: usize| {
            converters
                .get_index(i)
                .map(|(f, _)| f.clone())
                .unwrap_or_default()
        };
        for (i, label) in labels.iter().enumerate() {
            if let Some(j) = labels[..i].iter().position(|l| l == label) {
                return Err(ShotError::DuplicateLabel {
                    first: field(j),
                    second: field(i),
                    label: label.clone(),
                });
            }
        }
        Ok(Self { converters, labels })
    }

    /// Creates a formatter that treats every field as a plain string.
    ///
    /// # Errors
    ///
    /// See [`ComponentFormatter::new`].
    pub fn from_fields<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            fields
                .into_iter()
                .map(|f| (f.into(), Converter::string()))
                .collect(),
        )
    }

    /// Returns a formatter with `field` assigned to `converter`.
    ///
    /// An existing field keeps its position; a new field is appended.
    ///
    /// # Errors
    ///
    /// See [`ComponentFormatter::new`].
    pub fn with_converter(self, field: impl Into<String>, converter: Converter) -> Result<Self> {
        let mut converters = self.converters;
        converters.insert(field.into(), converter);
        Self::new(converters)
    }

    /// Declared field names, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.converters.keys().map(String::as_str)
    }

    /// The field → converter assignment.
    pub fn converters(&self) -> &IndexMap<String, Converter> {
        &self.converters
    }

    /// The converter assigned to a field.
    pub fn converter(&self, field: &str) -> Option<&Converter> {
        self.converters.get(field)
    }

    /// Formats a complete example.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::UndeclaredField`] or [`ShotError::MissingField`]
    /// when the example's field set differs from the declared one, and
    /// [`ShotError::Formatting`] when a converter rejects a value.
    pub fn format_example(&self, example: &Example) -> Result<String> {
        self.format_fields(example, true, &|_| false)
    }

    /// Formats a query: like [`format_example`](Self::format_example), but
    /// withheld (absent) fields are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::UndeclaredField`] for fields the formatter does
    /// not declare and [`ShotError::Formatting`] when a converter rejects a
    /// value.
    pub fn format_query(&self, query: &Example) -> Result<String> {
        self.format_fields(query, false, &|_| false)
    }

    /// Parses a block produced by [`format_example`](Self::format_example).
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::MissingSection`] when a declared field's section
    /// is absent or out of order, [`ShotError::UnexpectedText`] for text
    /// before the first label, and [`ShotError::Parse`] when a converter
    /// cannot recover a section.
    pub fn parse_example(&self, text: &str) -> Result<Example> {
        self.parse_sections(text, true)
    }

    /// Parses a block in which any declared field may be absent.
    ///
    /// Fields that are present must still appear in declared order.
    ///
    /// # Errors
    ///
    /// As [`parse_example`](Self::parse_example), minus missing sections.
    pub fn parse_fields(&self, text: &str) -> Result<Example> {
        self.parse_sections(text, false)
    }

    /// Formats the present fields, rejecting any rendered line that is a
    /// later field's label or that `reserved` claims.
    pub(crate) fn format_fields(
        &self,
        example: &Example,
        require_all: bool,
        reserved: &dyn Fn(&str) -> bool,
    ) -> Result<String> {
        if let Some(field) = example.keys().find(|k| !self.converters.contains_key(*k)) {
            return Err(ShotError::UndeclaredField(field.clone()));
        }

        let mut sections = Vec::with_capacity(self.converters.len());
        for (index, (field, converter)) in self.converters.iter().enumerate() {
            let Some(value) = example.get(field) else {
                if require_all {
                    return Err(ShotError::MissingField(field.clone()));
                }
                continue;
            };
            let formatting = |source| ShotError::Formatting {
                field: field.clone(),
                source,
            };
            let rendered = converter.render(value).map_err(formatting)?;

            // A later label inside this section would end it early on parse.
            let later = &self.labels[index + 1..];
            for line in rendered.lines().map(str::trim_end) {
                if later.iter().any(|x| x == line) {
                    return Err(formatting(ConvertError::Unrepresentable(format!(
                        "value contains the label line {line:?} of a later field"
                    ))));
                }
                if reserved(line) {
                    return Err(formatting(ConvertError::Unrepresentable(format!(
                        "value contains the reserved line {line:?}"
                    ))));
                }
            }
            sections.push(format!("{}\n{rendered}", self.labels[index]));
        }
        Ok(sections.join("\n\n"))
    }

    fn parse_sections(&self, text: &str, require_all: bool) -> Result<Example> {
        let mut sections: Vec<(usize, Vec<&str>)> = Vec::new();
        let mut preamble = Vec::new();
        let mut next = 0;

        for line in text.lines() {
            let candidate = line.trim_end();
            if let Some(offset) = self.labels[next..].iter().position(|l| l == candidate) {
                let index = next + offset;
                if require_all && index != next {
                    return Err(ShotError::MissingSection(self.field_at(next)));
                }
                sections.push((index, Vec::new()));
                next = index + 1;
                continue;
            }
            match sections.last_mut() {
                Some((_, body)) => body.push(line),
                None => preamble.push(line),
            }
        }

        let preamble = preamble.join("\n");
        if !preamble.trim().is_empty() {
            return Err(ShotError::UnexpectedText(preamble.trim().to_string()));
        }
        if require_all && next < self.labels.len() {
            return Err(ShotError::MissingSection(self.field_at(next)));
        }

        let mut example = Example::new();
        for (index, lines) in sections {
            let field = self.field_at(index);
            let segment = section_body(&lines);
            let value = self.converters[index]
                .recover(&segment)
                .map_err(|source| ShotError::Parse {
                    field: field.clone(),
                    segment,
                    source,
                })?;
            example.insert(field, value);
        }
        Ok(example)
    }

    fn field_at(&self, index: usize) -> String {
        self.converters
            .get_index(index)
            .map(|(field, _)| field.clone())
            .unwrap_or_default()
    }
}

/// Joins a section's lines, dropping blank lines at either end.
fn section_body(lines: &[&str]) -> String {
    let is_blank = |line: &&str| line.trim().is_empty();
    let start = lines.iter().position(|l| !is_blank(l)).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !is_blank(l)).map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}
