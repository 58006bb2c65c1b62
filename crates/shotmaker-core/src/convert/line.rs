//! Line template converter: one pattern line per record.

use super::{DataConverter, records, scalar_text, shape_name};
use crate::error::{ConvertError, ConvertResult};
use serde_json::{Map, Value};

const EXPECTED: &str = "sequence of mappings";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(usize),
}

/// Renders each record as one line following a pattern such as `name (type)`.
///
/// The pattern is literal text in which every configured field name appears
/// exactly once as a whole word, so two fields are always separated by
/// literal text. On recovery, a field extends up to the first
/// occurrence of the literal text that follows it in the pattern; a field at
/// the very end of the pattern takes the rest of the line. Each line is
/// prefixed with `indent` spaces.
///
/// Rendering refuses records whose line would not recover to the same
/// values (for example a `name` containing ` (`), so every rendered line is
/// guaranteed to parse back. Recovered values are strings.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shotmaker_core::convert::{DataConverter, LineTemplateConverter};
///
/// let converter = LineTemplateConverter::new("name (type)", ["name", "type"], 4).unwrap();
/// let entities = json!([{"name": "Entity1", "type": "Type1"}]);
///
/// let text = converter.render(&entities).unwrap();
/// assert_eq!(text, "    Entity1 (Type1)");
/// assert_eq!(converter.recover(&text).unwrap(), entities);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTemplateConverter {
    pattern: String,
    fields: Vec<String>,
    indent: usize,
    segments: Vec<Segment>,
}

impl LineTemplateConverter {
    /// Registry name.
    pub const TYPE_NAME: &'static str = "line_template";

    /// Compiles a line pattern over the given fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::InvalidParam`] if there are no fields, a field
    /// name is not a word (`[A-Za-z0-9_]+`) or is repeated, or a field does
    /// not appear exactly once in the pattern as a whole word.
    pub fn new<I, S>(pattern: &str, fields: I, indent: usize) -> ConvertResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(invalid("fields", "at least one field is required"));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.is_empty() || !field.chars().all(is_word_char) {
                return Err(invalid(
                    "fields",
                    format!("`{field}` is not a word of letters, digits and `_`"),
                ));
            }
            if fields[..i].contains(field) {
                return Err(invalid("fields", format!("`{field}` is listed twice")));
            }
        }

        let segments = compile(pattern, &fields)?;
        Ok(Self {
            pattern: pattern.to_string(),
            fields,
            indent,
            segments,
        })
    }

    /// The configured pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The configured fields, in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of spaces before each line.
    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Extracts field values from one unindented line.
    fn match_line(&self, body: &str) -> Option<Vec<String>> {
        let mut values = vec![String::new(); self.fields.len()];
        let mut pos = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    if !body[pos..].starts_with(text.as_str()) {
                        return None;
                    }
                    pos += text.len();
                }
                Segment::Field(index) => {
                    let end = match self.segments.get(i + 1) {
                        Some(Segment::Literal(next)) => pos + body[pos..].find(next.as_str())?,
                        _ => body.len(),
                    };
                    values[*index] = body[pos..end].to_string();
                    pos = end;
                }
            }
        }
        (pos == body.len()).then_some(values)
    }

    fn mismatch(&self, line: &str) -> ConvertError {
        ConvertError::LinePattern {
            pattern: self.pattern.clone(),
            line: line.to_string(),
        }
    }
}

impl DataConverter for LineTemplateConverter {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("pattern".to_string(), Value::String(self.pattern.clone()));
        params.insert(
            "fields".to_string(),
            Value::Array(self.fields.iter().cloned().map(Value::String).collect()),
        );
        params.insert("indent".to_string(), Value::from(self.indent));
        params
    }

    fn render(&self, value: &Value) -> ConvertResult<String> {
        let items = records(value, EXPECTED)?;
        let prefix = " ".repeat(self.indent);
        let mut lines = Vec::with_capacity(items.len());

        for (n, item) in items.iter().enumerate() {
            if let Some(extra) = item.keys().find(|k| !self.fields.contains(k)) {
                return Err(ConvertError::Unrepresentable(format!(
                    "item {} has field `{extra}` which the pattern `{}` does not contain",
                    n + 1,
                    self.pattern
                )));
            }

            let mut values = Vec::with_capacity(self.fields.len());
            for field in &self.fields {
                let cell = item.get(field).ok_or_else(|| {
                    ConvertError::Unrepresentable(format!(
                        "item {} is missing field `{field}`",
                        n + 1
                    ))
                })?;
                let text = scalar_text(cell).ok_or_else(|| {
                    ConvertError::Unrepresentable(format!(
                        "field `{field}` of item {} is a {}, not a scalar",
                        n + 1,
                        shape_name(cell)
                    ))
                })?;
                if text.contains(['\n', '\r']) {
                    return Err(ConvertError::Unrepresentable(format!(
                        "field `{field}` of item {} contains a line break",
                        n + 1
                    )));
                }
                values.push(text);
            }

            let body: String = self
                .segments
                .iter()
                .map(|segment| match segment {
                    Segment::Literal(text) => text.as_str(),
                    Segment::Field(index) => values[*index].as_str(),
                })
                .collect();

            if body.trim().is_empty() || self.match_line(&body).as_ref() != Some(&values) {
                return Err(ConvertError::Unrepresentable(format!(
                    "item {} would not parse back from {body:?}",
                    n + 1
                )));
            }
            lines.push(format!("{prefix}{body}"));
        }

        Ok(lines.join("\n"))
    }

    fn recover(&self, text: &str) -> ConvertResult<Value> {
        let prefix = " ".repeat(self.indent);
        let mut items = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let body = line
                .strip_prefix(prefix.as_str())
                .ok_or_else(|| self.mismatch(line))?;
            let values = self.match_line(body).ok_or_else(|| self.mismatch(line))?;
            let item: Map<String, Value> = self
                .fields
                .iter()
                .cloned()
                .zip(values.into_iter().map(Value::String))
                .collect();
            items.push(Value::Object(item));
        }

        Ok(Value::Array(items))
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn invalid(param: &str, reason: impl Into<String>) -> ConvertError {
    ConvertError::InvalidParam {
        param: param.to_string(),
        reason: reason.into(),
    }
}

/// Splits a pattern into literal and field segments.
fn compile(pattern: &str, fields: &[String]) -> ConvertResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut seen = vec![0usize; fields.len()];
    let mut pos = 0;

    while pos < pattern.len() {
        let rest = &pattern[pos..];
        let at_boundary = !pattern[..pos].chars().next_back().is_some_and(is_word_char);
        let found = at_boundary
            .then(|| {
                fields
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| {
                        rest.starts_with(f.as_str())
                            && !rest[f.len()..].chars().next().is_some_and(is_word_char)
                    })
                    .max_by_key(|(_, f)| f.len())
            })
            .flatten();

        match found {
            Some((index, field)) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(index));
                seen[index] += 1;
                pos += field.len();
            }
            None => {
                let ch = rest.chars().next().unwrap_or_default();
                literal.push(ch);
                pos += ch.len_utf8();
            }
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    for (field, count) in fields.iter().zip(&seen) {
        if *count != 1 {
            return Err(invalid(
                "pattern",
                format!("field `{field}` must appear exactly once, found {count}"),
            ));
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity_converter() -> LineTemplateConverter {
        LineTemplateConverter::new("name (type)", ["name", "type"], 4).unwrap()
    }

    #[test]
    fn test_render_entities() {
        let entities = json!([
            {"name": "Entity1", "type": "Type1"},
            {"name": "Entity2", "type": "Type2"}
        ]);
        let text = entity_converter().render(&entities).unwrap();
        assert_eq!(text, "    Entity1 (Type1)\n    Entity2 (Type2)");
    }

    #[test]
    fn test_round_trip_preserves_order_and_spaces() {
        let converter = entity_converter();
        let entities = json!([
            {"name": "New York City", "type": "Location"},
            {"name": "Ada Lovelace", "type": "Person"},
            {"name": "x", "type": ""}
        ]);
        let text = converter.render(&entities).unwrap();
        assert_eq!(converter.recover(&text).unwrap(), entities);
    }

    #[test]
    fn test_key_order_in_item_does_not_matter() {
        let converter = entity_converter();
        let entities = json!([{"type": "Type1", "name": "Entity1"}]);
        let text = converter.render(&entities).unwrap();
        assert_eq!(converter.recover(&text).unwrap(), entities);
    }

    #[test]
    fn test_pattern_with_leading_literal_and_trailing_field() {
        let converter = LineTemplateConverter::new("- key: value", ["key", "value"], 0).unwrap();
        let items = json!([{"key": "a", "value": "x: y"}]);
        let text = converter.render(&items).unwrap();
        assert_eq!(text, "- a: x: y");
        assert_eq!(converter.recover(&text).unwrap(), items);
    }

    #[test]
    fn test_render_rejects_ambiguous_value() {
        let items = json!([{"name": "A (B)", "type": "C"}]);
        let err = entity_converter().render(&items).unwrap_err();
        assert!(matches!(err, ConvertError::Unrepresentable(_)));
    }

    #[test]
    fn test_render_rejects_missing_and_extra_fields() {
        let converter = entity_converter();
        assert!(converter.render(&json!([{"name": "A"}])).is_err());
        assert!(
            converter
                .render(&json!([{"name": "A", "type": "B", "extra": "C"}]))
                .is_err()
        );
    }

    #[test]
    fn test_render_rejects_scalar_value() {
        let err = entity_converter().render(&json!("Entity1")).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedShape { .. }));
    }

    #[test]
    fn test_recover_reports_offending_line() {
        let text = "    Entity1 (Type1)\n    not an entity";
        match entity_converter().recover(text).unwrap_err() {
            ConvertError::LinePattern { pattern, line } => {
                assert_eq!(pattern, "name (type)");
                assert_eq!(line, "    not an entity");
            }
            other => panic!("expected LinePattern, got {other:?}"),
        }
    }

    #[test]
    fn test_recover_requires_indent() {
        let err = entity_converter().recover("Entity1 (Type1)").unwrap_err();
        assert!(matches!(err, ConvertError::LinePattern { .. }));
    }

    #[test]
    fn test_recover_skips_blank_lines() {
        let recovered = entity_converter()
            .recover("    A (B)\n\n    C (D)\n")
            .unwrap();
        assert_eq!(
            recovered,
            json!([{"name": "A", "type": "B"}, {"name": "C", "type": "D"}])
        );
    }

    #[test]
    fn test_field_names_match_whole_words_only() {
        let converter = LineTemplateConverter::new("named: name", ["name"], 0).unwrap();
        let text = converter.render(&json!([{"name": "x"}])).unwrap();
        assert_eq!(text, "named: x");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(LineTemplateConverter::new("name", Vec::<String>::new(), 0).is_err());
        assert!(LineTemplateConverter::new("name", ["name", "name"], 0).is_err());
        assert!(LineTemplateConverter::new("name (kind)", ["name", "type"], 0).is_err());
        assert!(LineTemplateConverter::new("name name", ["name"], 0).is_err());
        assert!(LineTemplateConverter::new("a_b", ["a", "b"], 0).is_err());
        assert!(LineTemplateConverter::new("name-type", ["name-type"], 0).is_err());
    }

    #[test]
    fn test_fields_inside_braces() {
        let converter = LineTemplateConverter::new("{x}{y}", ["x", "y"], 0).unwrap();
        let items = json!([{"x": "1", "y": "2"}]);
        let text = converter.render(&items).unwrap();
        assert_eq!(text, "{1}{2}");
        assert_eq!(converter.recover(&text).unwrap(), items);
    }

    #[test]
    fn test_params_round_trip() {
        let params = entity_converter().params();
        assert_eq!(params["pattern"], json!("name (type)"));
        assert_eq!(params["fields"], json!(["name", "type"]));
        assert_eq!(params["indent"], json!(4));
    }
}
