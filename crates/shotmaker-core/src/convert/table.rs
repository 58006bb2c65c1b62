//! Markdown table converter for sequences of flat records.

use super::{DataConverter, records, scalar_text, shape_name};
use crate::error::{ConvertError, ConvertResult};
use serde_json::{Map, Value};

const EXPECTED: &str = "sequence of mappings";
const SEPARATOR_CELL: &str = "-------";

/// Renders a sequence of mappings as one markdown table.
///
/// The header row holds the first item's keys in order; every item must have
/// the same key set and scalar values. `|` and `\` inside cells are escaped
/// with a backslash. An empty sequence renders as empty text.
///
/// Recovered cells are strings with surrounding whitespace trimmed.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shotmaker_core::convert::{DataConverter, MarkdownTableConverter};
///
/// let rows = json!([{"name": "Ada", "role": "engineer"}]);
/// let text = MarkdownTableConverter.render(&rows).unwrap();
/// assert_eq!(text, "| name | role |\n|-------|-------|\n| Ada | engineer |");
/// assert_eq!(MarkdownTableConverter.recover(&text).unwrap(), rows);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkdownTableConverter;

impl MarkdownTableConverter {
    /// Registry name.
    pub const TYPE_NAME: &'static str = "markdown_table";
}

impl DataConverter for MarkdownTableConverter {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn render(&self, value: &Value) -> ConvertResult<String> {
        let rows = records(value, EXPECTED)?;
        let Some(first) = rows.first() else {
            return Ok(String::new());
        };
        if first.is_empty() {
            return Err(ConvertError::Unrepresentable(
                "a table needs at least one column".to_string(),
            ));
        }
        let headers: Vec<&String> = first.keys().collect();

        let mut lines = Vec::with_capacity(rows.len() + 2);
        let header_cells = headers
            .iter()
            .map(|h| escape_cell(h))
            .collect::<ConvertResult<Vec<_>>>()?;
        lines.push(format_row(&header_cells));
        lines.push(format!("|{}|", vec![SEPARATOR_CELL; headers.len()].join("|")));

        for (i, row) in rows.iter().enumerate() {
            if row.len() != headers.len() || !headers.iter().all(|h| row.contains_key(*h)) {
                return Err(ConvertError::Unrepresentable(format!(
                    "row {} has keys {:?}, table header is {:?}",
                    i + 1,
                    row.keys().collect::<Vec<_>>(),
                    headers
                )));
            }
            let cells = headers
                .iter()
                .map(|h| {
                    let cell = &row[*h];
                    let text = scalar_text(cell).ok_or_else(|| {
                        ConvertError::Unrepresentable(format!(
                            "cell `{h}` in row {} is a {}, not a scalar",
                            i + 1,
                            shape_name(cell)
                        ))
                    })?;
                    escape_cell(&text)
                })
                .collect::<ConvertResult<Vec<_>>>()?;
            lines.push(format_row(&cells));
        }

        Ok(lines.join("\n"))
    }

    fn recover(&self, text: &str) -> ConvertResult<Value> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        if lines.len() < 2 {
            return Err(ConvertError::TableShape(
                "table needs a header row and a separator row".to_string(),
            ));
        }

        let headers = split_row(lines[0])?;
        for (i, header) in headers.iter().enumerate() {
            if headers[..i].contains(header) {
                return Err(ConvertError::TableShape(format!(
                    "duplicate column `{header}`"
                )));
            }
        }

        let separator = split_row(lines[1])?;
        let is_separator = separator.len() == headers.len()
            && separator
                .iter()
                .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'));
        if !is_separator {
            return Err(ConvertError::TableShape(format!(
                "expected a separator row with {} columns, found {:?}",
                headers.len(),
                lines[1]
            )));
        }

        let mut items = Vec::with_capacity(lines.len() - 2);
        for line in &lines[2..] {
            let cells = split_row(line)?;
            if cells.len() != headers.len() {
                return Err(ConvertError::TableShape(format!(
                    "row has {} cells, header has {}: {line:?}",
                    cells.len(),
                    headers.len()
                )));
            }
            let item: Map<String, Value> = headers
                .iter()
                .cloned()
                .zip(cells.into_iter().map(Value::String))
                .collect();
            items.push(Value::Object(item));
        }

        Ok(Value::Array(items))
    }
}

fn format_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

fn escape_cell(text: &str) -> ConvertResult<String> {
    if text.contains(['\n', '\r']) {
        return Err(ConvertError::Unrepresentable(format!(
            "table cell contains a line break: {text:?}"
        )));
    }
    Ok(text.replace('\\', "\\\\").replace('|', "\\|"))
}

/// Splits one `| a | b |` row into trimmed, unescaped cells.
fn split_row(line: &str) -> ConvertResult<Vec<String>> {
    let Some(rest) = line.strip_prefix('|') else {
        return Err(ConvertError::TableShape(format!(
            "row does not start with `|`: {line:?}"
        )));
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = rest.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next @ ('|' | '\\')) => current.push(next),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        return Err(ConvertError::TableShape(format!(
            "row does not end with `|`: {line:?}"
        )));
    }
    Ok(cells)
}
