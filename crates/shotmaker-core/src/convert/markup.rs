//! Structured markup converter: an XML-style element tree.
//!
//! The dialect is deliberately small. Mapping keys become element names,
//! sequence entries become `item` elements, and anything that is not a
//! string carries a `type` attribute so recovery is exact:
//!
//! ```text
//! <root type="list">
//!   <item>
//!     <name>Ada</name>
//!     <age type="number">36</age>
//!   </item>
//! </root>
//! ```
//!
//! Attribute values other than `type`, processing instructions other than a
//! leading `<?xml ...?>` declaration, and namespaces are not supported.

use super::{DataConverter, shape_name};
use crate::error::{ConvertError, ConvertResult};
use serde_json::{Map, Number, Value};

const INDENT: &str = "  ";

/// Deepest element nesting accepted in either direction.
const MAX_DEPTH: usize = 128;

/// Renders a mapping or sequence as a markup fragment and parses it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredMarkupConverter {
    root: String,
    item: String,
}

impl Default for StructuredMarkupConverter {
    fn default() -> Self {
        Self {
            root: "root".to_string(),
            item: "item".to_string(),
        }
    }
}

impl StructuredMarkupConverter {
    /// Registry name.
    pub const TYPE_NAME: &'static str = "structured_markup";

    /// Creates a converter with custom root and sequence-item element names.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::InvalidParam`] if either name is not a valid
    /// element name.
    pub fn new(root: impl Into<String>, item: impl Into<String>) -> ConvertResult<Self> {
        let root = root.into();
        let item = item.into();
        for (param, name) in [("root", &root), ("item", &item)] {
            if !is_valid_name(name) {
                return Err(ConvertError::InvalidParam {
                    param: param.to_string(),
                    reason: format!("`{name}` is not a valid element name"),
                });
            }
        }
        Ok(Self { root, item })
    }

    /// Name of the outermost element.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Name of the elements wrapping sequence entries.
    pub fn item(&self) -> &str {
        &self.item
    }

    fn write_element(
        &self,
        lines: &mut Vec<String>,
        name: &str,
        value: &Value,
        depth: usize,
    ) -> ConvertResult<()> {
        if depth >= MAX_DEPTH {
            return Err(ConvertError::Unrepresentable(format!(
                "value is nested deeper than {MAX_DEPTH} elements"
            )));
        }
        let pad = INDENT.repeat(depth);
        match value {
            Value::String(s) => lines.push(format!("{pad}<{name}>{}</{name}>", escape(s))),
            Value::Number(n) => lines.push(format!("{pad}<{name} type=\"number\">{n}</{name}>")),
            Value::Bool(b) => lines.push(format!("{pad}<{name} type=\"boolean\">{b}</{name}>")),
            Value::Null => lines.push(format!("{pad}<{name} type=\"null\"/>")),
            Value::Object(map) if map.is_empty() => {
                lines.push(format!("{pad}<{name} type=\"map\"/>"));
            }
            Value::Object(map) => {
                lines.push(format!("{pad}<{name}>"));
                for (key, child) in map {
                    if !is_valid_name(key) {
                        return Err(ConvertError::Unrepresentable(format!(
                            "key `{key}` is not a valid element name"
                        )));
                    }
                    self.write_element(lines, key, child, depth + 1)?;
                }
                lines.push(format!("{pad}</{name}>"));
            }
            Value::Array(items) if items.is_empty() => {
                lines.push(format!("{pad}<{name} type=\"list\"/>"));
            }
            Value::Array(items) => {
                lines.push(format!("{pad}<{name} type=\"list\">"));
                for child in items {
                    self.write_element(lines, &self.item, child, depth + 1)?;
                }
                lines.push(format!("{pad}</{name}>"));
            }
        }
        Ok(())
    }
}

impl DataConverter for StructuredMarkupConverter {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("root".to_string(), Value::String(self.root.clone()));
        params.insert("item".to_string(), Value::String(self.item.clone()));
        params
    }

    fn render(&self, value: &Value) -> ConvertResult<String> {
        if !matches!(value, Value::Object(_) | Value::Array(_)) {
            return Err(ConvertError::UnsupportedShape {
                expected: "mapping or sequence",
                found: shape_name(value),
            });
        }
        let mut lines = Vec::new();
        self.write_element(&mut lines, &self.root, value, 0)?;
        Ok(lines.join("\n"))
    }

    fn recover(&self, text: &str) -> ConvertResult<Value> {
        let mut parser = Parser {
            src: text.trim(),
            pos: 0,
            item: &self.item,
            depth: 0,
        };

        if parser.eat("<?xml") {
            let end = parser
                .rest()
                .find("?>")
                .ok_or_else(|| parser.error("unterminated declaration"))?;
            parser.pos += end + 2;
        }
        parser.skip_ws();
        let (name, value) = parser.element()?;
        parser.skip_ws();
        if !parser.rest().is_empty() {
            return Err(parser.error("unexpected content after the root element"));
        }
        if name != self.root {
            return Err(ConvertError::Markup {
                position: 0,
                reason: format!("expected root element `{}`, found `{name}`", self.root),
            });
        }
        match value {
            Value::Object(_) | Value::Array(_) => Ok(value),
            other => Err(ConvertError::Markup {
                position: 0,
                reason: format!(
                    "root element must hold a mapping or sequence, found a {}",
                    shape_name(&other)
                ),
            }),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    item: &'a str,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, reason: impl Into<String>) -> ConvertError {
        ConvertError::Markup {
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> ConvertResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{token}`")))
        }
    }

    fn name(&mut self) -> ConvertResult<&'a str> {
        let rest = self.rest();
        let len = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
        let name = &rest[..len];
        if !is_valid_name(name) {
            return Err(self.error("expected an element or attribute name"));
        }
        self.pos += len;
        Ok(name)
    }

    fn quoted(&mut self) -> ConvertResult<String> {
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted attribute value")),
        };
        self.pos += 1;
        let end = self
            .rest()
            .find(quote)
            .ok_or_else(|| self.error("unterminated attribute value"))?;
        let value = decode(&self.rest()[..end], self.pos)?;
        self.pos += end + 1;
        Ok(value)
    }

    fn element(&mut self) -> ConvertResult<(String, Value)> {
        let start = self.pos;
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("elements nested deeper than {MAX_DEPTH}")));
        }
        self.depth += 1;
        self.expect("<")?;
        let name = self.name()?.to_string();

        let mut kind: Option<String> = None;
        let self_closing = loop {
            self.skip_ws();
            if self.eat("/>") {
                break true;
            }
            if self.eat(">") {
                break false;
            }
            let attr = self.name()?;
            self.skip_ws();
            self.expect("=")?;
            self.skip_ws();
            let value = self.quoted()?;
            if attr != "type" {
                return Err(self.error(format!("unexpected attribute `{attr}` on `{name}`")));
            }
            if kind.replace(value).is_some() {
                return Err(self.error(format!("duplicate `type` attribute on `{name}`")));
            }
        };

        let mut text = String::new();
        let mut children = Vec::new();
        if !self_closing {
            loop {
                let next = self
                    .rest()
                    .find('<')
                    .ok_or_else(|| self.error(format!("element `{name}` is never closed")))?;
                text.push_str(&decode(&self.rest()[..next], self.pos)?);
                self.pos += next;

                if self.eat("</") {
                    let close = self.name()?;
                    if close != name {
                        return Err(self.error(format!(
                            "closing tag `{close}` does not match `{name}`"
                        )));
                    }
                    self.skip_ws();
                    self.expect(">")?;
                    break;
                }
                if self.eat("<!--") {
                    let end = self
                        .rest()
                        .find("-->")
                        .ok_or_else(|| self.error("unterminated comment"))?;
                    self.pos += end + 3;
                    continue;
                }
                children.push(self.element()?);
            }
        }

        let value = self.build(&name, kind.as_deref(), text, children, start)?;
        self.depth -= 1;
        Ok((name, value))
    }

    fn build(
        &self,
        name: &str,
        kind: Option<&str>,
        text: String,
        children: Vec<(String, Value)>,
        start: usize,
    ) -> ConvertResult<Value> {
        let fail = |reason: String| ConvertError::Markup {
            position: start,
            reason,
        };
        let leaf_only = |children: &[(String, Value)]| {
            if children.is_empty() {
                Ok(())
            } else {
                Err(fail(format!("`{name}` cannot have child elements")))
            }
        };
        let no_text = |text: &str| {
            if text.trim().is_empty() {
                Ok(())
            } else {
                Err(fail(format!("`{name}` mixes text and child elements")))
            }
        };

        match kind {
            None if children.is_empty() => Ok(Value::String(text)),
            None | Some("map") => {
                no_text(&text)?;
                let mut map = Map::new();
                for (key, value) in children {
                    if map.contains_key(&key) {
                        return Err(fail(format!("`{name}` repeats the key `{key}`")));
                    }
                    map.insert(key, value);
                }
                Ok(Value::Object(map))
            }
            Some("list") => {
                no_text(&text)?;
                children
                    .into_iter()
                    .map(|(child, value)| {
                        if child == self.item {
                            Ok(value)
                        } else {
                            Err(fail(format!(
                                "list `{name}` contains `{child}`, expected `{}`",
                                self.item
                            )))
                        }
                    })
                    .collect::<ConvertResult<Vec<_>>>()
                    .map(Value::Array)
            }
            Some("number") => {
                leaf_only(&children)?;
                serde_json::from_str::<Number>(&text)
                    .map(Value::Number)
                    .map_err(|_| fail(format!("`{name}` holds an invalid number {text:?}")))
            }
            Some("boolean") => {
                leaf_only(&children)?;
                match text.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(fail(format!("`{name}` holds an invalid boolean {text:?}"))),
                }
            }
            Some("null") => {
                leaf_only(&children)?;
                if text.is_empty() {
                    Ok(Value::Null)
                } else {
                    Err(fail(format!("null element `{name}` has content")))
                }
            }
            Some(other) => Err(fail(format!("unknown type `{other}` on `{name}`"))),
        }
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(is_name_char)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
    out
}

fn decode(raw: &str, position: usize) -> ConvertResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let bad = |reason: String| ConvertError::Markup { position, reason };
        let semi = after
            .find(';')
            .ok_or_else(|| bad("unterminated entity reference".to_string()))?;
        let entity = &after[..semi];
        let ch = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| bad(format!("unknown entity `&{entity};`")))?
            }
        };
        out.push(ch);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(value: Value) {
        let converter = StructuredMarkupConverter::default();
        let text = converter.render(&value).unwrap();
        assert_eq!(converter.recover(&text).unwrap(), value, "markup was:\n{text}");
    }

    #[test]
    fn test_render_sequence_of_records() {
        let value = json!([{"name": "Entity1", "type": "Type1"}]);
        let text = StructuredMarkupConverter::default().render(&value).unwrap();
        assert_eq!(
            text,
            "<root type=\"list\">\n  <item>\n    <name>Entity1</name>\n    <type>Type1</type>\n  </item>\n</root>"
        );
    }

    #[test]
    fn test_round_trip_mapping_with_typed_leaves() {
        round_trip(json!({
            "title": "Report",
            "pages": 12,
            "ratio": 0.75,
            "draft": false,
            "editor": null,
            "tags": ["a", "b"],
            "meta": {},
            "empty_list": []
        }));
    }

    #[test]
    fn test_round_trip_nested_sequences() {
        round_trip(json!([[1, 2], [], [{"item": "not a list entry"}]]));
    }

    #[test]
    fn test_round_trip_escaped_text() {
        round_trip(json!({"expr": "a < b && c > d", "multi": "line one\nline two\r\n", "pad": "  x  "}));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let depth = 200_000;
        let text = format!("<root>{}x{}</root>", "<a>".repeat(depth), "</a>".repeat(depth));
        let err = StructuredMarkupConverter::default().recover(&text).unwrap_err();
        match err {
            ConvertError::Markup { reason, .. } => assert!(reason.contains("nested deeper")),
            other => panic!("expected Markup error, got {other:?}"),
        }
    }

    #[test]
    fn test_nesting_limit_applies_to_render() {
        let converter = StructuredMarkupConverter::default();
        let mut value = json!("leaf");
        for _ in 0..MAX_DEPTH {
            value = json!({"a": value});
        }
        assert!(matches!(
            converter.render(&value).unwrap_err(),
            ConvertError::Unrepresentable(_)
        ));

        let mut value = json!("leaf");
        for _ in 0..MAX_DEPTH - 1 {
            value = json!({"a": value});
        }
        round_trip(value);
    }

    #[test]
    fn test_round_trip_empty_string() {
        round_trip(json!({"blank": ""}));
    }

    #[test]
    fn test_render_rejects_scalar_and_bad_keys() {
        let converter = StructuredMarkupConverter::default();
        assert!(matches!(
            converter.render(&json!("text")).unwrap_err(),
            ConvertError::UnsupportedShape { .. }
        ));
        assert!(matches!(
            converter.render(&json!({"has space": 1})).unwrap_err(),
            ConvertError::Unrepresentable(_)
        ));
    }

    #[test]
    fn test_recover_accepts_declaration_and_single_quotes() {
        let converter = StructuredMarkupConverter::default();
        let text = "<?xml version=\"1.0\"?>\n<root type='list'><item><n type='number'>1</n></item></root>";
        assert_eq!(converter.recover(text).unwrap(), json!([{"n": 1}]));
    }

    #[test]
    fn test_recover_rejects_malformed_markup() {
        let converter = StructuredMarkupConverter::default();
        for text in [
            "<root><a>1</b></root>",
            "<root><a>1</a>",
            "<root><a>1</a></root> trailing",
            "<other><a>1</a></other>",
            "<root>just text</root>",
            "<root><a type=\"number\">one</a></root>",
            "<root><a type=\"mystery\">x</a></root>",
            "<root><a>x</a><a>y</a></root>",
            "<root>text<a>x</a></root>",
            "<root><a>&bogus;</a></root>",
        ] {
            let err = converter.recover(text).unwrap_err();
            assert!(matches!(err, ConvertError::Markup { .. }), "{text}: {err:?}");
        }
    }

    #[test]
    fn test_custom_element_names() {
        let converter = StructuredMarkupConverter::new("entities", "entity").unwrap();
        let value = json!([{"name": "A"}]);
        let text = converter.render(&value).unwrap();
        assert!(text.starts_with("<entities type=\"list\">"));
        assert!(text.contains("<entity>"));
        assert_eq!(converter.recover(&text).unwrap(), value);
    }

    #[test]
    fn test_invalid_element_names() {
        assert!(StructuredMarkupConverter::new("1root", "item").is_err());
        assert!(StructuredMarkupConverter::new("root", "").is_err());
    }
}
