//! Minimal writer for the block/attribute configuration syntax.
//!
//! Only what the generator produces is supported: blocks with string
//! labels, attributes with pre-rendered expressions, and literal values.

use stresstest_env::{is_identifier, Value};

/// An ordered sequence of attributes and nested blocks.
#[derive(Debug, Clone, Default)]
pub struct Body {
    items: Vec<Item>,
}

#[derive(Debug, Clone)]
enum Item {
    Attribute { name: String, expr: String },
    Block(Block),
}

/// A `type "label" ... { body }` block.
#[derive(Debug, Clone)]
pub struct Block {
    kind: String,
    labels: Vec<String>,
    body: Body,
}

impl Block {
    pub fn new(kind: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            kind: kind.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            body: Body::new(),
        }
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `name = expr`, where `expr` is already rendered source.
    pub fn set_attribute(&mut self, name: impl Into<String>, expr: impl Into<String>) {
        self.items.push(Item::Attribute {
            name: name.into(),
            expr: expr.into(),
        });
    }

    pub fn append_block(&mut self, block: Block) {
        self.items.push(Item::Block(block));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renders the body as a complete file.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, 0);
        out
    }

    fn write(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        let mut prev_was_block = false;

        for (i, item) in self.items.iter().enumerate() {
            match item {
                Item::Attribute { name, expr } => {
                    if prev_was_block {
                        out.push('\n');
                    }
                    out.push_str(&format!("{}{} = {}\n", pad, name, expr));
                    prev_was_block = false;
                }
                Item::Block(block) => {
                    // Top-level blocks are separated by a blank line
                    if i > 0 {
                        out.push('\n');
                    }
                    out.push_str(&pad);
                    out.push_str(&block.kind);
                    for label in &block.labels {
                        out.push(' ');
                        out.push_str(&string_literal(label));
                    }
                    if block.body.is_empty() {
                        out.push_str(" {}\n");
                    } else {
                        out.push_str(" {\n");
                        block.body.write(out, indent + 1);
                        out.push_str(&pad);
                        out.push_str("}\n");
                    }
                    prev_was_block = true;
                }
            }
        }
    }
}

/// Renders a quoted string literal.
///
/// Template sequences are escaped (`${` → `$${`, `%{` → `%%{`) so the
/// literal never starts an interpolation.
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');

    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }

    out.push('"');
    out
}

/// Renders a fully-known value as a literal expression.
pub fn value_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(s),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(value_literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(attrs) => {
            object_constructor(attrs.iter().map(|(k, v)| (k.as_str(), value_literal(v))))
        }
    }
}

/// Renders `{ key = expr, ... }` from pre-rendered element expressions.
///
/// Keys that aren't identifiers are written as quoted strings.
pub fn object_constructor<'a>(entries: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let parts: Vec<String> = entries
        .into_iter()
        .map(|(key, expr)| {
            if is_identifier(key) {
                format!("{} = {}", key, expr)
            } else {
                format!("{} = {}", string_literal(key), expr)
            }
        })
        .collect();

    if parts.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("plain"), "\"plain\"");
        assert_eq!(string_literal("a\\b\"c"), "\"a\\\\b\\\"c\"");
        assert_eq!(string_literal("${x}"), "\"$${x}\"");
        assert_eq!(string_literal("%{x}"), "\"%%{x}\"");
        assert_eq!(string_literal("$${"), "\"$$${\"");
        assert_eq!(string_literal("100% $"), "\"100% $\"");
    }

    #[test]
    fn test_value_literal() {
        let mut attrs = BTreeMap::new();
        attrs.insert("b".to_string(), Value::Number(1));
        attrs.insert("a".to_string(), Value::List(vec![Value::Bool(true), Value::Null]));

        assert_eq!(value_literal(&Value::Object(attrs)), "{ a = [true, null], b = 1 }");
        assert_eq!(value_literal(&Value::Object(BTreeMap::new())), "{}");
    }

    #[test]
    fn test_body_rendering() {
        let mut file = Body::new();

        let mut var = Block::new("variable", &["a"]);
        var.body_mut().set_attribute("type", "string");
        file.append_block(var);

        file.append_block(Block::new("terraform", &[]));

        let mut out = Block::new("output", &["b"]);
        out.body_mut().set_attribute("value", "var.a");
        file.append_block(out);

        assert_eq!(
            file.to_source(),
            "variable \"a\" {\n  type = string\n}\n\nterraform {}\n\noutput \"b\" {\n  value = var.a\n}\n"
        );
    }
}
