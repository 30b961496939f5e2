//! Configuration values and traversal paths into them.

use crate::error::PathError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A fully-known configuration value.
///
/// Generated variables and outputs always hold strings; module calls
/// evaluate to objects (single instance or `for_each`) or lists (`count`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(i64),
    String(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Returns the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(attrs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in attrs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} = {}", k, v)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// Returns true if `s` can be written as a bare identifier.
///
/// Identifiers start with a letter or underscore and continue with letters,
/// digits, underscores or dashes.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// One traversal step into a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathStep {
    /// `.name`
    Attr(String),
    /// `["key"]`
    Key(String),
    /// `[0]`
    Index(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Attr(name) => write!(f, ".{}", name),
            PathStep::Key(key) => write!(f, "[{:?}]", key),
            PathStep::Index(idx) => write!(f, "[{}]", idx),
        }
    }
}

/// A sequence of traversal steps, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path(Vec<PathStep>);

impl Path {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an attribute step.
    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathStep::Attr(name.into()));
        self
    }

    /// Appends a map-key step.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathStep::Key(key.into()));
        self
    }

    /// Appends a list-index step.
    pub fn index(mut self, idx: usize) -> Self {
        self.0.push(PathStep::Index(idx));
        self
    }

    /// Appends an arbitrary step.
    pub fn push(&mut self, step: PathStep) {
        self.0.push(step);
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the path can be written as traversal syntax without
    /// quoting attribute names.
    ///
    /// Keys are written quoted (`["k"]`) but are still restricted to
    /// identifiers so no escaping is ever involved.
    pub fn is_representable(&self) -> bool {
        self.0.iter().all(|step| match step {
            PathStep::Attr(name) => is_identifier(name),
            PathStep::Key(key) => is_identifier(key),
            PathStep::Index(_) => true,
        })
    }

    /// Projects `value` through this path.
    pub fn apply(&self, value: &Value) -> Result<Value, PathError> {
        let mut current = value;
        for step in &self.0 {
            current = match (step, current) {
                (PathStep::Attr(name), Value::Object(attrs)) => attrs
                    .get(name)
                    .ok_or_else(|| PathError::NoSuchAttribute(name.clone()))?,
                (PathStep::Key(key), Value::Object(attrs)) => attrs
                    .get(key)
                    .ok_or_else(|| PathError::NoSuchKey(key.clone()))?,
                (PathStep::Index(index), Value::List(items)) => {
                    items.get(*index).ok_or(PathError::IndexOutOfRange {
                        index: *index,
                        len: items.len(),
                    })?
                }
                (step, other) => {
                    return Err(PathError::Unsupported {
                        step: step.to_string(),
                        type_name: other.type_name(),
                    })
                }
            };
        }
        Ok(current.clone())
    }
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_value() -> Value {
        let mut outputs = BTreeMap::new();
        outputs.insert("out".to_string(), Value::string("hello"));
        let instance = Value::Object(outputs);

        let mut by_key = BTreeMap::new();
        by_key.insert("a".to_string(), instance.clone());
        by_key.insert("b".to_string(), instance);
        Value::Object(by_key)
    }

    #[test]
    fn test_empty_path_is_identity() {
        let value = module_value();
        assert_eq!(Path::new().apply(&value).unwrap(), value);
    }

    #[test]
    fn test_path_projects_key_then_attr() {
        let path = Path::new().key("a").attr("out");
        assert_eq!(path.apply(&module_value()).unwrap(), Value::string("hello"));
        assert_eq!(path.to_string(), "[\"a\"].out");
    }

    #[test]
    fn test_path_index_into_list() {
        let list = Value::List(vec![Value::string("x"), Value::string("y")]);

        assert_eq!(Path::new().index(1).apply(&list).unwrap(), Value::string("y"));
        assert_eq!(
            Path::new().index(2).apply(&list),
            Err(PathError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_path_errors() {
        let value = module_value();

        assert_eq!(
            Path::new().key("zz").apply(&value),
            Err(PathError::NoSuchKey("zz".to_string()))
        );
        assert!(matches!(
            Path::new().index(0).apply(&value),
            Err(PathError::Unsupported { type_name: "object", .. })
        ));
        assert!(matches!(
            Path::new().attr("x").apply(&Value::string("s")),
            Err(PathError::Unsupported { type_name: "string", .. })
        ));
    }

    #[test]
    fn test_representable_paths() {
        assert!(Path::new().attr("out").key("k1").index(3).is_representable());
        assert!(!Path::new().attr("with space").is_representable());
        assert!(!Path::new().key("9lives").is_representable());
        assert!(!Path::new().key("").is_representable());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("a"));
        assert!(is_identifier("_x-1"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier("a.b"));
    }

    #[test]
    fn test_value_display() {
        let value = Value::List(vec![Value::string("a"), Value::Number(2), Value::Null]);
        assert_eq!(value.to_string(), "[\"a\", 2, null]");
    }
}
