//! Expressions that can appear in generated configuration.
//!
//! Since the goal is testing graph building and graph walks rather than
//! expression evaluation, only the kinds of expression that contribute to
//! the graph shape are modeled: constants and references.

use crate::registry::Registry;
use crate::render;
use serde::{Deserialize, Serialize};
use std::fmt;
use stresstest_env::{is_identifier, Path, Value};

/// An object that a reference expression can point at, scoped to one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Referenceable {
    /// `var.<name>`
    Variable(String),
    /// `module.<name>`
    ModuleCall(String),
}

impl Referenceable {
    pub fn name(&self) -> &str {
        match self {
            Referenceable::Variable(name) | Referenceable::ModuleCall(name) => name,
        }
    }
}

impl fmt::Display for Referenceable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referenceable::Variable(name) => write!(f, "var.{}", name),
            Referenceable::ModuleCall(name) => write!(f, "module.{}", name),
        }
    }
}

/// A reference to an object elsewhere in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigExprRef {
    /// Module-call path of the module the reference is written in
    pub module: Vec<String>,

    /// The object being referenced
    pub target: Referenceable,

    /// Extra traversal steps into the object, possibly empty
    pub path: Path,
}

/// A generated expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigExpr {
    /// A static, fully-known value
    Const(Value),
    /// A reference to another object, optionally with a path into it
    Ref(ConfigExprRef),
}

impl ConfigExpr {
    /// Creates a constant expression.
    pub fn constant(value: impl Into<Value>) -> Self {
        ConfigExpr::Const(value.into())
    }

    /// Creates a reference expression written in module `module`.
    pub fn reference(module: Vec<String>, target: Referenceable, path: Path) -> Self {
        ConfigExpr::Ref(ConfigExprRef {
            module,
            target,
            path,
        })
    }

    /// Renders the expression as configuration source.
    ///
    /// # Panics
    ///
    /// Panics if a reference uses a path outside the representable subset
    /// (quoted attribute names, non-identifier keys). The generator never
    /// produces such paths, so hitting this is a generator bug.
    pub fn build_expr(&self) -> String {
        match self {
            ConfigExpr::Const(value) => render::value_literal(value),
            ConfigExpr::Ref(r) => {
                if !is_identifier(r.target.name()) || !r.path.is_representable() {
                    panic!("generated an unrepresentable reference {}{}", r.target, r.path);
                }
                format!("{}{}", r.target, r.path)
            }
        }
    }

    /// Returns the value this expression must produce if the engine behaves
    /// correctly.
    ///
    /// This is always a fully-known value, never a placeholder.
    pub fn expected_value(&self, reg: &Registry) -> Value {
        match self {
            ConfigExpr::Const(value) => value.clone(),
            ConfigExpr::Ref(r) => reg.ref_value(&r.module, &r.target, &r.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_const_ignores_registry() {
        let expr = ConfigExpr::constant("hello");

        assert_eq!(expr.expected_value(&Registry::new()), Value::string("hello"));

        let mut reg = Registry::new();
        reg.register(&[], Referenceable::Variable("hello".into()), Value::string("nope"));
        assert_eq!(expr.expected_value(&reg), Value::string("hello"));
    }

    #[test]
    fn test_ref_resolves_through_registry() {
        let mut reg = Registry::new();
        reg.register(&[], Referenceable::Variable("a".into()), Value::string("x"));

        let expr = ConfigExpr::reference(vec![], Referenceable::Variable("a".into()), Path::new());
        assert_eq!(expr.expected_value(&reg), Value::string("x"));
        assert_eq!(expr.build_expr(), "var.a");
    }

    #[test]
    fn test_ref_with_path() {
        let mut instance = BTreeMap::new();
        instance.insert("o".to_string(), Value::string("v"));
        let mut reg = Registry::new();
        reg.register(
            &["m".to_string()],
            Referenceable::ModuleCall("c".into()),
            Value::List(vec![Value::Object(instance)]),
        );

        let expr = ConfigExpr::reference(
            vec!["m".to_string()],
            Referenceable::ModuleCall("c".into()),
            Path::new().index(0).attr("o"),
        );
        assert_eq!(expr.expected_value(&reg), Value::string("v"));
        assert_eq!(expr.build_expr(), "module.c[0].o");
    }

    #[test]
    fn test_build_const_escapes() {
        assert_eq!(ConfigExpr::constant("a\"b").build_expr(), "\"a\\\"b\"");
        assert_eq!(ConfigExpr::constant("${x}").build_expr(), "\"$${x}\"");
    }

    #[test]
    #[should_panic(expected = "unrepresentable reference")]
    fn test_build_rejects_unrepresentable_path() {
        let expr = ConfigExpr::reference(
            vec![],
            Referenceable::ModuleCall("c".into()),
            Path::new().attr("not valid"),
        );
        expr.build_expr();
    }
}
