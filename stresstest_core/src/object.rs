//! The configuration object model.

use crate::expr::ConfigExpr;
use crate::generate::{count_from_string, COUNT_MODULUS};
use crate::registry::Registry;
use crate::render::{self, Block, Body};
use std::collections::BTreeMap;
use stresstest_env::{InstanceKey, Value};

/// Version constraint written by every boilerplate object.
pub const BOILERPLATE_REQUIRED_VERSION: &str = ">= 0.15.0";

/// One declarative construct in a module body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigObject {
    Variable(ConfigVariable),
    Output(ConfigOutput),
    ModuleCall(ConfigModuleCall),
    Boilerplate(ConfigBoilerplate),
}

impl ConfigObject {
    /// Appends this object's rendering to a module body.
    pub fn append_to(&self, body: &mut Body) {
        match self {
            ConfigObject::Variable(v) => v.append_to(body),
            ConfigObject::Output(o) => o.append_to(body),
            ConfigObject::ModuleCall(m) => m.append_to(body),
            ConfigObject::Boilerplate(b) => b.append_to(body),
        }
    }
}

/// An input variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigVariable {
    pub name: String,

    /// True if the calling context must supply the value; false if the
    /// declaration carries a default
    pub caller_will_set: bool,

    /// Default value, present exactly when `caller_will_set` is false
    pub default: Option<Value>,
}

impl ConfigVariable {
    fn append_to(&self, body: &mut Body) {
        let mut block = Block::new("variable", &[self.name.as_str()]);
        block.body_mut().set_attribute("type", "string");
        if let Some(default) = &self.default {
            block
                .body_mut()
                .set_attribute("default", render::value_literal(default));
        }
        body.append_block(block);
    }
}

/// An output value declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOutput {
    pub name: String,
    pub value: ConfigExpr,
}

impl ConfigOutput {
    fn append_to(&self, body: &mut Body) {
        let mut block = Block::new("output", &[self.name.as_str()]);
        block.body_mut().set_attribute("value", self.value.build_expr());
        body.append_block(block);
    }
}

/// How many instances a module call has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repetition {
    /// One instance with no key
    Single,

    /// `for_each` over a map; one instance per key
    ForEach(BTreeMap<String, ConfigExpr>),

    /// `count = length(expr) % 3`
    Count(ConfigExpr),
}

/// A call to a nested module, including the called module's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigModuleCall {
    pub name: String,

    /// Module-call path of the called module (caller's path plus `name`)
    pub module_path: Vec<String>,

    /// Argument expressions by child variable name, written in the caller
    pub arguments: BTreeMap<String, ConfigExpr>,

    pub repetition: Repetition,

    /// Objects inside the called module, boilerplate first
    pub objects: Vec<ConfigObject>,
}

impl ConfigModuleCall {
    /// Returns the directory the called module is rendered into.
    pub fn module_dir(&self) -> String {
        self.module_path.join("/")
    }

    /// Returns the outputs declared directly in the called module.
    pub fn outputs(&self) -> impl Iterator<Item = &ConfigOutput> {
        self.objects.iter().filter_map(|obj| match obj {
            ConfigObject::Output(o) => Some(o),
            _ => None,
        })
    }

    /// Returns the instance count for `count` mode, re-derived from the
    /// expected value of the count expression.
    ///
    /// # Panics
    ///
    /// Panics if the count expression doesn't evaluate to a string.
    pub fn count(&self, reg: &Registry) -> Option<usize> {
        match &self.repetition {
            Repetition::Count(expr) => {
                let value = expr.expected_value(reg);
                let s = value
                    .as_str()
                    .unwrap_or_else(|| panic!("count expression produced a {}", value.type_name()));
                Some(count_from_string(s))
            }
            _ => None,
        }
    }

    /// Returns the keys of every instance this call must produce.
    pub fn instance_keys(&self, reg: &Registry) -> Vec<InstanceKey> {
        match &self.repetition {
            Repetition::Single => vec![InstanceKey::NoKey],
            Repetition::ForEach(entries) => entries
                .keys()
                .map(|k| InstanceKey::Str(k.clone()))
                .collect(),
            Repetition::Count(_) => (0..self.count(reg).unwrap_or(0))
                .map(InstanceKey::Int)
                .collect(),
        }
    }

    /// Returns the value `module.<name>` must have in the calling module.
    ///
    /// An object of outputs for a single instance, an object keyed by map
    /// key for `for_each`, or a list for `count`.
    pub fn expected_value(&self, reg: &Registry) -> Value {
        let instance = Value::Object(
            self.outputs()
                .map(|o| (o.name.clone(), o.value.expected_value(reg)))
                .collect(),
        );

        match &self.repetition {
            Repetition::Single => instance,
            Repetition::ForEach(entries) => Value::Object(
                entries
                    .keys()
                    .map(|k| (k.clone(), instance.clone()))
                    .collect(),
            ),
            Repetition::Count(_) => Value::List(vec![instance; self.count(reg).unwrap_or(0)]),
        }
    }

    /// Renders the called module's own file.
    pub fn child_body(&self) -> Body {
        let mut body = Body::new();
        for obj in &self.objects {
            obj.append_to(&mut body);
        }
        body
    }

    fn append_to(&self, body: &mut Body) {
        let mut block = Block::new("module", &[self.name.as_str()]);
        let inner = block.body_mut();

        inner.set_attribute("source", render::string_literal(&format!("./{}", self.name)));

        match &self.repetition {
            Repetition::Single => {}
            Repetition::ForEach(entries) => inner.set_attribute(
                "for_each",
                render::object_constructor(
                    entries.iter().map(|(k, expr)| (k.as_str(), expr.build_expr())),
                ),
            ),
            Repetition::Count(expr) => inner.set_attribute(
                "count",
                format!("length({}) % {}", expr.build_expr(), COUNT_MODULUS),
            ),
        }

        for (name, expr) in &self.arguments {
            inner.set_attribute(name.as_str(), expr.build_expr());
        }

        body.append_block(block);
    }
}

/// Fixed filler present in every module, so even an otherwise empty module
/// is a valid configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigBoilerplate;

impl ConfigBoilerplate {
    fn append_to(&self, body: &mut Body) {
        let mut block = Block::new("terraform", &[]);
        block.body_mut().set_attribute(
            "required_version",
            render::string_literal(BOILERPLATE_REQUIRED_VERSION),
        );
        body.append_block(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Referenceable;
    use stresstest_env::Path;

    fn call_with(repetition: Repetition) -> ConfigModuleCall {
        ConfigModuleCall {
            name: "m".to_string(),
            module_path: vec!["m".to_string()],
            arguments: BTreeMap::new(),
            repetition,
            objects: vec![
                ConfigObject::Boilerplate(ConfigBoilerplate),
                ConfigObject::Output(ConfigOutput {
                    name: "o".to_string(),
                    value: ConfigExpr::constant("v"),
                }),
            ],
        }
    }

    #[test]
    fn test_single_instance_value() {
        let call = call_with(Repetition::Single);
        let reg = Registry::new();

        assert_eq!(call.instance_keys(&reg), vec![InstanceKey::NoKey]);
        assert_eq!(
            Path::new().attr("o").apply(&call.expected_value(&reg)).unwrap(),
            Value::string("v")
        );
    }

    #[test]
    fn test_for_each_value() {
        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), ConfigExpr::constant("1"));
        entries.insert("a".to_string(), ConfigExpr::constant("2"));
        let call = call_with(Repetition::ForEach(entries));
        let reg = Registry::new();

        assert_eq!(
            call.instance_keys(&reg),
            vec![InstanceKey::Str("a".into()), InstanceKey::Str("b".into())]
        );
        let value = call.expected_value(&reg);
        assert_eq!(
            Path::new().key("b").attr("o").apply(&value).unwrap(),
            Value::string("v")
        );
    }

    #[test]
    fn test_count_value_follows_reference() {
        let mut reg = Registry::new();
        reg.register(&[], Referenceable::Variable("n".into()), Value::string("ab"));
        let call = call_with(Repetition::Count(ConfigExpr::reference(
            vec![],
            Referenceable::Variable("n".into()),
            Path::new(),
        )));

        assert_eq!(call.count(&reg), Some(2));
        assert_eq!(call.count(&reg), call.count(&reg));
        assert_eq!(call.instance_keys(&reg), vec![InstanceKey::Int(0), InstanceKey::Int(1)]);
        match call.expected_value(&reg) {
            Value::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {}", other),
        }
    }

    #[test]
    fn test_module_call_rendering() {
        let mut call = call_with(Repetition::Count(ConfigExpr::constant("abcd")));
        call.arguments.insert(
            "x".to_string(),
            ConfigExpr::reference(vec![], Referenceable::Variable("y".into()), Path::new()),
        );

        let mut body = Body::new();
        ConfigObject::ModuleCall(call.clone()).append_to(&mut body);
        assert_eq!(
            body.to_source(),
            "module \"m\" {\n  source = \"./m\"\n  count = length(\"abcd\") % 3\n  x = var.y\n}\n"
        );

        assert_eq!(
            call.child_body().to_source(),
            "terraform {\n  required_version = \">= 0.15.0\"\n}\n\noutput \"o\" {\n  value = \"v\"\n}\n"
        );
    }

    #[test]
    fn test_variable_rendering() {
        let mut body = Body::new();
        ConfigObject::Variable(ConfigVariable {
            name: "a".into(),
            caller_will_set: false,
            default: Some(Value::string("x")),
        })
        .append_to(&mut body);

        assert_eq!(
            body.to_source(),
            "variable \"a\" {\n  type = string\n  default = \"x\"\n}\n"
        );
    }
}
