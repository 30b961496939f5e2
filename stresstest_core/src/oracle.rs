//! State oracle: what a correct engine must have produced.
//!
//! The oracle never evaluates configuration source. It walks the generated
//! object tree, expands every module call into its instances and looks up
//! each output's expected value in the step's [`Registry`].

use crate::object::ConfigObject;
use crate::registry::Registry;
use std::collections::BTreeMap;
use stresstest_env::{AbsOutputAddr, ModuleInstancePath, State, Value};
use thiserror::Error;

/// One discrepancy between the realized and the expected state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// An output the configuration declares has no value in the new state
    #[error("{addr}: missing output, expected {expected}")]
    MissingOutput { addr: AbsOutputAddr, expected: Value },

    /// An output has a value other than the one the configuration implies
    #[error("{addr}: expected {expected}, got {actual}")]
    IncorrectOutput {
        addr: AbsOutputAddr,
        expected: Value,
        actual: Value,
    },

    /// The new state has an output the configuration doesn't declare
    #[error("{addr}: unexpected output{}", carried_over_suffix(*carried_over))]
    UnexpectedOutput {
        addr: AbsOutputAddr,
        /// True if the output existed in the prior state and wasn't removed
        carried_over: bool,
    },
}

fn carried_over_suffix(carried_over: bool) -> &'static str {
    if carried_over {
        " (left over from the prior state)"
    } else {
        ""
    }
}

impl StateError {
    /// Returns the output instance the error is about.
    pub fn addr(&self) -> &AbsOutputAddr {
        match self {
            StateError::MissingOutput { addr, .. }
            | StateError::IncorrectOutput { addr, .. }
            | StateError::UnexpectedOutput { addr, .. } => addr,
        }
    }
}

/// Returns the expected value of every output instance declared by
/// `objects` (a root module body) and everything nested below it.
pub fn expected_outputs(objects: &[ConfigObject], reg: &Registry) -> BTreeMap<AbsOutputAddr, Value> {
    let mut out = BTreeMap::new();
    collect_outputs(objects, reg, &ModuleInstancePath::root(), &mut out);
    out
}

fn collect_outputs(
    objects: &[ConfigObject],
    reg: &Registry,
    instance: &ModuleInstancePath,
    out: &mut BTreeMap<AbsOutputAddr, Value>,
) {
    for obj in objects {
        match obj {
            ConfigObject::Output(o) => {
                out.insert(
                    AbsOutputAddr::new(instance.clone(), o.name.clone()),
                    o.value.expected_value(reg),
                );
            }
            ConfigObject::ModuleCall(call) => {
                // Instances of one call share a body and argument values
                for key in call.instance_keys(reg) {
                    let child = instance.child(call.name.clone(), key);
                    collect_outputs(&call.objects, reg, &child, out);
                }
            }
            ConfigObject::Variable(_) | ConfigObject::Boilerplate(_) => {}
        }
    }
}

/// Compares the state an engine produced for a step against expectations.
///
/// Reports every missing, incorrect and unexpected output instance, in
/// address order. `prior` is only used to tell stale leftovers apart from
/// outputs that were invented outright. An empty result means the state
/// is correct.
pub fn check_new_state(
    objects: &[ConfigObject],
    reg: &Registry,
    prior: &State,
    new: &State,
) -> Vec<StateError> {
    let expected = expected_outputs(objects, reg);
    let mut errors = Vec::new();

    for (addr, want) in &expected {
        match new.output(addr) {
            None => errors.push(StateError::MissingOutput {
                addr: addr.clone(),
                expected: want.clone(),
            }),
            Some(got) if got != want => errors.push(StateError::IncorrectOutput {
                addr: addr.clone(),
                expected: want.clone(),
                actual: got.clone(),
            }),
            Some(_) => {}
        }
    }

    for (addr, _) in new.outputs() {
        if !expected.contains_key(addr) {
            errors.push(StateError::UnexpectedOutput {
                addr: addr.clone(),
                carried_over: prior.contains(addr),
            });
        }
    }

    errors.sort_by(|a, b| a.addr().cmp(b.addr()));
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ConfigExpr, Referenceable};
    use crate::object::{
        ConfigBoilerplate, ConfigModuleCall, ConfigOutput, ConfigVariable, Repetition,
    };
    use stresstest_env::{InstanceKey, Path};

    /// `variable "a" { default = "x" }` plus `output "b" { value = var.a }`.
    fn fixture() -> (Vec<ConfigObject>, Registry) {
        let mut reg = Registry::new();
        reg.register(&[], Referenceable::Variable("a".into()), Value::string("x"));

        let objects = vec![
            ConfigObject::Boilerplate(ConfigBoilerplate),
            ConfigObject::Variable(ConfigVariable {
                name: "a".into(),
                caller_will_set: false,
                default: Some(Value::string("x")),
            }),
            ConfigObject::Output(ConfigOutput {
                name: "b".into(),
                value: ConfigExpr::reference(
                    vec![],
                    Referenceable::Variable("a".into()),
                    Path::new(),
                ),
            }),
        ];
        (objects, reg)
    }

    #[test]
    fn test_correct_state_has_no_errors() {
        let (objects, reg) = fixture();
        let mut new = State::new();
        new.set_output(AbsOutputAddr::root("b"), Value::string("x"));

        assert!(check_new_state(&objects, &reg, &State::new(), &new).is_empty());
    }

    #[test]
    fn test_incorrect_output_is_reported() {
        let (objects, reg) = fixture();
        let mut new = State::new();
        new.set_output(AbsOutputAddr::root("b"), Value::string("y"));

        let errors = check_new_state(&objects, &reg, &State::new(), &new);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            StateError::IncorrectOutput {
                addr: AbsOutputAddr::root("b"),
                expected: Value::string("x"),
                actual: Value::string("y"),
            }
        );
        assert!(errors[0].to_string().contains("output.b"));
    }

    #[test]
    fn test_missing_output_is_reported() {
        let (objects, reg) = fixture();

        let errors = check_new_state(&objects, &reg, &State::new(), &State::new());
        assert_eq!(
            errors,
            vec![StateError::MissingOutput {
                addr: AbsOutputAddr::root("b"),
                expected: Value::string("x"),
            }]
        );
    }

    #[test]
    fn test_unexpected_output_is_reported() {
        let (objects, reg) = fixture();
        let stale = AbsOutputAddr::root("old");
        let invented = AbsOutputAddr::root("zzz");

        let mut prior = State::new();
        prior.set_output(stale.clone(), Value::string("1"));

        let mut new = State::new();
        new.set_output(AbsOutputAddr::root("b"), Value::string("x"));
        new.set_output(stale.clone(), Value::string("1"));
        new.set_output(invented.clone(), Value::string("2"));

        let errors = check_new_state(&objects, &reg, &prior, &new);
        assert_eq!(
            errors,
            vec![
                StateError::UnexpectedOutput {
                    addr: stale,
                    carried_over: true,
                },
                StateError::UnexpectedOutput {
                    addr: invented,
                    carried_over: false,
                },
            ]
        );
        assert!(errors[0].to_string().contains("prior state"));
    }

    #[test]
    fn test_nested_instances_are_expanded() {
        let mut reg = Registry::new();
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("k1".to_string(), ConfigExpr::constant("p"));
        entries.insert("k2".to_string(), ConfigExpr::constant("q"));

        let inner = ConfigModuleCall {
            name: "inner".into(),
            module_path: vec!["outer".into(), "inner".into()],
            arguments: BTreeMap::new(),
            repetition: Repetition::Count(ConfigExpr::constant("ab")),
            objects: vec![
                ConfigObject::Boilerplate(ConfigBoilerplate),
                ConfigObject::Output(ConfigOutput {
                    name: "o".into(),
                    value: ConfigExpr::constant("v"),
                }),
            ],
        };
        let value = inner.expected_value(&reg);
        reg.register(&["outer".to_string()], Referenceable::ModuleCall("inner".into()), value);

        let outer = ConfigModuleCall {
            name: "outer".into(),
            module_path: vec!["outer".into()],
            arguments: BTreeMap::new(),
            repetition: Repetition::ForEach(entries),
            objects: vec![ConfigObject::Boilerplate(ConfigBoilerplate), ConfigObject::ModuleCall(inner)],
        };

        let expected = expected_outputs(&[ConfigObject::ModuleCall(outer)], &reg);
        assert_eq!(expected.len(), 4);

        let addr = AbsOutputAddr::new(
            ModuleInstancePath::root()
                .child("outer", InstanceKey::Str("k2".into()))
                .child("inner", InstanceKey::Int(1)),
            "o",
        );
        assert_eq!(expected.get(&addr), Some(&Value::string("v")));
        assert_eq!(addr.to_string(), "module.outer[\"k2\"].module.inner[1].output.o");
    }
}
