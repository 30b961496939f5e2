//! Random generators for configuration objects.
//!
//! Generators never return errors: they either produce a valid object or
//! panic, because an invalid object would mean a bug in the generator
//! itself rather than in the engine under test.

use crate::config::GeneratorConfig;
use crate::expr::{ConfigExpr, Referenceable};
use crate::namespace::{generate_string, Namespace};
use crate::object::{
    ConfigBoilerplate, ConfigModuleCall, ConfigObject, ConfigOutput, ConfigVariable, Repetition,
};
use crate::registry::Registry;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::collections::BTreeMap;
use stresstest_env::Value;

/// Modulus applied when coercing a string to a `count` value.
pub const COUNT_MODULUS: usize = 3;

/// Picks an index with probability proportional to its weight.
///
/// Zero-weight entries are never chosen.
///
/// # Panics
///
/// Panics if every weight is zero (or the slice is empty), since that means
/// the caller left nothing to choose.
pub fn decide_index<R: Rng + ?Sized>(rng: &mut R, weights: &[u32]) -> usize {
    let dist = WeightedIndex::<u32>::new(weights)
        .unwrap_or_else(|err| panic!("invalid weights {:?}: {}", weights, err));
    dist.sample(rng)
}

/// Derives an instance count from a string value.
///
/// Mirrors the rendered `length(expr) % 3`: the number of characters modulo
/// [`COUNT_MODULUS`]. Pure, so the oracle can replay it from the expected
/// value alone.
pub fn count_from_string(s: &str) -> usize {
    s.chars().count() % COUNT_MODULUS
}

/// Generates a single configuration object, choosing its kind at random.
///
/// Module calls get less likely the deeper `ns` is nested and stop entirely
/// from depth 3 on.
pub fn generate_config_object<R: Rng + ?Sized>(
    rng: &mut R,
    ns: &mut Namespace,
    reg: &mut Registry,
    cfg: &GeneratorConfig,
) -> ConfigObject {
    const CHOOSE_VARIABLE: usize = 0;
    const CHOOSE_OUTPUT: usize = 1;
    const CHOOSE_MODULE: usize = 2;

    let module_adj = ns.depth().max(1) as u32;

    match decide_index(rng, &[3, 3, 2 / module_adj]) {
        CHOOSE_VARIABLE => ConfigObject::Variable(generate_config_variable(rng, ns, reg, cfg)),
        CHOOSE_OUTPUT => ConfigObject::Output(generate_config_output(rng, ns, cfg)),
        CHOOSE_MODULE => ConfigObject::ModuleCall(generate_config_module_call(rng, ns, reg, cfg)),
        _ => panic!("invalid object decision"),
    }
}

/// Generates a variable declaration.
///
/// Variables with a default are registered and become referenceable
/// immediately. A caller-set variable stays invisible to later expressions
/// until whoever supplies its value calls [`register_caller_set_variable`].
pub fn generate_config_variable<R: Rng + ?Sized>(
    rng: &mut R,
    ns: &mut Namespace,
    reg: &mut Registry,
    cfg: &GeneratorConfig,
) -> ConfigVariable {
    let name = ns.generate_short_name(rng);
    let caller_will_set = rng.gen_bool(0.5);

    let default = if caller_will_set {
        None
    } else {
        let value = Value::String(generate_string(rng, cfg.max_string_len));
        reg.register(
            ns.module_path(),
            Referenceable::Variable(name.clone()),
            value.clone(),
        );
        ns.declare_variable(&name);
        Some(value)
    };

    ConfigVariable {
        name,
        caller_will_set,
        default,
    }
}

/// Records the value supplied for a caller-set variable and makes the
/// variable referenceable at its level.
pub fn register_caller_set_variable(
    ns: &mut Namespace,
    reg: &mut Registry,
    var: &ConfigVariable,
    value: Value,
) {
    reg.register(
        ns.module_path(),
        Referenceable::Variable(var.name.clone()),
        value,
    );
    ns.declare_variable(&var.name);
}

/// Generates an output whose value is a random expression.
pub fn generate_config_output<R: Rng + ?Sized>(
    rng: &mut R,
    ns: &mut Namespace,
    cfg: &GeneratorConfig,
) -> ConfigOutput {
    let name = ns.generate_short_name(rng);
    let value = ns.generate_expression(rng, cfg.max_string_len);
    ConfigOutput { name, value }
}

/// Generates a module call together with the whole called module.
///
/// Repetition arguments are built from ordinary string expressions so they
/// can still depend on other objects:
/// - `for_each` is a map of generated keys whose values are expressions
/// - `count` is `length(expr) % 3` over a string expression
///
/// Arguments for caller-set child variables are generated in the parent
/// namespace, since they are evaluated in the calling module.
pub fn generate_config_module_call<R: Rng + ?Sized>(
    rng: &mut R,
    parent_ns: &mut Namespace,
    reg: &mut Registry,
    cfg: &GeneratorConfig,
) -> ConfigModuleCall {
    let name = parent_ns.generate_short_name(rng);
    let mut child_ns = parent_ns.child_namespace(&name);

    let repetition = match decide_index(rng, &[2, 1, 1]) {
        0 => Repetition::Single,
        1 => {
            let key_count = rng.gen_range(0..=cfg.max_for_each_keys);
            let mut key_ns = Namespace::root();
            let mut entries = BTreeMap::new();
            for _ in 0..key_count {
                let key = key_ns.generate_short_name(rng);
                entries.insert(key, parent_ns.generate_expression(rng, cfg.max_string_len));
            }
            Repetition::ForEach(entries)
        }
        2 => Repetition::Count(parent_ns.generate_expression(rng, cfg.max_string_len)),
        _ => panic!("invalid repetition decision"),
    };

    let obj_count = rng.gen_range(0..=cfg.max_child_objects);
    let mut objects = Vec::with_capacity(obj_count + 1);
    let mut arguments: BTreeMap<String, ConfigExpr> = BTreeMap::new();

    // Every called module carries exactly one boilerplate object
    objects.push(ConfigObject::Boilerplate(ConfigBoilerplate));

    for _ in 0..obj_count {
        let obj = generate_config_object(rng, &mut child_ns, reg, cfg);

        if let ConfigObject::Variable(var) = &obj {
            if var.caller_will_set {
                let expr = parent_ns.generate_expression(rng, cfg.max_string_len);
                let value = expr.expected_value(reg);
                register_caller_set_variable(&mut child_ns, reg, var, value);
                arguments.insert(var.name.clone(), expr);
            }
        }

        objects.push(obj);
    }

    let call = ConfigModuleCall {
        name,
        module_path: child_ns.module_path().to_vec(),
        arguments,
        repetition,
        objects,
    };

    // The call itself becomes referenceable from the parent
    let value = call.expected_value(reg);
    reg.register(
        parent_ns.module_path(),
        Referenceable::ModuleCall(call.name.clone()),
        value,
    );
    for key in call.instance_keys(reg) {
        for output in call.outputs() {
            parent_ns.declare_module_output(&call.name, &key, &output.name);
        }
    }

    call
}
