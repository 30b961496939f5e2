//! Reference engine for the generated configuration subset.
//!
//! `ModelEngine` plays the part of a real engine in self-tests: it parses
//! every module of a snapshot, wires module calls to their directories and
//! evaluates outputs lazily. Each `(module instance, object)` pair is
//! evaluated at most once; re-entering one that is still being evaluated
//! is a dependency cycle.

use crate::parser::{self, Body, Expr, Traverser};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use stresstest_env::{
    resolve_source, AbsOutputAddr, ConfigSnapshot, Engine, EngineError, InputValues,
    InstanceKey, ModuleInstancePath, Path, PathStep, State, Value,
};
use tracing::debug;

/// Evaluates snapshots directly, with no planning or persistence.
///
/// The prior state is ignored: every apply recomputes the full state from
/// the configuration alone, so outputs that disappear from the
/// configuration disappear from the state too.
#[derive(Debug, Default)]
pub struct ModelEngine {
    applies: u64,
}

impl ModelEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful applies so far.
    pub fn applies(&self) -> u64 {
        self.applies
    }
}

impl Engine for ModelEngine {
    fn apply(
        &mut self,
        snapshot: &ConfigSnapshot,
        variables: &InputValues,
        _prior: &State,
    ) -> Result<State, EngineError> {
        let modules = load_modules(snapshot)?;
        check_root_inputs(&modules, variables)?;

        let mut eval = Evaluator {
            modules: &modules,
            inputs: variables,
            memo: HashMap::new(),
            visiting: HashSet::new(),
        };
        let mut state = State::new();
        eval.collect(&ModuleInstancePath::root(), &mut state)?;

        self.applies += 1;
        debug!(
            "model engine: {} modules, {} outputs, {} evaluations",
            modules.len(),
            state.len(),
            eval.memo.len()
        );
        Ok(state)
    }

    fn name(&self) -> &str {
        "model"
    }
}

#[derive(Debug)]
struct ModuleDecl {
    variables: BTreeMap<String, Option<Expr>>,
    outputs: BTreeMap<String, Expr>,
    calls: BTreeMap<String, CallDecl>,
}

#[derive(Debug)]
struct CallDecl {
    /// Snapshot directory of the called module
    dir: String,
    repetition: CallRepetition,
    arguments: BTreeMap<String, Expr>,
}

#[derive(Debug)]
enum CallRepetition {
    Single,
    ForEach(Expr),
    Count(Expr),
}

fn dir_label(dir: &str) -> String {
    if dir.is_empty() {
        "root".to_string()
    } else {
        dir.to_string()
    }
}

fn instance_label(inst: &ModuleInstancePath) -> String {
    if inst.is_root() {
        "root".to_string()
    } else {
        inst.to_string()
    }
}

/// Parses the root module and everything reachable from it.
fn load_modules(snapshot: &ConfigSnapshot) -> Result<BTreeMap<String, ModuleDecl>, EngineError> {
    let mut modules = BTreeMap::new();
    let mut pending = vec![ConfigSnapshot::ROOT.to_string()];

    while let Some(dir) = pending.pop() {
        if modules.contains_key(&dir) {
            continue;
        }
        let src = snapshot
            .module(&dir)
            .ok_or_else(|| EngineError::MissingModule(dir_label(&dir)))?;
        let body = parser::parse(src).map_err(|err| EngineError::Parse {
            module: dir_label(&dir),
            line: err.line,
            message: err.message,
        })?;

        let decl = decode_module(&dir, &body)?;
        pending.extend(decl.calls.values().map(|call| call.dir.clone()));
        modules.insert(dir, decl);
    }

    // Arguments must line up with the called module's variables
    for (dir, decl) in &modules {
        for (name, call) in &decl.calls {
            let child = &modules[&call.dir];
            for arg in call.arguments.keys() {
                if !child.variables.contains_key(arg) {
                    return Err(EngineError::UnsupportedArgument {
                        module: format!("{} (module.{})", dir_label(dir), name),
                        name: arg.clone(),
                    });
                }
            }
            for (var, default) in &child.variables {
                if default.is_none() && !call.arguments.contains_key(var) {
                    return Err(EngineError::MissingVariable {
                        module: dir_label(&call.dir),
                        name: var.clone(),
                    });
                }
            }
        }
    }

    Ok(modules)
}

fn check_root_inputs(
    modules: &BTreeMap<String, ModuleDecl>,
    inputs: &InputValues,
) -> Result<(), EngineError> {
    let root = &modules[ConfigSnapshot::ROOT];

    for name in inputs.keys() {
        if !root.variables.contains_key(name) {
            return Err(EngineError::UnsupportedArgument {
                module: dir_label(ConfigSnapshot::ROOT),
                name: name.clone(),
            });
        }
    }
    for (name, default) in &root.variables {
        if default.is_none() && !inputs.contains_key(name) {
            return Err(EngineError::MissingVariable {
                module: dir_label(ConfigSnapshot::ROOT),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

fn single_label<'a>(dir: &str, kind: &str, labels: &'a [String]) -> Result<&'a str, EngineError> {
    match labels {
        [label] => Ok(label),
        _ => Err(EngineError::evaluation(format!(
            "{} block in module {} needs exactly one label",
            kind,
            dir_label(dir)
        ))),
    }
}

fn decode_module(dir: &str, body: &Body) -> Result<ModuleDecl, EngineError> {
    if let Some(attr) = body.attributes.values().next() {
        return Err(EngineError::evaluation(format!(
            "unexpected top-level attribute {:?} in module {} at line {}",
            attr.name,
            dir_label(dir),
            attr.line
        )));
    }

    let mut decl = ModuleDecl {
        variables: BTreeMap::new(),
        outputs: BTreeMap::new(),
        calls: BTreeMap::new(),
    };
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for block in &body.blocks {
        if block.kind == "terraform" {
            continue;
        }

        let name = single_label(dir, &block.kind, &block.labels)?;
        if !seen.insert((block.kind.as_str(), name)) {
            return Err(EngineError::evaluation(format!(
                "duplicate {} {:?} in module {}",
                block.kind,
                name,
                dir_label(dir)
            )));
        }
        let attrs = &block.body.attributes;

        match block.kind.as_str() {
            "variable" => {
                for attr in attrs.keys() {
                    if !matches!(attr.as_str(), "type" | "default" | "description") {
                        return Err(EngineError::UnsupportedArgument {
                            module: dir_label(dir),
                            name: format!("variable.{}.{}", name, attr),
                        });
                    }
                }
                let default = attrs.get("default").map(|a| a.expr.clone());
                decl.variables.insert(name.to_string(), default);
            }
            "output" => {
                let value = attrs.get("value").ok_or_else(|| {
                    EngineError::evaluation(format!(
                        "output {:?} in module {} has no value",
                        name,
                        dir_label(dir)
                    ))
                })?;
                decl.outputs.insert(name.to_string(), value.expr.clone());
            }
            "module" => {
                decl.calls
                    .insert(name.to_string(), decode_call(dir, name, &block.body)?);
            }
            other => {
                return Err(EngineError::evaluation(format!(
                    "unsupported block type {:?} in module {}",
                    other,
                    dir_label(dir)
                )))
            }
        }
    }

    Ok(decl)
}

fn decode_call(dir: &str, name: &str, body: &Body) -> Result<CallDecl, EngineError> {
    let source = match body.attributes.get("source").map(|a| &a.expr) {
        Some(Expr::Literal(Value::String(s))) => s,
        _ => {
            return Err(EngineError::evaluation(format!(
                "module.{} in module {} needs a literal source",
                name,
                dir_label(dir)
            )))
        }
    };
    let child_dir = resolve_source(dir, source)
        .ok_or_else(|| EngineError::MissingModule(source.clone()))?;

    let for_each = body.attributes.get("for_each").map(|a| a.expr.clone());
    let count = body.attributes.get("count").map(|a| a.expr.clone());
    let repetition = match (for_each, count) {
        (None, None) => CallRepetition::Single,
        (Some(expr), None) => CallRepetition::ForEach(expr),
        (None, Some(expr)) => CallRepetition::Count(expr),
        (Some(_), Some(_)) => {
            return Err(EngineError::evaluation(format!(
                "module.{} sets both for_each and count",
                name
            )))
        }
    };

    let arguments = body
        .attributes
        .iter()
        .filter(|(arg, _)| !matches!(arg.as_str(), "source" | "for_each" | "count"))
        .map(|(arg, attr)| (arg.clone(), attr.expr.clone()))
        .collect();

    Ok(CallDecl {
        dir: child_dir,
        repetition,
        arguments,
    })
}

/// An addressable object within one module instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Variable(String),
    Output(String),
    ModuleCall(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Variable(name) => write!(f, "var.{}", name),
            Node::Output(name) => write!(f, "output.{}", name),
            Node::ModuleCall(name) => write!(f, "module.{}", name),
        }
    }
}

struct Evaluator<'a> {
    modules: &'a BTreeMap<String, ModuleDecl>,
    inputs: &'a InputValues,
    memo: HashMap<(ModuleInstancePath, Node), Value>,
    visiting: HashSet<(ModuleInstancePath, Node)>,
}

impl<'a> Evaluator<'a> {
    fn module_at(&self, inst: &ModuleInstancePath) -> Result<&'a ModuleDecl, EngineError> {
        let modules = self.modules;
        let mut decl = &modules[ConfigSnapshot::ROOT];
        for step in inst.steps() {
            let call = decl.calls.get(&step.call).ok_or_else(|| {
                EngineError::MissingModule(format!("module.{}", step.call))
            })?;
            decl = modules
                .get(&call.dir)
                .ok_or_else(|| EngineError::MissingModule(dir_label(&call.dir)))?;
        }
        Ok(decl)
    }

    fn unknown(inst: &ModuleInstancePath, reference: impl fmt::Display) -> EngineError {
        EngineError::UnknownReference {
            module: instance_label(inst),
            reference: reference.to_string(),
        }
    }

    /// Records every output of `inst` and of all instances below it.
    fn collect(&mut self, inst: &ModuleInstancePath, state: &mut State) -> Result<(), EngineError> {
        let decl = self.module_at(inst)?;

        for name in decl.variables.keys() {
            self.eval_node(inst, &Node::Variable(name.clone()))?;
        }
        for name in decl.outputs.keys() {
            let value = self.eval_node(inst, &Node::Output(name.clone()))?;
            state.set_output(AbsOutputAddr::new(inst.clone(), name.clone()), value);
        }
        for (name, call) in &decl.calls {
            self.eval_node(inst, &Node::ModuleCall(name.clone()))?;
            for key in self.instance_keys(inst, call)? {
                self.collect(&inst.child(name.clone(), key), state)?;
            }
        }
        Ok(())
    }

    fn eval_node(&mut self, inst: &ModuleInstancePath, node: &Node) -> Result<Value, EngineError> {
        let key = (inst.clone(), node.clone());
        if let Some(value) = self.memo.get(&key) {
            return Ok(value.clone());
        }
        if !self.visiting.insert(key.clone()) {
            return Err(EngineError::Cycle {
                module: instance_label(inst),
                reference: node.to_string(),
            });
        }

        let result = self.compute_node(inst, node);
        self.visiting.remove(&key);

        let value = result?;
        self.memo.insert(key, value.clone());
        Ok(value)
    }

    fn compute_node(&mut self, inst: &ModuleInstancePath, node: &Node) -> Result<Value, EngineError> {
        let decl = self.module_at(inst)?;

        match node {
            Node::Variable(name) => {
                let default = decl
                    .variables
                    .get(name)
                    .ok_or_else(|| Self::unknown(inst, node))?;

                match inst.split_last() {
                    None => {
                        if let Some(value) = self.inputs.get(name) {
                            return Ok(value.clone());
                        }
                    }
                    Some((parent, step)) => {
                        let parent_decl = self.module_at(&parent)?;
                        let call = &parent_decl.calls[&step.call];
                        if let Some(arg) = call.arguments.get(name) {
                            return self.eval_expr(&parent, arg);
                        }
                    }
                }

                match default {
                    Some(expr) => self.eval_expr(inst, expr),
                    None => Err(EngineError::MissingVariable {
                        module: instance_label(inst),
                        name: name.clone(),
                    }),
                }
            }
            Node::Output(name) => {
                let expr = decl.outputs.get(name).ok_or_else(|| Self::unknown(inst, node))?;
                self.eval_expr(inst, expr)
            }
            Node::ModuleCall(name) => {
                let call = decl.calls.get(name).ok_or_else(|| Self::unknown(inst, node))?;
                let modules = self.modules;
                let child_decl = modules
                    .get(&call.dir)
                    .ok_or_else(|| EngineError::MissingModule(dir_label(&call.dir)))?;

                let mut instances = Vec::new();
                for key in self.instance_keys(inst, call)? {
                    let child = inst.child(name.clone(), key.clone());
                    let mut attrs = BTreeMap::new();
                    for output in child_decl.outputs.keys() {
                        let value = self.eval_node(&child, &Node::Output(output.clone()))?;
                        attrs.insert(output.clone(), value);
                    }
                    instances.push((key, Value::Object(attrs)));
                }

                Ok(match call.repetition {
                    CallRepetition::Single => instances
                        .pop()
                        .map(|(_, value)| value)
                        .unwrap_or_else(|| Value::Object(BTreeMap::new())),
                    CallRepetition::ForEach(_) => Value::Object(
                        instances
                            .into_iter()
                            .filter_map(|(key, value)| match key {
                                InstanceKey::Str(k) => Some((k, value)),
                                _ => None,
                            })
                            .collect(),
                    ),
                    CallRepetition::Count(_) => {
                        Value::List(instances.into_iter().map(|(_, value)| value).collect())
                    }
                })
            }
        }
    }

    fn instance_keys(
        &mut self,
        inst: &ModuleInstancePath,
        call: &CallDecl,
    ) -> Result<Vec<InstanceKey>, EngineError> {
        match &call.repetition {
            CallRepetition::Single => Ok(vec![InstanceKey::NoKey]),
            CallRepetition::ForEach(expr) => match self.eval_expr(inst, expr)? {
                Value::Object(map) => Ok(map.into_keys().map(InstanceKey::Str).collect()),
                other => Err(EngineError::evaluation(format!(
                    "for_each in {} must be a map, got {}",
                    instance_label(inst),
                    other.type_name()
                ))),
            },
            CallRepetition::Count(expr) => match self.eval_expr(inst, expr)? {
                Value::Number(n) if n >= 0 => Ok((0..n as usize).map(InstanceKey::Int).collect()),
                other => Err(EngineError::evaluation(format!(
                    "count in {} must be a non-negative number, got {}",
                    instance_label(inst),
                    other
                ))),
            },
        }
    }

    fn eval_expr(&mut self, inst: &ModuleInstancePath, expr: &Expr) -> Result<Value, EngineError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Scope(name) => Err(Self::unknown(inst, name)),
            Expr::Traversal(base, steps) => {
                let (value, rest) = match base.as_ref() {
                    Expr::Scope(scope) => {
                        let (first, rest) = steps
                            .split_first()
                            .ok_or_else(|| Self::unknown(inst, scope))?;
                        let node = match (scope.as_str(), first) {
                            ("var", Traverser::Attr(name)) => Node::Variable(name.clone()),
                            ("module", Traverser::Attr(name)) => Node::ModuleCall(name.clone()),
                            _ => return Err(Self::unknown(inst, scope)),
                        };
                        (self.eval_node(inst, &node)?, rest)
                    }
                    other => (self.eval_expr(inst, other)?, steps.as_slice()),
                };
                self.traverse(inst, &value, rest)
            }
            Expr::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| self.eval_expr(inst, arg))
                    .collect::<Result<Vec<_>, _>>()?;
                call_function(name, &values)
            }
            Expr::Object(entries) => {
                let mut attrs = BTreeMap::new();
                for (key, value) in entries {
                    attrs.insert(key.clone(), self.eval_expr(inst, value)?);
                }
                Ok(Value::Object(attrs))
            }
            Expr::Tuple(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval_expr(inst, item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Modulo(lhs, rhs) => {
                let lhs = self.eval_expr(inst, lhs)?;
                let rhs = self.eval_expr(inst, rhs)?;
                match (&lhs, &rhs) {
                    (Value::Number(_), Value::Number(0)) => {
                        Err(EngineError::evaluation("modulo by zero"))
                    }
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
                    _ => Err(EngineError::evaluation(format!(
                        "cannot apply % to {} and {}",
                        lhs.type_name(),
                        rhs.type_name()
                    ))),
                }
            }
        }
    }

    fn traverse(
        &mut self,
        inst: &ModuleInstancePath,
        value: &Value,
        steps: &[Traverser],
    ) -> Result<Value, EngineError> {
        let mut path = Path::new();
        for step in steps {
            match step {
                Traverser::Attr(name) => path.push(PathStep::Attr(name.clone())),
                Traverser::Index(expr) => match self.eval_expr(inst, expr)? {
                    Value::String(key) => path.push(PathStep::Key(key)),
                    Value::Number(n) if n >= 0 => path.push(PathStep::Index(n as usize)),
                    other => {
                        return Err(EngineError::evaluation(format!(
                            "invalid index {} in {}",
                            other,
                            instance_label(inst)
                        )))
                    }
                },
            }
        }

        path.apply(value).map_err(|err| {
            EngineError::evaluation(format!("{}: {}", instance_label(inst), err))
        })
    }
}

fn call_function(name: &str, args: &[Value]) -> Result<Value, EngineError> {
    match (name, args) {
        ("length", [Value::String(s)]) => Ok(Value::Number(s.chars().count() as i64)),
        ("length", [Value::List(items)]) => Ok(Value::Number(items.len() as i64)),
        ("length", [Value::Object(attrs)]) => Ok(Value::Number(attrs.len() as i64)),
        ("length", [other]) => Err(EngineError::evaluation(format!(
            "length of {} is undefined",
            other.type_name()
        ))),
        ("length", _) => Err(EngineError::evaluation(format!(
            "length takes 1 argument, got {}",
            args.len()
        ))),
        _ => Err(EngineError::evaluation(format!("call to unknown function {}", name))),
    }
}
