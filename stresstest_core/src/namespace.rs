//! Hierarchical naming authority for generated objects.

use crate::expr::{ConfigExpr, Referenceable};
use crate::generate::decide_index;
use rand::Rng;
use std::collections::HashSet;
use stresstest_env::{InstanceKey, Path, Value};

/// First character of a short name.
const NAME_HEAD: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Remaining characters of a short name.
const NAME_TAIL: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Characters used in generated string constants. Includes the characters
/// that need escaping so rendering gets exercised too.
const STRING_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789 -_.$%{}\"\\";

/// Collision retries before giving up. 26 * 37 * 37 names exist, so hitting
/// this means something is badly wrong.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Names that would collide with language keywords or meta-arguments.
const RESERVED_NAMES: &[&str] = &[
    "count", "each", "for", "for_each", "if", "in", "depends_on", "false", "true", "null",
    "lifecycle", "locals", "module", "output", "path", "providers", "provider", "self", "source",
    "terraform", "var", "variable", "version",
];

/// A reference this namespace's expressions may use.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RefCandidate {
    target: Referenceable,
    path: Path,
}

/// Naming scope for one module level.
///
/// Hands out short names that are unique within this level and spawns child
/// namespaces for nested module calls. It also remembers which objects
/// expressions at this level can refer to: its own variables, and the
/// outputs of module calls already generated here.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Module call names from the root to this level
    module_path: Vec<String>,

    /// Names already issued at this level
    names: HashSet<String>,

    /// Objects expressions at this level may reference
    candidates: Vec<RefCandidate>,
}

impl Namespace {
    /// Creates the namespace of a root module.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the module-call path of this level.
    pub fn module_path(&self) -> &[String] {
        &self.module_path
    }

    /// Returns the nesting depth (0 for the root module).
    pub fn depth(&self) -> usize {
        self.module_path.len()
    }

    /// Returns a name not yet issued by this namespace.
    ///
    /// # Panics
    ///
    /// Panics if no unused name turns up within a bounded number of draws.
    pub fn generate_short_name<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let len = rng.gen_range(0..=2);
            let mut name = String::with_capacity(len + 1);
            name.push(NAME_HEAD[rng.gen_range(0..NAME_HEAD.len())] as char);
            for _ in 0..len {
                name.push(NAME_TAIL[rng.gen_range(0..NAME_TAIL.len())] as char);
            }

            if RESERVED_NAMES.contains(&name.as_str()) || self.names.contains(&name) {
                continue;
            }
            self.names.insert(name.clone());
            return name;
        }
        panic!(
            "namespace {:?} exhausted after {} names",
            self.module_path,
            self.names.len()
        );
    }

    /// Returns a fresh namespace for a module called `name` from this level.
    pub fn child_namespace(&self, name: &str) -> Namespace {
        let mut module_path = self.module_path.clone();
        module_path.push(name.to_string());
        Namespace {
            module_path,
            names: HashSet::new(),
            candidates: Vec::new(),
        }
    }

    /// Makes `var.<name>` available to later expressions at this level.
    pub fn declare_variable(&mut self, name: &str) {
        self.candidates.push(RefCandidate {
            target: Referenceable::Variable(name.to_string()),
            path: Path::new(),
        });
    }

    /// Makes `module.<call>[key].<output>` available to later expressions.
    pub fn declare_module_output(&mut self, call: &str, key: &InstanceKey, output: &str) {
        let mut path = Path::new();
        if let Some(step) = key.path_step() {
            path.push(step);
        }
        self.candidates.push(RefCandidate {
            target: Referenceable::ModuleCall(call.to_string()),
            path: path.attr(output),
        });
    }

    /// Returns the number of references available at this level.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Generates a string-typed expression valid at this level.
    ///
    /// References are preferred 2:1 over constants whenever something is
    /// available to reference, so generated graphs have real edges.
    pub fn generate_expression<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        max_string_len: usize,
    ) -> ConfigExpr {
        let ref_weight = if self.candidates.is_empty() { 0 } else { 2 };

        match decide_index(rng, &[1, ref_weight]) {
            0 => ConfigExpr::Const(Value::String(generate_string(rng, max_string_len))),
            1 => {
                let chosen = &self.candidates[rng.gen_range(0..self.candidates.len())];
                ConfigExpr::reference(
                    self.module_path.clone(),
                    chosen.target.clone(),
                    chosen.path.clone(),
                )
            }
            _ => panic!("invalid expression decision"),
        }
    }
}

/// Generates a random string constant of 1..=`max_len` characters.
pub fn generate_string<R: Rng + ?Sized>(rng: &mut R, max_len: usize) -> String {
    let len = rng.gen_range(1..=max_len.max(1));
    (0..len)
        .map(|_| STRING_ALPHABET[rng.gen_range(0..STRING_ALPHABET.len())] as char)
        .collect()
}
