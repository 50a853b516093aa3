use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{JazzError, Result};
use crate::value::Value;

/// One lexical scope: a mapping from identifier to value plus an optional
/// enclosing scope.  Scopes are shared between the interpreter's current
/// pointer and any closures defined inside them, hence `Rc<RefCell<_>>`.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Unconditional insert into this environment only.
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}' = {}", name, value);

        self.values.insert(name.to_string(), value);
    }

    /// Walks the enclosing chain from innermost outward.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(JazzError::runtime(
                line,
                format!("undefined variable '{}'", name),
            ))
        }
    }

    /// Walks the enclosing chain; fails if no binding exists at any level.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(JazzError::runtime(
                line,
                format!("undefined variable '{}'", name),
            ))
        }
    }

    /// Reads from the environment exactly `hops` enclosing pointers away.
    ///
    /// The resolver guarantees the binding exists there; a miss is a bug in
    /// this crate, not in the user's program.
    pub fn get_at(env: &Rc<RefCell<Environment>>, hops: usize, name: &str) -> Value {
        Environment::ancestor(env, hops)
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolved variable '{}' missing at depth {}", name, hops))
    }

    /// Writes into the environment exactly `hops` enclosing pointers away.
    pub fn assign_at(env: &Rc<RefCell<Environment>>, hops: usize, name: &str, value: Value) {
        Environment::ancestor(env, hops)
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }

    fn ancestor(env: &Rc<RefCell<Environment>>, hops: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);

        for _ in 0..hops {
            let next = current
                .borrow()
                .enclosing
                .clone()
                .expect("environment chain shorter than resolved depth");
            current = next;
        }

        current
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
