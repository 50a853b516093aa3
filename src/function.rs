//! User-function call machinery and the built-in `clock`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::ast::FuncDecl;
use crate::environment::Environment;
use crate::error::Result;
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// A user-defined function: its declaration plus the environment captured at
/// the point the `fn` statement executed.
pub struct Func {
    pub declaration: Rc<FuncDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl Func {
    /// Runs the body in a fresh child of the captured closure, with the
    /// parameters bound positionally.  The caller has already checked arity.
    pub fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
        debug!(
            "Calling <fn {}> with {} arg(s)",
            self.declaration.name.lexeme,
            args.len()
        );

        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &self.closure,
        ))));

        for (param, arg) in self.declaration.params.iter().zip(args) {
            env.borrow_mut().define(&param.lexeme, arg);
        }

        match interpreter.execute_block(&self.declaration.body, env)? {
            Flow::Return(value) => Ok(value),

            Flow::Normal => Ok(Value::Nil),
        }
    }
}

// A closure environment can reach back to the function value stored inside
// it, so the default recursive Debug would never terminate.
impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

/// Built-in `clock()`: wall-clock milliseconds since the Unix epoch.
pub fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("clock error: {}", e))?
        .as_millis();

    Ok(Value::Number(millis as f64))
}
