use std::fmt;
use std::rc::Rc;

use crate::error::{JazzError, Result};
use crate::function::Func;
use crate::interpreter::Interpreter;

/// Signature shared by all built-in functions.
pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, String>;

/// The dynamic value domain of the language.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Callable(Callable),
}

#[derive(Debug, Clone)]
pub enum Callable {
    Native {
        name: &'static str,
        arity: usize,
        func: NativeFn,
    },

    Func(Rc<Func>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native { arity, .. } => *arity,

            Callable::Func(func) => func.declaration.params.len(),
        }
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        match self {
            Callable::Native { func, .. } => {
                func(&args).map_err(|msg| JazzError::runtime(line, msg))
            }

            Callable::Func(func) => func.call(interpreter, args),
        }
    }
}

impl Value {
    /// Kind name used in runtime diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Callable(_) => "fn",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::Str(s) => write!(f, "{}", s),

            Value::Callable(Callable::Native { .. }) => write!(f, "<native fn>"),

            Value::Callable(Callable::Func(func)) => {
                write!(f, "<fn {}>", func.declaration.name.lexeme)
            }
        }
    }
}
