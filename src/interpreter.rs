//! Tree-walking evaluator.
//!
//! Holds the current/global environment pair and the resolver's side-table,
//! and walks statements and expressions by exhaustive match.  Early `return`
//! travels as a [`Flow`] discriminant through statement execution, never as
//! an error, so runtime failures and control flow cannot be confused.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, Lit, Stmt};
use crate::environment::Environment;
use crate::error::{JazzError, Result};
use crate::function::{clock_native, Func};
use crate::token::{Token, TokenType};
use crate::value::{Callable, Value};

/// Outcome of executing one statement: either fall through to the next, or
/// unwind to the nearest enclosing function call carrying the return value.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    env: Rc<RefCell<Environment>>,
    globals: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    node_ids: usize,
    repl: bool,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Callable::Native {
                name: "clock",
                arity: 0,
                func: clock_native,
            }),
        );

        info!("Interpreter created, globals populated");

        Interpreter {
            env: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            node_ids: 0,
            repl: false,
            out: Box::new(io::stdout()),
        }
    }

    /// REPL mode: expression statements additionally echo their value.
    pub fn with_repl(mut self) -> Self {
        self.repl = true;
        self
    }

    /// Redirects `print` (and the REPL echo) into the given sink.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// Called by the resolver for every variable occurrence that lives in a
    /// local scope.  Unannotated occurrences are globals.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// First node id unused by any chunk this interpreter has seen.
    ///
    /// Closures keep earlier chunks' function bodies (and their side-table
    /// entries) alive, so a new chunk's parser must start its ids here.
    pub fn node_id_base(&self) -> usize {
        self.node_ids
    }

    /// Records how far a chunk's parser advanced the id space.
    pub fn note_node_ids(&mut self, watermark: usize) {
        self.node_ids = self.node_ids.max(watermark);
    }

    #[cfg(test)]
    pub(crate) fn resolved_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Runs a resolved chunk to completion, stopping at the first runtime
    /// error.  Top-level `return` cannot reach here; the resolver rejects it.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            self.execute(stmt)?;
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                let value = self.evaluate(expr)?;

                if self.repl {
                    writeln!(self.out, "{}", value)?;
                }

                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value)?;

                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.env.borrow_mut().define(&name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::Func(decl) => {
                // The closure is the environment in effect right now, so the
                // function sees later mutations of the scope it was born in.
                let func = Value::Callable(Callable::Func(Rc::new(Func {
                    declaration: Rc::clone(decl),
                    closure: Rc::clone(&self.env),
                })));

                self.env.borrow_mut().define(&decl.name.lexeme, func);

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.env,
                ))));

                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Return { keyword: _, value } => {
                let value: Value = if let Some(expr) = value {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                debug!("Return unwind carrying {}", value);

                Ok(Flow::Return(value))
            }
        }
    }

    /// Runs `statements` with `env` as the current environment, restoring the
    /// previous one on every exit path: normal completion, runtime error, and
    /// return unwind.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.env, env);

        let mut flow = Ok(Flow::Normal);

        for stmt in statements {
            flow = self.execute(stmt);

            match &flow {
                Ok(Flow::Normal) => continue,
                _ => break,
            }
        }

        self.env = previous;

        flow
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Lit::Nil => Value::Nil,
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Number(n) => Value::Number(*n),
                Lit::Str(s) => Value::Str(s.clone()),
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                // The result is the operand that decided the outcome, not a
                // coerced boolean.
                match operator.token_type {
                    TokenType::OR if is_truthy(&left_val) => Ok(left_val),

                    TokenType::AND if !is_truthy(&left_val) => Ok(left_val),

                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                if let Some(&depth) = self.locals.get(id) {
                    Environment::assign_at(&self.env, depth, &name.lexeme, value.clone());
                } else {
                    self.globals
                        .borrow_mut()
                        .assign(&name.lexeme, value.clone(), name.line)?;
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                args,
            } => self.evaluate_call(callee, paren, args),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => {
                let n = to_number(&value, operator.line)?;
                Ok(Value::Number(-n))
            }

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(JazzError::runtime(operator.line, "invalid unary operator")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        // Operands evaluate left to right.
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        let line = operator.line;

        match operator.token_type {
            TokenType::PLUS => match (&left_val, &right_val) {
                // String concatenation wins if either side is a string; the
                // other side is stringified.
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(format!("{}{}", left_val, right_val)))
                }

                _ => {
                    let (l, r) = to_numbers(&left_val, &right_val, line).map_err(|_| {
                        JazzError::runtime(
                            line,
                            format!(
                                "invalid operation: operands must be strings or numbers but are {}[{}], {}[{}]",
                                left_val.type_name(),
                                left_val,
                                right_val.type_name(),
                                right_val
                            ),
                        )
                    })?;

                    Ok(Value::Number(l + r))
                }
            },

            TokenType::MINUS => {
                let (l, r) = to_numbers(&left_val, &right_val, line)?;
                Ok(Value::Number(l - r))
            }

            TokenType::STAR => {
                let (l, r) = to_numbers(&left_val, &right_val, line)?;
                Ok(Value::Number(l * r))
            }

            TokenType::SLASH => {
                let (l, r) = to_numbers(&left_val, &right_val, line)?;

                if r == 0.0 {
                    return Err(JazzError::runtime(
                        line,
                        "invalid operation: division by zero",
                    ));
                }

                Ok(Value::Number(l / r))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left_val, &right_val))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            TokenType::GREATER => {
                let (l, r) = to_numbers(&left_val, &right_val, line)?;
                Ok(Value::Bool(l > r))
            }

            TokenType::GREATER_EQUAL => {
                let (l, r) = to_numbers(&left_val, &right_val, line)?;
                Ok(Value::Bool(l >= r))
            }

            TokenType::LESS => {
                let (l, r) = to_numbers(&left_val, &right_val, line)?;
                Ok(Value::Bool(l < r))
            }

            TokenType::LESS_EQUAL => {
                let (l, r) = to_numbers(&left_val, &right_val, line)?;
                Ok(Value::Bool(l <= r))
            }

            _ => Err(JazzError::runtime(line, "invalid binary operator")),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> Result<Value> {
        let callee_val = self.evaluate(callee)?;

        let Value::Callable(function) = callee_val else {
            return Err(JazzError::runtime(paren.line, "callee is not a function"));
        };

        let mut arg_vals: Vec<Value> = Vec::with_capacity(args.len());

        for arg in args {
            arg_vals.push(self.evaluate(arg)?);
        }

        if arg_vals.len() != function.arity() {
            return Err(JazzError::runtime(
                paren.line,
                format!(
                    "wrong number of arguments: expected {}, got {}",
                    function.arity(),
                    arg_vals.len()
                ),
            ));
        }

        debug!("Dispatching call at line {}", paren.line);

        function.call(self, arg_vals, paren.line)
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        if let Some(&depth) = self.locals.get(&id) {
            Ok(Environment::get_at(&self.env, depth, &name.lexeme))
        } else {
            self.globals.borrow().get(&name.lexeme, name.line)
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// nil and false are false; everything else (including 0 and "") is true.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

/// Same-kind comparison; cross-kind is always false.  Numbers follow IEEE
/// equality, so NaN != NaN.  Callables compare by identity.
fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,

        (Value::Bool(a), Value::Bool(b)) => a == b,

        (Value::Number(a), Value::Number(b)) => a == b,

        (Value::Str(a), Value::Str(b)) => a == b,

        (Value::Callable(Callable::Func(a)), Value::Callable(Callable::Func(b))) => {
            Rc::ptr_eq(a, b)
        }

        (
            Value::Callable(Callable::Native { name: a, .. }),
            Value::Callable(Callable::Native { name: b, .. }),
        ) => a == b,

        _ => false,
    }
}

/// Numeric coercion for arithmetic and comparison: numbers pass through and
/// strings parse as decimal doubles.
fn to_number(value: &Value, line: usize) -> Result<f64> {
    match value {
        Value::Number(n) => Ok(*n),

        Value::Str(s) => s.parse::<f64>().map_err(|_| {
            JazzError::runtime(
                line,
                format!(
                    "invalid operation: operand must be a number but was a string[{}]",
                    s
                ),
            )
        }),

        other => Err(JazzError::runtime(
            line,
            format!(
                "invalid operation: operand must be a number but was a {}[{}]",
                other.type_name(),
                other
            ),
        )),
    }
}

fn to_numbers(left: &Value, right: &Value, line: usize) -> Result<(f64, f64)> {
    Ok((to_number(left, line)?, to_number(right, line)?))
}
