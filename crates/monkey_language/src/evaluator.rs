//! Tree-walking evaluator.
//!
//! Evaluates the AST directly against an [`Environment`] chain. It shares
//! the object model, the builtins, and the operator semantics with the VM,
//! so the two engines produce the same values for the same program. The
//! evaluator has no compile step: an unbound name is a runtime error value
//! rather than a compile error, and arity mismatches or calls to
//! non-functions are error values rather than fatal errors.

mod environment;

pub use environment::{Env, Environment};

use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::ast::{Block, Expression, Ident, Program, Statement};
use crate::builtins::Builtins;
use crate::object::{Function, Value};
use crate::operators;

/// Default maximum nesting of function calls.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Tree-walking evaluator.
#[derive(Debug)]
pub struct Evaluator {
    builtins: Builtins,
    output: Vec<String>,
    depth: usize,
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Builtins::standard())
    }
}

impl Evaluator {
    /// Creates an evaluator that falls back to `builtins` for unbound names.
    #[must_use]
    pub fn new(builtins: Builtins) -> Self {
        Self {
            builtins,
            output: Vec::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Builder method to set the maximum call depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluates a program, returning the value of its last statement.
    ///
    /// A top-level `return` ends the program with its value.
    pub fn eval(&mut self, program: &Program, env: &Env) -> Value {
        let mut result = Value::Null;
        for statement in &program.statements {
            result = self.eval_statement(statement, env);
            if let Value::ReturnValue(value) = result {
                return *value;
            }
        }
        result
    }

    /// Returns the output from `puts`, one entry per printed value.
    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Takes the output buffer, leaving it empty.
    pub fn take_output(&mut self) -> Vec<String> {
        mem::take(&mut self.output)
    }

    fn eval_block(&mut self, block: &Block, env: &Env) -> Value {
        let mut result = Value::Null;
        for statement in &block.statements {
            result = self.eval_statement(statement, env);
            if matches!(result, Value::ReturnValue(_)) {
                return result;
            }
        }
        result
    }

    fn eval_statement(&mut self, statement: &Statement, env: &Env) -> Value {
        match statement {
            Statement::Let { name, value, .. } => {
                let value = self.eval_expression(value, env);
                if let Value::ReturnValue(_) = value {
                    return value;
                }
                env.borrow_mut().set(name.name.clone(), value);
                Value::Null
            }
            Statement::Return { value, .. } => {
                let value = self.eval_expression(value, env);
                match value {
                    Value::ReturnValue(_) => value,
                    _ => Value::ReturnValue(Box::new(value)),
                }
            }
            Statement::Expression(expression) => self.eval_expression(expression, env),
        }
    }

    fn eval_expression(&mut self, expression: &Expression, env: &Env) -> Value {
        match expression {
            Expression::Ident(ident) => self.eval_ident(ident, env),
            Expression::Int(n, _) => Value::Int(*n),
            Expression::Bool(b, _) => Value::Bool(*b),
            Expression::String(s, _) => Value::string(s),
            Expression::Prefix {
                operator, right, ..
            } => {
                let right = self.eval_expression(right, env);
                operators::prefix(operator, &right)
            }
            Expression::Infix {
                operator,
                left,
                right,
                ..
            } => {
                let left = self.eval_expression(left, env);
                let right = self.eval_expression(right, env);
                operators::infix(operator, &left, &right)
            }
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                if self.eval_expression(condition, env).is_truthy() {
                    self.eval_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, env)
                } else {
                    Value::Null
                }
            }
            Expression::Function {
                parameters, body, ..
            } => Value::Function(Rc::new(Function {
                parameters: parameters.clone(),
                body: body.clone(),
                env: Rc::clone(env),
            })),
            Expression::Call {
                function,
                arguments,
                ..
            } => {
                let function = self.eval_expression(function, env);
                let arguments: Vec<Value> = arguments
                    .iter()
                    .map(|argument| self.eval_expression(argument, env))
                    .collect();
                self.apply(&function, &arguments)
            }
            Expression::Array(elements, _) => Value::array(
                elements
                    .iter()
                    .map(|element| self.eval_expression(element, env))
                    .collect::<Vec<_>>(),
            ),
            Expression::Hash(pairs, _) => {
                let pairs: Vec<(Value, Value)> = pairs
                    .iter()
                    .map(|(key, value)| {
                        (
                            self.eval_expression(key, env),
                            self.eval_expression(value, env),
                        )
                    })
                    .collect();
                operators::hash(pairs)
            }
            Expression::Index { left, index, .. } => {
                let left = self.eval_expression(left, env);
                let index = self.eval_expression(index, env);
                operators::index(&left, &index)
            }
        }
    }

    fn eval_ident(&self, ident: &Ident, env: &Env) -> Value {
        if let Some(value) = env.borrow().get(&ident.name) {
            return value;
        }
        match self.builtins.lookup(&ident.name) {
            Some(builtin) => Value::Builtin(builtin),
            None => Value::error(format!("identifier not found: {}", ident.name)),
        }
    }

    fn apply(&mut self, function: &Value, arguments: &[Value]) -> Value {
        match function {
            Value::Function(function) => {
                if arguments.len() != function.parameters.len() {
                    return Value::error(format!(
                        "wrong number of arguments: want={}, got={}",
                        function.parameters.len(),
                        arguments.len()
                    ));
                }
                if self.depth >= self.max_depth {
                    return Value::error(format!(
                        "stack overflow (call depth limit {})",
                        self.max_depth
                    ));
                }

                let env = Environment::enclosed(&function.env);
                for (parameter, argument) in function.parameters.iter().zip(arguments) {
                    env.borrow_mut().set(parameter.name.clone(), argument.clone());
                }

                self.depth += 1;
                trace!(depth = self.depth, "apply function");
                let result = self.eval_block(&function.body, &env);
                self.depth -= 1;

                match result {
                    Value::ReturnValue(value) => *value,
                    other => other,
                }
            }
            Value::Builtin(builtin) => (builtin.func)(arguments, &mut self.output),
            other => Value::error(format!(
                "calling non-function: {}",
                other.object_type()
            )),
        }
    }
}

/// Parses and evaluates source text in a fresh environment.
///
/// # Errors
/// Returns parse errors. Runtime errors are returned as error values.
pub fn eval(source: &str) -> monkey_foundation::Result<Value> {
    let program = crate::parser::parse(source)?;
    Ok(Evaluator::default().eval(&program, &Environment::new()))
}
