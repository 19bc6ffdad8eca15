//! Stack-based virtual machine for Monkey bytecode.
//!
//! The VM runs a fetch-decode-execute loop over the instructions of the
//! innermost [`Frame`]. All frames share one operand stack. A frame's locals
//! live in the stack slots starting at its base pointer, directly above the
//! closure being called.
//!
//! # Errors
//!
//! Two kinds of failure are kept apart:
//!
//! - Language-level errors (type mismatches, division by zero, bad builtin
//!   arguments) are [`Value::Error`] values. They are pushed like any
//!   other result and the program keeps running.
//! - Fatal errors (unknown opcodes, stack overflow, calling a non-function,
//!   free-variable or arity mismatches) abort [`Vm::run`] with an [`Error`] for which
//!   [`Error::is_fatal`] holds.
//!
//! # Output
//!
//! Builtins never touch stdout directly. Whatever `puts` prints is collected
//! and can be read back with [`Vm::output`].

mod config;
mod frame;
#[cfg(test)]
mod tests;

pub use config::VmConfig;
pub use frame::Frame;

use std::mem;
use std::rc::Rc;

use monkey_foundation::{Error, ErrorKind, Overflow, Result};
use tracing::{debug, trace, warn};

use crate::builtins::Builtins;
use crate::code::{self, Opcode};
use crate::compiler::Bytecode;
use crate::object::{Closure, CompiledFunction, Value};
use crate::operators;

/// Stack-based virtual machine.
#[derive(Debug)]
pub struct Vm {
    /// Constant pool of the program being run.
    constants: Vec<Value>,
    /// Builtins addressed by `OpGetBuiltin`.
    builtins: Builtins,
    /// Resource bounds.
    config: VmConfig,
    /// Operand stack, pre-filled to its full size.
    stack: Vec<Value>,
    /// Next free stack slot. The last popped value stays at `stack[sp]`.
    sp: usize,
    /// Global slots (persist across runs when handed back in).
    globals: Vec<Value>,
    /// Active calls, innermost last.
    frames: Vec<Frame>,
    /// Output from `puts`.
    output: Vec<String>,
}

impl Vm {
    /// Creates a VM for `bytecode` with fresh globals and default bounds.
    #[must_use]
    pub fn new(bytecode: Bytecode, builtins: Builtins) -> Self {
        Self::with_globals(bytecode, builtins, Vec::new(), VmConfig::default())
    }

    /// Creates a VM that continues with globals from an earlier run.
    ///
    /// `builtins` must be the registry the bytecode was compiled against.
    #[must_use]
    pub fn with_globals(
        bytecode: Bytecode,
        builtins: Builtins,
        mut globals: Vec<Value>,
        config: VmConfig,
    ) -> Self {
        if globals.len() < bytecode.num_globals {
            globals.resize(bytecode.num_globals, Value::Null);
        }

        let main = CompiledFunction {
            instructions: bytecode.instructions,
            name: Some("<main>".to_string()),
            ..CompiledFunction::default()
        };
        let main = Rc::new(Closure {
            function: Rc::new(main),
            free: Vec::new(),
        });

        Self {
            constants: bytecode.constants,
            builtins,
            config,
            stack: vec![Value::Null; config.stack_size],
            sp: 0,
            globals,
            frames: vec![Frame::new(main, 0)],
            output: Vec::new(),
        }
    }

    /// Runs the program to completion.
    ///
    /// # Errors
    /// Returns a fatal error if the bytecode violates the VM's contract or a
    /// configured bound is exceeded. Language-level errors are values and do
    /// not fail the run.
    pub fn run(&mut self) -> Result<()> {
        if self.globals.len() > self.config.globals_size {
            return Err(Error::limit_exceeded("globals", self.config.globals_size));
        }

        debug!(
            constants = self.constants.len(),
            globals = self.globals.len(),
            "vm run"
        );
        let result = self.execute();
        if let Err(error) = &result {
            warn!(%error, depth = self.frames.len(), "vm run aborted");
        }
        result
    }

    /// Returns the value on top of the stack, if any.
    #[must_use]
    pub fn stack_top(&self) -> Option<&Value> {
        self.sp.checked_sub(1).and_then(|top| self.stack.get(top))
    }

    /// Returns the value most recently popped off the stack.
    ///
    /// After a run this is the value of the last expression statement, or
    /// the value of a top-level `return`.
    #[must_use]
    pub fn last_popped(&self) -> Value {
        self.stack.get(self.sp).cloned().unwrap_or(Value::Null)
    }

    /// Returns the global slots.
    #[must_use]
    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Consumes the VM, returning its globals for a later run.
    #[must_use]
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
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

    fn execute(&mut self) -> Result<()> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(());
            };
            let offset = frame.ip;
            let fetched = frame.instructions().get(offset).copied();
            frame.ip = offset + 1;

            let Some(byte) = fetched else {
                // Running off the end of the program finishes it.
                if self.frames.len() == 1 {
                    self.frames.pop();
                    return Ok(());
                }
                return Err(malformed(offset));
            };

            let opcode = Opcode::try_from(byte)?;
            match opcode {
                Opcode::Constant => {
                    let index = self.read_u16_operand(offset)?;
                    let value = self
                        .constants
                        .get(index)
                        .cloned()
                        .ok_or_else(|| Error::new(ErrorKind::InvalidConstant { index }))?;
                    self.push(value)?;
                }
                Opcode::Add => self.execute_infix("+")?,
                Opcode::Sub => self.execute_infix("-")?,
                Opcode::Mul => self.execute_infix("*")?,
                Opcode::Div => self.execute_infix("/")?,
                Opcode::Equal => self.execute_infix("==")?,
                Opcode::NotEqual => self.execute_infix("!=")?,
                Opcode::GreaterThan => self.execute_infix(">")?,
                Opcode::Minus => self.execute_prefix("-")?,
                Opcode::Bang => self.execute_prefix("!")?,
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::True => self.push(Value::Bool(true))?,
                Opcode::False => self.push(Value::Bool(false))?,
                Opcode::Null => self.push(Value::Null)?,
                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand(offset)?;
                    if !self.pop()?.is_truthy() {
                        self.current_frame_mut()?.ip = target;
                    }
                }
                Opcode::Jump => {
                    let target = self.read_u16_operand(offset)?;
                    self.current_frame_mut()?.ip = target;
                }
                Opcode::GetGlobal => {
                    let index = self.read_u16_operand(offset)?;
                    let value = self
                        .globals
                        .get(index)
                        .cloned()
                        .ok_or_else(|| malformed(offset))?;
                    self.push(value)?;
                }
                Opcode::SetGlobal => {
                    let index = self.read_u16_operand(offset)?;
                    let value = self.pop()?;
                    *self.globals.get_mut(index).ok_or_else(|| malformed(offset))? = value;
                }
                Opcode::GetLocal => {
                    let index = self.read_u8_operand(offset)?;
                    let slot = self.current_frame()?.base_pointer + index;
                    let value = self
                        .stack
                        .get(slot)
                        .cloned()
                        .ok_or_else(|| malformed(offset))?;
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let index = self.read_u8_operand(offset)?;
                    let slot = self.current_frame()?.base_pointer + index;
                    let value = self.pop()?;
                    *self.stack.get_mut(slot).ok_or_else(|| malformed(offset))? = value;
                }
                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand(offset)?;
                    let builtin = self.builtins.get(index).ok_or_else(|| malformed(offset))?;
                    self.push(Value::Builtin(builtin))?;
                }
                Opcode::GetFree => {
                    let index = self.read_u8_operand(offset)?;
                    let free = &self.current_frame()?.closure.free;
                    let value = free.get(index).cloned().ok_or_else(|| {
                        Error::new(ErrorKind::FreeVariableMismatch {
                            expected: index + 1,
                            actual: free.len(),
                        })
                    })?;
                    self.push(value)?;
                }
                Opcode::CurrentClosure => {
                    let closure = Rc::clone(&self.current_frame()?.closure);
                    self.push(Value::Closure(closure))?;
                }
                Opcode::Array => {
                    let count = self.read_u16_operand(offset)?;
                    let elements = self.pop_many(count)?;
                    self.push(Value::array(elements))?;
                }
                Opcode::Hash => {
                    let count = self.read_u16_operand(offset)?;
                    let mut items = self.pop_many(count)?.into_iter();
                    let pairs = std::iter::from_fn(|| Some((items.next()?, items.next()?)));
                    self.push(operators::hash(pairs))?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.push(operators::index(&left, &index))?;
                }
                Opcode::Call => {
                    let argc = self.read_u8_operand(offset)?;
                    self.call(argc)?;
                }
                Opcode::Closure => {
                    let index = self.read_u16_operand(offset)?;
                    let num_free = self.read_u8_operand(offset)?;
                    self.push_closure(index, num_free)?;
                }
                Opcode::ReturnValue => {
                    let value = self.pop()?;
                    if self.return_from_frame(value)? {
                        return Ok(());
                    }
                }
                Opcode::Return => {
                    if self.return_from_frame(Value::Null)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn execute_infix(&mut self, operator: &str) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.push(operators::infix(operator, &left, &right))
    }

    fn execute_prefix(&mut self, operator: &str) -> Result<()> {
        let right = self.pop()?;
        self.push(operators::prefix(operator, &right))
    }

    fn call(&mut self, argc: usize) -> Result<()> {
        let callee_slot = self
            .sp
            .checked_sub(argc + 1)
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))?;

        match self.stack[callee_slot].clone() {
            Value::Closure(closure) => self.call_closure(closure, argc),
            Value::Builtin(builtin) => {
                let arguments = &self.stack[callee_slot + 1..self.sp];
                let result = (builtin.func)(arguments, &mut self.output);
                self.sp = callee_slot;
                self.push(result)
            }
            other => Err(Error::new(ErrorKind::NotCallable(other.object_type()))),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> Result<()> {
        let num_parameters = closure.function.num_parameters;
        let num_locals = closure.function.num_locals;

        if argc != num_parameters {
            return Err(Error::new(ErrorKind::ArityMismatch {
                expected: num_parameters,
                actual: argc,
            }));
        }
        if self.frames.len() >= self.config.max_frames {
            return Err(Error::stack_overflow(Overflow::Frames {
                limit: self.config.max_frames,
            }));
        }

        let base_pointer = self.sp - argc;
        let sp = base_pointer + num_locals;
        if sp > self.stack.len() {
            return Err(Error::stack_overflow(Overflow::Operand {
                limit: self.stack.len(),
            }));
        }

        trace!(
            function = closure.function.name.as_deref().unwrap_or("<anonymous>"),
            depth = self.frames.len() + 1,
            base_pointer,
            "push frame"
        );
        self.sp = sp;
        self.frames.push(Frame::new(closure, base_pointer));
        Ok(())
    }

    /// Pops the current frame and hands `value` to the caller.
    ///
    /// Returns true if the popped frame was the top-level program.
    fn return_from_frame(&mut self, value: Value) -> Result<bool> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))?;

        if self.frames.is_empty() {
            self.sp = 0;
            if let Some(slot) = self.stack.first_mut() {
                *slot = value;
            }
            return Ok(true);
        }

        trace!(depth = self.frames.len(), "pop frame");
        self.sp = frame
            .base_pointer
            .checked_sub(1)
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))?;
        self.push(value)?;
        Ok(false)
    }

    fn push_closure(&mut self, index: usize, num_free: usize) -> Result<()> {
        let function = match self.constants.get(index) {
            Some(Value::CompiledFunction(function)) => Rc::clone(function),
            _ => return Err(Error::new(ErrorKind::InvalidConstant { index })),
        };
        if num_free != function.num_free {
            return Err(Error::new(ErrorKind::FreeVariableMismatch {
                expected: function.num_free,
                actual: num_free,
            }));
        }

        let free = self.pop_many(num_free)?;
        self.push(Value::Closure(Rc::new(Closure { function, free })))
    }

    fn push(&mut self, value: Value) -> Result<()> {
        let limit = self.stack.len();
        let Some(slot) = self.stack.get_mut(self.sp) else {
            return Err(Error::stack_overflow(Overflow::Operand { limit }));
        };
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        if self.sp == 0 {
            return Err(Error::new(ErrorKind::StackUnderflow));
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    /// Pops the top `count` values, returning them in push order.
    fn pop_many(&mut self, count: usize) -> Result<Vec<Value>> {
        let start = self
            .sp
            .checked_sub(count)
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))?;
        let values = self.stack[start..self.sp].to_vec();
        self.sp = start;
        Ok(values)
    }

    fn current_frame(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Error::new(ErrorKind::Internal("no active frame".to_string())))
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::new(ErrorKind::Internal("no active frame".to_string())))
    }

    fn read_u16_operand(&mut self, offset: usize) -> Result<usize> {
        let frame = self.current_frame_mut()?;
        let operand = frame
            .instructions()
            .get(frame.ip..)
            .and_then(code::read_u16)
            .ok_or_else(|| malformed(offset))?;
        frame.ip += 2;
        Ok(usize::from(operand))
    }

    fn read_u8_operand(&mut self, offset: usize) -> Result<usize> {
        let frame = self.current_frame_mut()?;
        let operand = frame
            .instructions()
            .get(frame.ip..)
            .and_then(code::read_u8)
            .ok_or_else(|| malformed(offset))?;
        frame.ip += 1;
        Ok(usize::from(operand))
    }
}

fn malformed(offset: usize) -> Error {
    Error::new(ErrorKind::MalformedInstruction { offset })
}

/// Compiles and runs source text, returning the last popped value.
///
/// # Errors
/// Returns parse, compile, or fatal VM errors.
pub fn eval(source: &str) -> Result<Value> {
    let bytecode = crate::compiler::compile(source)?;
    let mut vm = Vm::new(bytecode, Builtins::standard());
    vm.run()?;
    Ok(vm.last_popped())
}
