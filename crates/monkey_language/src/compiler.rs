//! Compiler from AST to bytecode.
//!
//! The compiler walks the AST once. Instructions go into a stack of
//! compilation scopes, one per function body being compiled, while literals
//! and compiled functions go into a single constant pool shared by all
//! scopes.
//!
//! Each scope remembers its last two emitted instructions. That is enough
//! for the two rewrites the compiler needs: dropping a trailing `OpPop` so a
//! block leaves its value on the stack, and turning a trailing `OpPop` into
//! `OpReturnValue` for implicit returns.
//!
//! Forward jumps are emitted with a placeholder operand and back-patched in
//! place once the target offset is known.

use std::mem;
use std::rc::Rc;

use monkey_foundation::{Error, Result};
use tracing::{debug, trace};

use crate::ast::{Block, Expression, Ident, Program, Statement};
use crate::builtins::Builtins;
use crate::code::{Instructions, Opcode, make};
use crate::object::{CompiledFunction, Value};
use crate::span::Span;
use crate::symbol_table::{Symbol, SymbolScope, SymbolTable};

const MAX_CONSTANTS: usize = 1 << 16;
const MAX_GLOBALS: usize = 1 << 16;
const MAX_LOCALS: usize = 1 << 8;
const MAX_ARGUMENTS: usize = u8::MAX as usize;
const MAX_FREE: usize = u8::MAX as usize;
const MAX_U16_OPERAND: usize = u16::MAX as usize;

const JUMP_PLACEHOLDER: usize = 9999;

/// A compiled program ready for the VM.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bytecode {
    /// Top-level instructions.
    pub instructions: Instructions,
    /// Constant pool referenced by `OpConstant` and `OpClosure`.
    pub constants: Vec<Value>,
    /// Number of global slots the program defines.
    pub num_globals: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// Compiles programs into [`Bytecode`].
///
/// A compiler can be fed several programs in turn. Globals and constants
/// accumulate across calls while instructions describe only the most recent
/// program, which is how the REPL compiles one line at a time.
#[derive(Debug)]
pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scope: CompilationScope,
    outer_scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// Creates a compiler that resolves the given builtins by name.
    #[must_use]
    pub fn new(builtins: &Builtins) -> Self {
        Self::with_state(Self::global_symbols(builtins), Vec::new())
    }

    /// Creates a compiler that continues from earlier compilation state.
    ///
    /// `symbol_table` must be an outermost table.
    #[must_use]
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            constants,
            symbol_table,
            scope: CompilationScope::default(),
            outer_scopes: Vec::new(),
        }
    }

    /// Builds the outermost symbol table with every builtin registered.
    #[must_use]
    pub fn global_symbols(builtins: &Builtins) -> SymbolTable {
        let mut table = SymbolTable::new();
        for (index, builtin) in builtins.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        table
    }

    /// Compiles a program.
    ///
    /// Every top-level statement is attempted. A failing statement is
    /// abandoned, its error recorded, and compilation resumes with the next
    /// one; the compiler is back at program scope either way.
    ///
    /// # Errors
    /// Returns every compile error found. The emitted instructions must not
    /// be executed when this fails.
    pub fn compile(&mut self, program: &Program) -> Result<()> {
        let mut errors = Vec::new();
        for statement in &program.statements {
            if let Err(error) = self.compile_statement(statement) {
                self.unwind();
                errors.push(error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::collected(errors))
        }
    }

    /// Returns a copy of the bytecode compiled so far.
    #[must_use]
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope.instructions.clone(),
            constants: self.constants.clone(),
            num_globals: self.symbol_table.num_definitions(),
        }
    }

    /// Consumes the compiler, returning its bytecode.
    #[must_use]
    pub fn into_bytecode(self) -> Bytecode {
        Bytecode {
            num_globals: self.symbol_table.num_definitions(),
            instructions: self.scope.instructions,
            constants: self.constants,
        }
    }

    /// Consumes the compiler, returning the state a later compiler needs.
    #[must_use]
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbol_table, self.constants)
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Let { name, value, .. } => {
                self.compile_expression(value)?;
                let symbol = self.symbol_table.define(&name.name);
                self.store_symbol(&symbol, name.span)
            }
            Statement::Return { value, .. } => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
                Ok(())
            }
            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Pop, &[]);
                Ok(())
            }
        }
    }

    fn compile_block(&mut self, block: &Block) -> Result<()> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Ident(ident) => {
                let symbol = self.resolve(ident)?;
                self.load_symbol(&symbol);
            }
            Expression::Int(n, span) => {
                let index = self.add_constant(Value::Int(*n), *span)?;
                self.emit(Opcode::Constant, &[index]);
            }
            Expression::String(s, span) => {
                let index = self.add_constant(Value::string(s), *span)?;
                self.emit(Opcode::Constant, &[index]);
            }
            Expression::Bool(b, _) => {
                self.emit(if *b { Opcode::True } else { Opcode::False }, &[]);
            }
            Expression::Prefix {
                operator,
                right,
                span,
            } => {
                let opcode = match operator.as_str() {
                    "!" => Opcode::Bang,
                    "-" => Opcode::Minus,
                    _ => {
                        return Err(
                            Error::unknown_operator(operator.clone()).at(span.line, span.column)
                        );
                    }
                };
                self.compile_expression(right)?;
                self.emit(opcode, &[]);
            }
            Expression::Infix {
                operator,
                left,
                right,
                span,
            } => self.compile_infix(operator, left, right, *span)?,
            Expression::If {
                condition,
                consequence,
                alternative,
                span,
            } => self.compile_if(condition, consequence, alternative.as_ref(), *span)?,
            Expression::Function {
                name,
                parameters,
                body,
                span,
            } => self.compile_function(name.as_deref(), parameters, body, *span)?,
            Expression::Call {
                function,
                arguments,
                span,
            } => {
                ensure_within(arguments.len(), MAX_ARGUMENTS, "arguments", *span)?;
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
            Expression::Array(elements, span) => {
                ensure_within(elements.len(), MAX_U16_OPERAND, "array elements", *span)?;
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expression::Hash(pairs, span) => {
                ensure_within(pairs.len(), MAX_U16_OPERAND / 2, "hash entries", *span)?;
                let mut sorted: Vec<_> = pairs.iter().collect();
                sorted.sort_by_cached_key(|(key, _)| key.to_string());
                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expression::Index { left, index, .. } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_infix(
        &mut self,
        operator: &str,
        left: &Expression,
        right: &Expression,
        span: Span,
    ) -> Result<()> {
        // There is no less-than opcode; `a < b` is `b > a`.
        if operator == "<" {
            self.compile_expression(right)?;
            self.compile_expression(left)?;
            self.emit(Opcode::GreaterThan, &[]);
            return Ok(());
        }

        let opcode = match operator {
            "+" => Opcode::Add,
            "-" => Opcode::Sub,
            "*" => Opcode::Mul,
            "/" => Opcode::Div,
            ">" => Opcode::GreaterThan,
            "==" => Opcode::Equal,
            "!=" => Opcode::NotEqual,
            _ => return Err(Error::unknown_operator(operator).at(span.line, span.column)),
        };
        self.compile_expression(left)?;
        self.compile_expression(right)?;
        self.emit(opcode, &[]);
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &Block,
        alternative: Option<&Block>,
        span: Span,
    ) -> Result<()> {
        self.compile_expression(condition)?;
        let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[JUMP_PLACEHOLDER]);

        self.compile_branch(consequence)?;
        let jump = self.emit(Opcode::Jump, &[JUMP_PLACEHOLDER]);

        let after_consequence = self.scope.instructions.len();
        self.change_operand(jump_not_truthy, Opcode::JumpNotTruthy, after_consequence, span)?;

        match alternative {
            Some(block) => self.compile_branch(block)?,
            None => {
                self.emit(Opcode::Null, &[]);
            }
        }

        let after_alternative = self.scope.instructions.len();
        self.change_operand(jump, Opcode::Jump, after_alternative, span)
    }

    /// Compiles a branch so that it leaves exactly one value on the stack.
    fn compile_branch(&mut self, block: &Block) -> Result<()> {
        self.compile_block(block)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        } else {
            self.emit(Opcode::Null, &[]);
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: Option<&str>,
        parameters: &[Ident],
        body: &Block,
        span: Span,
    ) -> Result<()> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for parameter in parameters {
            let symbol = self.symbol_table.define(&parameter.name);
            ensure_within(symbol.index + 1, MAX_LOCALS, "locals", parameter.span)?;
        }

        self.compile_block(body)?;

        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = self.symbol_table.free_symbols().to_vec();
        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope();

        ensure_within(free_symbols.len(), MAX_FREE, "free variables", span)?;
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        debug!(
            name = name.unwrap_or("<anonymous>"),
            num_locals,
            num_free = free_symbols.len(),
            bytes = instructions.len(),
            "compiled function"
        );

        let function = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
            num_free: free_symbols.len(),
            name: name.map(str::to_string),
        };
        let index = self.add_constant(Value::CompiledFunction(Rc::new(function)), span)?;
        self.emit(Opcode::Closure, &[index, free_symbols.len()]);
        Ok(())
    }

    fn resolve(&mut self, ident: &Ident) -> Result<Symbol> {
        self.symbol_table.resolve(&ident.name).ok_or_else(|| {
            Error::undefined_variable(&ident.name).at(ident.span.line, ident.span.column)
        })
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    fn store_symbol(&mut self, symbol: &Symbol, span: Span) -> Result<()> {
        if symbol.scope == SymbolScope::Global {
            ensure_within(symbol.index + 1, MAX_GLOBALS, "globals", span)?;
            self.emit(Opcode::SetGlobal, &[symbol.index]);
        } else {
            ensure_within(symbol.index + 1, MAX_LOCALS, "locals", span)?;
            self.emit(Opcode::SetLocal, &[symbol.index]);
        }
        Ok(())
    }

    fn add_constant(&mut self, value: Value, span: Span) -> Result<usize> {
        let index = self.constants.len();
        ensure_within(index + 1, MAX_CONSTANTS, "constants", span)?;
        self.constants.push(value);
        Ok(index)
    }

    fn emit(&mut self, opcode: Opcode, operands: &[usize]) -> usize {
        let position = self.scope.instructions.push(&make(opcode, operands));
        self.scope.previous = self
            .scope
            .last
            .replace(EmittedInstruction { opcode, position });
        position
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        self.scope.last.is_some_and(|last| last.opcode == opcode)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.scope.last {
            self.scope.instructions.truncate(last.position);
            self.scope.last = self.scope.previous;
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope.last.as_mut() {
            self.scope
                .instructions
                .replace(last.position, &make(Opcode::ReturnValue, &[]));
            last.opcode = Opcode::ReturnValue;
        }
    }

    fn change_operand(
        &mut self,
        position: usize,
        opcode: Opcode,
        operand: usize,
        span: Span,
    ) -> Result<()> {
        ensure_within(operand, MAX_U16_OPERAND, "instruction bytes", span)?;
        self.scope
            .instructions
            .replace(position, &make(opcode, &[operand]));
        Ok(())
    }

    fn enter_scope(&mut self) {
        let outer = mem::take(&mut self.scope);
        self.outer_scopes.push(outer);
        let table = mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(table);
        trace!(depth = self.outer_scopes.len(), "entered function scope");
    }

    fn leave_scope(&mut self) -> Instructions {
        let outer = self.outer_scopes.pop().unwrap_or_default();
        let inner = mem::replace(&mut self.scope, outer);
        let table = mem::take(&mut self.symbol_table);
        self.symbol_table = table.into_outer().unwrap_or_default();
        trace!(depth = self.outer_scopes.len(), "left function scope");
        inner.instructions
    }

    fn unwind(&mut self) {
        while !self.outer_scopes.is_empty() {
            self.leave_scope();
        }
    }
}

fn ensure_within(count: usize, limit: usize, what: &'static str, span: Span) -> Result<()> {
    if count <= limit {
        Ok(())
    } else {
        Err(Error::limit_exceeded(what, limit).at(span.line, span.column))
    }
}

/// Parses and compiles source text against the standard builtins.
///
/// # Errors
/// Returns parse errors, or compile errors if parsing succeeded.
pub fn compile(source: &str) -> Result<Bytecode> {
    let program = crate::parser::parse(source)?;
    let mut compiler = Compiler::new(&Builtins::standard());
    compiler.compile(&program)?;
    Ok(compiler.into_bytecode())
}
