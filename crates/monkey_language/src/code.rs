//! Bytecode instruction encoding for the Monkey VM.
//!
//! An instruction is one opcode byte followed by its operands, each encoded
//! big-endian in the width the opcode declares. [`make`] encodes,
//! [`read_operands`] decodes, and the `Display` impl of [`Instructions`]
//! disassembles a whole buffer:
//!
//! ```text
//! 0000 OpConstant 0
//! 0003 OpConstant 1
//! 0006 OpAdd
//! 0007 OpPop
//! ```
//!
//! Offsets are absolute byte positions, so jump operands can be read
//! straight off the listing.

#![allow(clippy::doc_markdown)]

use std::fmt;
use std::ops::Deref;

use monkey_foundation::{Error, ErrorKind, Result};

/// A single VM operation.
///
/// The discriminant is the encoded byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Push a constant. Operand: u16 pool index.
    Constant,
    /// `[a, b] -> [a + b]`
    Add,
    /// Discard the top of stack.
    Pop,
    /// `[a, b] -> [a - b]`
    Sub,
    /// `[a, b] -> [a * b]`
    Mul,
    /// `[a, b] -> [a / b]`
    Div,
    /// Push `true`.
    True,
    /// Push `false`.
    False,
    /// `[a, b] -> [a == b]`
    Equal,
    /// `[a, b] -> [a != b]`
    NotEqual,
    /// `[a, b] -> [a > b]`
    GreaterThan,
    /// `[a] -> [-a]`
    Minus,
    /// `[a] -> [!a]`
    Bang,
    /// Pop and jump if falsy. Operand: u16 absolute target.
    JumpNotTruthy,
    /// Jump unconditionally. Operand: u16 absolute target.
    Jump,
    /// Push `null`.
    Null,
    /// Push a global. Operand: u16 slot.
    GetGlobal,
    /// Pop into a global. Operand: u16 slot.
    SetGlobal,
    /// Build an array from the top N values. Operand: u16 element count.
    Array,
    /// Build a hash from the top N values. Operand: u16 count of keys plus values.
    Hash,
    /// `[coll, index] -> [coll[index]]`
    Index,
    /// Call the value below the arguments. Operand: u8 argument count.
    Call,
    /// Return the top of stack to the caller.
    ReturnValue,
    /// Return `null` to the caller.
    Return,
    /// Push a local. Operand: u8 slot.
    GetLocal,
    /// Pop into a local. Operand: u8 slot.
    SetLocal,
    /// Push a builtin. Operand: u8 registry index.
    GetBuiltin,
    /// Build a closure. Operands: u16 constant index, u8 free-variable count.
    Closure,
    /// Push a captured variable of the running closure. Operand: u8 index.
    GetFree,
    /// Push the running closure itself.
    CurrentClosure,
}

impl Opcode {
    /// Every opcode, indexed by its byte.
    pub const ALL: [Opcode; 30] = [
        Self::Constant,
        Self::Add,
        Self::Pop,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::True,
        Self::False,
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::Minus,
        Self::Bang,
        Self::JumpNotTruthy,
        Self::Jump,
        Self::Null,
        Self::GetGlobal,
        Self::SetGlobal,
        Self::Array,
        Self::Hash,
        Self::Index,
        Self::Call,
        Self::ReturnValue,
        Self::Return,
        Self::GetLocal,
        Self::SetLocal,
        Self::GetBuiltin,
        Self::Closure,
        Self::GetFree,
        Self::CurrentClosure,
    ];

    /// Returns the mnemonic and operand widths of this opcode.
    #[must_use]
    pub const fn definition(self) -> Definition {
        match self {
            Self::Constant => definition("OpConstant", &[2]),
            Self::Add => definition("OpAdd", &[]),
            Self::Pop => definition("OpPop", &[]),
            Self::Sub => definition("OpSub", &[]),
            Self::Mul => definition("OpMul", &[]),
            Self::Div => definition("OpDiv", &[]),
            Self::True => definition("OpTrue", &[]),
            Self::False => definition("OpFalse", &[]),
            Self::Equal => definition("OpEqual", &[]),
            Self::NotEqual => definition("OpNotEqual", &[]),
            Self::GreaterThan => definition("OpGreaterThan", &[]),
            Self::Minus => definition("OpMinus", &[]),
            Self::Bang => definition("OpBang", &[]),
            Self::JumpNotTruthy => definition("OpJumpNotTruthy", &[2]),
            Self::Jump => definition("OpJump", &[2]),
            Self::Null => definition("OpNull", &[]),
            Self::GetGlobal => definition("OpGetGlobal", &[2]),
            Self::SetGlobal => definition("OpSetGlobal", &[2]),
            Self::Array => definition("OpArray", &[2]),
            Self::Hash => definition("OpHash", &[2]),
            Self::Index => definition("OpIndex", &[]),
            Self::Call => definition("OpCall", &[1]),
            Self::ReturnValue => definition("OpReturnValue", &[]),
            Self::Return => definition("OpReturn", &[]),
            Self::GetLocal => definition("OpGetLocal", &[1]),
            Self::SetLocal => definition("OpSetLocal", &[1]),
            Self::GetBuiltin => definition("OpGetBuiltin", &[1]),
            Self::Closure => definition("OpClosure", &[2, 1]),
            Self::GetFree => definition("OpGetFree", &[1]),
            Self::CurrentClosure => definition("OpCurrentClosure", &[]),
        }
    }
}

const fn definition(name: &'static str, operand_widths: &'static [usize]) -> Definition {
    Definition {
        name,
        operand_widths,
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(byte))
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::UnknownOpcode(byte)))
    }
}

/// Mnemonic and operand layout of an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Definition {
    /// Mnemonic used in disassembly, e.g. `OpConstant`.
    pub name: &'static str,
    /// Width in bytes of each operand, in order.
    pub operand_widths: &'static [usize],
}

impl Definition {
    /// Total number of operand bytes following the opcode.
    #[must_use]
    pub fn operand_bytes(&self) -> usize {
        self.operand_widths.iter().sum()
    }
}

/// Looks up the definition of an opcode byte.
///
/// # Errors
/// Returns `UnknownOpcode` if the byte has no registered definition.
pub fn lookup(byte: u8) -> Result<Definition> {
    Opcode::try_from(byte).map(Opcode::definition)
}

/// Encodes one instruction.
///
/// # Panics
/// Panics if `operands` does not match the opcode's declared operand count.
/// That is a compiler bug, not a recoverable condition.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn make(op: Opcode, operands: &[usize]) -> Vec<u8> {
    let def = op.definition();
    assert_eq!(
        operands.len(),
        def.operand_widths.len(),
        "{} takes {} operands",
        def.name,
        def.operand_widths.len()
    );

    let mut instruction = Vec::with_capacity(1 + def.operand_bytes());
    instruction.push(op as u8);
    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        if width == 2 {
            instruction.extend_from_slice(&(operand as u16).to_be_bytes());
        } else {
            instruction.push(operand as u8);
        }
    }
    instruction
}

/// Decodes the operands of one instruction.
///
/// `ins` starts right after the opcode byte. Returns the operands and the
/// number of bytes they occupied, or `None` if `ins` is too short.
#[must_use]
pub fn read_operands(def: &Definition, ins: &[u8]) -> Option<(Vec<usize>, usize)> {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for &width in def.operand_widths {
        let rest = ins.get(offset..)?;
        let operand = match width {
            2 => usize::from(read_u16(rest)?),
            1 => usize::from(read_u8(rest)?),
            _ => return None,
        };
        operands.push(operand);
        offset += width;
    }

    Some((operands, offset))
}

/// Reads a big-endian u16 from the start of `ins`.
#[must_use]
pub fn read_u16(ins: &[u8]) -> Option<u16> {
    match ins {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Reads a u8 from the start of `ins`.
#[must_use]
pub fn read_u8(ins: &[u8]) -> Option<u8> {
    ins.first().copied()
}

/// A buffer of encoded instructions.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Instructions(Vec<u8>);

impl Instructions {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an encoded instruction, returning its byte offset.
    pub fn push(&mut self, instruction: &[u8]) -> usize {
        let position = self.0.len();
        self.0.extend_from_slice(instruction);
        position
    }

    /// Overwrites bytes starting at `position` with `instruction`.
    ///
    /// Used to back-patch jump targets and to swap a trailing opcode; the
    /// replacement must not run past the end of the buffer.
    pub fn replace(&mut self, position: usize, instruction: &[u8]) {
        let end = (position + instruction.len()).min(self.0.len());
        let len = end.saturating_sub(position);
        self.0[position..end].copy_from_slice(&instruction[..len]);
    }

    /// Removes everything from `position` onwards.
    pub fn truncate(&mut self, position: usize) {
        self.0.truncate(position);
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Instructions {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromIterator<Vec<u8>> for Instructions {
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Self(iter.into_iter().flatten().collect())
    }
}

impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut i = 0;
        while i < self.0.len() {
            let def = match lookup(self.0[i]) {
                Ok(def) => def,
                Err(e) => {
                    writeln!(f, "{i:04} ERROR: {e}")?;
                    i += 1;
                    continue;
                }
            };

            let Some((operands, read)) = read_operands(&def, &self.0[i + 1..]) else {
                writeln!(
                    f,
                    "{i:04} ERROR: {} needs {} operand bytes, {} remain",
                    def.name,
                    def.operand_bytes(),
                    self.0.len() - i - 1
                )?;
                break;
            };

            write!(f, "{i:04} {}", def.name)?;
            for operand in &operands {
                write!(f, " {operand}")?;
            }
            writeln!(f)?;

            i += 1 + read;
        }
        Ok(())
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instructions(\n{self})")
    }
}
