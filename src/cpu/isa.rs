//! Instruction set: typed instructions and their binary encoding.
//!
//! The machine has seven instructions over two general registers (A, B).
//! Programs execute from the typed [`Instruction`] list; the packed words
//! produced by [`encode`] exist only so the memory image shown to display
//! consumers matches what a real machine would hold.
//!
//! Word layout: top 4 bits are the opcode tag, the remaining
//! `word_length - 4` bits are the operand payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A general-purpose register name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reg {
    A,
    B,
}

impl Reg {
    /// Selector bit used in the binary encoding (0 = A, 1 = B).
    pub fn selector(self) -> u32 {
        match self {
            Reg::A => 0,
            Reg::B => 1,
        }
    }

    /// Lower-case name, used for bus path identifiers ("dr-a").
    pub fn path_name(self) -> &'static str {
        match self {
            Reg::A => "a",
            Reg::B => "b",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::A => write!(f, "A"),
            Reg::B => write!(f, "B"),
        }
    }
}

/// Opcode identity, separate from operands.
///
/// Held in the IR after a fetch and used as the encoded word's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Ldi,
    Add,
    Store,
    Load,
    Jmp,
    Jz,
    Hlt,
}

impl Opcode {
    /// The 4-bit tag stored in the top of every encoded word.
    pub fn tag(self) -> u32 {
        match self {
            Opcode::Ldi => 1,
            Opcode::Add => 2,
            Opcode::Store => 3,
            Opcode::Load => 4,
            Opcode::Jmp => 5,
            Opcode::Jz => 6,
            Opcode::Hlt => 15,
        }
    }

    /// Recover an opcode from its tag value.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Opcode::Ldi),
            2 => Some(Opcode::Add),
            3 => Some(Opcode::Store),
            4 => Some(Opcode::Load),
            5 => Some(Opcode::Jmp),
            6 => Some(Opcode::Jz),
            15 => Some(Opcode::Hlt),
            _ => None,
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Ldi => "LDI",
            Opcode::Add => "ADD",
            Opcode::Store => "STORE",
            Opcode::Load => "LOAD",
            Opcode::Jmp => "JMP",
            Opcode::Jz => "JZ",
            Opcode::Hlt => "HLT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// A parsed instruction.
///
/// Immutable once parsed; the program is an ordered sequence whose index is
/// the memory address of the instruction. Range checks on immediates and
/// addresses are not done here — the simulation core validates against the
/// active word length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Instruction {
    /// Load a signed immediate into a register.
    Ldi { reg: Reg, value: i32 },
    /// Add source into destination, updating SF/OF.
    Add { dest: Reg, src: Reg },
    /// Read a memory cell into a register.
    Load { reg: Reg, address: usize },
    /// Write a register into a memory cell.
    Store { reg: Reg, address: usize },
    /// Unconditional jump.
    Jmp { address: usize },
    /// Jump if the tested register is exactly zero.
    Jz { reg: Reg, address: usize },
    /// Stop execution.
    Hlt,
}

impl Instruction {
    /// The opcode identity of this instruction.
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Ldi { .. } => Opcode::Ldi,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Store { .. } => Opcode::Store,
            Instruction::Load { .. } => Opcode::Load,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Jz { .. } => Opcode::Jz,
            Instruction::Hlt => Opcode::Hlt,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Ldi { reg, value } => write!(f, "LDI {}, {}", reg, value),
            Instruction::Add { dest, src } => write!(f, "ADD {}, {}", dest, src),
            Instruction::Load { reg, address } => write!(f, "LOAD {}, {}", reg, address),
            Instruction::Store { reg, address } => write!(f, "STORE {}, {}", reg, address),
            Instruction::Jmp { address } => write!(f, "JMP {}", address),
            Instruction::Jz { reg, address } => write!(f, "JZ {}, {}", reg, address),
            Instruction::Hlt => write!(f, "HLT"),
        }
    }
}

/// Encode an instruction into a packed word for the given word length.
///
/// Out-of-range operands are masked, never rejected; range rejection happens
/// in the simulation core's validation pass before any encoding. In 10-bit
/// mode the register-selector bit of STORE/LOAD/JZ (bit 6) falls outside the
/// 6-bit payload and is masked away.
pub fn encode(instruction: &Instruction, word_length: u32) -> u32 {
    let payload_bits = word_length - 4;
    let payload_mask = (1u32 << payload_bits) - 1;
    let word_mask = (1u32 << word_length) - 1;

    let operand = match *instruction {
        Instruction::Ldi { reg, value } => {
            let imm_bits = payload_bits - 1;
            let imm_mask = (1u32 << imm_bits) - 1;
            (reg.selector() << imm_bits) | ((value as u32 & word_mask) & imm_mask)
        }
        Instruction::Add { dest, src } => (dest.selector() << 1) | src.selector(),
        Instruction::Store { reg, address } | Instruction::Load { reg, address } => {
            (reg.selector() << 6) | (address as u32 & 0x3f)
        }
        Instruction::Jmp { address } => address as u32 & 0x3f,
        Instruction::Jz { reg, address } => (reg.selector() << 6) | (address as u32 & 0x3f),
        Instruction::Hlt => 0,
    };

    ((instruction.opcode().tag() << payload_bits) | (operand & payload_mask)) & word_mask
}

/// Extract the opcode tag from an encoded word.
///
/// Operand bits are not recoverable in general (immediates are truncated to
/// their slot), but the opcode identity always is.
pub fn opcode_from_word(word: u32, word_length: u32) -> Option<Opcode> {
    Opcode::from_tag(word >> (word_length - 4))
}
