//! The register/memory model and the instruction set.
//!
//! - [`registers`]: the register file, condition flags, and bus trace
//! - [`memory`]: the fixed-size masked-word memory
//! - [`isa`]: typed instructions and their binary encoding

pub mod isa;
pub mod memory;
pub mod registers;

pub use isa::{encode, opcode_from_word, Instruction, Opcode, Reg};
pub use memory::{Memory, MemoryError};
pub use registers::{BusControl, BusTrace, Cpu, Flags, RegisterFile};
