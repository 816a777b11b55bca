//! # didact
//!
//! An instructional fixed-word-length CPU emulator.
//!
//! The machine is deliberately tiny: two general registers (A, B), a
//! seven-instruction ISA, 64 words of memory, and a configurable word length
//! of 10 or 16 bits. Programs are written in a small line-oriented assembly
//! language, encoded into a binary memory image for display, and executed
//! one micro-step at a time against an explicit register/flag/bus model so
//! that front ends can animate every data path.

pub mod asm;
pub mod config;
pub mod cpu;
pub mod demos;
pub mod runner;
pub mod sim;

// Re-export commonly used types
pub use asm::{parse, ParseError};
pub use config::{Config, ConfigError, DisplayBase, MEMORY_SIZE, SUPPORTED_WORD_LENGTHS};
pub use cpu::{encode, opcode_from_word, Cpu, Instruction, Memory, Opcode, Reg};
pub use demos::{demo_by_id, Demo, DEMO_PROGRAMS};
pub use runner::{RunnerError, SweepReport, TestRunner};
pub use sim::{
    MicroStep, Phase, SimError, SimulationCore, StateSnapshot, StepOutcome, StepReason,
};
