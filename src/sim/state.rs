//! Observer-facing state types.
//!
//! Everything here is an owned deep copy: observers receive these values and
//! cannot reach the live machine through them. The snapshot shape is the
//! sole contract the rendering/editor/test-output collaborators depend on.

use crate::config::Config;
use crate::cpu::isa::{Instruction, Opcode};
use crate::cpu::registers::{BusTrace, Flags, RegisterFile};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution phase of the simulation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No program loaded.
    Idle,
    /// Program loaded, PC at 0, not halted.
    Ready,
    Fetch,
    Execute,
    /// STORE is the one opcode with an explicit writeback phase.
    Writeback,
    /// Terminal: explicit HLT or fall-through past the last instruction.
    Halt,
}

/// Why a `step()` returned without executing.
///
/// Both reasons leave the CPU halted, but they are deliberately distinct:
/// `NoInstruction` means the program fell off the end, `Halted` means HLT
/// already ran (or the caller kept stepping a stopped machine). The original
/// design conflates the two in the reported phase; callers that care must
/// look at the reason, not the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepReason {
    Halted,
    NoInstruction,
}

impl fmt::Display for StepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepReason::Halted => write!(f, "halted"),
            StepReason::NoInstruction => write!(f, "no_instruction"),
        }
    }
}

/// Deep copy of the CPU's externally visible state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub registers: RegisterFile,
    pub flags: Flags,
    pub bus: BusTrace,
    pub halted: bool,
    pub cycle: u64,
}

/// One line of the loaded program listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramLine {
    /// Memory address of the instruction (its index in the program).
    pub address: usize,
    pub instruction: Instruction,
}

/// Phase and last-action summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Human-readable description of the most recent mutation.
    pub last_action: String,
    pub phase: Phase,
}

/// Full state snapshot handed to observers after every visible mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub cpu: CpuSnapshot,
    pub program: Vec<ProgramLine>,
    pub memory: Vec<u32>,
    pub config: Config,
    pub meta: Meta,
}

/// ALU activity within a micro-step (ADD only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AluTrace {
    pub op: Opcode,
    pub in1: u32,
    pub in2: u32,
    pub out: u32,
}

/// Record of the micro-step just performed, for per-step observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroStep {
    pub phase: Phase,
    /// Human-readable effect, e.g. "A <- 2" or "MEM[10] <- A".
    pub action: String,
    /// Registers and cells touched by this step.
    pub touched: Vec<String>,
    /// Diagram path identifiers active during this step.
    pub active_paths: Vec<String>,
    pub alu: Option<AluTrace>,
}

/// Result of a single `step()` call.
///
/// `ok == false` with a [`StepReason`] is a normal, non-fatal outcome — the
/// machine was (or just became) halted and nothing else changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub ok: bool,
    pub reason: Option<StepReason>,
    pub state: StateSnapshot,
    pub micro_step: Option<MicroStep>,
}
