//! The simulation core: the only component with execution semantics.
//!
//! Owns the configuration, CPU, memory, and the typed program, and drives
//! the fetch-decode-execute state machine one micro-step at a time. The
//! typed instruction list is the authoritative execution source; the encoded
//! words in memory are a derived display image, regenerated in full whenever
//! the program or the word length changes.

use crate::asm::{self, ParseError};
use crate::config::{Config, ConfigError, DisplayBase, SUPPORTED_WORD_LENGTHS};
use crate::cpu::isa::{self, Instruction, Opcode};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{BusControl, BusTrace, Cpu};
use crate::sim::state::{
    AluTrace, CpuSnapshot, Meta, MicroStep, Phase, ProgramLine, StateSnapshot, StepOutcome,
    StepReason,
};
use thiserror::Error;

/// Default step budget for [`SimulationCore::run_until_halt`].
pub const DEFAULT_STEP_BUDGET: u64 = 256;

/// Callback fired after every externally visible mutation.
pub type StateListener = Box<dyn FnMut(&StateSnapshot)>;

/// Callback fired after every successful step.
pub type StepListener = Box<dyn FnMut(&StateSnapshot, &MicroStep)>;

/// The emulator state machine.
pub struct SimulationCore {
    config: Config,
    cpu: Cpu,
    memory: Memory,
    program: Vec<Instruction>,
    last_action: String,
    phase: Phase,
    listeners: Vec<StateListener>,
    step_listeners: Vec<StepListener>,
}

impl SimulationCore {
    /// Create an idle core with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// Create an idle core with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let cpu = Cpu::new(config.word_length, config.memory_size);
        let memory = Memory::new(config.memory_size, config.word_length);
        Self {
            config,
            cpu,
            memory,
            program: Vec::new(),
            last_action: "Not started".to_string(),
            phase: Phase::Idle,
            listeners: Vec::new(),
            step_listeners: Vec::new(),
        }
    }

    /// Register a state-change observer, invoked in registration order.
    pub fn on_state_change<F>(&mut self, listener: F)
    where
        F: FnMut(&StateSnapshot) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Register a per-step observer, invoked in registration order.
    pub fn on_step<F>(&mut self, listener: F)
    where
        F: FnMut(&StateSnapshot, &MicroStep) + 'static,
    {
        self.step_listeners.push(Box::new(listener));
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The loaded typed program.
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Whether the CPU has halted.
    pub fn is_halted(&self) -> bool {
        self.cpu.halted
    }

    /// Build a deep-copy snapshot of the full externally visible state.
    pub fn state(&self) -> StateSnapshot {
        StateSnapshot {
            cpu: CpuSnapshot {
                registers: self.cpu.registers.clone(),
                flags: self.cpu.flags,
                bus: self.cpu.bus.clone(),
                halted: self.cpu.halted,
                cycle: self.cpu.cycle,
            },
            program: self
                .program
                .iter()
                .enumerate()
                .map(|(address, &instruction)| ProgramLine { address, instruction })
                .collect(),
            memory: self.memory.snapshot(),
            config: self.config.clone(),
            meta: Meta {
                last_action: self.last_action.clone(),
                phase: self.phase,
            },
        }
    }

    fn notify_state_change(&mut self) {
        let state = self.state();
        for listener in &mut self.listeners {
            listener(&state);
        }
    }

    fn notify_step(&mut self, state: &StateSnapshot, micro_step: &MicroStep) {
        for listener in &mut self.step_listeners {
            listener(state, micro_step);
        }
    }

    /// Change the display base. Display-only; execution is unaffected.
    pub fn set_display_base(&mut self, base: DisplayBase) {
        self.config.set_display_base(base);
        self.notify_state_change();
    }

    /// Change the active word length.
    ///
    /// All-or-nothing: the currently loaded program is re-validated against
    /// the new width first, so a narrowing switch that would overflow an
    /// existing immediate or address leaves every register, memory cell, and
    /// config field unchanged.
    pub fn set_word_length(&mut self, bits: u32) -> Result<(), SimError> {
        if !SUPPORTED_WORD_LENGTHS.contains(&bits) {
            return Err(ConfigError::UnsupportedWordLength(bits).into());
        }
        self.validate_program_constraints(&self.program, bits)?;

        self.config.set_word_length(bits)?;
        self.cpu.set_word_length(bits);
        self.memory.set_word_length(bits);
        self.rewrite_program_image();
        self.last_action = format!("Word length switched to {}-bit", bits);
        self.notify_state_change();
        Ok(())
    }

    /// Parse, validate, and load a program.
    ///
    /// On success the CPU and memory are reset, the typed program stored,
    /// the encoded image rewritten, and the phase becomes `Ready`. Returns
    /// the instruction count. On failure nothing previously committed
    /// changes.
    pub fn load_program(&mut self, source: &str) -> Result<usize, SimError> {
        let parsed = asm::parse(source)?;
        if parsed.len() > self.config.memory_size {
            return Err(SimError::ProgramTooLarge {
                count: parsed.len(),
                capacity: self.config.memory_size,
            });
        }
        self.validate_program_constraints(&parsed, self.config.word_length)?;

        let count = parsed.len();
        self.cpu.reset();
        self.memory.reset();
        self.program = parsed;
        self.rewrite_program_image();
        self.last_action = format!("Program loaded ({} instructions)", count);
        self.phase = Phase::Ready;
        self.notify_state_change();
        Ok(count)
    }

    /// Clear CPU and memory state, keeping (and re-encoding) any loaded
    /// program, and return to the idle phase.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.memory.reset();
        if !self.program.is_empty() {
            self.rewrite_program_image();
        }
        self.last_action = "Reset".to_string();
        self.phase = Phase::Idle;
        self.notify_state_change();
    }

    /// Check every instruction against the given word length and the memory
    /// bounds: LDI immediates must fit the signed `bits`-bit range, address
    /// operands must fall inside memory. Runs at load time and before any
    /// word-length change.
    pub fn validate_program_constraints(
        &self,
        program: &[Instruction],
        bits: u32,
    ) -> Result<(), SimError> {
        let min_signed = -(1i64 << (bits - 1));
        let max_signed = (1i64 << (bits - 1)) - 1;

        for (index, instruction) in program.iter().enumerate() {
            match *instruction {
                Instruction::Ldi { value, .. } => {
                    let value = i64::from(value);
                    if value < min_signed || value > max_signed {
                        return Err(SimError::ImmediateOutOfRange {
                            index,
                            value,
                            bits,
                            min: min_signed,
                            max: max_signed,
                        });
                    }
                }
                Instruction::Store { address, .. }
                | Instruction::Load { address, .. }
                | Instruction::Jmp { address }
                | Instruction::Jz { address, .. } => {
                    if address >= self.config.memory_size {
                        return Err(SimError::AddressOutOfRange {
                            index,
                            address,
                            memory_size: self.config.memory_size,
                        });
                    }
                }
                Instruction::Add { .. } | Instruction::Hlt => {}
            }
        }
        Ok(())
    }

    /// Regenerate the encoded memory image from the typed program, in one
    /// pass. Never patched incrementally.
    fn rewrite_program_image(&mut self) {
        let bits = self.config.word_length;
        for (address, instruction) in self.program.iter().enumerate() {
            let word = isa::encode(instruction, bits);
            // Cannot fail: load_program rejects programs larger than memory.
            let _ = self.memory.write(address, word);
        }
    }

    /// Execute one fetch-execute(-writeback) cycle.
    ///
    /// A halted CPU or a PC past the last instruction yields a non-fatal
    /// `ok = false` outcome; see [`StepReason`]. Everything else performs
    /// exactly one instruction, advances the cycle counter, and notifies
    /// both observer channels.
    pub fn step(&mut self) -> Result<StepOutcome, SimError> {
        if self.cpu.halted {
            self.last_action = "CPU is halted".to_string();
            self.phase = Phase::Halt;
            self.notify_state_change();
            return Ok(StepOutcome {
                ok: false,
                reason: Some(StepReason::Halted),
                state: self.state(),
                micro_step: None,
            });
        }

        let pc = self.cpu.registers.pc as usize;
        let Some(&instruction) = self.program.get(pc) else {
            // Fall-through halt: execution reached an address with no
            // instruction.
            self.cpu.halted = true;
            self.phase = Phase::Halt;
            self.last_action = format!("No instruction at PC={}; halting", pc);
            self.notify_state_change();
            return Ok(StepOutcome {
                ok: false,
                reason: Some(StepReason::NoInstruction),
                state: self.state(),
                micro_step: None,
            });
        };

        // Fetch: AR takes the PC, DR the encoded word, IR the opcode.
        self.phase = Phase::Fetch;
        let fetched = self.memory.read(pc)?;
        self.cpu.registers.ar = pc as u32;
        self.cpu.registers.dr = fetched;
        self.cpu.registers.ir = Some(instruction.opcode());
        self.cpu.set_bus(BusTrace {
            ab: Some(pc as u32),
            db: Some(fetched),
            control: BusControl::Fetch,
            active_paths: paths(&["pc-ab", "ab-memory", "memory-ir"]),
        });

        self.phase = Phase::Execute;
        let micro_step = self.execute(instruction, pc)?;

        // Every register is re-masked at the end of the step; A and B are
        // masked at write time.
        self.cpu.registers.pc = self.cpu.mask_value(self.cpu.registers.pc);
        self.cpu.registers.ar = self.cpu.mask_value(self.cpu.registers.ar);
        self.cpu.registers.dr = self.cpu.mask_value(self.cpu.registers.dr);
        self.cpu.registers.sp = self.cpu.mask_value(self.cpu.registers.sp);

        self.cpu.cycle += 1;
        self.last_action = micro_step.action.clone();

        let state = self.state();
        self.notify_state_change();
        self.notify_step(&state, &micro_step);

        Ok(StepOutcome {
            ok: true,
            reason: None,
            state,
            micro_step: Some(micro_step),
        })
    }

    /// Per-opcode execute effects. Returns the micro-step record.
    fn execute(&mut self, instruction: Instruction, pc: usize) -> Result<MicroStep, SimError> {
        match instruction {
            Instruction::Ldi { reg, value } => {
                self.cpu.write_register(reg, value as u32);
                self.cpu.registers.dr = self.cpu.mask_value(value as u32);
                let active = paths(&["ir-control", "control-dr"]);
                let active = with_path(active, format!("dr-{}", reg.path_name()));
                self.cpu.set_bus(BusTrace {
                    ab: Some(pc as u32),
                    db: Some(self.cpu.registers.dr),
                    control: BusControl::ExecLdi,
                    active_paths: active.clone(),
                });
                self.cpu.registers.pc += 1;
                Ok(MicroStep {
                    phase: Phase::Execute,
                    action: format!("{} <- {}", reg, value),
                    touched: touched(&["IR", "DR"], &[reg.to_string()]),
                    active_paths: active,
                    alu: None,
                })
            }
            Instruction::Add { dest, src } => {
                let lhs = self.cpu.read_register(dest);
                let rhs = self.cpu.read_register(src);
                let full = u64::from(lhs) + u64::from(rhs);
                let masked = self.cpu.mask_value(full as u32);
                // Overflow iff masking changed the full-precision sum.
                let overflow = full != u64::from(masked);
                self.cpu.write_register(dest, masked);
                self.cpu.registers.dr = masked;
                self.cpu.update_flags_from_value(masked, overflow);
                let active = vec![
                    format!("{}-alu", dest.path_name()),
                    format!("{}-alu", src.path_name()),
                    "alu-dr".to_string(),
                    format!("dr-{}", dest.path_name()),
                ];
                self.cpu.set_bus(BusTrace {
                    ab: Some(pc as u32),
                    db: Some(masked),
                    control: BusControl::ExecAdd,
                    active_paths: active.clone(),
                });
                self.cpu.registers.pc += 1;
                Ok(MicroStep {
                    phase: Phase::Execute,
                    action: format!("{} <- {} + {}", dest, dest, src),
                    touched: touched(&["IR"], &[dest.to_string(), src.to_string(), "DR".to_string(), "ALU".to_string()]),
                    active_paths: active,
                    alu: Some(AluTrace {
                        op: Opcode::Add,
                        in1: lhs,
                        in2: rhs,
                        out: masked,
                    }),
                })
            }
            Instruction::Store { reg, address } => {
                let value = self.cpu.read_register(reg);
                self.cpu.registers.ar = address as u32;
                self.cpu.registers.dr = value;
                self.memory.write(address, value)?;
                self.phase = Phase::Writeback;
                let active = vec![format!("{}-dr", reg.path_name()), "dr-memory".to_string()];
                self.cpu.set_bus(BusTrace {
                    ab: Some(address as u32),
                    db: Some(value),
                    control: BusControl::MemWrite,
                    active_paths: active.clone(),
                });
                self.cpu.registers.pc += 1;
                Ok(MicroStep {
                    phase: Phase::Writeback,
                    action: format!("MEM[{}] <- {}", address, reg),
                    touched: touched(
                        &["IR", "AR", "DR"],
                        &[reg.to_string(), format!("MEM[{}]", address)],
                    ),
                    active_paths: active,
                    alu: None,
                })
            }
            Instruction::Load { reg, address } => {
                self.cpu.registers.ar = address as u32;
                let value = self.memory.read(address)?;
                self.cpu.registers.dr = value;
                self.cpu.write_register(reg, value);
                let active = paths(&["ab-memory", "memory-ir", "control-dr"]);
                let active = with_path(active, format!("dr-{}", reg.path_name()));
                self.cpu.set_bus(BusTrace {
                    ab: Some(address as u32),
                    db: Some(value),
                    control: BusControl::MemRead,
                    active_paths: active.clone(),
                });
                self.cpu.registers.pc += 1;
                Ok(MicroStep {
                    phase: Phase::Execute,
                    action: format!("{} <- MEM[{}]", reg, address),
                    touched: touched(
                        &["IR", "AR", "DR"],
                        &[reg.to_string(), format!("MEM[{}]", address)],
                    ),
                    active_paths: active,
                    alu: None,
                })
            }
            Instruction::Jmp { address } => {
                self.cpu.registers.pc = address as u32;
                let active = paths(&["ir-control", "pc-ab"]);
                self.cpu.set_bus(BusTrace {
                    ab: Some(address as u32),
                    db: Some(address as u32),
                    control: BusControl::Jmp,
                    active_paths: active.clone(),
                });
                Ok(MicroStep {
                    phase: Phase::Execute,
                    action: format!("PC <- {}", address),
                    touched: touched(&["IR", "PC"], &[]),
                    active_paths: active,
                    alu: None,
                })
            }
            Instruction::Jz { reg, address } => {
                let reg_value = self.cpu.read_register(reg);
                let taken = reg_value == 0;
                self.cpu.registers.pc = if taken {
                    address as u32
                } else {
                    self.cpu.registers.pc + 1
                };
                let active = vec![
                    "ir-control".to_string(),
                    format!("{}-alu", reg.path_name()),
                    "pc-ab".to_string(),
                ];
                self.cpu.set_bus(BusTrace {
                    ab: Some(self.cpu.registers.pc),
                    db: Some(reg_value),
                    control: if taken {
                        BusControl::BranchTaken
                    } else {
                        BusControl::BranchNotTaken
                    },
                    active_paths: active.clone(),
                });
                Ok(MicroStep {
                    phase: Phase::Execute,
                    action: if taken {
                        format!("JZ {} taken -> {}", reg, address)
                    } else {
                        format!("JZ {} not taken", reg)
                    },
                    touched: touched(&["IR"], &[reg.to_string(), "PC".to_string()]),
                    active_paths: active,
                    alu: None,
                })
            }
            Instruction::Hlt => {
                self.cpu.halted = true;
                self.phase = Phase::Halt;
                let active = paths(&["ir-control"]);
                self.cpu.set_bus(BusTrace {
                    ab: None,
                    db: None,
                    control: BusControl::Halt,
                    active_paths: active.clone(),
                });
                Ok(MicroStep {
                    phase: Phase::Halt,
                    action: "HALT".to_string(),
                    touched: touched(&["IR", "CONTROL"], &[]),
                    active_paths: active,
                    alu: None,
                })
            }
        }
    }

    /// Step until the CPU halts, with the default budget of
    /// [`DEFAULT_STEP_BUDGET`] steps.
    pub fn run_until_halt(&mut self) -> Result<StateSnapshot, SimError> {
        self.run_limited(DEFAULT_STEP_BUDGET)
    }

    /// Step until the CPU halts or `max_steps` steps pass.
    ///
    /// The budget is a hard cap against non-terminating programs; exceeding
    /// it fails with [`SimError::NonTermination`]. Any non-fatal step reason
    /// other than "halted" (i.e. a fall-through) is surfaced as a fatal
    /// [`SimError::ExecutionFailed`].
    pub fn run_limited(&mut self, max_steps: u64) -> Result<StateSnapshot, SimError> {
        for _ in 0..max_steps {
            if self.cpu.halted {
                return Ok(self.state());
            }

            let outcome = self.step()?;
            if let Some(reason) = outcome.reason {
                if reason != StepReason::Halted {
                    return Err(SimError::ExecutionFailed { reason });
                }
            }
            if outcome.state.cpu.halted {
                return Ok(outcome.state);
            }
        }

        Err(SimError::NonTermination { max_steps })
    }
}

impl Default for SimulationCore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulationCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationCore")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("program_len", &self.program.len())
            .field("cycle", &self.cpu.cycle)
            .field("halted", &self.cpu.halted)
            .finish()
    }
}

fn paths(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn with_path(mut paths: Vec<String>, path: String) -> Vec<String> {
    paths.push(path);
    paths
}

fn touched(fixed: &[&str], dynamic: &[String]) -> Vec<String> {
    fixed
        .iter()
        .map(|s| s.to_string())
        .chain(dynamic.iter().cloned())
        .collect()
}

/// Errors from loading, reconfiguring, or running programs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("program too large: {count} instructions (max {capacity})")]
    ProgramTooLarge { count: usize, capacity: usize },

    #[error("instruction {index}: immediate {value} does not fit signed {bits}-bit range ({min}..{max})")]
    ImmediateOutOfRange {
        index: usize,
        value: i64,
        bits: u32,
        min: i64,
        max: i64,
    },

    #[error("instruction {index}: address {address} out of range (0..{})", .memory_size - 1)]
    AddressOutOfRange {
        index: usize,
        address: usize,
        memory_size: usize,
    },

    #[error("memory fault: {0}")]
    Memory(#[from] MemoryError),

    #[error("execution failed: {reason}")]
    ExecutionFailed { reason: StepReason },

    #[error("execution did not halt within {max_steps} steps")]
    NonTermination { max_steps: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::isa::Reg;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn run(source: &str) -> StateSnapshot {
        let mut core = SimulationCore::new();
        core.load_program(source).unwrap();
        core.run_until_halt().unwrap()
    }

    #[test]
    fn test_add_and_store() {
        let state = run("LDI A, 2\nLDI B, 3\nADD A, B\nSTORE A, 10\nHLT");
        assert_eq!(state.cpu.registers.a, 5);
        assert_eq!(state.cpu.registers.b, 3);
        assert_eq!(state.memory[10], 5);
        assert!(state.cpu.halted);
        assert_eq!(state.cpu.cycle, 5);
    }

    #[test]
    fn test_branch_taken() {
        let state = run("LDI A, 0\nJZ A, 4\nLDI B, 9\nJMP 5\nLDI B, 7\nHLT");
        assert_eq!(state.cpu.registers.b, 7);
        assert!(state.cpu.halted);
    }

    #[test]
    fn test_branch_not_taken() {
        let state = run("LDI A, 1\nJZ A, 4\nLDI B, 9\nJMP 5\nLDI B, 7\nHLT");
        assert_eq!(state.cpu.registers.b, 9);
        assert!(state.cpu.halted);
    }

    #[test]
    fn test_negative_immediate_bit_pattern() {
        let state = run("LDI A, -1\nSTORE A, 30\nHLT");
        assert_eq!(state.cpu.registers.a, 65535);
        assert_eq!(state.memory[30], 65535);
        assert!(state.cpu.halted);
    }

    #[test]
    fn test_ldi_mirrors_dr() {
        let mut core = SimulationCore::new();
        core.load_program("LDI B, 12\nHLT").unwrap();
        let outcome = core.step().unwrap();
        assert_eq!(outcome.state.cpu.registers.dr, 12);
        assert_eq!(outcome.state.cpu.registers.b, 12);
    }

    #[test]
    fn test_add_sets_overflow_and_sign() {
        // 65535 + 1 wraps to 0: OF set, SF clear
        let state = run("LDI A, -1\nLDI B, 1\nADD A, B\nHLT");
        assert_eq!(state.cpu.registers.a, 0);
        assert_eq!(state.cpu.flags.of, 1);
        assert_eq!(state.cpu.flags.sf, 0);

        // 0x7fff + 1 = 0x8000: sign bit set, no carry out
        let state = run("LDI A, 32767\nLDI B, 1\nADD A, B\nHLT");
        assert_eq!(state.cpu.registers.a, 0x8000);
        assert_eq!(state.cpu.flags.of, 0);
        assert_eq!(state.cpu.flags.sf, 1);
    }

    #[test]
    fn test_load_reads_memory() {
        let state = run("LDI A, 12\nSTORE A, 20\nLDI A, 0\nLOAD B, 20\nHLT");
        assert_eq!(state.cpu.registers.a, 0);
        assert_eq!(state.cpu.registers.b, 12);
        assert_eq!(state.memory[20], 12);
    }

    #[test]
    fn test_program_too_large_leaves_state_intact() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 5\nHLT").unwrap();
        let before = core.state();

        let mut big = String::new();
        for _ in 0..65 {
            big.push_str("HLT\n");
        }
        let err = core.load_program(&big).unwrap_err();
        assert_eq!(
            err,
            SimError::ProgramTooLarge { count: 65, capacity: 64 }
        );
        assert_eq!(core.state(), before);
    }

    #[test]
    fn test_step_after_halt_is_nonfatal_and_inert() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 3\nHLT").unwrap();
        core.run_until_halt().unwrap();
        let before = core.state();

        let outcome = core.step().unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.reason, Some(StepReason::Halted));
        assert!(outcome.micro_step.is_none());
        assert_eq!(outcome.state.cpu.registers, before.cpu.registers);
        assert_eq!(outcome.state.cpu.cycle, before.cpu.cycle);
        assert_eq!(outcome.state.memory, before.memory);
    }

    #[test]
    fn test_fall_through_halts_with_distinct_reason() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 1").unwrap();
        core.step().unwrap();

        let outcome = core.step().unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.reason, Some(StepReason::NoInstruction));
        assert!(outcome.state.cpu.halted);
    }

    #[test]
    fn test_run_treats_fall_through_as_fatal() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 1").unwrap();
        let err = core.run_until_halt().unwrap_err();
        assert_eq!(
            err,
            SimError::ExecutionFailed { reason: StepReason::NoInstruction }
        );
    }

    #[test]
    fn test_infinite_loop_hits_step_budget() {
        let mut core = SimulationCore::new();
        core.load_program("JMP 0").unwrap();
        let err = core.run_until_halt().unwrap_err();
        assert_eq!(err, SimError::NonTermination { max_steps: 256 });
    }

    #[test]
    fn test_run_is_deterministic() {
        let source = "LDI A, 2\nJMP 3\nLDI A, 9\nLDI B, 4\nADD A, B\nHLT";
        let first = run(source);
        let second = run(source);
        assert_eq!(first.cpu, second.cpu);
        assert_eq!(first.memory, second.memory);
    }

    #[test]
    fn test_word_length_switch_reencodes_image() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 2\nHLT").unwrap();
        assert_eq!(
            core.state().memory[0],
            isa::encode(&Instruction::Ldi { reg: Reg::A, value: 2 }, 16)
        );

        core.set_word_length(10).unwrap();
        let state = core.state();
        assert_eq!(state.config.word_length, 10);
        assert_eq!(
            state.memory[0],
            isa::encode(&Instruction::Ldi { reg: Reg::A, value: 2 }, 10)
        );
        assert_eq!(state.memory[1], isa::encode(&Instruction::Hlt, 10));
    }

    #[test]
    fn test_word_length_switch_is_all_or_nothing() {
        let mut core = SimulationCore::new();
        // 600 fits signed 16-bit but not signed 10-bit (-512..511)
        core.load_program("LDI A, 600\nHLT").unwrap();
        core.run_until_halt().unwrap();
        let before = core.state();

        let err = core.set_word_length(10).unwrap_err();
        assert!(matches!(err, SimError::ImmediateOutOfRange { index: 0, .. }));
        assert_eq!(core.state(), before);
    }

    #[test]
    fn test_unsupported_word_length_rejected() {
        let mut core = SimulationCore::new();
        let err = core.set_word_length(12).unwrap_err();
        assert_eq!(err, SimError::Config(ConfigError::UnsupportedWordLength(12)));
    }

    #[test]
    fn test_load_rejects_out_of_range_address() {
        let mut core = SimulationCore::new();
        let err = core.load_program("STORE A, 64\nHLT").unwrap_err();
        assert_eq!(
            err,
            SimError::AddressOutOfRange { index: 0, address: 64, memory_size: 64 }
        );
    }

    #[test]
    fn test_reset_retains_program() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 7\nSTORE A, 12\nHLT").unwrap();
        core.run_until_halt().unwrap();
        core.reset();

        let state = core.state();
        assert_eq!(state.cpu.registers.a, 0);
        assert_eq!(state.cpu.registers.sp, 63);
        assert_eq!(state.memory[12], 0);
        assert!(!state.cpu.halted);
        assert_eq!(state.meta.phase, Phase::Idle);
        // Program listing and encoded image survive the reset
        assert_eq!(state.program.len(), 3);
        assert_ne!(state.memory[0], 0);

        core.run_until_halt().unwrap();
        assert_eq!(core.state().memory[12], 7);
    }

    #[test]
    fn test_observers_fire_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut core = SimulationCore::new();

        let first = Rc::clone(&log);
        core.on_state_change(move |_| first.borrow_mut().push(1));
        let second = Rc::clone(&log);
        core.on_state_change(move |_| second.borrow_mut().push(2));

        core.load_program("HLT").unwrap();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_snapshots_are_isolated_from_live_state() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 2\nLDI B, 3\nHLT").unwrap();
        let snapshot = core.step().unwrap().state;
        assert_eq!(snapshot.cpu.registers.a, 2);

        core.step().unwrap();
        // The earlier snapshot is a deep copy; later steps do not reach it.
        assert_eq!(snapshot.cpu.registers.b, 0);
        assert_eq!(snapshot.cpu.cycle, 1);
    }

    #[test]
    fn test_step_observer_sees_micro_step() {
        let actions = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&actions);

        let mut core = SimulationCore::new();
        core.on_step(move |state, micro| {
            sink.borrow_mut()
                .push((state.cpu.cycle, micro.action.clone()));
        });
        core.load_program("LDI A, 2\nSTORE A, 10\nHLT").unwrap();
        core.run_until_halt().unwrap();

        let actions = actions.borrow();
        assert_eq!(
            *actions,
            vec![
                (1, "A <- 2".to_string()),
                (2, "MEM[10] <- A".to_string()),
                (3, "HALT".to_string()),
            ]
        );
    }

    #[test]
    fn test_store_reports_writeback_phase() {
        let mut core = SimulationCore::new();
        core.load_program("LDI A, 1\nSTORE A, 0\nHLT").unwrap();
        core.step().unwrap();
        let outcome = core.step().unwrap();
        let micro = outcome.micro_step.unwrap();
        assert_eq!(micro.phase, Phase::Writeback);
        assert_eq!(outcome.state.meta.phase, Phase::Writeback);
    }

    #[test]
    fn test_bus_trace_for_fetch_then_halt() {
        let mut core = SimulationCore::new();
        core.load_program("HLT").unwrap();
        let outcome = core.step().unwrap();
        let bus = &outcome.state.cpu.bus;
        assert_eq!(bus.control, BusControl::Halt);
        assert_eq!(bus.ab, None);
        assert_eq!(bus.db, None);
        assert_eq!(bus.active_paths, vec!["ir-control".to_string()]);
    }
}
