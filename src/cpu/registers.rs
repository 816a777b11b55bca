//! Register, flag, and bus state of the CPU.
//!
//! The machine has six word-width registers (A, B, DR, AR, PC, SP), an IR
//! holding the opcode of the current fetch, two condition flags (SF, OF), a
//! halted latch, a cycle counter, and a transient bus-trace record that is
//! overwritten on every micro-step.

use crate::cpu::isa::{Opcode, Reg};
use serde::{Deserialize, Serialize};

/// The word-width register file.
///
/// All values are kept masked to the active word length. IR is not a numeric
/// register: it carries the mnemonic of the currently fetched opcode, `None`
/// before the first fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    pub a: u32,
    pub b: u32,
    pub dr: u32,
    pub ar: u32,
    pub pc: u32,
    pub sp: u32,
    pub ir: Option<Opcode>,
}

/// Condition flags, recomputed only by arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// Sign flag: the sign bit of the last masked arithmetic result.
    pub sf: u8,
    /// Overflow flag: set when the masked result differed from the full sum.
    pub of: u8,
}

/// Control tag describing the bus activity of one micro-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusControl {
    Idle,
    Fetch,
    ExecLdi,
    ExecAdd,
    MemRead,
    MemWrite,
    Jmp,
    BranchTaken,
    BranchNotTaken,
    Halt,
}

/// Transient record of which data paths were active in the last micro-step.
///
/// Overwritten every step; purely descriptive, consumed by visualization
/// collaborators and never read back by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusTrace {
    /// Address bus value, if driven.
    pub ab: Option<u32>,
    /// Data bus value, if driven.
    pub db: Option<u32>,
    /// What the control unit was doing.
    pub control: BusControl,
    /// Diagram path identifiers, e.g. "pc-ab", "alu-dr", "dr-a".
    pub active_paths: Vec<String>,
}

impl BusTrace {
    /// The quiescent bus: nothing driven.
    pub fn idle() -> Self {
        Self {
            ab: None,
            db: None,
            control: BusControl::Idle,
            active_paths: Vec::new(),
        }
    }
}

/// The CPU: registers, flags, halted latch, cycle counter, bus trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub registers: RegisterFile,
    pub flags: Flags,
    pub halted: bool,
    pub cycle: u64,
    pub bus: BusTrace,
    word_length: u32,
    memory_size: usize,
}

impl Cpu {
    /// Create a CPU in its reset state.
    pub fn new(word_length: u32, memory_size: usize) -> Self {
        let mut cpu = Self {
            registers: RegisterFile {
                a: 0,
                b: 0,
                dr: 0,
                ar: 0,
                pc: 0,
                sp: 0,
                ir: None,
            },
            flags: Flags::default(),
            halted: false,
            cycle: 0,
            bus: BusTrace::idle(),
            word_length,
            memory_size,
        };
        cpu.reset();
        cpu
    }

    /// Reset to initial state: all registers zero except SP = memory_size - 1,
    /// flags cleared, not halted, cycle zero, bus idle.
    pub fn reset(&mut self) {
        self.registers = RegisterFile {
            a: 0,
            b: 0,
            dr: 0,
            ar: 0,
            pc: 0,
            sp: (self.memory_size - 1) as u32,
            ir: None,
        };
        self.flags = Flags::default();
        self.halted = false;
        self.cycle = 0;
        self.bus = BusTrace::idle();
    }

    /// The active word mask.
    pub fn mask(&self) -> u32 {
        (1u32 << self.word_length) - 1
    }

    /// Clip a value to the active word length.
    pub fn mask_value(&self, value: u32) -> u32 {
        value & self.mask()
    }

    /// The active word length in bits.
    pub fn word_length(&self) -> u32 {
        self.word_length
    }

    /// Change the active word length and re-mask every register in place.
    /// Values are clipped, not sign-extended.
    pub fn set_word_length(&mut self, bits: u32) {
        self.word_length = bits;
        self.mask_registers();
    }

    /// Re-mask all numeric registers to the active word length.
    pub fn mask_registers(&mut self) {
        let mask = self.mask();
        let regs = &mut self.registers;
        regs.a &= mask;
        regs.b &= mask;
        regs.dr &= mask;
        regs.ar &= mask;
        regs.pc &= mask;
        regs.sp &= mask;
    }

    /// Read a general-purpose register.
    pub fn read_register(&self, reg: Reg) -> u32 {
        match reg {
            Reg::A => self.registers.a,
            Reg::B => self.registers.b,
        }
    }

    /// Write a general-purpose register, masking to the active word length.
    pub fn write_register(&mut self, reg: Reg, value: u32) {
        let masked = self.mask_value(value);
        match reg {
            Reg::A => self.registers.a = masked,
            Reg::B => self.registers.b = masked,
        }
    }

    /// Set SF from the sign bit of the masked value and OF from the
    /// caller-supplied overflow indication.
    pub fn update_flags_from_value(&mut self, value: u32, overflow: bool) {
        let masked = self.mask_value(value);
        let sign_bit = 1u32 << (self.word_length - 1);
        self.flags.sf = u8::from(masked & sign_bit != 0);
        self.flags.of = u8::from(overflow);
    }

    /// Record the bus activity of the current micro-step.
    pub fn set_bus(&mut self, bus: BusTrace) {
        self.bus = bus;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reset_state() {
        let mut cpu = Cpu::new(16, 64);
        cpu.registers.a = 5;
        cpu.registers.pc = 7;
        cpu.halted = true;
        cpu.cycle = 12;
        cpu.flags.sf = 1;

        cpu.reset();

        assert_eq!(cpu.registers.a, 0);
        assert_eq!(cpu.registers.pc, 0);
        assert_eq!(cpu.registers.sp, 63);
        assert_eq!(cpu.registers.ir, None);
        assert_eq!(cpu.flags, Flags::default());
        assert!(!cpu.halted);
        assert_eq!(cpu.cycle, 0);
        assert_eq!(cpu.bus, BusTrace::idle());
    }

    #[test]
    fn test_write_register_masks() {
        let mut cpu = Cpu::new(10, 64);
        cpu.write_register(Reg::A, 0xffff);
        assert_eq!(cpu.registers.a, 0x3ff);
    }

    #[test]
    fn test_narrowing_remasks_registers() {
        let mut cpu = Cpu::new(16, 64);
        cpu.write_register(Reg::B, 0xabcd);
        cpu.set_word_length(10);
        // Clipped, not sign-extended
        assert_eq!(cpu.registers.b, 0xabcd & 0x3ff);
    }

    #[test]
    fn test_flags_from_value() {
        let mut cpu = Cpu::new(16, 64);

        cpu.update_flags_from_value(0x8000, false);
        assert_eq!(cpu.flags.sf, 1);
        assert_eq!(cpu.flags.of, 0);

        cpu.update_flags_from_value(1, true);
        assert_eq!(cpu.flags.sf, 0);
        assert_eq!(cpu.flags.of, 1);
    }

    proptest! {
        #[test]
        fn prop_mask_value_idempotent(value in any::<u32>(), bits in prop_oneof![Just(10u32), Just(16u32)]) {
            let cpu = Cpu::new(bits, 64);
            let once = cpu.mask_value(value);
            prop_assert_eq!(cpu.mask_value(once), once);
        }
    }
}
