//! Simulation orchestration: the state machine and its observer-facing
//! snapshot types.

pub mod core;
pub mod state;

pub use self::core::{SimError, SimulationCore, DEFAULT_STEP_BUDGET};
pub use state::{
    AluTrace, CpuSnapshot, Meta, MicroStep, Phase, ProgramLine, StateSnapshot, StepOutcome,
    StepReason,
};
