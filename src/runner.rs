//! Demo sweep runner.
//!
//! Drives the simulation core through the demo catalog and checks each
//! program's final state against its declared outcome. Errors during load
//! or run become failing results with the error message as the sole detail,
//! never panics or propagation out of the sweep.

use crate::cpu::isa::Reg;
use crate::demos::{self, Demo, Expected};
use crate::sim::{SimError, SimulationCore, StateSnapshot};
use thiserror::Error;

/// Verdict for one demo program.
#[derive(Debug, Clone)]
pub struct DemoVerdict {
    pub id: &'static str,
    pub name: &'static str,
    pub pass: bool,
    /// On pass: the checked values. On fail: the mismatches or the error.
    pub details: Vec<String>,
}

/// Aggregate result of a full sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub pass_count: usize,
    pub total: usize,
    pub results: Vec<DemoVerdict>,
}

impl SweepReport {
    pub fn all_passed(&self) -> bool {
        self.pass_count == self.total
    }
}

/// Errors from running a single named demo.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("unknown demo: {0}")]
    UnknownDemo(String),

    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Runs demo programs against a simulation core.
pub struct TestRunner<'a> {
    core: &'a mut SimulationCore,
}

impl<'a> TestRunner<'a> {
    pub fn new(core: &'a mut SimulationCore) -> Self {
        Self { core }
    }

    /// Load and run one demo to halt, returning the final state.
    pub fn run_demo(&mut self, id: &str) -> Result<StateSnapshot, RunnerError> {
        let demo = demos::demo_by_id(id).ok_or_else(|| RunnerError::UnknownDemo(id.to_string()))?;
        self.core.load_program(demo.source)?;
        Ok(self.core.run_until_halt()?)
    }

    /// Run every demo in `demos` and check its declared outcome.
    pub fn run_all(&mut self, demos: &[Demo]) -> SweepReport {
        let mut results = Vec::with_capacity(demos.len());

        for demo in demos {
            let verdict = match self.run_demo(demo.id) {
                Ok(state) => {
                    let bits = self.core.config().word_length;
                    let (pass, details) = check_expected(&state, &demo.expected, bits);
                    DemoVerdict {
                        id: demo.id,
                        name: demo.name,
                        pass,
                        details,
                    }
                }
                Err(error) => DemoVerdict {
                    id: demo.id,
                    name: demo.name,
                    pass: false,
                    details: vec![error.to_string()],
                },
            };
            results.push(verdict);
        }

        SweepReport {
            pass_count: results.iter().filter(|r| r.pass).count(),
            total: results.len(),
            results,
        }
    }
}

/// Compare a final state against a declared outcome.
///
/// Negative expectations are normalized by masking to the active word width,
/// so an expected `-1` matches the stored two's-complement bit pattern.
fn check_expected(state: &StateSnapshot, expected: &Expected, bits: u32) -> (bool, Vec<String>) {
    let mask = (1i64 << bits) - 1;
    let normalize = |value: i64| if value < 0 { value & mask } else { value };
    let mut details = Vec::new();
    let mut failures = Vec::new();

    if let Some(halted) = expected.halted {
        if state.cpu.halted == halted {
            details.push(format!("halted={}", state.cpu.halted));
        } else {
            failures.push(format!(
                "halted expected {}, got {}",
                halted, state.cpu.halted
            ));
        }
    }

    for &(reg, expected_value) in expected.registers {
        let actual = i64::from(match reg {
            Reg::A => state.cpu.registers.a,
            Reg::B => state.cpu.registers.b,
        });
        let wanted = normalize(expected_value);
        if actual == wanted {
            details.push(format!("{}={}", reg, actual));
        } else {
            failures.push(format!("register {} expected {}, got {}", reg, wanted, actual));
        }
    }

    for &(address, expected_value) in expected.memory {
        let actual = i64::from(state.memory[address]);
        let wanted = normalize(expected_value);
        if actual == wanted {
            details.push(format!("M[{}]={}", address, actual));
        } else {
            failures.push(format!(
                "memory[{}] expected {}, got {}",
                address, wanted, actual
            ));
        }
    }

    if failures.is_empty() {
        (true, details)
    } else {
        (false, failures)
    }
}
