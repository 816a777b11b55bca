//! didact-emu - CLI entry point
//!
//! Commands:
//! - `didact-emu run <source.asm>` - Assemble and run a program to halt
//! - `didact-emu demo <id>` - Run a built-in demo program
//! - `didact-emu list` - List the demo catalog
//! - `didact-emu test` - Run the full demo sweep

use clap::{Parser, Subcommand};
use didact::{DisplayBase, SimulationCore, StateSnapshot, TestRunner, DEMO_PROGRAMS};

#[derive(Parser)]
#[command(name = "didact-emu")]
#[command(version = "0.1.0")]
#[command(about = "An instructional fixed-word-length CPU emulator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a source file and run it until it halts
    Run {
        /// Path to the assembly source file
        source: String,
        /// Word length in bits (10 or 16)
        #[arg(short, long, default_value_t = 16)]
        bits: u32,
        /// Display base for the final state (bin, hex, dec)
        #[arg(long, default_value = "bin")]
        base: String,
        /// Maximum number of steps before giving up
        #[arg(long, default_value_t = 256)]
        max_steps: u64,
        /// Print each micro-step as it executes
        #[arg(short, long)]
        trace: bool,
        /// Dump the final state snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load and run a built-in demo program
    Demo {
        /// Demo identifier (see `list`)
        id: String,
        /// Print each micro-step as it executes
        #[arg(short, long)]
        trace: bool,
    },
    /// List the built-in demo programs
    List,
    /// Run the full demo sweep and report pass/fail per program
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { source, bits, base, max_steps, trace, json }) => {
            run_file(&source, bits, &base, max_steps, trace, json);
        }
        Some(Commands::Demo { id, trace }) => {
            run_demo(&id, trace);
        }
        Some(Commands::List) => {
            list_demos();
        }
        Some(Commands::Test) => {
            run_sweep();
        }
        None => {
            println!("didact-emu v0.1.0");
            println!("An instructional fixed-word-length CPU emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn configure_core(bits: u32, base: &str) -> SimulationCore {
    let base: DisplayBase = match base.parse() {
        Ok(base) => base,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let mut core = SimulationCore::new();
    core.set_display_base(base);
    if let Err(e) = core.set_word_length(bits) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    core
}

fn attach_trace(core: &mut SimulationCore) {
    core.on_step(|state, micro| {
        println!(
            "{:>4}  PC={:02}  {:?}  {}",
            state.cpu.cycle,
            state.cpu.registers.pc,
            state.meta.phase,
            micro.action
        );
    });
}

fn run_file(path: &str, bits: u32, base: &str, max_steps: u64, trace: bool, json: bool) {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let mut core = configure_core(bits, base);
    if trace {
        attach_trace(&mut core);
    }

    let count = match core.load_program(&source) {
        Ok(count) => count,
        Err(e) => {
            eprintln!("❌ Load error: {}", e);
            std::process::exit(1);
        }
    };
    println!("📝 Loaded {} instructions ({}-bit words)", count, bits);
    println!();

    let state = match core.run_limited(max_steps) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&state) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print_final_state(&state);
    }
}

fn run_demo(id: &str, trace: bool) {
    let mut core = SimulationCore::new();
    if trace {
        attach_trace(&mut core);
    }

    let state = match TestRunner::new(&mut core).run_demo(id) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    print_final_state(&state);
}

fn list_demos() {
    println!("Built-in demo programs:");
    println!();
    for demo in DEMO_PROGRAMS {
        println!("  {:<8} {}", demo.id, demo.name);
    }
}

fn run_sweep() {
    let mut core = SimulationCore::new();
    let report = TestRunner::new(&mut core).run_all(DEMO_PROGRAMS);

    for verdict in &report.results {
        let mark = if verdict.pass { "✓" } else { "✗" };
        println!("{} {}", mark, verdict.name);
        for detail in &verdict.details {
            println!("    {}", detail);
        }
    }

    println!();
    println!("Results: {}/{} passed", report.pass_count, report.total);

    if !report.all_passed() {
        std::process::exit(1);
    }
}

fn print_final_state(state: &StateSnapshot) {
    let bits = state.config.word_length;
    let base = state.config.display_base;
    let fmt = |value: u32| base.format(value, bits);
    let regs = &state.cpu.registers;

    println!("━━━ Final State ━━━");
    println!("Cycles: {}", state.cpu.cycle);
    println!("Halted: {}", state.cpu.halted);
    println!("Phase:  {:?}", state.meta.phase);
    println!("Last:   {}", state.meta.last_action);
    println!();
    println!("A  = {}  ({})", fmt(regs.a), regs.a);
    println!("B  = {}  ({})", fmt(regs.b), regs.b);
    println!("DR = {}  AR = {}", fmt(regs.dr), fmt(regs.ar));
    println!("PC = {}  SP = {}", fmt(regs.pc), fmt(regs.sp));
    println!("SF = {}  OF = {}", state.cpu.flags.sf, state.cpu.flags.of);
    println!();

    let touched: Vec<_> = state
        .memory
        .iter()
        .enumerate()
        .skip(state.program.len())
        .filter(|(_, &value)| value != 0)
        .collect();
    if touched.is_empty() {
        println!("Memory: no data cells written");
    } else {
        println!("Memory (non-zero data cells):");
        for (address, &value) in touched {
            println!("  [{:02}] = {}  ({})", address, fmt(value), value);
        }
    }
}
