use anyhow::{Context, Result};
use armmc_sim::{assemble, mem_diff, AssembleOption, BranchTarget, McSim, SimConfig};
use binutils::{clap, verbose};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BranchMode {
    /// the encoded offset is the target address
    Absolute,
    /// the encoded offset is relative to the next instruction
    PcRelative,
}

impl From<BranchMode> for BranchTarget {
    fn from(mode: BranchMode) -> Self {
        match mode {
            BranchMode::Absolute => BranchTarget::Absolute,
            BranchMode::PcRelative => BranchTarget::PcRelative,
        }
    }
}

/// Multicycle ARM-subset simulator written in Rust.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = binutils::get_styles(),
    arg_required_else_help = true,
)]
struct Args {
    /// Path to the input assembly file
    input: String,

    /// Branch target encoding shared by the assembler and the simulator
    #[arg(long, value_enum, default_value = "absolute")]
    branch_target: BranchMode,

    /// Give up after this many cycles
    #[arg(long, default_value_t = 3_000_000)]
    max_cycles: u64,

    /// Stop once PC reaches this address at an instruction boundary
    #[arg(long, value_parser = parse_addr)]
    until: Option<u32>,

    /// Print the datapath of every cycle
    #[arg(long)]
    trace: bool,

    /// Print every cycle as a JSON line instead
    #[arg(long, conflicts_with = "trace")]
    json: bool,

    #[command(flatten)]
    verbose: verbose::Verbosity,
}

fn parse_addr(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read file `{}`", &args.input))?;

    let verbose_asm = args
        .verbose
        .log_level()
        .is_some_and(|lv| lv >= verbose::Level::Trace);
    let log_level = binutils::verbose_level_to_trace(args.verbose.log_level());
    binutils::logging_setup(log_level, None::<&std::fs::File>);

    let branch_target = args.branch_target.into();
    let obj = assemble(
        &content,
        AssembleOption::default()
            .set_verbose(verbose_asm)
            .set_branch_target(branch_target),
    )?;

    let config = SimConfig::default()
        .set_branch_target(branch_target)
        .set_max_cycles(args.max_cycles)
        .set_tty_out(args.trace);
    let mut sim = McSim::new(obj.obj.init_mem(), config);

    let outcome = if args.json {
        run_json(&mut sim, args.max_cycles, args.until)
    } else if let Some(addr) = args.until {
        sim.run_until_pc(addr).map_err(Into::into)
    } else {
        sim.run().map_err(Into::into)
    };

    println!("{}", sim.register_file());
    println!(
        "pc = {:#x}  z = {}  stat = {}  cycles = {}  instructions = {}",
        sim.pc(),
        sim.zero_flag() as u8,
        sim.stat(),
        sim.cycle_count(),
        sim.inst_count()
    );
    mem_diff(&obj.obj.init_mem(), sim.mem());
    outcome
}

/// Step the machine by hand so that each cycle can be dumped.
fn run_json(sim: &mut McSim, max_cycles: u64, until: Option<u32>) -> Result<()> {
    for _ in 0..max_cycles {
        if sim.is_terminate() {
            return Ok(());
        }
        if until.is_some_and(|addr| sim.pc() == addr && sim.state() == armmc_sim::State::Fetch) {
            return Ok(());
        }
        let rec = sim.step()?;
        println!("{}", rec.to_json()?);
    }
    anyhow::bail!("cycle limit ({max_cycles}) exceeded")
}
