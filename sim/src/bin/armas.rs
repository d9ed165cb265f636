use anyhow::{Context, Result};
use armmc_sim::{assemble, AssembleOption, BranchTarget};
use binutils::{clap, verbose};
use clap::Parser;

/// Assembler for the ARM subset run by `armsim`.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    long_about = None,
    styles = binutils::get_styles(),
    arg_required_else_help = true,
)]
struct Args {
    /// Path to the input assembly file
    input: String,

    /// Output filename (default is input%.lst)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Encode branch offsets relative to the next instruction
    #[arg(long)]
    pc_relative: bool,

    /// Print logs during assembly
    #[command(flatten)]
    verbose: verbose::Verbosity,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let verbose_asm = args
        .verbose
        .log_level()
        .is_some_and(|lv| lv >= verbose::Level::Trace);
    let log_level = binutils::verbose_level_to_trace(args.verbose.log_level());
    binutils::logging_setup(log_level, None::<&std::fs::File>);

    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read file `{}`", &args.input))?;
    let branch_target = if args.pc_relative {
        BranchTarget::PcRelative
    } else {
        BranchTarget::Absolute
    };
    let a = assemble(
        &content,
        AssembleOption::default()
            .set_verbose(verbose_asm)
            .set_branch_target(branch_target),
    )?;

    let output_path = match args.output {
        Some(path) => path,
        None => {
            let mut path = std::path::PathBuf::from(&args.input);
            path.set_extension("lst");
            path.to_string_lossy().to_string()
        }
    };
    std::fs::write(&output_path, format!("{}", a))
        .with_context(|| format!("could not write file `{}`", &output_path))?;
    tracing::info!("{} symbol(s)", a.obj.symbols.len());
    println!("writing to file `{}`", &output_path);
    Ok(())
}
