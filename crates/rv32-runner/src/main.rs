//! Headless RV32 program runner.
//!
//! Reads a hex-dump program image (a file argument, or standard input when
//! omitted), runs it on the out-of-order core until HALT commits, and
//! prints the low byte of `x10` as a decimal on standard output.
//! Diagnostics go to standard error.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use machine_rv32::{MachineConfig, Rv32Machine};
use tracing::Level;

#[derive(Parser)]
#[command(name = "rv32-runner", version, about = "Run an RV32I hex dump on the out-of-order core")]
struct Args {
    /// Program image (hex dump); standard input when omitted.
    image: Option<PathBuf>,

    /// RAM size in bytes.
    #[arg(long)]
    mem_size: Option<usize>,

    /// Abort if HALT has not committed after this many cycles.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Increase diagnostic verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_image(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading standard input")?;
            Ok(text)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let text = read_image(args.image.as_ref())?;

    let mut config = MachineConfig::default();
    if let Some(mem_size) = args.mem_size {
        config.mem_size = mem_size;
    }

    let mut machine = Rv32Machine::new(config);
    machine.load_hex(&text)?;

    while !machine.halted() {
        if let Some(limit) = args.max_cycles {
            if machine.cycles() >= limit {
                bail!("no HALT committed after {limit} cycles");
            }
        }
        machine.step();
    }

    tracing::info!(
        cycles = machine.cycles(),
        committed = machine.committed(),
        prediction_rate = machine.prediction_rate(),
        "finished"
    );
    println!("{}", machine.result());
    Ok(())
}
