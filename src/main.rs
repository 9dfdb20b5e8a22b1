//! Breadboard - Educational Circuit Simulator
//!
//! Runs a saved circuit for a number of timesteps and prints the node
//! voltages and device currents of every step.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug breadboard circuit.json --dt 1e-4 --steps 500 --format json > run.jsonl
//! ```

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use breadboard_core::{
    circuit::CircuitDocument,
    error::Result,
    solver::{IntegrationMethod, SolveResult},
    Circuit, Simulator, SolverConfig, DEFAULT_TIMESTEP,
};
use clap::{Parser, ValueEnum};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Tab-separated columns, one row per step
    Table,
    /// One JSON object per line
    Json,
}

/// Educational circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit document (.json)
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Time step in seconds
    #[arg(long, default_value_t = DEFAULT_TIMESTEP)]
    dt: f64,

    /// Number of steps to run
    #[arg(short, long, default_value_t = 1)]
    steps: usize,

    /// Fixed-point iteration budget per step
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Integration rule for capacitors and inductors
    #[arg(long, value_enum)]
    method: Option<IntegrationMethod>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Serialize)]
struct StepRecord<'a> {
    step: usize,
    time: f64,
    #[serde(flatten)]
    result: &'a SolveResult,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Load and build the circuit
    let doc = CircuitDocument::from_file(&args.circuit_file)?;
    let circuit = Circuit::from_document(&doc)?;
    log::info!(
        "loaded {} components, {} wires, {} nodes",
        circuit.components().len(),
        circuit.wires().len(),
        circuit.node_count()
    );

    let mut config = SolverConfig::new();
    if let Some(n) = args.max_iterations {
        config = config.with_max_iterations(n);
    }
    if let Some(method) = args.method {
        config = config.with_integration(method);
    }
    let mut simulator = Simulator::with_config(circuit, args.dt, config)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if args.format == OutputFormat::Table {
        write_header(&mut out, &simulator)?;
    }
    for step in 0..args.steps {
        let time = simulator.time();
        let result = simulator.step();
        if !result.valid {
            log::warn!(
                "step {step} invalid: {}",
                result
                    .meta
                    .invalid_reason
                    .map_or("unknown", |r| r.as_str())
            );
        }
        match args.format {
            OutputFormat::Table => write_row(&mut out, step, time, &result)?,
            OutputFormat::Json => {
                let record = StepRecord {
                    step,
                    time,
                    result: &result,
                };
                serde_json::to_writer(&mut out, &record)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;

    Ok(())
}

fn write_header(out: &mut impl Write, simulator: &Simulator) -> Result<()> {
    write!(out, "step\ttime\tvalid\titer")?;
    for node in 1..simulator.circuit().node_count() {
        write!(out, "\tV{node}")?;
    }
    let mut ids: Vec<_> = simulator.circuit().components().iter().map(|c| c.id).collect();
    ids.sort();
    for id in ids {
        write!(out, "\tI{id}")?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_row(out: &mut impl Write, step: usize, time: f64, result: &SolveResult) -> Result<()> {
    write!(
        out,
        "{step}\t{time:.6e}\t{}\t{}",
        result.valid, result.meta.iterations
    )?;
    for v in result.voltages.iter().skip(1) {
        write!(out, "\t{v:.6e}")?;
    }
    for i in result.currents.values() {
        write!(out, "\t{i:.6e}")?;
    }
    writeln!(out)?;
    Ok(())
}
