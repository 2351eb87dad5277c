//! Proxima simulation runner CLI

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use proxima::core::error::ProximaError;
use proxima::logsink::SnapshotLogger;
use proxima::runner::{Runner, RunnerConfig};
use proxima::store::JsonDirStore;
use proxima::world::build_world;

#[derive(Parser, Debug)]
#[command(name = "proxima")]
#[command(about = "Agent-based lunar base simulation kernel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an experiment from the configuration store
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Experiment document id (env: EXPERIMENT_ID)
    #[arg(long, env = "EXPERIMENT_ID")]
    experiment_id: String,

    /// Step cap; overrides the experiment's simulation_time_steps
    /// (env: UPDATE_CYCLES)
    #[arg(long, env = "UPDATE_CYCLES")]
    steps: Option<u64>,

    /// Run seed; overrides the experiment's seed
    #[arg(long)]
    seed: Option<u64>,

    /// Configuration store directory (env: DB_URI)
    #[arg(long, env = "DB_URI", default_value = "data")]
    data_dir: PathBuf,

    /// Wall-clock delay between steps in milliseconds (env: UPDATE_RATE_MS)
    #[arg(long, env = "UPDATE_RATE_MS", default_value_t = 0)]
    update_rate_ms: u64,

    /// Do not write logs or state back to the store (env: READ_ONLY)
    #[arg(long, env = "READ_ONLY")]
    read_only: bool,

    /// CSV log output path; omit to skip the flat-file sink
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn exit_code_for(error: &ProximaError) -> u8 {
    match error {
        ProximaError::Config(_) | ProximaError::Serde(_) => 2,
        ProximaError::CommitOverdraft { .. } => 3,
        ProximaError::StoreUnavailable(_) => 4,
        _ => 1,
    }
}

fn run(args: RunArgs) -> Result<(), ProximaError> {
    let mut store = JsonDirStore::open(&args.data_dir)?;

    let mut output = build_world(&store, &args.experiment_id)?;
    if let Some(seed) = args.seed {
        output.world.run_seed = seed;
    }
    let max_steps = args.steps.or(output.simulation_time_steps);

    println!("Proxima run: experiment {}", args.experiment_id);
    println!("  world system: {}", output.world_system_id);
    println!("  seed: {}", output.world.run_seed);
    match max_steps {
        Some(steps) => println!("  steps: {steps}"),
        None => println!("  steps: continuous (stop via command)"),
    }

    let logger = SnapshotLogger::new(
        &output.world_system_id,
        output.log_skip_steps,
        args.read_only,
        args.csv.clone(),
    );
    let mut runner = Runner::new(
        output.world,
        logger,
        RunnerConfig {
            max_steps,
            step_delay_ms: args.update_rate_ms,
        },
    );

    let summary = runner.run(&mut store)?;
    println!(
        "Run complete: {} steps, {} snapshots dropped{}",
        summary.steps_run,
        summary.log_dropped_total,
        if summary.stopped_by_command {
            " (stopped by command)"
        } else {
            ""
        }
    );

    // Final state summary for quick inspection.
    for (sector, gauges) in runner.latest_gauges() {
        let line: Vec<String> = gauges
            .iter()
            .take(4)
            .map(|(k, v)| format!("{k}={v:.2}"))
            .collect();
        println!("  {sector}: {}", line.join(", "));
    }

    if !args.read_only {
        let snapshot = runner.world.dump()?;
        let path = args.data_dir.join(format!(
            "snapshot_{}_t{}.json",
            args.experiment_id, runner.world.t
        ));
        std::fs::write(&path, snapshot)?;
        println!("Final snapshot written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => match run(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("error: {error}");
                ExitCode::from(exit_code_for(&error))
            }
        },
    }
}
