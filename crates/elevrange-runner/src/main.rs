//! `elevrange` command-line interface.

use clap::{Parser, Subcommand};
use elevrange_runner::output::{self, OutputFiles};
use elevrange_runner::pipeline::write_table_summary;
use elevrange_runner::{
    run_pipeline, run_simulation, summarize_table, PipelineConfig, PipelineError, RunOptions,
    DEFAULT_BIN_WIDTH_M,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "elevrange")]
#[command(about = "Elevational range analysis of bird observation records", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the configured random seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Rebuild zero_filled.csv even if it exists
    #[arg(long, global = true)]
    force: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline
    Run {
        /// YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run the range-shift simulations only
    Simulate {
        /// YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Recompute summary tables from an analysis.csv
    Summarize {
        /// Analysis table written by a previous run
        #[arg(short, long)]
        input: PathBuf,

        /// Elevation bin width in metres
        #[arg(long, default_value_t = DEFAULT_BIN_WIDTH_M)]
        bin_width: f64,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn execute(cli: Cli) -> Result<(), PipelineError> {
    match cli.command {
        Command::Run { config } => {
            let config = PipelineConfig::from_yaml_file(&config)?;
            let options = RunOptions {
                force: cli.force,
                seed_override: cli.seed,
            };
            let summary = run_pipeline(&config, options)?;
            println!(
                "{}: {} checklists, {} after subsampling, {} joined; outputs in {}",
                summary.species,
                summary.zero_filled,
                summary.subsampled,
                summary.join.joined,
                config.output_dir.display()
            );
        }
        Command::Simulate { config } => {
            let config = PipelineConfig::from_yaml_file(&config)?;
            let seed = cli.seed.unwrap_or(config.seed);
            let mut files = OutputFiles::new(&config.output_dir);
            let results = run_simulation(&config.simulation, seed, &mut files)?;
            println!(
                "{} shift estimates, {} sample sizes; outputs in {}",
                results.shifts.len(),
                results.sample_size_effects.len(),
                config.output_dir.display()
            );
        }
        Command::Summarize {
            input,
            bin_width,
            output_dir,
        } => {
            let table = output::read_analysis(&input)?;
            let dir = output_dir
                .or_else(|| input.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));
            let summary = summarize_table(&table, bin_width)?;
            let mut files = OutputFiles::new(dir);
            write_table_summary(&summary, &mut files)?;
            println!(
                "{} records, {} detections; wrote {} tables to {}",
                summary.overall.records,
                summary.overall.detections,
                files.written().len(),
                files.dir().display()
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    elevrange_metrics::describe_metrics();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
