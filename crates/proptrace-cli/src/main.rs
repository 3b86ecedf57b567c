mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "proptrace")]
#[command(about = "Property-guided execution trace generator for smart contracts")]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Flags shared by every command that runs the generator. Values given
/// here override the `--config` file.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct GenerationArgs {
    /// JSON generator config file
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Number of operation records per trace (default: 1000)
    #[arg(long)]
    pub(crate) length: Option<usize>,

    /// Seed for reproducible traces
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Comma-separated account pool (default: 0xA1,0xB2,0xC3,0xD4)
    #[arg(long, value_delimiter = ',')]
    pub(crate) accounts: Option<Vec<String>>,

    /// Chance of splicing a business pattern after each record
    #[arg(long)]
    pub(crate) pattern_probability: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a trace for one contract
    Generate {
        /// Contract source file
        contract: PathBuf,

        /// Temporal property file (none: no property rules)
        #[arg(long)]
        properties: Option<PathBuf>,

        /// Output trace file
        #[arg(long, default_value = "example_traces.txt")]
        out: PathBuf,

        /// Replay the trace after writing it and fail on any violation
        #[arg(long)]
        check: bool,

        #[command(flatten)]
        generation: GenerationArgs,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate traces for every contract in a directory
    Batch {
        /// Directory of `*.sol` contracts
        #[arg(long, default_value = "output")]
        contracts: PathBuf,

        /// Benchmark root holding `<name>/temporal_properties.txt`
        #[arg(long, default_value = "synthesis-benchmark")]
        benchmarks: PathBuf,

        /// Trace root; each trace goes to `<name>/example_traces.txt`
        #[arg(long, default_value = "test_trace")]
        out: PathBuf,

        /// Write the JSON batch report here
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        generation: GenerationArgs,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Summarize an existing trace file
    Inspect {
        /// Trace file to read
        trace: PathBuf,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            contract,
            properties,
            out,
            check,
            generation,
            format,
        } => {
            commands::generate::run_generate_command(
                contract, properties, out, check, generation, format,
            )?;
        }
        Commands::Batch {
            contracts,
            benchmarks,
            out,
            report,
            generation,
            format,
        } => {
            commands::batch::run_batch_command(
                contracts, benchmarks, out, report, generation, format,
            )?;
        }
        Commands::Inspect { trace, format } => {
            commands::inspect::run_inspect_command(trace, format)?;
        }
    }

    Ok(())
}
