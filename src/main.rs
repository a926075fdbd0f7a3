use std::io::{self, BufWriter};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use rankflow::config::{
    ConfigError, MapperConfig, ReducerConfig, DAMPING_ENV_VAR, TOTAL_NODES_ENV_VAR,
};
use rankflow::stage::{combiner, mapper, reducer, COMBINE_STAGE, MAP_STAGE, REDUCE_STAGE};
use rankflow::{StageContext, StageError, StageReport};

/// Run one stage of an iteration of PageRank on a partition read from stdin.
///
/// The log level is set with `RUST_LOG` (default: warn). Logs go to stderr.
#[derive(Debug, Parser)]
#[clap(name = "rankflow", version)]
struct Options {
    #[clap(subcommand)]
    stage: StageCommand,

    /// Print the chain of operators of the stage as JSON to stderr before running it.
    #[clap(long, global = true)]
    explain: bool,

    /// Print the counters of the stage as JSON to stderr when it is complete.
    #[clap(long, global = true)]
    report: bool,
}

#[derive(Debug, Subcommand)]
enum StageCommand {
    /// Emit the adjacency list and the rank contributions of every node.
    Map(StageArgs),
    /// Sum the contributions of every node of a key-grouped partition.
    Combine,
    /// Compute the new rank of every node of a key-grouped partition.
    Reduce(StageArgs),
}

#[derive(Debug, Args)]
struct StageArgs {
    /// Damping factor, in the open interval (0, 1).
    #[clap(long, env = DAMPING_ENV_VAR)]
    damping: Option<String>,

    /// Number of nodes of the graph.
    #[clap(long, env = TOTAL_NODES_ENV_VAR)]
    total_nodes: Option<String>,
}

enum Failure {
    Config(ConfigError),
    Stage(StageError),
}

impl From<ConfigError> for Failure {
    fn from(value: ConfigError) -> Self {
        Failure::Config(value)
    }
}

impl From<StageError> for Failure {
    fn from(value: StageError) -> Self {
        Failure::Stage(value)
    }
}

fn run(options: &Options) -> Result<StageReport, Failure> {
    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());

    let report = match &options.stage {
        StageCommand::Map(args) => {
            let config = MapperConfig::from_values(
                args.total_nodes.as_deref(),
                args.damping.as_deref(),
            )?;
            let ctx = StageContext::new(MAP_STAGE);
            let stream = mapper(&ctx, config, stdin, stdout);
            if options.explain {
                explain(&stream.structure());
            }
            stream.execute()?
        }
        StageCommand::Combine => {
            let ctx = StageContext::new(COMBINE_STAGE);
            let stream = combiner(&ctx, stdin, stdout);
            if options.explain {
                explain(&stream.structure());
            }
            stream.execute()?
        }
        StageCommand::Reduce(args) => {
            let config = ReducerConfig::from_values(
                args.damping.as_deref(),
                args.total_nodes.as_deref(),
            )?;
            let ctx = StageContext::new(REDUCE_STAGE);
            let stream = reducer(&ctx, config, stdin, stdout);
            if options.explain {
                explain(&stream.structure());
            }
            stream.execute()?
        }
    };
    Ok(report)
}

fn explain(structure: &rankflow::structure::BlockStructure) {
    info!("operator chain: {structure}");
    match serde_json::to_string_pretty(structure) {
        Ok(json) => eprintln!("{json}"),
        Err(e) => error!("cannot serialize the operator chain: {e}"),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let options = Options::parse();

    match run(&options) {
        Ok(report) => {
            info!("{report}");
            if options.report {
                match serde_json::to_string(&report) {
                    Ok(json) => eprintln!("{json}"),
                    Err(e) => error!("cannot serialize the report: {e}"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(Failure::Config(e)) => {
            error!("invalid configuration: {e}");
            eprintln!("rankflow: invalid configuration: {e}");
            ExitCode::from(2)
        }
        Err(Failure::Stage(e)) => {
            eprintln!("rankflow: {e}");
            ExitCode::from(1)
        }
    }
}
