use abconfig_cli::{bucket, check, simulate, DatasetFile};
use anyhow::Context;
use clap::{value_parser, Arg, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .long("dataset")
        .short('d')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Experiment dataset (.yaml, .yml or .json)")
}

fn cli() -> Command {
    Command::new("abconfig")
        .version(abconfig_cli::VERSION)
        .about("Inspect and simulate abconfig experiment datasets")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("simulate")
                .about("Run seeded uniform draws and print each experiment's distribution")
                .arg(dataset_arg())
                .arg(
                    Arg::new("draws")
                        .long("draws")
                        .default_value("10000")
                        .value_parser(value_parser!(u64))
                        .help("Draws per experiment"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                ),
        )
        .subcommand(
            Command::new("bucket")
                .about("Show where a device lands in each device experiment")
                .arg(dataset_arg())
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .required(true)
                        .help("Client address"),
                )
                .arg(
                    Arg::new("ua")
                        .long("ua")
                        .required(true)
                        .help("User agent string"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Report command lines that would be skipped as malformed")
                .arg(dataset_arg()),
        )
}

fn load(args: &clap::ArgMatches) -> anyhow::Result<abconfig_store::ExperimentSet> {
    let path = args
        .get_one::<PathBuf>("dataset")
        .context("missing --dataset")?;
    let set = DatasetFile::load(path)?.to_set()?;
    tracing::info!(path = %path.display(), experiments = set.len(), "dataset loaded");
    Ok(set)
}

fn run() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let set = load(args)?;
            let draws = args.get_one::<u64>("draws").copied().unwrap_or(10_000);
            let seed = args.get_one::<u64>("seed").copied().unwrap_or(42);
            for distribution in simulate(&set, draws, seed) {
                print!("{distribution}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("bucket", args)) => {
            let set = load(args)?;
            let addr = args.get_one::<String>("addr").context("missing --addr")?;
            let ua = args.get_one::<String>("ua").context("missing --ua")?;
            print!("{}", bucket(&set, addr, ua));
            Ok(ExitCode::SUCCESS)
        }
        Some(("check", args)) => {
            let set = load(args)?;
            let problems = check(&set);
            for problem in &problems {
                println!("{problem}");
            }
            if problems.is_empty() {
                println!("all commands parse");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{} malformed command(s)", problems.len());
                Ok(ExitCode::FAILURE)
            }
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
