use cellpipe::cli::{self, CheckOptions, CheckResult, CliError};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "cellpipe")]
#[command(about = "cellpipe - composable SQL cell pipelines over an embedded columnar engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline description, optionally executing it over data
    Check {
        /// Path to the pipeline description JSON (reads from stdin if not provided)
        pipeline: Option<String>,

        /// CSV file to load as the pipeline's source table and execute against
        #[arg(short, long)]
        data: Option<String>,

        /// Pretty-print the output rows
        #[arg(short, long)]
        pretty: bool,

        /// Only validate the description, don't execute
        #[arg(long)]
        syntax_only: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            pipeline,
            data,
            pretty,
            syntax_only,
        } => run_check(pipeline, data, pretty, syntax_only),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(
    pipeline: Option<String>,
    data: Option<String>,
    pretty: bool,
    syntax_only: bool,
) -> Result<(), CliError> {
    let pipeline = match pipeline {
        Some(path) => fs::read_to_string(path).map_err(CliError::Io)?,
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            buffer
        }
        None => return Err(CliError::NoInput),
    };

    let options = CheckOptions {
        pipeline,
        data,
        pretty,
        syntax_only,
    };

    match cli::execute_check(&options)? {
        CheckResult::DescriptionValid { cells } => {
            println!("Pipeline description is valid ({} cells)", cells);
        }
        CheckResult::Executed { queries, rows } => {
            for (i, (kind, query)) in queries.iter().enumerate() {
                println!("-- cell {} ({})", i, kind);
                println!("{}", query);
            }
            let json = if pretty {
                serde_json::to_string_pretty(&rows)
            } else {
                serde_json::to_string(&rows)
            }
            .map_err(CliError::Json)?;
            println!("{}", json);
        }
    }
    Ok(())
}
