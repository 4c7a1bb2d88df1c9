//! Sightline CLI - recognize photographed objects and manage recognition settings.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use sightline_core::{RecognitionMethod, DEFAULT_SIMILARITY_THRESHOLD};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Nothing recognized
  66  Cannot read input image
  69  Recognition timed out or was interrupted
  74  Cannot access the data directory
  78  Invalid configuration";

#[derive(Parser)]
#[command(name = "sightline")]
#[command(author, version, about = "Photographed-object recognition orchestrator", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Directory holding persisted priority and quota state
    #[arg(long, global = true, value_name = "DIR", default_value = ".sightline")]
    data_dir: PathBuf,

    /// Suppress progress and decorative output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the perceptual fingerprint of one or more images
    Fingerprint {
        /// Images to fingerprint
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compare two images (or hex fingerprints) by Hamming distance
    Compare {
        /// First image path or 16-digit hex fingerprint
        #[arg(value_name = "A")]
        first: String,

        /// Second image path or 16-digit hex fingerprint
        #[arg(value_name = "B")]
        second: String,

        /// Maximum distance (in bits) still considered similar
        #[arg(short, long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: u32,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Recognize the object in a photo using the built-in demo recognizers
    Recognize {
        /// Photo to recognize
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Pretend the network is unreachable
        #[arg(long)]
        offline: bool,

        /// Cloud quota source to draw on (repeatable)
        #[arg(long = "source", value_name = "NAME", default_value = "vision-api")]
        sources: Vec<String>,

        /// Treat the user AI service as configured
        #[arg(long)]
        user_ai: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show or change the order in which recognition methods are tried
    Priority {
        #[command(subcommand)]
        action: PriorityAction,
    },

    /// Inspect cloud quota usage
    Quota {
        #[command(subcommand)]
        action: QuotaAction,
    },
}

#[derive(Subcommand)]
enum PriorityAction {
    /// Show the current method order
    Show {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Enable the given methods in this order and disable the rest
    Set {
        /// Methods in order: offline, cloud-api, user-ai
        #[arg(value_name = "METHOD", required = true)]
        methods: Vec<RecognitionMethod>,
    },

    /// Restore the default order (offline, cloud-api, user-ai)
    Reset,
}

#[derive(Subcommand)]
enum QuotaAction {
    /// Show usage for every registered source
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "sightline_core=warn",
        1 => "sightline_core=info,sightline=info",
        _ => "sightline_core=debug,sightline=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        data_dir,
        quiet,
        command,
        ..
    } = cli;

    match command {
        Commands::Fingerprint { files, json } => commands::fingerprint::execute(&files, json),
        Commands::Compare {
            first,
            second,
            threshold,
            json,
        } => commands::compare::execute(&first, &second, threshold, json),
        Commands::Recognize {
            file,
            offline,
            sources,
            user_ai,
            json,
        } => {
            let options = commands::recognize::RecognizeOptions {
                offline,
                sources,
                user_ai,
                json,
                quiet,
            };
            commands::recognize::execute(&data_dir, &file, options).await
        }
        Commands::Priority { action } => match action {
            PriorityAction::Show { json } => commands::priority::show(&data_dir, json),
            PriorityAction::Set { methods } => commands::priority::set(&data_dir, &methods, quiet),
            PriorityAction::Reset => commands::priority::reset(&data_dir, quiet),
        },
        Commands::Quota { action } => match action {
            QuotaAction::Status { json } => commands::quota::status(&data_dir, json),
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
