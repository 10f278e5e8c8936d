//! autojson CLI: inspect, validate, and initialize persisted documents.
//!
//! Every command takes the base path of a document (without `.json`) and a
//! textual type descriptor such as `map<date,list<tuple<int,str>>>`.

mod commands;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use autojson_core::TypeDescriptor;
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;

#[derive(Parser, Debug)]
#[command(name = "autojson", version, about = "Inspect and initialize typed JSON documents")]
struct Cli {
    /// Raise the log level (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode <BASE>.json against the descriptor and report the result
    Check(TypedArgs),

    /// Print the normalised document
    Show {
        #[command(flatten)]
        target: TypedArgs,

        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Create <BASE>.json from a default value unless it already exists
    Init {
        #[command(flatten)]
        target: TypedArgs,

        /// Default value as JSON text
        #[arg(long, value_name = "JSON")]
        default: String,
    },
}

#[derive(Args, Debug)]
struct TypedArgs {
    /// Document path without the `.json` extension
    #[arg(value_name = "BASE")]
    base: PathBuf,

    /// Type descriptor, e.g. `list<tuple<int,str>>`
    #[arg(short = 't', long = "type", value_name = "DESC")]
    descriptor: TypeDescriptor,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let stdout = io::stdout();
    match commands::run(cli.command, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
