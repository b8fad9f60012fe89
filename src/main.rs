use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cppmono::{run_main, CppmonoOptions};

#[derive(Parser, Debug)]
#[command(
    name = "cppmono",
    about = "cppmono: C++ template monomorphizer for lint-style analysis",
    version
)]
pub struct Args {
    /// Input files to simplify (repeatable)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        num_args = 1..,
        action = clap::ArgAction::Append,
        required = true
    )]
    files: Vec<String>,

    /// TOML file with simplifier settings
    #[arg(long, value_name = "PATH")]
    settings: Option<String>,

    /// Report debug messages when a construct is bailed on
    #[arg(long, default_value_t = false)]
    debug_warnings: bool,

    /// Only probe template expressions for unbalanced angle brackets
    #[arg(long, default_value_t = false)]
    check_syntax: bool,

    /// Do not print the simplified token stream
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

pub fn run(args: Args) -> Result<()> {
    let opts = CppmonoOptions {
        files: args.files,
        settings_file: args.settings,
        debug_warnings: args.debug_warnings,
        check_syntax: args.check_syntax,
        print_stream: !args.quiet,
    };

    match run_main(&opts) {
        Ok(Some(output)) => {
            println!("{output}");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => Err(anyhow::anyhow!(err.to_string())),
    }
}

pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    run(args)
}
