//! # params CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use params_cli::check::{run_check, CheckArgs};
use params_cli::validate::{run_validate, ValidateArgs};
use params_cli::EXIT_ERROR;

/// Declarative parameter validation.
///
/// Checks descriptor documents and validates payloads against them.
#[derive(Parser, Debug)]
#[command(name = "params", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and summarize every descriptor document in a directory.
    Check(CheckArgs),

    /// Validate a payload against a schema.
    Validate(ValidateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check(args) => run_check(&args),
        Commands::Validate(args) => run_validate(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from([
            "params",
            "validate",
            "--schema-dir",
            "schemas",
            "--schema",
            "signup",
            "--input",
            "req.json",
            "--batch",
            "--pretty",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.schema_dir, PathBuf::from("schemas"));
        assert_eq!(args.input, Some(PathBuf::from("req.json")));
        assert!(args.batch && args.pretty && !args.keep_empty_strings);
    }

    #[test]
    fn test_validate_requires_schema() {
        assert!(Cli::try_parse_from(["params", "validate", "--schema-dir", "s"]).is_err());
    }

    #[test]
    fn test_verbose_levels() {
        let cli = Cli::try_parse_from(["params", "-vv", "check", "--schema-dir", "s"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn test_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["params"]).is_err());
    }
}
