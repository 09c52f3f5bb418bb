//! # omst CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use omst_cli::steps::{run_steps, StepsArgs};
use omst_cli::translate::{run_translate, TranslateArgs};

/// OpenMalaria scenario translator.
///
/// Upgrades scenario XML files from the schema version they declare to a
/// newer one, applying one translation step per version.
#[derive(Parser, Debug)]
#[command(name = "omst", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate scenario files to a target schema version.
    Translate(TranslateArgs),

    /// List the registered translation steps.
    Steps(StepsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Translate(args) => run_translate(&args, cli.config.as_deref()),
        Commands::Steps(args) => run_steps(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["omst", "translate", "-vv", "--config", "p.yaml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("p.yaml")));
        assert!(matches!(cli.command, Commands::Translate(_)));
    }

    #[test]
    fn steps_subcommand_parses() {
        let cli = Cli::try_parse_from(["omst", "steps", "--json"]).unwrap();
        match cli.command {
            Commands::Steps(args) => assert!(args.json),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
