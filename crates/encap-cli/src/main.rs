//! encap: run and migrate scripts under prototype encapsulation
//!
//! Sets up the global allocator and logging, then dispatches to one of
//! the subcommands.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{PolicyArg, RealmOptions};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "encap")]
#[command(about = "Prototype encapsulation runtime and migration tool", long_about = None)]
#[command(version)]
struct Cli {
    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script in a fresh realm
    Run {
        /// Script file
        file: String,
        #[command(flatten)]
        realm: RealmOptions,
        /// Print the value of the last expression statement
        #[arg(short, long)]
        print: bool,
        /// Report diagnostics (mode mismatches, denials) on stderr
        #[arg(long)]
        diagnostics: bool,
        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a script with static reserved-key references rewritten
    Rewrite {
        /// Script file
        file: String,
        /// List each rewrite on stderr
        #[arg(long)]
        records: bool,
    },

    /// Report constructs that break under encapsulation
    Check {
        /// Script files
        #[arg(required = true)]
        files: Vec<String>,
        /// Emit findings as JSON
        #[arg(long)]
        json: bool,
        /// Also report informational findings
        #[arg(long)]
        all: bool,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            file,
            realm,
            print,
            diagnostics,
            json,
        } => {
            let code = commands::run::execute(&file, &realm, print, diagnostics, json)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Rewrite { file, records } => commands::rewrite::execute(&file, records)?,
        Commands::Check { files, json, all } => {
            if !commands::check::execute(&files, json, all)? {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "encap",
            "run",
            "app.js",
            "--secure-mode",
            "--policy",
            "throw",
            "-p",
        ]);
        let Commands::Run { file, realm, print, .. } = cli.command else {
            panic!("expected run");
        };

        assert_eq!(file, "app.js");
        assert_eq!(realm.secure_mode.as_deref(), Some("1"));
        assert_eq!(realm.policy, Some(PolicyArg::Throw));
        assert!(print);
    }

    #[test]
    fn test_secure_mode_value() {
        let cli = Cli::parse_from(["encap", "run", "app.js", "--secure-mode=?0"]);
        let Commands::Run { realm, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(realm.secure_mode.as_deref(), Some("?0"));
    }
}
