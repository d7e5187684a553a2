use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use binwrap::commands;
use binwrap::commands::run::StdinSource;
use binwrap::error::BinwrapError;

#[derive(Parser)]
#[clap(name = "binwrap")]
#[clap(about = "Fetch, cache and run prebuilt platform binaries")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Override the manifest's destination directory
    #[clap(long, global = true)]
    dest: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the binary if needed, then run it
    Run {
        /// Wrapper manifest (TOML, or JSON with a .json extension)
        manifest: PathBuf,
        /// Feed this file to the binary's stdin ("-" for our own stdin)
        #[clap(long)]
        stdin: Option<PathBuf>,
        /// Arguments passed after the manifest's configured args
        #[clap(last = true)]
        args: Vec<String>,
    },
    /// Download and install the binary without running it
    Fetch {
        /// Wrapper manifest
        manifest: PathBuf,
    },
    /// Print the resolved executable path
    Path {
        /// Wrapper manifest
        manifest: PathBuf,
    },
    /// Show which source is selected for a platform
    Select {
        /// Wrapper manifest
        manifest: PathBuf,
        /// Operating system name (default: this system)
        #[clap(long)]
        os: Option<String>,
        /// CPU architecture (default: this system)
        #[clap(long)]
        arch: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "binwrap=info",
        _ => "binwrap=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let dest = cli.dest.as_deref();

    let result = match cli.command {
        Commands::Run {
            manifest,
            stdin,
            args,
        } => {
            let stdin = match stdin.as_deref() {
                None => StdinSource::None,
                Some(path) if path.as_os_str() == "-" => StdinSource::Inherit,
                Some(path) => StdinSource::File(path),
            };
            commands::run::run_binary(&manifest, dest, stdin, &args)
        }
        Commands::Fetch { manifest } => commands::fetch::fetch_binary(&manifest, dest).map(|_| ()),
        Commands::Path { manifest } => commands::inspect::print_path(&manifest, dest).map(|_| ()),
        Commands::Select { manifest, os, arch } => {
            commands::inspect::select_source(&manifest, os.as_deref(), arch.as_deref()).map(|_| ())
        }
    };

    if let Err(e) = result {
        if let BinwrapError::ProcessFailed { .. } = &e {
            // The child already reported its own failure on stderr.
            std::process::exit(e.exit_code().unwrap_or(1));
        }
        if e.is_timeout() {
            eprintln!("Error: {e}");
            std::process::exit(124);
        }
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
