use clap::Parser;
use gsai_launch::cli::cmd::{self, Commands};
use std::{path::PathBuf, process::ExitCode};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CommandLine {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Launch configuration file (defaults to ./gsai-launch.toml when present)
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

pub fn main() -> ExitCode {
    let command_line = CommandLine::parse();

    // Logs go to stderr so they never mix with the guest console on stdout
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = command_line.config.as_deref();

    // Dispatch command
    match command_line.command {
        Some(command @ Commands::Run { .. }) => cmd::run::run(command, config),
        Some(command @ Commands::Args { .. }) => cmd::args::run(command, config),
        Some(command @ Commands::Check { .. }) => cmd::check::run(command, config),
        Some(command @ Commands::Version { .. }) => cmd::version::run(command),
        None => cmd::run::run(
            Commands::Run {
                overrides: Default::default(),
            },
            config,
        ),
    }
}
