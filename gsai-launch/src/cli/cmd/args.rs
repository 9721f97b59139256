use crate::qemu::QemuBuilder;
use std::{path::Path, process::ExitCode};
use tracing::error;

/// Render the invocation as a single line that can be pasted into a shell.
pub fn cmdline(builder: &QemuBuilder) -> Option<String> {
    let mut words = vec![builder.exe().to_string()];
    words.extend(builder.args());
    shlex::try_join(words.iter().map(String::as_str)).ok()
}

pub fn run(cmd: super::Commands, config_path: Option<&Path>) -> ExitCode {
    match cmd {
        super::Commands::Args { overrides } => {
            let config = match super::resolve_config(config_path, Some(&overrides)) {
                Ok(config) => config,
                Err(err) => {
                    error!(error = ?err, "Failed to load launch configuration");
                    return ExitCode::FAILURE;
                }
            };

            match cmdline(&QemuBuilder::new(&config)) {
                Some(line) => {
                    println!("{line}");
                    ExitCode::SUCCESS
                }
                None => {
                    error!("Command line contains a nul byte");
                    ExitCode::FAILURE
                }
            }
        }
        _ => panic!("Must be passed a Commands::Args"),
    }
}
