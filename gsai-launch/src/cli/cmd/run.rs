use crate::qemu::{self, QemuBuilder};
use std::{path::Path, process::ExitCode};
use tracing::{error, info};

/// Exit code a shell reports for a command it cannot find.
const EXIT_NOT_FOUND: u8 = 127;

pub fn run(cmd: super::Commands, config_path: Option<&Path>) -> ExitCode {
    match cmd {
        super::Commands::Run { overrides } => {
            let config = match super::resolve_config(config_path, Some(&overrides)) {
                Ok(config) => config,
                Err(err) => {
                    error!(error = ?err, "Failed to load launch configuration");
                    return ExitCode::FAILURE;
                }
            };

            let process = match QemuBuilder::new(&config).start() {
                Ok(process) => process,
                Err(err) if qemu::is_not_found(&err) => {
                    error!(qemu = %config.qemu, "Emulator not found");
                    return ExitCode::from(EXIT_NOT_FOUND);
                }
                Err(err) => {
                    error!(error = ?err, "Failed to start emulator");
                    return ExitCode::FAILURE;
                }
            };

            match process.wait() {
                Ok(status) => {
                    info!(status = %status, "Emulator exited");
                    ExitCode::from(qemu::exit_code(status))
                }
                Err(err) => {
                    error!(error = ?err, "Failed to wait for emulator");
                    ExitCode::FAILURE
                }
            }
        }
        _ => panic!("Must be passed a Commands::Run"),
    }
}
