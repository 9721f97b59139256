use crate::config::LaunchConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    io,
    process::{Child, Command, ExitStatus, Stdio},
};
use strum::Display;
use tracing::{info, trace};

/// Drive id the NVMe controller is attached to.
pub const NVME_DRIVE_ID: &str = "nvm";

/// Supported VM hardware acceleration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Display, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Accel {
    /// "Kernel VM" which requires Intel VT or AMD-V
    #[default]
    Kvm,
    /// Basically means no acceleration
    Tcg,
}

/// Wraps a running qemu process whose stdio is the launcher's own.
pub struct QemuProcess {
    pub process: Child,
}

impl Drop for QemuProcess {
    fn drop(&mut self) {
        // Only reached early if the launcher bails before wait() returns
        self.process.kill().unwrap_or_default();
    }
}

impl QemuProcess {
    /// Block until QEMU exits.
    pub fn wait(mut self) -> Result<ExitStatus> {
        Ok(self.process.wait()?)
    }
}

#[derive(Debug, Clone)]
pub struct QemuArgs {
    pub accel: Accel,
    pub no_reboot: bool,
    pub machine: String,
    pub cpu: String,
    pub smp: String,
    pub memory: String,
    pub serial: String,
    pub display: String,
    pub net: String,
    pub bios: String,
    pub drive: Vec<String>,
    pub device: Vec<String>,
    pub debug_log: String,
    pub trace: Vec<String>,
}

impl From<QemuArgs> for Vec<String> {
    fn from(args: QemuArgs) -> Self {
        let mut cmdline = vec![String::from("-accel"), args.accel.to_string()];

        if args.no_reboot {
            cmdline.push(String::from("-no-reboot"));
        }

        cmdline.extend([
            String::from("-machine"),
            args.machine,
            String::from("-cpu"),
            args.cpu,
            String::from("-smp"),
            args.smp,
            String::from("-m"),
            args.memory,
            String::from("-serial"),
            args.serial,
            String::from("-display"),
            args.display,
            String::from("-net"),
            args.net,
            String::from("-bios"),
            args.bios,
        ]);

        for drive in args.drive {
            cmdline.push(String::from("-drive"));
            cmdline.push(drive);
        }

        for device in args.device {
            cmdline.push(String::from("-device"));
            cmdline.push(device);
        }

        cmdline.push(String::from("-D"));
        cmdline.push(args.debug_log);

        if !args.trace.is_empty() {
            cmdline.push(String::from("-d"));
            cmdline.push(args.trace.join(","));
        }

        trace!("QEMU cmdline: {:?}", &cmdline);
        cmdline
    }
}

pub struct QemuBuilder {
    args: QemuArgs,
    exe: String,
}

impl QemuBuilder {
    pub fn new(config: &LaunchConfig) -> Self {
        Self {
            args: QemuArgs {
                accel: config.accel,
                no_reboot: config.no_reboot,
                machine: config.machine.clone(),
                cpu: config.cpu.clone(),
                smp: config.smp.to_string(),
                memory: config.memory.to_string(),
                serial: config.serial.clone(),
                display: config.display.clone(),
                net: config.net.clone(),
                bios: config.bios.display().to_string(),

                // The boot volume is a host directory QEMU synthesizes a FAT
                // filesystem from; the second drive only backs the NVMe device
                drive: vec![
                    format!("format=raw,file=fat:rw:{}", config.fat_drive.display()),
                    format!(
                        "format=raw,file={},if=none,id={NVME_DRIVE_ID}",
                        config.nvme_image.display()
                    ),
                ],
                device: vec![format!(
                    "nvme,drive={NVME_DRIVE_ID},serial={}",
                    config.nvme_serial
                )],
                debug_log: config.debug_log.display().to_string(),
                trace: config.trace.clone(),
            },
            exe: config.qemu.clone(),
        }
    }

    /// The emulator binary that will be spawned.
    pub fn exe(&self) -> &str {
        &self.exe
    }

    /// The full argument list, without the binary.
    pub fn args(&self) -> Vec<String> {
        self.args.clone().into()
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.exe);
        command
            .args(self.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }

    pub fn start(self) -> Result<QemuProcess> {
        info!(exe = %self.exe, args = ?self.args, "Spawning new qemu process");

        let process = self
            .command()
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.exe))?;

        Ok(QemuProcess { process })
    }
}

/// Build the invocation for the given config, run it to completion and return
/// QEMU's exit status.
pub fn launch(config: &LaunchConfig) -> Result<ExitStatus> {
    QemuBuilder::new(config).start()?.wait()
}

/// Whether the error means the emulator binary could not be found.
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|cause| cause.kind() == io::ErrorKind::NotFound)
}

/// Map QEMU's exit status onto the launcher's own exit code. A signal death
/// becomes 128 + signal, like a shell reports it.
pub fn exit_code(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return match code {
            0 => 0,
            code if code as u8 == 0 => 1,
            code => code as u8,
        };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128u8.wrapping_add(signal as u8);
        }
    }

    1
}
