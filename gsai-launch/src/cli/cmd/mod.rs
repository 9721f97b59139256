use crate::config::{DEFAULT_CONFIG, LaunchConfig};
use crate::qemu::Accel;
use anyhow::{Result, bail};
use std::path::Path;
use tracing::debug;
use validator::Validate;

pub mod args;
pub mod check;
pub mod run;
pub mod version;

/// Settings that can be overridden per invocation without a config file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LaunchOverrides {
    /// Disable virtual machine acceleration (use TCG instead of KVM)
    #[clap(long, num_args = 0)]
    pub no_accel: bool,

    /// The QEMU binary to run
    #[clap(long)]
    pub qemu: Option<String>,

    /// Guest memory size (e.g. 64M, 1G)
    #[clap(long)]
    pub memory: Option<String>,

    /// Number of virtual CPUs
    #[clap(long)]
    pub smp: Option<u32>,
}

impl LaunchOverrides {
    pub fn apply(&self, config: &mut LaunchConfig) {
        if self.no_accel {
            config.accel = Accel::Tcg;
        }
        if let Some(qemu) = &self.qemu {
            config.qemu = qemu.clone();
        }
        if let Some(memory) = &self.memory {
            config.memory.0 = memory.clone();
        }
        if let Some(smp) = self.smp {
            config.smp = smp;
        }
    }
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Commands {
    /// Boot the kernel image (the default when no command is given)
    Run {
        #[clap(flatten)]
        overrides: LaunchOverrides,
    },

    /// Print the QEMU command line without running it
    Args {
        #[clap(flatten)]
        overrides: LaunchOverrides,
    },

    /// Check that the emulator and the files it needs are in place
    Check {},

    /// Show build information
    Version {},
}

/// Load the config file (or defaults), apply command line overrides and
/// validate the result.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: Option<&LaunchOverrides>,
) -> Result<LaunchConfig> {
    let mut config = LaunchConfig::load(path)?;

    if let Some(overrides) = overrides {
        overrides.apply(&mut config);
    }

    if let Err(errors) = config.validate() {
        bail!(
            "Invalid launch configuration ({}): {}",
            path.map(|p| p.display().to_string())
                .unwrap_or_else(|| DEFAULT_CONFIG.to_string()),
            errors
        );
    }

    debug!(config = ?config, "Resolved launch configuration");
    Ok(config)
}
