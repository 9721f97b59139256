use anyhow::{Context, Result};
use byte_unit::Byte;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::qemu::Accel;

/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG: &str = "gsai-launch.toml";

/// Guest RAM allocation in QEMU's `-m` syntax.
#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub struct Memory(pub String);

impl Default for Memory {
    fn default() -> Self {
        Self("64M".to_string())
    }
}

impl std::fmt::Display for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Memory {
    /// Whether the string is in the form `-m` accepts: digits with at most one
    /// K, M, G or T suffix.
    fn is_qemu_size(&self) -> bool {
        let digits = self
            .0
            .strip_suffix(['K', 'M', 'G', 'T', 'k', 'm', 'g', 't'])
            .unwrap_or(&self.0);
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Validate for Memory {
    fn validate(&self) -> std::result::Result<(), validator::ValidationErrors> {
        if !self.is_qemu_size() {
            let mut errors = validator::ValidationErrors::new();
            errors.add(
                "memory",
                ValidationError::new(
                    "Invalid memory size. Expected digits with an optional K, M, G or T suffix (e.g. '64M', '1G')",
                ),
            );
            return Err(errors);
        }

        // QEMU takes lowercase suffixes too
        match self.0.to_ascii_uppercase().parse::<Byte>() {
            Ok(byte) => {
                if byte.as_u64() == 0 {
                    let mut errors = validator::ValidationErrors::new();
                    errors.add(
                        "memory",
                        ValidationError::new("Memory size must be greater than zero"),
                    );
                    return Err(errors);
                }
                Ok(())
            }
            Err(_) => {
                let mut errors = validator::ValidationErrors::new();
                errors.add(
                    "memory",
                    ValidationError::new(
                        "Invalid memory size. Expected a number followed by a unit (e.g. '64M', '1G')",
                    ),
                );
                Err(errors)
            }
        }
    }
}

fn validate_trace(trace: &[String]) -> std::result::Result<(), ValidationError> {
    if trace.iter().any(|category| category.trim().is_empty()) {
        return Err(ValidationError::new("Trace categories must not be empty"));
    }
    Ok(())
}

/// Everything that goes into one QEMU invocation. The defaults boot the kernel
/// image from the current directory.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchConfig {
    /// Emulator binary, resolved through PATH when not a path
    pub qemu: String,

    pub accel: Accel,

    /// Halt instead of resetting when the guest triple faults
    pub no_reboot: bool,

    pub machine: String,

    pub cpu: String,

    #[validate(range(min = 1))]
    pub smp: u32,

    #[validate(nested)]
    pub memory: Memory,

    pub serial: String,

    pub display: String,

    pub net: String,

    /// UEFI firmware
    pub bios: PathBuf,

    /// Host directory exposed to the guest as a FAT volume
    pub fat_drive: PathBuf,

    /// Raw image backing the NVMe controller
    pub nvme_image: PathBuf,

    pub nvme_serial: String,

    /// Where QEMU writes its `-d` output
    pub debug_log: PathBuf,

    #[validate(custom(function = "validate_trace"))]
    pub trace: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            qemu: String::from("qemu-system-x86_64"),
            accel: Accel::Kvm,
            no_reboot: true,
            machine: String::from("q35"),
            cpu: String::from("host"),
            smp: 2,
            memory: Memory::default(),
            serial: String::from("mon:stdio"),
            display: String::from("none"),
            net: String::from("none"),
            bios: PathBuf::from("./ovmf.fd"),
            fat_drive: PathBuf::from("./.hdd/image/"),
            nvme_image: PathBuf::from("./.hdd/nvme.img"),
            nvme_serial: String::from("deadbeef"),
            debug_log: PathBuf::from(".debug/qemu_debug.log"),
            trace: vec![String::from("int"), String::from("guest_errors")],
        }
    }
}

impl LaunchConfig {
    /// Locate the default config file in the given directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Option<PathBuf> {
        let path = dir.as_ref().join(DEFAULT_CONFIG);
        if path.is_file() { Some(path) } else { None }
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load the explicitly requested config, or the one in the working
    /// directory if there is one, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                debug!(path = ?path, "Loading config");
                Self::from_file(path)
            }
            None => match Self::from_dir(".") {
                Some(path) => {
                    debug!(path = ?path, "Loading config from working directory");
                    Self::from_file(path)
                }
                None => Ok(Self::default()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = LaunchConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_memory() {
        for memory in ["64M", "1G", "512m", "2T", "67108864"] {
            assert!(
                Memory(memory.to_string()).validate().is_ok(),
                "Expected '{}' to be valid",
                memory
            );
        }
    }

    #[test]
    fn test_invalid_memory() {
        for memory in [
            "", "abc", "M64", "64X", "0", "0M", "512 MB", "64MiB", "1.5G", "1.5 GB", "64MM", "-64M",
        ] {
            assert!(
                Memory(memory.to_string()).validate().is_err(),
                "Expected '{}' to be invalid",
                memory
            );
        }
    }

    #[test]
    fn test_zero_smp() {
        let config = LaunchConfig {
            smp: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_trace_category() {
        let config = LaunchConfig {
            trace: vec![String::from("int"), String::from(" ")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "smp = 4")?;
        writeln!(file, "memory = \"256M\"")?;
        writeln!(file, "accel = \"tcg\"")?;

        let config = LaunchConfig::from_file(file.path())?;
        assert_eq!(config.smp, 4);
        assert_eq!(config.memory, Memory(String::from("256M")));
        assert_eq!(config.accel, Accel::Tcg);

        let default = LaunchConfig::default();
        assert_eq!(config.machine, default.machine);
        assert_eq!(config.bios, default.bios);
        assert_eq!(config.trace, default.trace);
        Ok(())
    }

    #[test]
    fn test_unknown_key_rejected() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "memroy = \"256M\"")?;

        assert!(LaunchConfig::from_file(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_explicit_file() {
        assert!(LaunchConfig::load(Some(Path::new("/nonexistent/gsai-launch.toml"))).is_err());
    }

    #[test]
    fn test_from_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(LaunchConfig::from_dir(dir.path()), None);

        std::fs::write(dir.path().join(DEFAULT_CONFIG), "cpu = \"max\"\n")?;
        let path = LaunchConfig::from_dir(dir.path()).expect("config file should be found");
        assert_eq!(LaunchConfig::from_file(path)?.cpu, "max");
        Ok(())
    }
}
