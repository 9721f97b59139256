use crate::config::LaunchConfig;
use crate::qemu::Accel;
use console::style;
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::error;

/// One line of the preflight report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub detail: String,
    pub ok: bool,
}

impl CheckItem {
    fn path(name: &'static str, path: &Path, ok: bool) -> Self {
        Self {
            name,
            detail: path.display().to_string(),
            ok,
        }
    }
}

/// Inspect everything QEMU will need for the given config. Nothing is created
/// or modified.
pub fn preflight(config: &LaunchConfig) -> Vec<CheckItem> {
    let mut items = Vec::new();

    items.push(match which::which(&config.qemu) {
        Ok(path) => CheckItem::path("emulator", &path, true),
        Err(_) => CheckItem {
            name: "emulator",
            detail: config.qemu.clone(),
            ok: false,
        },
    });

    if config.accel == Accel::Kvm && cfg!(target_os = "linux") {
        let kvm = PathBuf::from("/dev/kvm");
        let ok = kvm.exists();
        items.push(CheckItem::path("kvm", &kvm, ok));
    }

    items.push(CheckItem::path(
        "firmware",
        &config.bios,
        config.bios.is_file(),
    ));
    items.push(CheckItem::path(
        "fat drive",
        &config.fat_drive,
        config.fat_drive.is_dir(),
    ));
    items.push(CheckItem::path(
        "nvme image",
        &config.nvme_image,
        config.nvme_image.is_file(),
    ));

    let log_dir = match config.debug_log.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let ok = log_dir.is_dir();
    items.push(CheckItem::path("debug log directory", &log_dir, ok));

    items
}

pub fn run(cmd: super::Commands, config_path: Option<&Path>) -> ExitCode {
    match cmd {
        super::Commands::Check {} => {
            let config = match super::resolve_config(config_path, None) {
                Ok(config) => config,
                Err(err) => {
                    error!(error = ?err, "Failed to load launch configuration");
                    return ExitCode::FAILURE;
                }
            };

            let items = preflight(&config);
            for item in &items {
                let status = if item.ok {
                    style("OK     ").green()
                } else {
                    style("MISSING").red().bold()
                };
                println!("{status} {:20} {}", item.name, item.detail);
            }

            if items.iter().all(|item| item.ok) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        _ => panic!("Must be passed a Commands::Check"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn item<'a>(items: &'a [CheckItem], name: &str) -> &'a CheckItem {
        items.iter().find(|item| item.name == name).unwrap()
    }

    #[test]
    fn test_missing_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = LaunchConfig {
            qemu: String::from("gsai-launch-no-such-emulator"),
            accel: Accel::Tcg,
            bios: dir.path().join("ovmf.fd"),
            fat_drive: dir.path().join(".hdd/image"),
            nvme_image: dir.path().join(".hdd/nvme.img"),
            debug_log: dir.path().join(".debug/qemu_debug.log"),
            ..Default::default()
        };

        let items = preflight(&config);
        assert!(items.iter().all(|item| !item.ok));
        assert!(items.iter().all(|item| item.name != "kvm"));

        // Nothing was created along the way
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_present_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("ovmf.fd"), b"")?;
        std::fs::create_dir_all(dir.path().join(".hdd/image"))?;
        std::fs::write(dir.path().join(".hdd/nvme.img"), b"")?;
        std::fs::create_dir_all(dir.path().join(".debug"))?;

        let config = LaunchConfig {
            accel: Accel::Tcg,
            bios: dir.path().join("ovmf.fd"),
            fat_drive: dir.path().join(".hdd/image"),
            nvme_image: dir.path().join(".hdd/nvme.img"),
            debug_log: dir.path().join(".debug/qemu_debug.log"),
            ..Default::default()
        };

        let items = preflight(&config);
        assert!(item(&items, "firmware").ok);
        assert!(item(&items, "fat drive").ok);
        assert!(item(&items, "nvme image").ok);
        assert!(item(&items, "debug log directory").ok);
        Ok(())
    }

    #[test]
    fn test_wrong_kinds() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("ovmf.fd"))?;
        std::fs::write(dir.path().join("image"), b"")?;

        let config = LaunchConfig {
            bios: dir.path().join("ovmf.fd"),
            fat_drive: dir.path().join("image"),
            ..Default::default()
        };

        let items = preflight(&config);
        assert!(!item(&items, "firmware").ok);
        assert!(!item(&items, "fat drive").ok);
        Ok(())
    }

    #[test]
    fn test_log_in_working_directory() {
        let config = LaunchConfig {
            debug_log: PathBuf::from("qemu_debug.log"),
            ..Default::default()
        };

        let items = preflight(&config);
        let log_dir = item(&items, "debug log directory");
        assert_eq!(log_dir.detail, ".");
        assert!(log_dir.ok);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_kvm_checked_only_with_kvm() {
        let items = preflight(&LaunchConfig::default());
        assert!(items.iter().any(|item| item.name == "kvm"));
    }
}
