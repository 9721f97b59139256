pub mod cli;
pub mod config;
pub mod qemu;

/// Build info
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
