use crate::built_info;
use std::process::ExitCode;

pub fn run(cmd: super::Commands) -> ExitCode {
    match cmd {
        super::Commands::Version {} => {
            println!("{} {}", built_info::PKG_NAME, built_info::PKG_VERSION);
            println!("target:   {}", built_info::TARGET);
            println!("profile:  {}", built_info::PROFILE);
            println!("rustc:    {}", built_info::RUSTC_VERSION);
            println!("built:    {}", built_info::BUILT_TIME_UTC);
            ExitCode::SUCCESS
        }
        _ => panic!("Must be passed a Commands::Version"),
    }
}
