use crate::config_loader::DEFAULT_CONFIG_PATH;
use clap::{Arg, ArgAction, Command};
use log::debug;
use std::time::Instant;

pub fn build_cli() -> Command {
    debug!("⚙️ Building CLI interface...");
    let start_time = Instant::now();
    let cmd = Command::new("rvision")
        .version("0.1.0")
        .author("rvision Developers")
        .about("Streams FRC coprocessor cameras and publishes vision results to NetworkTables.")
        .arg(
            Arg::new("config")
                .value_name("FILE")
                .help("Camera configuration file")
                .default_value(DEFAULT_CONFIG_PATH)
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("settings")
                .short('s')
                .long("settings")
                .value_name("FILE")
                .help("Optional YAML application settings")
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
        );
    debug!("✅ CLI interface built in {:?}", start_time.elapsed());
    cmd
}
