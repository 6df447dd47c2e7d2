use log::debug;
use std::env;
use std::error::Error;
use std::process;

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::new();
    init_logger(&config)?;
    debug!("配置加载成功 {}", config.config_dir.display());

    let mut shell = Shell::new(&config)?;
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => shell.run(),
        [flag, line] if flag == "-c" => process::exit(shell.run_command(line)),
        _ => {
            eprintln!("usage: {} [-c <command>]", config.name);
            process::exit(1);
        }
    }
}
