mod api;
mod cli;
mod config;
mod db;
mod error;
mod server;

use log::error;

use crate::cli::Cli;
use crate::config::Config;

fn main() {
    let config = Config::get();

    // RUST_LOG takes precedence over the configured level when set.
    let _logger = match flexi_logger::Logger::try_with_env_or_str(&config.logging.level) {
        Ok(logger) => logger.start().ok(),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    if let Err(err) = Cli::handle_command_line() {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
