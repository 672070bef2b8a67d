//! berth command-line entry point.

use berth_orchestrator::cli::{commands, parse_cli};
use berth_utils::config::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = parse_cli();

    let config = Settings::new(cli.config.clone())?;
    berth_utils::logging::init(&config.log.level, &config.log.format)?;

    if !commands::run(cli.command, &config).await? {
        std::process::exit(1);
    }
    Ok(())
}
