mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use logbook::{api, config::Config, observability};
use tracing::info;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    observability::init_tracing(&config.telemetry)?;

    match cli.command {
        Commands::Server(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            info!(version = env!("CARGO_PKG_VERSION"), "Starting logbook");
            api::run(config).await?;
        }
        Commands::Check => {
            let state = api::AppState::from_config(config)?;
            let status = state.probe.check().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !status.all_available() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
