mod cli;
mod server;

use clap::Parser;
use cli::{Cli, Commands};
use pinkeep::config::Config;
use pinkeep::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    init_tracing(&config.telemetry.log_filter);

    match cli.command {
        Commands::Serve => server::serve(config).await?,
        Commands::Settle => server::settle_once(config).await?,
        Commands::Reclaim => server::reclaim_once(config).await?,
        Commands::RecordPayment(args) => server::record_payment(config, args).await?,
    }

    Ok(())
}
