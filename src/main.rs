mod main_runtime;

use clap::Parser;
use qc_dsp::adapters::bidder_server;
use qc_dsp::bootstrap::build_app_state;
use qc_dsp::cli::{self, Cli, Commands};
use qc_dsp::config::AppConfig;
use tracing::{error, info};

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve { port: None });

    match command {
        Commands::Serve { port } => {
            let config = load_config(&cli.config_dir)?;
            init_logging(&config.log_level, config.log_json);
            config.warn_placeholders();
            let port = port.unwrap_or(config.port);

            info!(
                port,
                seat_id = %config.seat_id,
                campaign_id = %config.default_campaign_id,
                strategy = %config.strategy.kind,
                "starting bidder"
            );
            let state = build_app_state(&config).await?;
            if let Err(e) = bidder_server::serve(state, port).await {
                error!(error = %e, "bidder server failed");
                return Err(e.into());
            }
        }
        Commands::Simulate {
            auctions,
            seed,
            concurrency,
            json,
        } => {
            let config = load_config(&cli.config_dir)?;
            init_logging(&config.log_level, config.log_json);

            let report = cli::run_simulation(&config, auctions, seed, concurrency).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                cli::print_simulation(&report);
            }
        }
        Commands::Loadgen {
            url,
            count,
            delay_ms,
            seed,
        } => {
            init_logging_simple();
            let report = cli::run_loadgen(&url, count, delay_ms, seed).await?;
            println!(
                "sent {} | bids {} | no-bids {} | errors {}",
                report.sent, report.bids, report.no_bids, report.errors
            );
        }
    }

    Ok(())
}

fn load_config(dir: &std::path::Path) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    config.validate()?;
    Ok(config)
}
