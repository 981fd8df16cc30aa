use clap::Parser;
use error::AppError;
use museo_engine::Engine;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod commands;
mod config;
mod error;
mod utils;

use cli::{CliArgs, Command};
use commands::CommandExecutor;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("museo.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stderr, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("Museo - offline content cache for the audio guide");

    let config = config::engine_config(&args)?;
    let engine = Engine::new(config).await?;
    let executor = CommandExecutor::new(engine);

    match args.command {
        Command::Fetch {
            urls,
            range,
            navigate,
            offline,
            output,
        } => {
            executor
                .fetch(
                    &urls,
                    range.as_deref(),
                    navigate,
                    offline,
                    output.as_deref(),
                )
                .await?;
        }
        Command::Warm { urls } => executor.warm(&urls).await?,
        Command::Clear => executor.clear().await?,
        Command::Stores => executor.stores().await?,
        Command::Reconcile => executor.reconcile().await?,
        Command::Install => executor.install().await?,
    }

    Ok(())
}
