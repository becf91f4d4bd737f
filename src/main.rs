mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mediabox::config::Config;
use mediabox::engines::BuiltinEngines;
use mediabox::observability;
use mediabox::storage::StorageClient;
use std::sync::Arc;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let config = load_config(args.config.config)?;
            mediabox::api::run(config, args.address).await?;
        }
        Commands::Select(args) => {
            let config = load_config(args.config.config)?;
            let registry = config.engine_registry()?;
            for engine in registry.select_engines(&args.url, args.engine.as_deref(), None) {
                println!("{engine}");
            }
        }
        Commands::Check(args) => {
            let config = load_config(args.config)?;
            let storage = Arc::new(StorageClient::local(&config.storage.download_dir)?);
            let engines = BuiltinEngines::from_config(&config.engines, storage)?;

            let mut missing = 0;
            for (engine, result) in engines.extractors.check_all().await {
                match result {
                    Ok(version) => println!("{engine}\tok\t{version}"),
                    Err(e) => {
                        missing += 1;
                        println!("{engine}\tunavailable\t{e}");
                    }
                }
            }
            if missing > 0 {
                return Err(format!("{missing} engine(s) unavailable").into());
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<std::path::PathBuf>) -> Result<Config, AnyError> {
    let config = Config::load_with(path)?;
    observability::init_tracing(&config.telemetry);
    Ok(config)
}
