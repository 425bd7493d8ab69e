use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;

use contrapart_registry::SupplierRegistry;
use contrapart_sync::{HttpTransactionSource, RetrievalEngine};

mod cli;
mod commands;
mod config;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = config::Config::load(&cli.config)?;

    let registry = SupplierRegistry::load(&config.registry_path);
    tracing::info!(
        path = %config.registry_path.display(),
        suppliers = registry.len(),
        "supplier registry loaded"
    );
    let registry = Arc::new(Mutex::new(registry));

    match cli.command {
        Command::Suppliers(command) => commands::run_suppliers(&registry, command).await?,
        command => {
            let source = HttpTransactionSource::new(&config.api.base_url, &config.api.token)?;
            let engine =
                RetrievalEngine::new(source, Arc::clone(&registry), config.engine_config());
            match command {
                Command::Sync { from, to, limit } => {
                    commands::run_sync(&engine, from, to, limit).await
                }
                Command::Search { term } => commands::run_search(&engine, &term).await,
                Command::Stats => commands::run_stats(&engine).await,
                Command::Suppliers(_) => unreachable!("handled above"),
            }
        }
    }

    Ok(())
}
