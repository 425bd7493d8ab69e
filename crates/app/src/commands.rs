use anyhow::Context;
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use contrapart_core::Transaction;
use contrapart_registry::{bulk, learner, resolver, AliasOverrides, SupplierRegistry};
use contrapart_sync::{FetchOptions, RetrievalEngine, TransactionSource};

use crate::cli::SupplierCommand;

pub async fn run_sync<S: TransactionSource>(
    engine: &RetrievalEngine<S>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<usize>,
) {
    let transactions = match (from, to, limit) {
        (Some(from), Some(to), None) => engine.fetch_by_period(from, to).await,
        _ => {
            engine
                .fetch_all(&FetchOptions { limit, start: from, end: to })
                .await
        }
    };

    for tx in &transactions {
        println!("{}", format_transaction(tx));
    }
    println!("{} transactions", transactions.len());
}

pub async fn run_search<S: TransactionSource>(engine: &RetrievalEngine<S>, term: &str) {
    let display = {
        let registry = engine.registry();
        let registry = registry.lock().await;
        resolver::display_name(&registry, term)
    };
    let transactions = engine.search_by_description(term).await;

    println!("{display}:");
    for tx in &transactions {
        println!("{}", format_transaction(tx));
    }
    println!("{} matching transactions", transactions.len());
}

pub async fn run_stats<S: TransactionSource>(engine: &RetrievalEngine<S>) {
    let stats = engine.stats().await;
    println!("transactions: {}", stats.transaction_count);
    println!("credits:      {}", stats.credit_total);
    println!("debits:       {}", stats.debit_total);
    println!("net:          {}", stats.net);
    if let (Some(earliest), Some(latest)) = (stats.earliest, stats.latest) {
        println!(
            "period:       {} to {}",
            earliest.format("%Y-%m-%d"),
            latest.format("%Y-%m-%d")
        );
    }
}

pub async fn run_suppliers(
    registry: &Arc<Mutex<SupplierRegistry>>,
    command: SupplierCommand,
) -> anyhow::Result<()> {
    let mut registry = registry.lock().await;
    match command {
        SupplierCommand::List => {
            for (key, entry) in registry.all() {
                println!("{key}");
                println!("  aliases:  {}", entry.aliases.join(", "));
                println!("  patterns: {}", entry.patterns.join(", "));
            }
            println!("{} suppliers", registry.len());
        }
        SupplierCommand::Add { name, aliases } => {
            let outcome = learner::add_manual(&mut registry, &name, &aliases);
            println!("{outcome}");
        }
        SupplierCommand::Remove { key } => {
            if registry.remove(&key) {
                println!("removed {key}");
            } else {
                println!("no supplier under key '{key}'");
            }
        }
        SupplierCommand::Import { file, overrides } => {
            let names = read_counterparty_names(&file)?;
            let overrides = match overrides {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path).with_context(|| {
                        format!("failed to read overrides {}", path.display())
                    })?;
                    AliasOverrides::from_toml(&raw)
                        .with_context(|| format!("failed to parse overrides {}", path.display()))?
                }
                None => AliasOverrides::default(),
            };
            let summary = bulk::import_names(&mut registry, &names, &overrides);
            println!("{summary}");
        }
    }
    Ok(())
}

/// Counterparty names from an invoice export: first column of each record,
/// blank lines and `#` comments skipped.
fn read_counterparty_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(first) = record.get(0) {
            let first = first.trim();
            if !first.is_empty() && !first.starts_with('#') {
                names.push(first.to_string());
            }
        }
    }
    Ok(names)
}

fn format_transaction(tx: &Transaction) -> String {
    format!(
        "{}  {:>6}  {:>12} {}  {}",
        tx.value_date.format("%Y-%m-%d"),
        tx.direction.to_string(),
        tx.amount,
        tx.currency,
        tx.description
    )
}
