use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "contrapart",
    about = "Bank ledger retrieval with self-learning supplier resolution"
)]
pub struct Cli {
    /// Path to the toml configuration file.
    #[arg(long, default_value = "contrapart.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch transactions from the upstream ledger.
    Sync {
        /// First value date to include (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last value date to include (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Stop after this many transactions.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List transactions whose description resolves to a supplier term.
    Search { term: String },
    /// Summarize the full ledger.
    Stats,
    /// Manage the supplier registry.
    #[command(subcommand)]
    Suppliers(SupplierCommand),
}

#[derive(Debug, Subcommand)]
pub enum SupplierCommand {
    /// Print every registered supplier with its aliases and patterns.
    List,
    /// Register a supplier by name; the canonical key is derived.
    Add {
        name: String,
        /// Extra aliases beyond the generated set.
        #[arg(long = "alias")]
        aliases: Vec<String>,
    },
    /// Delete a supplier by canonical key.
    Remove { key: String },
    /// Bulk-import counterparty names from a CSV export.
    Import {
        file: PathBuf,
        /// Toml file with curated alias overrides per canonical key.
        #[arg(long)]
        overrides: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_with_period() {
        let cli = Cli::try_parse_from([
            "contrapart", "sync", "--from", "2025-12-01", "--to", "2025-12-31",
        ])
        .unwrap();
        match cli.command {
            Command::Sync { from, to, limit } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2025, 12, 1));
                assert_eq!(to, NaiveDate::from_ymd_opt(2025, 12, 31));
                assert_eq!(limit, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_supplier_add_with_aliases() {
        let cli = Cli::try_parse_from([
            "contrapart", "suppliers", "add", "Globex NV", "--alias", "globex intl",
        ])
        .unwrap();
        match cli.command {
            Command::Suppliers(SupplierCommand::Add { name, aliases }) => {
                assert_eq!(name, "Globex NV");
                assert_eq!(aliases, vec!["globex intl".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(Cli::try_parse_from(["contrapart", "sync", "--from", "not-a-date"]).is_err());
    }
}
