use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use contrapart_core::{Direction, Transaction};

use crate::error::SourceError;

/// One page request against the upstream ledger. Results are always ordered
/// by value date, descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub offset: usize,
    pub page_size: usize,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Abstraction over the paginated upstream transaction endpoint.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RawTransaction>, SourceError>;
}

/// Upstream row as delivered. Every field the upstream may omit defaults,
/// so payload irregularities stop at this boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub iban: String,
    pub amount: Decimal,
    #[serde(default)]
    pub direction: Option<String>,
    pub value_date: DateTime<Utc>,
    #[serde(default)]
    pub counterparty_name: String,
    #[serde(default)]
    pub communication: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub account_ref: Option<String>,
}

impl RawTransaction {
    /// Convert into the domain record: IBAN whitespace stripped, description
    /// composed from the counterparty name plus the first non-empty
    /// free-text field, direction from the flag or the amount sign.
    pub fn into_transaction(self) -> Transaction {
        let direction = self
            .direction
            .as_deref()
            .and_then(|flag| Direction::from_str(flag).ok())
            .unwrap_or_else(|| Direction::from_amount(self.amount));

        let free_text = [self.communication.as_deref(), self.note.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty());

        let description = match (self.counterparty_name.trim(), free_text) {
            ("", Some(text)) => text.to_string(),
            (name, None) => name.to_string(),
            (name, Some(text)) => format!("{name} {text}"),
        };

        Transaction {
            id: self.id,
            iban: self.iban.split_whitespace().collect(),
            amount: self.amount,
            direction,
            value_date: self.value_date,
            description,
            currency: self
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "EUR".to_string()),
            account_ref: self.account_ref.unwrap_or_default(),
        }
    }
}
