use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    /// Fallback for upstream rows that omit the direction flag.
    pub fn from_amount(amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            other => Err(format!("unknown direction: '{other}'")),
        }
    }
}

/// One ledger movement, built once at the ingestion boundary and never
/// mutated afterwards. The description is the counterparty display name
/// concatenated with the first non-empty free-text field of the raw row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub iban: String,
    pub amount: Decimal,
    pub direction: Direction,
    pub value_date: DateTime<Utc>,
    pub description: String,
    pub currency: String,
    pub account_ref: String,
}

impl Transaction {
    pub fn is_credit(&self) -> bool {
        self.direction == Direction::Credit
    }

    pub fn is_debit(&self) -> bool {
        self.direction == Direction::Debit
    }
}
