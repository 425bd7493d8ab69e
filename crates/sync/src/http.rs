use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::SourceError;
use crate::source::{PageQuery, RawTransaction, TransactionSource};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default)]
    items: Vec<RawTransaction>,
}

/// Bearer-authenticated client for the upstream ledger endpoint.
pub struct HttpTransactionSource {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTransactionSource {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn page_url(&self, query: &PageQuery) -> String {
        let mut url = format!(
            "{}/transactions?offset={}&limit={}&sort=value_date:desc",
            self.base_url, query.offset, query.page_size
        );
        if let Some(from) = query.from {
            url.push_str(&format!("&from={from}"));
        }
        if let Some(to) = query.to {
            url.push_str(&format!("&to={to}"));
        }
        url
    }
}

#[async_trait]
impl TransactionSource for HttpTransactionSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RawTransaction>, SourceError> {
        let url = self.page_url(query);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let envelope: PageEnvelope = response.json().await?;
        Ok(envelope.items)
    }
}
