use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use contrapart_core::{DayWindow, Transaction};
use contrapart_registry::{learner, resolver, SupplierRegistry};

use crate::cache::TransactionCache;
use crate::source::{PageQuery, TransactionSource};

/// Cache key for the unconstrained query. Date-bounded fetches never touch
/// the cache under any key.
const UNBOUNDED_CACHE_KEY: &str = "all";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upstream hard page cap.
    pub page_size: usize,
    /// Pause between page requests, respecting upstream throttling.
    pub page_delay: Duration,
    pub cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 120,
            page_delay: Duration::from_millis(500),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub limit: Option<usize>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl FetchOptions {
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn period(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            limit: None,
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn is_dated(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerStats {
    pub transaction_count: usize,
    pub credit_total: Decimal,
    /// Sum of debit magnitudes, reported as a positive number.
    pub debit_total: Decimal,
    pub net: Decimal,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl LedgerStats {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut stats = LedgerStats {
            transaction_count: transactions.len(),
            ..Default::default()
        };
        for tx in transactions {
            if tx.is_credit() {
                stats.credit_total += tx.amount;
            } else {
                stats.debit_total += tx.amount.abs();
            }
            stats.earliest = Some(match stats.earliest {
                Some(e) => e.min(tx.value_date),
                None => tx.value_date,
            });
            stats.latest = Some(match stats.latest {
                Some(l) => l.max(tx.value_date),
                None => tx.value_date,
            });
        }
        stats.net = stats.credit_total - stats.debit_total;
        stats
    }
}

/// Presents a complete, correctly time-windowed transaction sequence over a
/// page-capped upstream, while learning supplier identities from every
/// observed description as a side effect of ingestion.
///
/// Upstream failures abort the current pagination loop only: accumulated
/// results are returned as-is, so every fetch is best-effort and callers
/// cannot distinguish a complete sequence from one truncated by an error.
pub struct RetrievalEngine<S> {
    source: S,
    config: EngineConfig,
    registry: Arc<Mutex<SupplierRegistry>>,
    cache: Mutex<TransactionCache>,
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: TransactionSource> RetrievalEngine<S> {
    pub fn new(source: S, registry: Arc<Mutex<SupplierRegistry>>, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            registry,
            cache: Mutex::new(TransactionCache::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> Arc<Mutex<SupplierRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Fetch the transaction sequence for `opts`, newest first.
    ///
    /// Unconstrained calls are answered from the cache when fresh;
    /// concurrent cache misses share a single upstream pagination sequence.
    /// Explicit date bounds always go upstream. Only a non-empty, fully
    /// unconstrained (no dates, no limit) result populates the cache.
    pub async fn fetch_all(&self, opts: &FetchOptions) -> Vec<Transaction> {
        if opts.is_dated() {
            return self.paginate(opts).await;
        }

        if let Some(hit) = self.cache.lock().await.get(UNBOUNDED_CACHE_KEY) {
            return truncated(hit, opts.limit);
        }

        let flight = self.flight_guard(UNBOUNDED_CACHE_KEY).await;
        let _in_flight = flight.lock().await;

        // A concurrent caller may have landed while we waited on the guard.
        if let Some(hit) = self.cache.lock().await.get(UNBOUNDED_CACHE_KEY) {
            return truncated(hit, opts.limit);
        }

        let transactions = self.paginate(opts).await;
        if opts.limit.is_none() && !transactions.is_empty() {
            self.cache.lock().await.put(
                UNBOUNDED_CACHE_KEY,
                transactions.clone(),
                self.config.cache_ttl,
            );
        }
        transactions
    }

    /// Fetch with date bounds, then re-filter client-side: the upstream
    /// filter is date-only and may include boundary-adjacent rows outside
    /// the intended window.
    pub async fn fetch_by_period(&self, start: NaiveDate, end: NaiveDate) -> Vec<Transaction> {
        let window = DayWindow::new(start, end);
        self.fetch_all(&FetchOptions::period(start, end))
            .await
            .into_iter()
            .filter(|tx| window.contains(tx.value_date))
            .collect()
    }

    pub async fn credits(&self) -> Vec<Transaction> {
        self.fetch_all(&FetchOptions::unconstrained())
            .await
            .into_iter()
            .filter(Transaction::is_credit)
            .collect()
    }

    pub async fn debits(&self) -> Vec<Transaction> {
        self.fetch_all(&FetchOptions::unconstrained())
            .await
            .into_iter()
            .filter(Transaction::is_debit)
            .collect()
    }

    /// Transactions whose description resolves to `term` via the supplier
    /// registry.
    pub async fn search_by_description(&self, term: &str) -> Vec<Transaction> {
        let transactions = self.fetch_all(&FetchOptions::unconstrained()).await;
        let registry = self.registry.lock().await;
        transactions
            .into_iter()
            .filter(|tx| resolver::matches(&registry, &tx.description, term))
            .collect()
    }

    pub async fn stats(&self) -> LedgerStats {
        let transactions = self.fetch_all(&FetchOptions::unconstrained()).await;
        LedgerStats::from_transactions(&transactions)
    }

    pub async fn flush_cache(&self) {
        self.cache.lock().await.flush();
    }

    async fn flight_guard(&self, key: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        Arc::clone(
            flights
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn paginate(&self, opts: &FetchOptions) -> Vec<Transaction> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            if opts.limit.is_some_and(|limit| all.len() >= limit) {
                break;
            }

            let query = PageQuery {
                offset,
                page_size: self.config.page_size,
                from: opts.start,
                to: opts.end,
            };
            let page = match self.source.fetch_page(&query).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        offset,
                        accumulated = all.len(),
                        error = %e,
                        "upstream page fetch failed, returning partial results"
                    );
                    break;
                }
            };
            let count = page.len();

            {
                let mut registry = self.registry.lock().await;
                for raw in page {
                    let tx = raw.into_transaction();
                    learner::learn(&mut registry, &tx.description);
                    all.push(tx);
                }
            }

            if count == 0 || count < self.config.page_size {
                break;
            }
            offset += count;
            tokio::time::sleep(self.config.page_delay).await;
        }

        if let Some(limit) = opts.limit {
            all.truncate(limit);
        }
        all
    }
}

fn truncated(mut transactions: Vec<Transaction>, limit: Option<usize>) -> Vec<Transaction> {
    if let Some(limit) = limit {
        transactions.truncate(limit);
    }
    transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::RawTransaction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockSource {
        pages: Vec<Vec<RawTransaction>>,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        delay: Duration,
    }

    impl MockSource {
        fn new(pages: Vec<Vec<RawTransaction>>) -> Self {
            Self {
                pages,
                calls: AtomicUsize::new(0),
                fail_on_call: None,
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransactionSource for MockSource {
        async fn fetch_page(&self, _query: &PageQuery) -> Result<Vec<RawTransaction>, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_on_call == Some(call) {
                return Err(SourceError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
            Ok(self.pages.get(call).cloned().unwrap_or_default())
        }
    }

    fn raw(id: usize, date: &str, amount_cents: i64) -> RawTransaction {
        RawTransaction {
            id: format!("tx-{id}"),
            iban: "BE68 5390 0754 7034".to_string(),
            amount: Decimal::new(amount_cents, 2),
            direction: None,
            value_date: DateTime::parse_from_rfc3339(date).unwrap().with_timezone(&Utc),
            counterparty_name: format!("COUNTERPARTY {id}"),
            communication: None,
            note: None,
            currency: None,
            account_ref: None,
        }
    }

    /// Pages of the given sizes, ids strictly increasing and value dates
    /// strictly descending across the whole sequence.
    fn descending_pages(sizes: &[usize]) -> Vec<Vec<RawTransaction>> {
        let mut id = 0;
        sizes
            .iter()
            .map(|&size| {
                (0..size)
                    .map(|_| {
                        id += 1;
                        let day = 28 - (id / 50) as u32;
                        let secs = 86_399 - (id % 50) as u32;
                        raw(
                            id,
                            &format!(
                                "2025-12-{day:02}T{:02}:{:02}:{:02}Z",
                                secs / 3600,
                                (secs % 3600) / 60,
                                secs % 60
                            ),
                            -1000,
                        )
                    })
                    .collect()
            })
            .collect()
    }

    fn engine_with(
        pages: Vec<Vec<RawTransaction>>,
    ) -> (tempfile::TempDir, RetrievalEngine<MockSource>) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(Mutex::new(SupplierRegistry::new(
            dir.path().join("suppliers.json"),
        )));
        let config = EngineConfig {
            page_size: 120,
            page_delay: Duration::ZERO,
            cache_ttl: Duration::from_secs(300),
        };
        let engine = RetrievalEngine::new(MockSource::new(pages), registry, config);
        (dir, engine)
    }

    #[tokio::test]
    async fn paginates_until_short_page() {
        let (_dir, engine) = engine_with(descending_pages(&[120, 120, 45]));

        let transactions = engine.fetch_all(&FetchOptions::unconstrained()).await;

        assert_eq!(transactions.len(), 285);
        assert_eq!(engine.source.calls(), 3);
        // No duplicates.
        let mut ids: Vec<&str> = transactions.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 285);
        // Descending value-date order preserved.
        assert!(transactions.windows(2).all(|w| w[0].value_date >= w[1].value_date));
    }

    #[tokio::test]
    async fn stops_on_empty_page() {
        let (_dir, engine) = engine_with(vec![descending_pages(&[120])[0].clone(), vec![]]);
        let transactions = engine.fetch_all(&FetchOptions::unconstrained()).await;
        assert_eq!(transactions.len(), 120);
        assert_eq!(engine.source.calls(), 2);
    }

    #[tokio::test]
    async fn limit_stops_pagination_and_truncates() {
        let (_dir, engine) = engine_with(descending_pages(&[120, 120, 45]));
        let transactions = engine.fetch_all(&FetchOptions::with_limit(130)).await;
        assert_eq!(transactions.len(), 130);
        assert_eq!(engine.source.calls(), 2);
    }

    #[tokio::test]
    async fn second_unconstrained_fetch_is_served_from_cache() {
        let (_dir, engine) = engine_with(descending_pages(&[45]));

        let first = engine.fetch_all(&FetchOptions::unconstrained()).await;
        let second = engine.fetch_all(&FetchOptions::unconstrained()).await;

        assert_eq!(first, second);
        assert_eq!(engine.source.calls(), 1);
    }

    #[tokio::test]
    async fn empty_result_is_not_cached() {
        let (_dir, engine) = engine_with(vec![vec![], vec![]]);

        assert!(engine.fetch_all(&FetchOptions::unconstrained()).await.is_empty());
        assert!(engine.fetch_all(&FetchOptions::unconstrained()).await.is_empty());

        // Both calls went upstream.
        assert_eq!(engine.source.calls(), 2);
    }

    #[tokio::test]
    async fn expired_cache_entry_triggers_refetch() {
        let (_dir, engine) = {
            let dir = tempfile::tempdir().unwrap();
            let registry = Arc::new(Mutex::new(SupplierRegistry::new(
                dir.path().join("suppliers.json"),
            )));
            let config = EngineConfig {
                page_size: 120,
                page_delay: Duration::ZERO,
                cache_ttl: Duration::ZERO,
            };
            let engine = RetrievalEngine::new(
                MockSource::new(descending_pages(&[45, 45])),
                registry,
                config,
            );
            (dir, engine)
        };

        engine.fetch_all(&FetchOptions::unconstrained()).await;
        engine.fetch_all(&FetchOptions::unconstrained()).await;
        assert_eq!(engine.source.calls(), 2);
    }

    #[tokio::test]
    async fn dated_fetch_bypasses_cache() {
        let (_dir, engine) = engine_with(descending_pages(&[45, 45, 45]));
        let day = NaiveDate::from_ymd_opt(2025, 12, 28).unwrap();

        engine.fetch_all(&FetchOptions::unconstrained()).await;
        engine.fetch_all(&FetchOptions::period(day, day)).await;
        engine.fetch_all(&FetchOptions::period(day, day)).await;

        // One call for the unconstrained fetch, one per dated fetch.
        assert_eq!(engine.source.calls(), 3);
    }

    #[tokio::test]
    async fn limited_fetch_does_not_populate_cache() {
        let (_dir, engine) = engine_with(descending_pages(&[45, 45]));

        engine.fetch_all(&FetchOptions::with_limit(10)).await;
        engine.fetch_all(&FetchOptions::unconstrained()).await;

        assert_eq!(engine.source.calls(), 2);
    }

    #[tokio::test]
    async fn upstream_error_returns_partial_results() {
        let mut source = MockSource::new(descending_pages(&[120, 120, 45]));
        source.fail_on_call = Some(1);
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(Mutex::new(SupplierRegistry::new(
            dir.path().join("suppliers.json"),
        )));
        let engine = RetrievalEngine::new(
            source,
            registry,
            EngineConfig {
                page_size: 120,
                page_delay: Duration::ZERO,
                cache_ttl: Duration::from_secs(300),
            },
        );

        let transactions = engine.fetch_all(&FetchOptions::unconstrained()).await;
        assert_eq!(transactions.len(), 120);
        assert_eq!(engine.source.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_upstream_sequence() {
        let mut source = MockSource::new(descending_pages(&[45]));
        source.delay = Duration::from_millis(20);
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(Mutex::new(SupplierRegistry::new(
            dir.path().join("suppliers.json"),
        )));
        let engine = RetrievalEngine::new(
            source,
            registry,
            EngineConfig {
                page_size: 120,
                page_delay: Duration::ZERO,
                cache_ttl: Duration::from_secs(300),
            },
        );

        let opts = FetchOptions::unconstrained();
        let (a, b) = tokio::join!(engine.fetch_all(&opts), engine.fetch_all(&opts));

        assert_eq!(a.len(), 45);
        assert_eq!(a, b);
        assert_eq!(engine.source.calls(), 1);
    }

    #[tokio::test]
    async fn fetch_by_period_filters_boundary_adjacent_rows() {
        let pages = vec![vec![
            raw(1, "2025-12-25T00:00:00.001Z", -1000),
            raw(2, "2025-12-24T12:00:00.000Z", -1000),
            raw(3, "2025-12-23T23:59:59.999Z", -1000),
        ]];
        let (_dir, engine) = engine_with(pages);
        let day = NaiveDate::from_ymd_opt(2025, 12, 24).unwrap();

        let transactions = engine.fetch_by_period(day, day).await;

        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].id, "tx-2");
    }

    #[tokio::test]
    async fn credits_and_debits_split_by_direction() {
        let pages = vec![vec![
            raw(1, "2025-12-25T10:00:00Z", 150_00),
            raw(2, "2025-12-24T10:00:00Z", -40_00),
            raw(3, "2025-12-23T10:00:00Z", -10_00),
        ]];
        let (_dir, engine) = engine_with(pages);

        assert_eq!(engine.credits().await.len(), 1);
        assert_eq!(engine.debits().await.len(), 2);
    }

    #[tokio::test]
    async fn stats_totals_and_date_range() {
        let pages = vec![vec![
            raw(1, "2025-12-25T10:00:00Z", 150_00),
            raw(2, "2025-12-24T10:00:00Z", -40_00),
            raw(3, "2025-12-23T10:00:00Z", -10_00),
        ]];
        let (_dir, engine) = engine_with(pages);

        let stats = engine.stats().await;
        assert_eq!(stats.transaction_count, 3);
        assert_eq!(stats.credit_total, Decimal::new(150_00, 2));
        assert_eq!(stats.debit_total, Decimal::new(50_00, 2));
        assert_eq!(stats.net, Decimal::new(100_00, 2));
        assert_eq!(
            stats.earliest.unwrap(),
            DateTime::parse_from_rfc3339("2025-12-23T10:00:00Z").unwrap()
        );
        assert_eq!(
            stats.latest.unwrap(),
            DateTime::parse_from_rfc3339("2025-12-25T10:00:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn search_matches_learned_and_seeded_suppliers() {
        let pages = vec![vec![
            RawTransaction {
                counterparty_name: "EDENRED BELGIUM SA/NV".to_string(),
                communication: Some("31347257 629914ETR171225".to_string()),
                ..raw(1, "2025-12-25T10:00:00Z", -25_50)
            },
            raw(2, "2025-12-24T10:00:00Z", -40_00),
        ]];
        let dir = tempfile::tempdir().unwrap();
        // Seeded defaults so "Eden Red" resolves via the registry.
        let registry = Arc::new(Mutex::new(SupplierRegistry::load(
            dir.path().join("suppliers.json"),
        )));
        let engine = RetrievalEngine::new(
            MockSource::new(pages),
            registry,
            EngineConfig {
                page_size: 120,
                page_delay: Duration::ZERO,
                cache_ttl: Duration::from_secs(300),
            },
        );

        let hits = engine.search_by_description("Eden Red").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "tx-1");
    }

    #[tokio::test]
    async fn ingestion_learns_from_descriptions() {
        let pages = vec![vec![RawTransaction {
            counterparty_name: String::new(),
            communication: Some("VIREMENT A ACME SPRL BE68539007547034".to_string()),
            ..raw(1, "2025-12-25T10:00:00Z", -99_00)
        }]];
        let (_dir, engine) = engine_with(pages);

        engine.fetch_all(&FetchOptions::unconstrained()).await;

        let registry = engine.registry();
        let registry = registry.lock().await;
        assert!(registry.all().contains_key("acme"));
    }

    #[tokio::test]
    async fn flush_cache_forces_refetch() {
        let (_dir, engine) = engine_with(descending_pages(&[45, 45]));
        engine.fetch_all(&FetchOptions::unconstrained()).await;
        engine.flush_cache().await;
        engine.fetch_all(&FetchOptions::unconstrained()).await;
        assert_eq!(engine.source.calls(), 2);
    }
}
