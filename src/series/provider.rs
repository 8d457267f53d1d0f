//! Data provider capability and the ordered fallback chain
//!
//! A chain is plain caller configuration: typically a live source first, a
//! static dataset second and a constant series last. The chain itself never
//! adds a source of its own.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;

use super::types::{Observation, ReturnSeries};
use crate::error::{Error, Result};

/// Default bound on a single provider attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a single provider attempt failed. The chain treats all variants alike.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Source of raw annual observations for a series id
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Fetch raw observations; validation happens in the chain
    async fn fetch(&self, series_id: &str) -> std::result::Result<Vec<Observation>, ProviderError>;
}

/// In-memory dataset, usually loaded from a bundled CSV file
#[derive(Debug, Clone, Default)]
pub struct StaticSeriesProvider {
    name: String,
    series: HashMap<String, Vec<Observation>>,
}

#[derive(Debug, serde::Deserialize)]
struct StaticCsvRow {
    series_id: String,
    period: i32,
    change: f64,
}

impl StaticSeriesProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: HashMap::new(),
        }
    }

    pub fn with_series(
        mut self,
        series_id: impl Into<String>,
        observations: Vec<Observation>,
    ) -> Self {
        self.series.insert(series_id.into(), observations);
        self
    }

    /// Load a long-format CSV with columns `series_id,period,change` (change as a fraction)
    pub fn from_csv_path<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(name, file)
    }

    /// Load from any reader (string buffer, bundled asset)
    pub fn from_reader<R: std::io::Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut provider = Self::new(name);

        for result in csv_reader.deserialize() {
            let row: StaticCsvRow =
                result.map_err(|e| Error::invalid_series(format!("static dataset: {}", e)))?;
            provider
                .series
                .entry(row.series_id)
                .or_default()
                .push(Observation::new(row.period, row.change));
        }

        info!(
            "Loaded static dataset '{}' with {} series",
            provider.name,
            provider.series.len()
        );
        Ok(provider)
    }

    pub fn series_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.series.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl SeriesProvider for StaticSeriesProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, series_id: &str) -> std::result::Result<Vec<Observation>, ProviderError> {
        self.series
            .get(series_id)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(format!("no series '{}'", series_id)))
    }
}

/// Flat-rate series over a fixed period range; the usual last link of a chain
#[derive(Debug, Clone)]
pub struct ConstantSeriesProvider {
    name: String,
    first_period: i32,
    last_period: i32,
    rates: HashMap<String, f64>,
}

impl ConstantSeriesProvider {
    pub fn new(name: impl Into<String>, first_period: i32, last_period: i32) -> Self {
        Self {
            name: name.into(),
            first_period,
            last_period,
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, series_id: impl Into<String>, annual_rate: f64) -> Self {
        self.rates.insert(series_id.into(), annual_rate);
        self
    }
}

#[async_trait]
impl SeriesProvider for ConstantSeriesProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, series_id: &str) -> std::result::Result<Vec<Observation>, ProviderError> {
        let rate = self
            .rates
            .get(series_id)
            .copied()
            .ok_or_else(|| ProviderError::Unavailable(format!("no constant for '{}'", series_id)))?;

        Ok((self.first_period..=self.last_period)
            .map(|period| Observation::new(period, rate))
            .collect())
    }
}

/// A provider attempt that did not produce a usable series
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

/// Successful chain result, including the failures that were skipped over
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub series: ReturnSeries,
    pub provider: String,
    pub failures: Vec<ProviderFailure>,
}

impl FetchOutcome {
    /// True when a lower-priority provider supplied the data
    pub fn used_fallback(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Ordered list of providers, each attempt bounded by `attempt_timeout`
#[derive(Clone)]
pub struct FallbackChain {
    providers: Vec<Arc<dyn SeriesProvider>>,
    attempt_timeout: Duration,
}

impl FallbackChain {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            attempt_timeout,
        }
    }

    pub fn with_provider<P: SeriesProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn with_shared_provider(mut self, provider: Arc<dyn SeriesProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub async fn fetch(&self, series_id: &str) -> Result<FetchOutcome> {
        fetch_with_fallback(&self.providers, series_id, self.attempt_timeout).await
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.provider_names())
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

/// Try each provider once, in order, until one yields a valid non-empty series
pub async fn fetch_with_fallback(
    providers: &[Arc<dyn SeriesProvider>],
    series_id: &str,
    attempt_timeout: Duration,
) -> Result<FetchOutcome> {
    let mut failures = Vec::new();

    for provider in providers {
        debug!("Fetching '{}' from provider '{}'", series_id, provider.name());

        match attempt(provider.as_ref(), series_id, attempt_timeout).await {
            Ok(series) => {
                if !failures.is_empty() {
                    warn!(
                        "Series '{}' served by fallback provider '{}' after {} failure(s)",
                        series_id,
                        provider.name(),
                        failures.len()
                    );
                }
                return Ok(FetchOutcome {
                    series,
                    provider: provider.name().to_string(),
                    failures,
                });
            }
            Err(error) => {
                warn!(
                    "Provider '{}' failed for '{}': {}",
                    provider.name(),
                    series_id,
                    error
                );
                failures.push(ProviderFailure {
                    provider: provider.name().to_string(),
                    error,
                });
            }
        }
    }

    Err(Error::DataUnavailable {
        series_id: series_id.to_string(),
        attempts: failures
            .iter()
            .map(|f| format!("{}: {}", f.provider, f.error))
            .collect(),
    })
}

async fn attempt(
    provider: &dyn SeriesProvider,
    series_id: &str,
    attempt_timeout: Duration,
) -> std::result::Result<ReturnSeries, ProviderError> {
    let observations = tokio::time::timeout(attempt_timeout, provider.fetch(series_id))
        .await
        .map_err(|_| ProviderError::Timeout(attempt_timeout))??;

    if observations.is_empty() {
        return Err(ProviderError::Malformed("empty series".to_string()));
    }

    ReturnSeries::new(observations).map_err(|e| ProviderError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SeriesProvider for FailingProvider {
        fn name(&self) -> &str {
            "live"
        }

        async fn fetch(
            &self,
            _series_id: &str,
        ) -> std::result::Result<Vec<Observation>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Unavailable("connection refused".to_string()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl SeriesProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch(
            &self,
            _series_id: &str,
        ) -> std::result::Result<Vec<Observation>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![Observation::new(2000, 0.1)])
        }
    }

    fn unordered_provider() -> StaticSeriesProvider {
        StaticSeriesProvider::new("broken")
            .with_series("sp500", vec![Observation::new(2001, 0.1), Observation::new(2000, 0.1)])
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = FallbackChain::new(Duration::from_secs(1))
            .with_provider(
                StaticSeriesProvider::new("static")
                    .with_series("sp500", vec![Observation::new(2000, 0.2)]),
            )
            .with_provider(
                ConstantSeriesProvider::new("constant", 1990, 2000).with_rate("sp500", 0.07),
            );

        let outcome = chain.fetch("sp500").await.unwrap();
        assert_eq!(outcome.provider, "static");
        assert!(!outcome.used_fallback());
        assert_eq!(outcome.series.len(), 1);
    }

    #[tokio::test]
    async fn test_falls_through_failures_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(Duration::from_millis(50))
            .with_provider(FailingProvider { calls: calls.clone() })
            .with_provider(SlowProvider)
            .with_provider(unordered_provider())
            .with_provider(StaticSeriesProvider::new("empty").with_series("sp500", Vec::new()))
            .with_provider(
                ConstantSeriesProvider::new("constant", 1990, 1999).with_rate("sp500", 0.07),
            );

        let outcome = chain.fetch("sp500").await.unwrap();
        assert_eq!(outcome.provider, "constant");
        assert_eq!(outcome.series.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let failed: Vec<&str> = outcome.failures.iter().map(|f| f.provider.as_str()).collect();
        assert_eq!(failed, vec!["live", "slow", "broken", "empty"]);
        assert_eq!(
            outcome.failures[1].error,
            ProviderError::Timeout(Duration::from_millis(50))
        );
        assert!(matches!(outcome.failures[2].error, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_all_fail_is_data_unavailable() {
        let chain = FallbackChain::new(Duration::from_millis(20))
            .with_provider(FailingProvider {
                calls: Arc::new(AtomicUsize::new(0)),
            })
            .with_provider(SlowProvider);

        match chain.fetch("cpi").await {
            Err(Error::DataUnavailable { series_id, attempts }) => {
                assert_eq!(series_id, "cpi");
                assert_eq!(attempts.len(), 2);
                assert!(attempts[1].starts_with("slow: timed out"));
            }
            other => panic!("expected DataUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_data_unavailable() {
        let chain = FallbackChain::default();
        assert!(matches!(
            chain.fetch("cpi").await,
            Err(Error::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_static_provider_from_reader() {
        let csv = "series_id,period,change\nsp500,2000,-0.091\nsp500,2001,-0.119\ncpi,2000,0.034\n";
        let provider = StaticSeriesProvider::from_reader("bundled", csv.as_bytes()).unwrap();
        assert_eq!(provider.series_ids(), vec!["cpi", "sp500"]);
    }
}
