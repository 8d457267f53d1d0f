//! Fetch-compound-cache pipeline for named series (market returns, inflation)

use std::sync::Arc;

use log::info;

use super::cache::{CacheStats, SeriesCache};
use super::normalizer::compound;
use super::provider::FallbackChain;
use super::types::CompoundedSeries;
use crate::error::Result;

/// Serves compounded series through a fallback chain and a TTL cache
#[derive(Debug)]
pub struct SeriesService {
    chain: FallbackChain,
    cache: SeriesCache,
}

impl SeriesService {
    pub fn new(chain: FallbackChain, cache: SeriesCache) -> Self {
        Self { chain, cache }
    }

    /// Compounded series for `series_id`, refreshed through the chain when expired
    pub async fn compounded(&self, series_id: &str) -> Result<Arc<CompoundedSeries>> {
        self.cache
            .get_or_refresh(series_id, || async {
                let outcome = self.chain.fetch(series_id).await?;
                info!(
                    "Series '{}' fetched from '{}' ({} observations)",
                    series_id,
                    outcome.provider,
                    outcome.series.len()
                );
                compound(&outcome.series)
            })
            .await
    }

    /// Force the next read of `series_id` to go through the chain
    pub fn invalidate(&self, series_id: &str) {
        self.cache.invalidate(series_id);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{ConstantSeriesProvider, Observation, StaticSeriesProvider};
    use std::time::Duration;

    fn service() -> SeriesService {
        let chain = FallbackChain::new(Duration::from_millis(100))
            .with_provider(
                StaticSeriesProvider::new("static")
                    .with_series(
                        "sp500",
                        vec![Observation::new(2000, 0.1), Observation::new(2001, 0.1)],
                    ),
            )
            .with_provider(
                ConstantSeriesProvider::new("constant", 2000, 2004).with_rate("cpi", 0.0),
            );
        SeriesService::new(chain, SeriesCache::default())
    }

    #[tokio::test]
    async fn test_compounded_is_cached() {
        let service = service();
        let first = service.compounded("sp500").await.unwrap();
        let second = service.compounded("sp500").await.unwrap();

        assert!((first.final_value() - 1.21).abs() < 1e-12);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.cache_stats().refreshes, 1);
    }

    #[tokio::test]
    async fn test_fallback_supplies_constant_series() {
        let service = service();
        let cpi = service.compounded("cpi").await.unwrap();
        assert_eq!(cpi.points().len(), 6);
        assert!(cpi.values().iter().all(|v| *v == 1.0));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let service = service();
        service.compounded("sp500").await.unwrap();
        service.invalidate("sp500");
        service.compounded("sp500").await.unwrap();
        assert_eq!(service.cache_stats().refreshes, 2);
    }

    #[tokio::test]
    async fn test_unknown_series_is_unavailable() {
        let service = service();
        assert!(service.compounded("gold").await.is_err());
    }
}
