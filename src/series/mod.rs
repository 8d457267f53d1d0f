//! Return series normalization: validation, compounding, provider fallback and caching

mod types;
mod normalizer;
mod provider;
mod cache;
mod service;

pub use types::{Observation, ReturnSeries, CompoundedSeries, IndexPoint};
pub use normalizer::{compound, real_returns};
pub use provider::{
    SeriesProvider, ProviderError, ProviderFailure, FetchOutcome, FallbackChain,
    StaticSeriesProvider, ConstantSeriesProvider, fetch_with_fallback, DEFAULT_ATTEMPT_TIMEOUT,
};
pub use cache::{SeriesCache, CachedSeries, CacheStats, DEFAULT_TTL};
pub use service::SeriesService;
