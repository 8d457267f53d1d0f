//! Retirement Engine - market series, portfolio projection and medical ledger core
//!
//! This library provides:
//! - Compounding of annual return series with an ordered provider fallback chain
//! - A TTL cache of compounded series with single refresh per key
//! - A country historical-returns catalog loaded from a wide CSV table
//! - Year-by-year bucketed portfolio projections with shortfall tracking
//! - A medical-expense reimbursement ledger with deferred growth
//! - Chart-ready output for the rendering layer

pub mod error;
pub mod series;
pub mod catalog;
pub mod projection;
pub mod ledger;
pub mod chart;
pub mod config;
pub mod scenario;

// Re-export commonly used types
pub use error::{Error, Result};
pub use series::{
    compound, CompoundedSeries, FallbackChain, Observation, ReturnSeries, SeriesCache,
    SeriesService,
};
pub use catalog::{Catalog, CatalogStore, CountrySummary};
pub use projection::{
    project, BucketRates, FlowSchedule, PortfolioProjector, PortfolioState, ProjectionResult,
};
pub use ledger::{MedicalLedger, Receipt, ReceiptId, GrowthBasis};
pub use chart::ChartData;
pub use config::Settings;
pub use scenario::ScenarioRunner;
