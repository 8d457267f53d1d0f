//! Bucketed portfolio projection with exact allocation rounding

mod state;
mod allocation;
mod engine;
mod result;

pub use state::{
    BucketBalance, PortfolioState, BucketRates, FlowSchedule,
    DEFAULT_STOCKS_RATE, DEFAULT_BONDS_RATE, DEFAULT_BILLS_RATE,
};
pub use allocation::{
    allocate, full_units, Allocation, DEFAULT_ALLOCATION_PRECISION, MAX_ALLOCATION_PRECISION,
};
pub use engine::{project, PortfolioProjector, ProjectionConfig};
pub use result::{ProjectionResult, YearSnapshot, Shortfall};
