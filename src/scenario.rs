//! Scenario runner for batch projections
//!
//! Holds a base rate assumption set and projection config once, then runs many
//! projections against it. Batches run in parallel with rayon.

use rayon::prelude::*;

use crate::error::Result;
use crate::projection::{
    BucketRates, FlowSchedule, PortfolioProjector, PortfolioState, ProjectionConfig,
    ProjectionResult,
};

/// Pre-configured runner for repeated projections
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::new();
///
/// let optimistic = BucketRates::default_assumptions().with_rate("stocks", 0.12);
/// let pessimistic = BucketRates::default_assumptions().with_rate("stocks", 0.02);
/// let results = runner.run_scenarios(&portfolio, &[optimistic, pessimistic], &flows, 30);
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    base_rates: BucketRates,
    projector: PortfolioProjector,
}

impl ScenarioRunner {
    /// Runner with the default rate assumptions and config
    pub fn new() -> Self {
        Self::with_rates(BucketRates::default_assumptions(), ProjectionConfig::default())
    }

    pub fn with_rates(base_rates: BucketRates, config: ProjectionConfig) -> Self {
        Self {
            base_rates,
            projector: PortfolioProjector::new(config),
        }
    }

    /// Project one portfolio against the base rates
    pub fn run(
        &self,
        initial: &PortfolioState,
        flows: &FlowSchedule,
        horizon_years: u32,
    ) -> Result<ProjectionResult> {
        self.projector.project(initial, &self.base_rates, flows, horizon_years)
    }

    /// Project several portfolios with the same flows and base rates
    pub fn run_batch(
        &self,
        portfolios: &[PortfolioState],
        flows: &FlowSchedule,
        horizon_years: u32,
    ) -> Vec<Result<ProjectionResult>> {
        portfolios
            .par_iter()
            .map(|initial| self.run(initial, flows, horizon_years))
            .collect()
    }

    /// Project one portfolio under several rate sets, results in input order
    pub fn run_scenarios(
        &self,
        initial: &PortfolioState,
        scenarios: &[BucketRates],
        flows: &FlowSchedule,
        horizon_years: u32,
    ) -> Vec<Result<ProjectionResult>> {
        scenarios
            .par_iter()
            .map(|rates| self.projector.project(initial, rates, flows, horizon_years))
            .collect()
    }

    pub fn rates(&self) -> &BucketRates {
        &self.base_rates
    }

    pub fn rates_mut(&mut self) -> &mut BucketRates {
        &mut self.base_rates
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn portfolio() -> PortfolioState {
        PortfolioState::from_pairs(&[
            ("stocks", 60_000.0),
            ("bonds", 30_000.0),
            ("bills", 10_000.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_runner_matches_direct_projection() {
        let runner = ScenarioRunner::new();
        let flows = FlowSchedule::withdrawals(&[("bills", 2_000.0)], 10);
        let via_runner = runner.run(&portfolio(), &flows, 10).unwrap();
        let rates = BucketRates::default_assumptions();
        let direct = crate::projection::project(&portfolio(), &rates, &flows, 10).unwrap();
        assert_eq!(via_runner, direct);
    }

    #[test]
    fn test_higher_rates_end_higher() {
        let runner = ScenarioRunner::new();
        let low = BucketRates::default_assumptions().with_rate("stocks", 0.02);
        let high = BucketRates::default_assumptions().with_rate("stocks", 0.12);

        let results = runner.run_scenarios(&portfolio(), &[low, high], &FlowSchedule::none(), 20);
        let totals: Vec<f64> = results.iter().map(|r| r.as_ref().unwrap().final_total()).collect();
        assert!(totals[1] > totals[0]);
    }

    #[test]
    fn test_batch_keeps_failures_per_portfolio() {
        let runner = ScenarioRunner::new();
        let odd = PortfolioState::from_pairs(&[("gold", 1_000.0)]).unwrap();
        let results = runner.run_batch(&[portfolio(), odd], &FlowSchedule::none(), 5);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::InvalidProjection(_))));
    }
}
