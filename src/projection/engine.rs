//! Deterministic year-by-year projection of a bucketed portfolio

use log::{debug, warn};

use super::allocation::{allocate, DEFAULT_ALLOCATION_PRECISION, MAX_ALLOCATION_PRECISION};
use super::result::{ProjectionResult, Shortfall, YearSnapshot};
use super::state::{BucketRates, FlowSchedule, PortfolioState};
use crate::error::{Error, Result};

/// Configuration for a projection run
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Decimal places kept in allocation percentages
    pub allocation_precision: u32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            allocation_precision: DEFAULT_ALLOCATION_PRECISION,
        }
    }
}

/// Projects bucket balances forward one year at a time
#[derive(Debug, Clone, Default)]
pub struct PortfolioProjector {
    config: ProjectionConfig,
}

impl PortfolioProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Run the projection for `horizon_years`.
    ///
    /// Each year every bucket grows at its rate, then that year's flow is
    /// applied. A withdrawal larger than the grown balance drains the bucket to
    /// zero and records the unpaid part as a shortfall; other buckets are never
    /// tapped to cover it.
    pub fn project(
        &self,
        initial: &PortfolioState,
        rates: &BucketRates,
        flows: &FlowSchedule,
        horizon_years: u32,
    ) -> Result<ProjectionResult> {
        let precision = self.config.allocation_precision;
        if precision > MAX_ALLOCATION_PRECISION {
            return Err(Error::invalid_projection(format!(
                "allocation precision {} exceeds {}",
                precision, MAX_ALLOCATION_PRECISION
            )));
        }

        let bucket_rates = resolve_rates(initial, rates)?;
        validate_flows(initial, flows)?;

        let mut balances: Vec<f64> = initial.buckets().iter().map(|b| b.balance).collect();
        let mut result = ProjectionResult::new(precision);

        result.add_year(YearSnapshot {
            year: 0,
            balances: initial.clone(),
            allocations: allocate(initial, precision),
            shortfalls: Vec::new(),
        });

        for year in 1..=horizon_years {
            let mut shortfalls = Vec::new();

            for (idx, bucket) in initial.names().enumerate() {
                let grown = balances[idx] * (1.0 + bucket_rates[idx]);
                let proposed = grown + flows.flow(year, bucket);

                if proposed < 0.0 {
                    shortfalls.push(Shortfall {
                        bucket: bucket.to_string(),
                        unmet: -proposed,
                    });
                    balances[idx] = 0.0;
                } else {
                    balances[idx] = proposed;
                }
            }

            if !shortfalls.is_empty() {
                debug!("Year {}: {} bucket(s) short", year, shortfalls.len());
            }

            let state = initial.with_balances(&balances);
            result.add_year(YearSnapshot {
                year,
                allocations: allocate(&state, precision),
                balances: state,
                shortfalls,
            });
        }

        if let Some(year) = result.first_shortfall_year() {
            warn!("Projection first runs short in year {} of {}", year, horizon_years);
        }

        Ok(result)
    }
}

/// Project with the default configuration
pub fn project(
    initial: &PortfolioState,
    rates: &BucketRates,
    flows: &FlowSchedule,
    horizon_years: u32,
) -> Result<ProjectionResult> {
    PortfolioProjector::default().project(initial, rates, flows, horizon_years)
}

/// Rates in portfolio order. Rates at or below -100% (including -inf) are
/// rejected before any other check.
fn resolve_rates(initial: &PortfolioState, rates: &BucketRates) -> Result<Vec<f64>> {
    for (bucket, rate) in rates.iter() {
        if rate <= -1.0 {
            return Err(Error::NegativeRateOverflow {
                name: bucket.to_string(),
                rate,
            });
        }
        if !rate.is_finite() {
            return Err(Error::invalid_projection(format!("rate for '{}' is not finite", bucket)));
        }
        if initial.position(bucket).is_none() {
            return Err(Error::invalid_projection(format!(
                "rate given for unknown bucket '{}'",
                bucket
            )));
        }
    }

    initial
        .names()
        .map(|bucket| {
            rates
                .get(bucket)
                .ok_or_else(|| {
                    Error::invalid_projection(format!("no rate for bucket '{}'", bucket))
                })
        })
        .collect()
}

fn validate_flows(initial: &PortfolioState, flows: &FlowSchedule) -> Result<()> {
    for (year, bucket, amount) in flows.entries() {
        if initial.position(bucket).is_none() {
            return Err(Error::invalid_projection(format!(
                "year {} flow for unknown bucket '{}'",
                year, bucket
            )));
        }
        if !amount.is_finite() {
            return Err(Error::invalid_projection(format!(
                "year {} flow for '{}' is not finite",
                year, bucket
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::full_units;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn three_buckets() -> PortfolioState {
        PortfolioState::from_pairs(&[("stocks", 1000.0), ("bonds", 1000.0), ("bills", 1000.0)])
            .unwrap()
    }

    #[test]
    fn test_growth_without_flows() {
        let rates = BucketRates::default_assumptions();
        let result = project(&three_buckets(), &rates, &FlowSchedule::none(), 2).unwrap();
        assert_eq!(result.years.len(), 3);
        assert_eq!(result.horizon(), 2);

        let year2 = result.year(2).unwrap();
        assert_abs_diff_eq!(year2.balances.balance("stocks").unwrap(), 1210.0, epsilon = 1e-9);
        assert_abs_diff_eq!(year2.balances.balance("bonds").unwrap(), 1081.6, epsilon = 1e-9);
        assert_abs_diff_eq!(year2.balances.balance("bills").unwrap(), 1030.225, epsilon = 1e-9);
        assert!(result.shortfall_years().is_empty());
    }

    #[test]
    fn test_year_zero_is_initial_state() {
        let initial = three_buckets();
        let rates = BucketRates::default_assumptions();
        let result = project(&initial, &rates, &FlowSchedule::none(), 5).unwrap();
        let start = result.year(0).unwrap();
        assert_eq!(start.balances, initial);
        let units: Vec<i64> = start.allocations.iter().map(|a| a.units).collect();
        assert_eq!(units, vec![3334, 3333, 3333]);
    }

    #[test]
    fn test_withdrawal_drains_bucket_and_flags_shortfall() {
        let initial = PortfolioState::from_pairs(&[("stocks", 5000.0), ("bills", 100.0)]).unwrap();
        let rates = BucketRates::new().with_rate("stocks", 0.05).with_rate("bills", 0.0);
        let flows = FlowSchedule::withdrawals(&[("bills", 60.0)], 3);

        let result = project(&initial, &rates, &flows, 3).unwrap();

        let year1 = result.year(1).unwrap();
        assert_abs_diff_eq!(year1.balances.balance("bills").unwrap(), 40.0, epsilon = 1e-9);
        let year2 = result.year(2).unwrap();
        assert_eq!(year2.balances.balance("bills"), Some(0.0));
        assert!(year2.is_short("bills"));
        assert!(!year2.is_short("stocks"));
        assert_abs_diff_eq!(year2.shortfalls[0].unmet, 20.0, epsilon = 1e-9);

        // Stocks are never used to cover bills
        assert_abs_diff_eq!(
            year2.balances.balance("stocks").unwrap(),
            5000.0 * 1.05 * 1.05,
            epsilon = 1e-6
        );
        assert_eq!(result.shortfall_years(), vec![2, 3]);
        assert_eq!(result.first_shortfall_year(), Some(2));
        assert_abs_diff_eq!(result.total_unmet(), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_withdrawal_from_empty_bucket() {
        let initial =
            PortfolioState::from_pairs(&[("stocks", 0.0), ("bonds", 0.0), ("bills", 0.0)]).unwrap();
        let flows =
            FlowSchedule::constant(&[("stocks", 0.0), ("bonds", 0.0), ("bills", -1000.0)], 1);
        let result = project(&initial, &BucketRates::default_assumptions(), &flows, 1).unwrap();

        let year1 = result.year(1).unwrap();
        assert!(year1.is_short("bills"));
        assert!(!year1.is_short("stocks"));
        assert_eq!(year1.balances.balance("bills"), Some(0.0));
        assert!(year1.allocations.iter().all(|a| a.units == 0));
    }

    #[test]
    fn test_contributions_are_added_after_growth() {
        let initial = PortfolioState::from_pairs(&[("stocks", 100.0)]).unwrap();
        let rates = BucketRates::new().with_rate("stocks", 0.10);
        let flows = FlowSchedule::contributions(&[("stocks", 10.0)], 1);
        let result = project(&initial, &rates, &flows, 2).unwrap();
        assert_abs_diff_eq!(result.year(1).unwrap().total(), 120.0, epsilon = 1e-9);
        // Schedule is one year long; year 2 has no flow
        assert_abs_diff_eq!(result.final_total(), 132.0, epsilon = 1e-9);
    }

    #[test]
    fn test_drained_bucket_refills_from_later_contribution() {
        let initial = PortfolioState::from_pairs(&[("stocks", 10.0)]).unwrap();
        let rates = BucketRates::new().with_rate("stocks", 0.0);
        let flows = FlowSchedule::from_years(vec![
            HashMap::from([("stocks".to_string(), -20.0)]),
            HashMap::new(),
            HashMap::from([("stocks".to_string(), 25.0)]),
        ]);

        let result = project(&initial, &rates, &flows, 3).unwrap();

        assert_eq!(result.bucket_path("stocks"), vec![10.0, 0.0, 0.0, 25.0]);
        assert_eq!(result.shortfall_years(), vec![1]);
        assert_abs_diff_eq!(result.year(1).unwrap().shortfalls[0].unmet, 10.0, epsilon = 1e-9);
        assert_eq!(result.year(3).unwrap().allocation("stocks").unwrap().units, full_units(2));
    }

    #[test]
    fn test_zero_horizon_returns_only_start() {
        let rates = BucketRates::default_assumptions();
        let result = project(&three_buckets(), &rates, &FlowSchedule::none(), 0).unwrap();
        assert_eq!(result.years.len(), 1);
        assert_eq!(result.final_total(), 3000.0);
    }

    #[test]
    fn test_rate_at_minus_one_overflows() {
        let rates = BucketRates::default_assumptions().with_rate("bonds", -1.0);
        let err = project(&three_buckets(), &rates, &FlowSchedule::none(), 1).unwrap_err();
        assert!(matches!(err, Error::NegativeRateOverflow { ref name, .. } if name == "bonds"));
    }

    #[test]
    fn test_negative_infinite_rate_overflows() {
        let rates = BucketRates::default_assumptions().with_rate("stocks", f64::NEG_INFINITY);
        let err = project(&three_buckets(), &rates, &FlowSchedule::none(), 1).unwrap_err();
        assert!(matches!(err, Error::NegativeRateOverflow { ref name, .. } if name == "stocks"));
    }

    #[test]
    fn test_nan_and_positive_infinite_rates_are_invalid() {
        for rate in [f64::NAN, f64::INFINITY] {
            let rates = BucketRates::default_assumptions().with_rate("bonds", rate);
            let err = project(&three_buckets(), &rates, &FlowSchedule::none(), 1).unwrap_err();
            assert!(matches!(err, Error::InvalidProjection(_)));
        }
    }

    #[test]
    fn test_missing_rate_is_invalid() {
        let rates = BucketRates::new().with_rate("stocks", 0.1);
        let err = project(&three_buckets(), &rates, &FlowSchedule::none(), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidProjection(_)));
    }

    #[test]
    fn test_flow_for_unknown_bucket_is_invalid() {
        let flows = FlowSchedule::withdrawals(&[("crypto", 1.0)], 1);
        let rates = BucketRates::default_assumptions();
        let err = project(&three_buckets(), &rates, &flows, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidProjection(_)));
    }

    #[test]
    fn test_excessive_precision_is_invalid() {
        let projector = PortfolioProjector::new(ProjectionConfig { allocation_precision: 12 });
        let err = projector
            .project(
                &three_buckets(),
                &BucketRates::default_assumptions(),
                &FlowSchedule::none(),
                1,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProjection(_)));
    }

    proptest! {
        #[test]
        fn prop_balances_stay_non_negative(
            stocks in 0.0f64..1e6,
            bills in 0.0f64..1e6,
            rate in -0.5f64..0.5,
            withdrawal in 0.0f64..2e5,
            horizon in 0u32..30,
        ) {
            let initial =
                PortfolioState::from_pairs(&[("stocks", stocks), ("bills", bills)]).unwrap();
            let rates = BucketRates::new().with_rate("stocks", rate).with_rate("bills", 0.01);
            let flows = FlowSchedule::withdrawals(
                &[("stocks", withdrawal), ("bills", withdrawal)],
                horizon,
            );
            let result = project(&initial, &rates, &flows, horizon).unwrap();

            prop_assert_eq!(result.years.len(), horizon as usize + 1);
            for snapshot in &result.years {
                prop_assert!(snapshot.balances.buckets().iter().all(|b| b.balance >= 0.0));
                let units: i64 = snapshot.allocations.iter().map(|a| a.units).sum();
                if snapshot.total() > 0.0 {
                    prop_assert_eq!(units, full_units(result.precision));
                }
            }
        }
    }
}
