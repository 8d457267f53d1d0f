//! Allocation shares with exact rounding
//!
//! Shares are computed in integer units of `10^-precision` percent. Each raw
//! share is rounded to the nearest unit, and whatever is left over goes to the
//! bucket with the largest raw share, so the units always add up to exactly
//! `100 * 10^precision` when the portfolio holds anything.
//!
//! With many small buckets at low precision the rounding can overshoot by more
//! than the largest share holds. Units never go negative: the part of the
//! correction the largest bucket cannot absorb is taken one unit at a time from
//! the other buckets, largest raw share first.

use serde::{Deserialize, Serialize};

use super::state::PortfolioState;

/// Decimal places kept in allocation percentages
pub const DEFAULT_ALLOCATION_PRECISION: u32 = 2;

/// Upper bound accepted for allocation precision
pub const MAX_ALLOCATION_PRECISION: u32 = 9;

/// One bucket's share of the portfolio for a year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub bucket: String,
    /// Share in units of `10^-precision` percent
    pub units: i64,
    pub precision: u32,
}

impl Allocation {
    /// Share as a percentage, e.g. `33.34`
    pub fn percent(&self) -> f64 {
        self.units as f64 / unit_scale(self.precision) as f64
    }
}

fn unit_scale(precision: u32) -> i64 {
    10_i64.pow(precision)
}

/// Units that a full portfolio's allocations add up to
pub fn full_units(precision: u32) -> i64 {
    100 * unit_scale(precision)
}

/// Rounded shares for every bucket, in portfolio order.
///
/// An empty (all-zero) portfolio gets zero units everywhere.
pub fn allocate(state: &PortfolioState, precision: u32) -> Vec<Allocation> {
    let scale = unit_scale(precision) as f64;
    let total = state.total();

    let raw: Vec<f64> = state
        .buckets()
        .iter()
        .map(|b| if total > 0.0 { b.balance / total * 100.0 } else { 0.0 })
        .collect();

    let mut units: Vec<i64> = raw.iter().map(|share| (share * scale).round() as i64).collect();

    if total > 0.0 {
        let remainder = full_units(precision) - units.iter().sum::<i64>();
        // First bucket wins ties
        let largest = raw
            .iter()
            .enumerate()
            .fold(0, |best, (idx, &share)| if share > raw[best] { idx } else { best });
        let mut deficit = 0;
        if let Some(u) = units.get_mut(largest) {
            *u += remainder;
            if *u < 0 {
                deficit = -*u;
                *u = 0;
            }
        }
        if deficit > 0 {
            spread_deficit(&mut units, &raw, deficit);
        }
    }

    state
        .buckets()
        .iter()
        .zip(units)
        .map(|(b, units)| Allocation {
            bucket: b.bucket.clone(),
            units,
            precision,
        })
        .collect()
}

/// Remove `deficit` units, one per pass from each bucket that still holds
/// some, visiting buckets by descending raw share (portfolio order on ties).
fn spread_deficit(units: &mut [i64], raw: &[f64], mut deficit: i64) {
    let mut order: Vec<usize> = (0..units.len()).collect();
    order.sort_by(|&a, &b| raw[b].total_cmp(&raw[a]));

    while deficit > 0 {
        let before = deficit;
        for &idx in &order {
            if deficit == 0 {
                break;
            }
            if units[idx] > 0 {
                units[idx] -= 1;
                deficit -= 1;
            }
        }
        if deficit == before {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_thirds_round_to_exactly_one_hundred() {
        let state =
            PortfolioState::from_pairs(&[("stocks", 1.0), ("bonds", 1.0), ("bills", 1.0)]).unwrap();
        let shares = allocate(&state, 2);
        let units: Vec<i64> = shares.iter().map(|a| a.units).collect();
        assert_eq!(units, vec![3334, 3333, 3333]);
        assert_abs_diff_eq!(shares[0].percent(), 33.34, epsilon = 1e-9);
    }

    #[test]
    fn test_remainder_goes_to_largest_share() {
        let state =
            PortfolioState::from_pairs(&[("a", 1.0), ("b", 2.0), ("c", 2.0), ("d", 2.0)]).unwrap();
        let shares = allocate(&state, 0);
        // Raw: 14.29, 28.57, 28.57, 28.57 -> 14, 29, 29, 29 = 101
        let units: Vec<i64> = shares.iter().map(|a| a.units).collect();
        assert_eq!(units, vec![14, 28, 29, 29]);
        assert_eq!(units.iter().sum::<i64>(), 100);
    }

    #[test]
    fn test_many_small_buckets_never_go_negative() {
        // 150 equal shares of 0.67% each round up to 1, overshooting by 50
        let state = (0..150)
            .try_fold(PortfolioState::new(), |s, i| s.with_bucket(format!("b{}", i), 1.0))
            .unwrap();
        let units: Vec<i64> = allocate(&state, 0).iter().map(|a| a.units).collect();

        assert!(units.iter().all(|&u| (0..=1).contains(&u)));
        assert_eq!(units.iter().sum::<i64>(), 100);
        assert_eq!(units[0], 0);
    }

    #[test]
    fn test_empty_portfolio_allocates_nothing() {
        let state = PortfolioState::from_pairs(&[("stocks", 0.0), ("bonds", 0.0)]).unwrap();
        assert!(allocate(&state, 2).iter().all(|a| a.units == 0));
    }

    proptest! {
        #[test]
        fn prop_units_sum_to_full(
            balances in prop::collection::vec(0.0f64..1e9, 1..300),
            precision in 0u32..5,
        ) {
            let pairs: Vec<(String, f64)> =
                balances.iter().enumerate().map(|(i, &b)| (format!("b{}", i), b)).collect();
            let state = pairs
                .iter()
                .try_fold(PortfolioState::new(), |s, (name, b)| s.with_bucket(name.clone(), *b))
                .unwrap();
            let shares = allocate(&state, precision);
            let sum: i64 = shares.iter().map(|a| a.units).sum();
            prop_assert!(shares.iter().all(|a| a.units >= 0));
            if state.total() > 0.0 {
                prop_assert_eq!(sum, full_units(precision));
            } else {
                prop_assert_eq!(sum, 0);
            }
        }
    }
}
