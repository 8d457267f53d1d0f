//! Compounding of return series into index series

use log::debug;

use super::types::{CompoundedSeries, IndexPoint, Observation, ReturnSeries};
use crate::error::{Error, Result};

/// Compound a return series into an index anchored at 1.0.
///
/// `index[0] = 1.0` at the anchor period, then
/// `index[i] = index[i-1] * (1 + change[i])` for each observation.
pub fn compound(series: &ReturnSeries) -> Result<CompoundedSeries> {
    let observations = series.observations();
    let first = observations
        .first()
        .ok_or_else(|| Error::invalid_series("cannot compound an empty series"))?;

    let mut points = Vec::with_capacity(observations.len() + 1);
    points.push(IndexPoint {
        period: first.period - 1,
        value: 1.0,
    });

    let mut index = 1.0;
    for obs in observations {
        index *= 1.0 + obs.change;
        points.push(IndexPoint {
            period: obs.period,
            value: index,
        });
    }

    debug!(
        "Compounded {} observations ({}..={}) to {:.6}",
        observations.len(),
        first.period,
        observations[observations.len() - 1].period,
        index
    );

    Ok(CompoundedSeries::from_points(points))
}

/// Inflation-adjusted returns over the periods present in both series.
///
/// real = (1 + nominal) / (1 + inflation) - 1
pub fn real_returns(nominal: &ReturnSeries, inflation: &ReturnSeries) -> Result<ReturnSeries> {
    let observations: Vec<Observation> = nominal
        .observations()
        .iter()
        .filter_map(|obs| {
            inflation
                .change_at(obs.period)
                .map(|infl| Observation::new(obs.period, (1.0 + obs.change) / (1.0 + infl) - 1.0))
        })
        .collect();

    if observations.is_empty() {
        return Err(Error::InsufficientData(
            "nominal and inflation series share no periods".to_string(),
        ));
    }

    ReturnSeries::new(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_compound_known_values() {
        let series =
            ReturnSeries::from_pairs(&[(2001, 0.10), (2002, -0.10), (2003, 0.05)]).unwrap();
        let compounded = compound(&series).unwrap();

        let expected = [1.0, 1.10, 0.99, 1.0395];
        let values = compounded.values();
        assert_eq!(values.len(), expected.len());
        for (actual, expected) in values.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*actual, *expected, epsilon = 1e-12);
        }
        assert_eq!(compounded.periods(), vec![2000, 2001, 2002, 2003]);
        assert_eq!(compounded.anchor_period(), 2000);
    }

    #[test]
    fn test_compound_empty_fails() {
        let err = compound(&ReturnSeries::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidSeries(_)));
    }

    #[test]
    fn test_non_increasing_periods_fail_before_compounding() {
        let err = ReturnSeries::from_pairs(&[(2003, 0.1), (2002, 0.1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidSeries(_)));
    }

    #[test]
    fn test_all_zero_changes_compound_flat() {
        let pairs: Vec<(i32, f64)> = (1990..2010).map(|y| (y, 0.0)).collect();
        let compounded = compound(&ReturnSeries::from_pairs(&pairs).unwrap()).unwrap();
        assert!(compounded.values().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_compound_preserves_gaps() {
        let series = ReturnSeries::from_pairs(&[(1990, 0.1), (1993, 0.1)]).unwrap();
        let compounded = compound(&series).unwrap();
        assert_eq!(compounded.periods(), vec![1989, 1990, 1993]);
        assert_eq!(compounded.value_at(1991), None);
        assert_abs_diff_eq!(compounded.final_value(), 1.21, epsilon = 1e-12);
    }

    #[test]
    fn test_annualized_return() {
        let series = ReturnSeries::from_pairs(&[(2000, 0.10), (2001, 0.10)]).unwrap();
        let compounded = compound(&series).unwrap();
        assert_abs_diff_eq!(compounded.total_return(), 0.21, epsilon = 1e-12);
        assert_abs_diff_eq!(compounded.annualized_return(), 0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_real_returns_over_common_periods() {
        let nominal =
            ReturnSeries::from_pairs(&[(2000, 0.10), (2001, 0.05), (2002, 0.02)]).unwrap();
        let inflation =
            ReturnSeries::from_pairs(&[(2001, 0.05), (2002, 0.02), (2003, 0.03)]).unwrap();
        let real = real_returns(&nominal, &inflation).unwrap();
        assert_eq!(real.len(), 2);
        assert_abs_diff_eq!(real.change_at(2001).unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(real.change_at(2002).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_real_returns_without_overlap_fails() {
        let nominal = ReturnSeries::from_pairs(&[(2000, 0.10)]).unwrap();
        let inflation = ReturnSeries::from_pairs(&[(2001, 0.05)]).unwrap();
        assert!(matches!(
            real_returns(&nominal, &inflation),
            Err(Error::InsufficientData(_))
        ));
    }
}
