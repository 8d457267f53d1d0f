//! Chart-data output consumed by the rendering layer
//!
//! Shape: `{labels, datasets: [{bucketName, values}], meta: {shortfallYears}}`.
//! Missing values serialize as `null`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::projection::{ProjectionResult, YearSnapshot};
use crate::series::CompoundedSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub bucket_name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    /// Labels of years in which any bucket ran short, ascending
    pub shortfall_years: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub meta: ChartMeta,
}

impl ChartData {
    /// Balance per bucket per year; year 0 is labelled `start_year`
    pub fn from_projection(result: &ProjectionResult, start_year: i32) -> Self {
        Self::projection_view(result, start_year, |snapshot, idx| {
            snapshot.balances.buckets().get(idx).map(|b| b.balance)
        })
    }

    /// Allocation percentage per bucket per year
    pub fn allocations(result: &ProjectionResult, start_year: i32) -> Self {
        Self::projection_view(result, start_year, |snapshot, idx| {
            snapshot.allocations.get(idx).map(|a| a.percent())
        })
    }

    fn projection_view<F>(result: &ProjectionResult, start_year: i32, value: F) -> Self
    where
        F: Fn(&YearSnapshot, usize) -> Option<f64>,
    {
        let label = |year: u32| (start_year + year as i32).to_string();

        let labels = result.years.iter().map(|s| label(s.year)).collect();

        let datasets = match result.years.first() {
            Some(start) => start
                .balances
                .names()
                .enumerate()
                .map(|(idx, bucket)| Dataset {
                    bucket_name: bucket.to_string(),
                    values: result.years.iter().map(|s| value(s, idx)).collect(),
                })
                .collect(),
            None => Vec::new(),
        };

        Self {
            labels,
            datasets,
            meta: ChartMeta {
                shortfall_years: result.shortfall_years().into_iter().map(label).collect(),
            },
        }
    }

    /// One dataset per named series over the union of their periods
    pub fn from_series(series: &[(&str, &CompoundedSeries)]) -> Self {
        let periods: BTreeSet<i32> = series
            .iter()
            .flat_map(|(_, s)| s.points().iter().map(|p| p.period))
            .collect();

        let datasets = series
            .iter()
            .map(|(name, s)| Dataset {
                bucket_name: name.to_string(),
                values: periods.iter().map(|&p| s.value_at(p)).collect(),
            })
            .collect();

        Self {
            labels: periods.iter().map(|p| p.to_string()).collect(),
            datasets,
            meta: ChartMeta::default(),
        }
    }
}
