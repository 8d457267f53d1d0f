//! Return and index series types

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One period-over-period observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar year
    pub period: i32,
    /// Fractional change (0.05 = +5%)
    pub change: f64,
}

impl Observation {
    pub fn new(period: i32, change: f64) -> Self {
        Self { period, change }
    }
}

/// Validated sequence of annual changes.
///
/// Periods are strictly increasing and every change is finite and above -100%.
/// Missing years stay missing; they are never filled with zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReturnSeries {
    observations: Vec<Observation>,
}

impl ReturnSeries {
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        for (idx, obs) in observations.iter().enumerate() {
            if !obs.change.is_finite() {
                return Err(Error::invalid_series(format!(
                    "non-numeric change at period {}",
                    obs.period
                )));
            }
            if obs.change <= -1.0 {
                return Err(Error::invalid_series(format!(
                    "change {} at period {} is at or below -100%",
                    obs.change, obs.period
                )));
            }
            if idx > 0 {
                let prev = observations[idx - 1].period;
                if obs.period == prev {
                    return Err(Error::invalid_series(format!("duplicate period {}", prev)));
                }
                if obs.period < prev {
                    return Err(Error::invalid_series(format!(
                        "period {} follows {} (periods must be strictly increasing)",
                        obs.period, prev
                    )));
                }
            }
        }
        Ok(Self { observations })
    }

    /// Build from `(period, change)` pairs
    pub fn from_pairs(pairs: &[(i32, f64)]) -> Result<Self> {
        Self::new(pairs.iter().map(|&(p, c)| Observation::new(p, c)).collect())
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_period(&self) -> Option<i32> {
        self.observations.first().map(|o| o.period)
    }

    pub fn last_period(&self) -> Option<i32> {
        self.observations.last().map(|o| o.period)
    }

    pub fn change_at(&self, period: i32) -> Option<f64> {
        self.observations
            .binary_search_by_key(&period, |o| o.period)
            .ok()
            .map(|idx| self.observations[idx].change)
    }

    /// Observations within `[start, end]` inclusive
    pub fn slice(&self, start: i32, end: i32) -> ReturnSeries {
        let observations = self
            .observations
            .iter()
            .filter(|o| o.period >= start && o.period <= end)
            .copied()
            .collect();
        // A filtered subsequence of a valid series is still valid
        ReturnSeries { observations }
    }

    /// Count of observations within `[start, end]`
    pub fn count_in(&self, start: i32, end: i32) -> usize {
        self.observations
            .iter()
            .filter(|o| o.period >= start && o.period <= end)
            .count()
    }
}

impl<'de> Deserialize<'de> for ReturnSeries {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            observations: Vec<Observation>,
        }
        let raw = Raw::deserialize(deserializer)?;
        ReturnSeries::new(raw.observations).map_err(serde::de::Error::custom)
    }
}

/// One point of a compounded index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub period: i32,
    pub value: f64,
}

/// Cumulative index anchored at 1.0.
///
/// The first point is the anchor at `first_period - 1` (the start of the first
/// observed period). Each following point is the end-of-period value for one
/// source observation, so the source period set is preserved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundedSeries {
    points: Vec<IndexPoint>,
}

impl CompoundedSeries {
    /// Only the normalizer builds these
    pub(crate) fn from_points(points: Vec<IndexPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[IndexPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn periods(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.period).collect()
    }

    pub fn anchor_period(&self) -> i32 {
        self.points[0].period
    }

    pub fn last_period(&self) -> i32 {
        self.points[self.points.len() - 1].period
    }

    pub fn value_at(&self, period: i32) -> Option<f64> {
        self.points
            .binary_search_by_key(&period, |p| p.period)
            .ok()
            .map(|idx| self.points[idx].value)
    }

    pub fn final_value(&self) -> f64 {
        self.points[self.points.len() - 1].value
    }

    /// Cumulative return over the whole series (0.25 = +25%)
    pub fn total_return(&self) -> f64 {
        self.final_value() - 1.0
    }

    /// Geometric mean annual return across the observed periods
    pub fn annualized_return(&self) -> f64 {
        let periods = (self.points.len() - 1) as f64;
        self.final_value().powf(1.0 / periods) - 1.0
    }
}
