//! Portfolio inputs: bucket balances, per-bucket rates, and yearly cash flows

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default annual return for the stocks bucket
pub const DEFAULT_STOCKS_RATE: f64 = 0.10;

/// Default annual return for the bonds bucket
pub const DEFAULT_BONDS_RATE: f64 = 0.04;

/// Default annual return for the bills bucket
pub const DEFAULT_BILLS_RATE: f64 = 0.015;

/// Balance held in one named bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketBalance {
    pub bucket: String,
    pub balance: f64,
}

/// Ordered bucket balances, all finite and non-negative.
///
/// Order is the caller's insertion order and carries through to results and
/// chart datasets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<BucketBalance>", into = "Vec<BucketBalance>")]
pub struct PortfolioState {
    buckets: Vec<BucketBalance>,
}

impl PortfolioState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Result<Self> {
        pairs
            .iter()
            .try_fold(Self::new(), |state, &(bucket, balance)| state.with_bucket(bucket, balance))
    }

    /// Add a bucket; rejects duplicates and negative or non-finite balances
    pub fn with_bucket(mut self, bucket: impl Into<String>, balance: f64) -> Result<Self> {
        let bucket = bucket.into();
        if !balance.is_finite() || balance < 0.0 {
            return Err(Error::invalid_projection(format!(
                "balance {} for '{}' must be a non-negative number",
                balance, bucket
            )));
        }
        if self.position(&bucket).is_some() {
            return Err(Error::invalid_projection(format!("duplicate bucket '{}'", bucket)));
        }
        self.buckets.push(BucketBalance { bucket, balance });
        Ok(self)
    }

    pub fn position(&self, bucket: &str) -> Option<usize> {
        self.buckets.iter().position(|b| b.bucket == bucket)
    }

    pub fn balance(&self, bucket: &str) -> Option<f64> {
        self.position(bucket).map(|idx| self.buckets[idx].balance)
    }

    pub fn buckets(&self) -> &[BucketBalance] {
        &self.buckets
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.bucket.as_str())
    }

    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|b| b.balance).sum()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Same buckets with new balances (projector-internal, balances already validated)
    pub(crate) fn with_balances(&self, balances: &[f64]) -> Self {
        Self {
            buckets: self
                .buckets
                .iter()
                .zip(balances)
                .map(|(b, &balance)| BucketBalance {
                    bucket: b.bucket.clone(),
                    balance,
                })
                .collect(),
        }
    }
}

impl TryFrom<Vec<BucketBalance>> for PortfolioState {
    type Error = Error;

    fn try_from(buckets: Vec<BucketBalance>) -> Result<Self> {
        buckets
            .into_iter()
            .try_fold(Self::new(), |state, b| state.with_bucket(b.bucket, b.balance))
    }
}

impl From<PortfolioState> for Vec<BucketBalance> {
    fn from(state: PortfolioState) -> Self {
        state.buckets
    }
}

/// Fixed annual rate per bucket
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketRates {
    rates: HashMap<String, f64>,
}

impl BucketRates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stocks 10%, bonds 4%, bills 1.5%
    pub fn default_assumptions() -> Self {
        Self::new()
            .with_rate("stocks", DEFAULT_STOCKS_RATE)
            .with_rate("bonds", DEFAULT_BONDS_RATE)
            .with_rate("bills", DEFAULT_BILLS_RATE)
    }

    pub fn with_rate(mut self, bucket: impl Into<String>, rate: f64) -> Self {
        self.rates.insert(bucket.into(), rate);
        self
    }

    pub fn get(&self, bucket: &str) -> Option<f64> {
        self.rates.get(bucket).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Signed cash flow per bucket for each projected year.
///
/// Positive amounts are contributions, negative amounts withdrawals. Years past
/// the end of the schedule have no flows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowSchedule {
    years: Vec<HashMap<String, f64>>,
}

impl FlowSchedule {
    pub fn none() -> Self {
        Self::default()
    }

    /// Explicit flows, index 0 is year 1
    pub fn from_years(years: Vec<HashMap<String, f64>>) -> Self {
        Self { years }
    }

    /// The same signed flows every year for `years` years
    pub fn constant(flows: &[(&str, f64)], years: u32) -> Self {
        let year: HashMap<String, f64> =
            flows.iter().map(|&(b, amount)| (b.to_string(), amount)).collect();
        Self {
            years: vec![year; years as usize],
        }
    }

    /// Constant yearly contributions (amounts given as positive numbers)
    pub fn contributions(amounts: &[(&str, f64)], years: u32) -> Self {
        Self::constant(amounts, years)
    }

    /// Constant yearly withdrawals (amounts given as positive numbers)
    pub fn withdrawals(amounts: &[(&str, f64)], years: u32) -> Self {
        let negated: Vec<(&str, f64)> = amounts.iter().map(|&(b, amount)| (b, -amount)).collect();
        Self::constant(&negated, years)
    }

    /// Append one more year of flows
    pub fn push_year(&mut self, flows: HashMap<String, f64>) {
        self.years.push(flows);
    }

    /// Flow for `bucket` in 1-based `year`
    pub fn flow(&self, year: u32, bucket: &str) -> f64 {
        if year == 0 {
            return 0.0;
        }
        self.years
            .get(year as usize - 1)
            .and_then(|flows| flows.get(bucket))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Every (year, bucket, amount) entry, for validation
    pub(crate) fn entries(&self) -> impl Iterator<Item = (u32, &str, f64)> {
        self.years.iter().enumerate().flat_map(|(idx, flows)| {
            flows
                .iter()
                .map(move |(bucket, amount)| (idx as u32 + 1, bucket.as_str(), *amount))
        })
    }
}
