//! Projection output structures

use serde::{Deserialize, Serialize};

use super::allocation::Allocation;
use super::state::PortfolioState;

/// A bucket that could not cover its withdrawal in a given year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub bucket: String,
    /// Part of the requested withdrawal that was not paid
    pub unmet: f64,
}

/// Portfolio state at the end of one projected year (year 0 is the start)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSnapshot {
    pub year: u32,
    pub balances: PortfolioState,
    pub allocations: Vec<Allocation>,
    pub shortfalls: Vec<Shortfall>,
}

impl YearSnapshot {
    pub fn total(&self) -> f64 {
        self.balances.total()
    }

    pub fn has_shortfall(&self) -> bool {
        !self.shortfalls.is_empty()
    }

    pub fn is_short(&self, bucket: &str) -> bool {
        self.shortfalls.iter().any(|s| s.bucket == bucket)
    }

    pub fn allocation(&self, bucket: &str) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.bucket == bucket)
    }
}

/// Year-by-year projection of a bucketed portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub precision: u32,
    pub years: Vec<YearSnapshot>,
}

impl ProjectionResult {
    pub fn new(precision: u32) -> Self {
        Self {
            precision,
            years: Vec::new(),
        }
    }

    pub fn add_year(&mut self, snapshot: YearSnapshot) {
        self.years.push(snapshot);
    }

    /// Number of projected years (snapshots minus the starting point)
    pub fn horizon(&self) -> u32 {
        self.years.len().saturating_sub(1) as u32
    }

    pub fn year(&self, year: u32) -> Option<&YearSnapshot> {
        self.years.get(year as usize)
    }

    pub fn final_snapshot(&self) -> Option<&YearSnapshot> {
        self.years.last()
    }

    pub fn final_total(&self) -> f64 {
        self.final_snapshot().map(|s| s.total()).unwrap_or(0.0)
    }

    pub fn shortfall_years(&self) -> Vec<u32> {
        self.years
            .iter()
            .filter(|s| s.has_shortfall())
            .map(|s| s.year)
            .collect()
    }

    pub fn first_shortfall_year(&self) -> Option<u32> {
        self.years.iter().find(|s| s.has_shortfall()).map(|s| s.year)
    }

    /// Sum of unmet withdrawals across all years and buckets
    pub fn total_unmet(&self) -> f64 {
        self.years
            .iter()
            .flat_map(|s| s.shortfalls.iter())
            .map(|s| s.unmet)
            .sum()
    }

    /// Balance path of one bucket, year 0 first
    pub fn bucket_path(&self, bucket: &str) -> Vec<f64> {
        self.years
            .iter()
            .map(|s| s.balances.balance(bucket).unwrap_or(0.0))
            .collect()
    }
}
