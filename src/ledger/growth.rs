//! Growth applied to a pending receipt between its incurred date and an as-of date

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};
use crate::series::CompoundedSeries;

/// Days per year used to turn a date span into a fraction of a year
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Default annual growth rate for receipts awaiting reimbursement
pub const DEFAULT_LEDGER_GROWTH_RATE: f64 = 0.05;

/// How a pending receipt's claimable value grows
#[derive(Debug, Clone, PartialEq)]
pub enum GrowthBasis {
    /// Fixed annual rate, compounded over actual days / 365.25
    FixedRate(f64),
    /// Follow a compounded market index (periods are calendar years)
    Series(CompoundedSeries),
}

impl Default for GrowthBasis {
    fn default() -> Self {
        GrowthBasis::FixedRate(DEFAULT_LEDGER_GROWTH_RATE)
    }
}

impl GrowthBasis {
    /// Multiplier from `from` to `to`. Callers guarantee `from <= to`.
    pub fn factor(&self, from: NaiveDate, to: NaiveDate) -> Result<f64> {
        match self {
            GrowthBasis::FixedRate(rate) => fixed_factor(*rate, from, to),
            GrowthBasis::Series(series) => Ok(index_on(series, to)? / index_on(series, from)?),
        }
    }
}

fn fixed_factor(rate: f64, from: NaiveDate, to: NaiveDate) -> Result<f64> {
    if rate <= -1.0 {
        return Err(Error::NegativeRateOverflow {
            name: "ledger growth rate".to_string(),
            rate,
        });
    }
    if !rate.is_finite() {
        return Err(Error::Config(format!("ledger growth rate {} is not finite", rate)));
    }
    let years = (to - from).num_days() as f64 / DAYS_PER_YEAR;
    Ok((1.0 + rate).powf(years))
}

/// Index level on `date`, interpolated geometrically between the end of the
/// previous year and the end of the date's own year.
fn index_on(series: &CompoundedSeries, date: NaiveDate) -> Result<f64> {
    let year = date.year();
    let missing = || {
        Error::InsufficientData(format!(
            "growth series covers {}..={}, no index for {}",
            series.anchor_period(),
            series.last_period(),
            date
        ))
    };

    let start = series.value_at(year - 1).ok_or_else(missing)?;
    // Jan 1 is the previous year's close
    if date.ordinal0() == 0 {
        return Ok(start);
    }
    let end = series.value_at(year).ok_or_else(missing)?;

    let days_in_year = if is_leap_year(year) { 366.0 } else { 365.0 };
    let fraction = date.ordinal0() as f64 / days_in_year;
    Ok(start * (end / start).powf(fraction))
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
