//! Country-level historical returns catalog
//!
//! Built once from a wide CSV table and treated as immutable. Reloading swaps
//! in a whole new catalog through [`CatalogStore`].

pub mod loader;
mod store;

pub use store::CatalogStore;

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::series::{compound, CompoundedSeries, ReturnSeries};

/// First year of the default catalog window
pub const CATALOG_FIRST_YEAR: i32 = 1960;

/// Last year of the default catalog window
pub const CATALOG_LAST_YEAR: i32 = 2024;

/// Initial chart selection, in display order
pub const DEFAULT_COUNTRIES: [&str; 8] = ["USA", "GBR", "DEU", "FRA", "JPN", "CAN", "AUS", "CHE"];

/// Default path to the country returns table
pub const DEFAULT_CATALOG_PATH: &str = "data/country_returns.csv";

/// One country and its sparse annual returns
#[derive(Debug, Clone, PartialEq)]
pub struct CountryCatalogEntry {
    pub code: String,
    pub name: String,
    pub returns: ReturnSeries,
}

impl CountryCatalogEntry {
    pub fn has_data_in(&self, start: i32, end: i32) -> bool {
        self.returns.count_in(start, end) > 0
    }
}

/// Listing row for country pickers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    pub code: String,
    pub name: String,
    pub has_data: bool,
}

/// Compounded series for one country
#[derive(Debug, Clone, Serialize)]
pub struct CountrySeries {
    pub code: String,
    pub name: String,
    pub series: CompoundedSeries,
}

/// Catalog window and curated selection
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogOptions {
    pub window_start: i32,
    pub window_end: i32,
    pub default_countries: Vec<String>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            window_start: CATALOG_FIRST_YEAR,
            window_end: CATALOG_LAST_YEAR,
            default_countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Immutable set of country return series
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CountryCatalogEntry>,
    index: HashMap<String, usize>,
    options: CatalogOptions,
}

impl Catalog {
    pub fn from_entries(entries: Vec<CountryCatalogEntry>, options: CatalogOptions) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.code.clone(), idx))
            .collect();
        Self {
            entries,
            index,
            options,
        }
    }

    /// Load from any reader holding the wide CSV table
    pub fn from_reader<R: std::io::Read>(reader: R, options: CatalogOptions) -> Result<Self> {
        Ok(Self::from_entries(loader::load_entries(reader)?, options))
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P, options: CatalogOptions) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file, options)
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, code: &str) -> Option<&CountryCatalogEntry> {
        self.index.get(code).map(|&idx| &self.entries[idx])
    }

    /// Compounded returns for `code` over `[start_year, end_year]`
    pub fn country_returns(
        &self,
        code: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<CompoundedSeries> {
        let entry = self
            .entry(code)
            .ok_or_else(|| Error::UnknownCountry(code.to_string()))?;

        let window = entry.returns.slice(start_year, end_year);
        if window.is_empty() {
            return Err(Error::InsufficientData(format!(
                "{} has no observations in {}..={}",
                code, start_year, end_year
            )));
        }

        debug!("{}: {} observations in {}..={}", code, window.len(), start_year, end_year);
        compound(&window)
    }

    /// Every country with its data flag for the configured window
    pub fn available_countries(&self) -> Vec<CountrySummary> {
        self.available_countries_in(self.options.window_start, self.options.window_end)
    }

    pub fn available_countries_in(&self, start_year: i32, end_year: i32) -> Vec<CountrySummary> {
        self.entries
            .iter()
            .map(|e| CountrySummary {
                code: e.code.clone(),
                name: e.name.clone(),
                has_data: e.has_data_in(start_year, end_year),
            })
            .collect()
    }

    /// Curated initial selection, limited to codes present in this catalog
    pub fn default_countries(&self) -> Vec<CountrySummary> {
        let (start, end) = (self.options.window_start, self.options.window_end);
        self.options
            .default_countries
            .iter()
            .filter_map(|code| {
                let entry = self.entry(code);
                if entry.is_none() {
                    debug!("Default country {} not in catalog", code);
                }
                entry
            })
            .map(|e| CountrySummary {
                code: e.code.clone(),
                name: e.name.clone(),
                has_data: e.has_data_in(start, end),
            })
            .collect()
    }

    /// Compound every country that has data in the window, in parallel
    pub fn compound_all(&self, start_year: i32, end_year: i32) -> Vec<CountrySeries> {
        self.entries
            .par_iter()
            .filter(|e| e.has_data_in(start_year, end_year))
            .filter_map(|e| {
                compound(&e.returns.slice(start_year, end_year))
                    .ok()
                    .map(|series| CountrySeries {
                        code: e.code.clone(),
                        name: e.name.clone(),
                        series,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const TABLE: &str = "Country Name,Country Code,1989,1990,1991,1992,2000\n\
                         United States,USA,,10,-10,5,\n\
                         United Kingdom,GBR,3,,,,\n\
                         Japan,JPN,1,2,3,4,5\n";

    fn catalog() -> Catalog {
        Catalog::from_reader(TABLE.as_bytes(), CatalogOptions::default()).unwrap()
    }

    #[test]
    fn test_country_returns_compounds_window() {
        let series = catalog().country_returns("USA", 1990, 2000).unwrap();
        let expected = [1.0, 1.10, 0.99, 1.0395];
        for (actual, expected) in series.values().iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*actual, *expected, epsilon = 1e-12);
        }
        assert_eq!(series.anchor_period(), 1989);
    }

    #[test]
    fn test_unknown_country() {
        let err = catalog().country_returns("XX", 1990, 2000).unwrap_err();
        assert!(matches!(err, Error::UnknownCountry(code) if code == "XX"));
    }

    #[test]
    fn test_known_country_without_data_in_window() {
        let err = catalog().country_returns("GBR", 1990, 2000).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_inverted_window_is_insufficient() {
        let err = catalog().country_returns("USA", 2000, 1990).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_available_countries_flags() {
        let listing = catalog().available_countries_in(1990, 2000);
        let flags: Vec<(&str, bool)> =
            listing.iter().map(|c| (c.code.as_str(), c.has_data)).collect();
        assert_eq!(flags, vec![("USA", true), ("GBR", false), ("JPN", true)]);

        let full = catalog().available_countries();
        assert!(full.iter().all(|c| c.has_data));
    }

    #[test]
    fn test_default_countries_follow_curated_order() {
        let defaults = catalog().default_countries();
        let codes: Vec<&str> = defaults.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["USA", "GBR", "JPN"]);
    }

    #[test]
    fn test_compound_all_skips_countries_without_data() {
        let all = catalog().compound_all(1990, 2000);
        let codes: Vec<&str> = all.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["USA", "JPN"]);
        assert_abs_diff_eq!(
            all[1].series.final_value(),
            1.02 * 1.03 * 1.04 * 1.05,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_bundled_table_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/country_returns.csv");
        let catalog = Catalog::from_csv_path(path, CatalogOptions::default()).unwrap();
        assert_eq!(catalog.default_countries().len(), DEFAULT_COUNTRIES.len());
        assert!(catalog.country_returns("USA", 2000, 2024).is_ok());
        // Argentina's early years are ".." in the table
        assert_eq!(catalog.entry("ARG").unwrap().returns.first_period(), Some(2008));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let json = serde_json::to_string(&catalog().default_countries()[0]).unwrap();
        assert_eq!(json, r#"{"code":"USA","name":"United States","hasData":true}"#);
    }
}
