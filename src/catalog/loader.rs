//! Wide-table country returns loader
//!
//! Expected layout: one header row holding identifying columns and one column
//! per year, then one row per country. Cells are percent changes (`7.5` means
//! +7.5%). Blank cells and the markers `..` and `n/a` are missing years; any
//! other cell that is not a finite number makes the table malformed.

use std::collections::HashSet;
use std::io::Read;

use log::{debug, info};

use super::CountryCatalogEntry;
use crate::error::{Error, Result};
use crate::series::{Observation, ReturnSeries};

const CODE_HEADERS: [&str; 4] = ["country code", "code", "iso3", "iso"];
const NAME_HEADERS: [&str; 3] = ["country name", "name", "country"];

/// Cell values that mark a year with no data
const MISSING_MARKERS: [&str; 2] = ["..", "n/a"];

/// Column layout resolved from the header row
#[derive(Debug)]
struct Layout {
    code_col: usize,
    name_col: usize,
    /// (column index, year), sorted by year
    year_cols: Vec<(usize, i32)>,
}

fn parse_year(header: &str) -> Option<i32> {
    let trimmed = header.trim();
    // World Bank exports label columns like "1990 [YR1990]"
    let head = trimmed.split_whitespace().next().unwrap_or(trimmed);
    match head.parse::<i32>() {
        Ok(year) if (1000..=9999).contains(&year) => Some(year),
        _ => None,
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|name| h.trim().eq_ignore_ascii_case(name)))
}

fn resolve_layout(headers: &csv::StringRecord) -> Result<Layout> {
    let mut year_cols: Vec<(usize, i32)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, h)| parse_year(h).map(|year| (idx, year)))
        .collect();

    if year_cols.is_empty() {
        return Err(Error::malformed("header row has no year columns"));
    }

    year_cols.sort_by_key(|&(_, year)| year);
    if let Some(pair) = year_cols.windows(2).find(|w| w[0].1 == w[1].1) {
        return Err(Error::malformed(format!("year {} appears twice in header", pair[0].1)));
    }

    let year_set: HashSet<usize> = year_cols.iter().map(|&(idx, _)| idx).collect();
    let first_label = (0..headers.len()).find(|idx| !year_set.contains(idx));

    let code_col = find_column(headers, &CODE_HEADERS)
        .or(first_label)
        .ok_or_else(|| Error::malformed("header row has no country column"))?;
    let name_col = find_column(headers, &NAME_HEADERS).unwrap_or(code_col);

    Ok(Layout {
        code_col,
        name_col,
        year_cols,
    })
}

/// Parse a wide country × year table into catalog entries (file order)
pub fn load_entries<R: Read>(reader: R) -> Result<Vec<CountryCatalogEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| Error::malformed(format!("cannot read header row: {}", e)))?
        .clone();
    let layout = resolve_layout(&headers)?;

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    let mut numeric_rows = 0usize;

    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::malformed(format!("row {}: {}", row_idx + 2, e)))?;

        let code = record.get(layout.code_col).unwrap_or("").trim();
        if code.is_empty() {
            debug!("Skipping row {} without a country code", row_idx + 2);
            continue;
        }
        let name = record.get(layout.name_col).unwrap_or(code).trim();

        let mut observations = Vec::new();
        for &(col, year) in &layout.year_cols {
            let cell = record.get(col).unwrap_or("").trim();
            if cell.is_empty() || MISSING_MARKERS.iter().any(|m| cell.eq_ignore_ascii_case(m)) {
                continue;
            }
            match cell.parse::<f64>() {
                Ok(pct) if pct.is_finite() => {
                    observations.push(Observation::new(year, pct / 100.0))
                }
                _ => {
                    return Err(Error::malformed(format!(
                        "country {} year {}: '{}' is not a percent change",
                        code, year, cell
                    )))
                }
            }
        }

        if !observations.is_empty() {
            numeric_rows += 1;
        }

        let returns = ReturnSeries::new(observations)
            .map_err(|e| Error::malformed(format!("country {}: {}", code, e)))?;

        if !seen.insert(code.to_string()) {
            return Err(Error::malformed(format!("duplicate country code {}", code)));
        }

        entries.push(CountryCatalogEntry {
            code: code.to_string(),
            name: if name.is_empty() { code.to_string() } else { name.to_string() },
            returns,
        });
    }

    if numeric_rows == 0 {
        return Err(Error::malformed("no country rows contain numeric data"));
    }

    info!(
        "Loaded {} countries ({} with data) across {} year columns",
        entries.len(),
        numeric_rows,
        layout.year_cols.len()
    );
    Ok(entries)
}
