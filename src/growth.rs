//! Per-city and national growth rates derived from a housing price index

use crate::data::column_to_f64;
use crate::error::{ForecastError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Fallback quarterly growth rate when no index data is available
pub const DEFAULT_QUARTERLY_RATE: f64 = 0.02;

/// Name of the national aggregate column in the index dataset
pub const NATIONAL_COLUMN: &str = "All India";

/// Name of the period-label column in the index dataset
pub const PERIOD_COLUMN: &str = "HPI";

/// Where a resolved growth rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    /// The city itself had an index series
    #[serde(rename = "City-specific")]
    CitySpecific,
    /// National fallback (or the fixed default when even that is missing)
    #[serde(rename = "All India")]
    National,
}

/// Mean fractional period-over-period growth per city, plus one
/// national aggregate rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRateTable {
    city_rates: BTreeMap<String, f64>,
    national_rate: Option<f64>,
}

impl GrowthRateTable {
    /// A table with no index data; every lookup resolves to the default rate
    pub fn empty() -> Self {
        Self {
            city_rates: BTreeMap::new(),
            national_rate: None,
        }
    }

    /// Reassemble a table from its persisted parts
    pub fn from_parts(city_rates: BTreeMap<String, f64>, national_rate: Option<f64>) -> Self {
        // Keep the finite-rate invariant even for artifacts written
        // by hand or by an older build
        let city_rates = city_rates
            .into_iter()
            .filter(|(_, rate)| rate.is_finite())
            .collect();
        Self {
            city_rates,
            national_rate: national_rate.filter(|r| r.is_finite()),
        }
    }

    /// Build a table from an index CSV: one period-label column, an
    /// `All India` column, and one numeric column per city
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::DataUnavailable(format!(
                "Cannot open growth index at {}: {}",
                path.display(),
                e
            ))
        })?;

        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()
            .map_err(|e| {
                ForecastError::DataUnavailable(format!(
                    "Cannot read growth index at {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Self::from_dataframe(&df)
    }

    /// Build a table from an index DataFrame
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut city_rates = BTreeMap::new();
        let mut national_rate = None;

        for col in df.get_columns() {
            // The period label is never a city, even when it holds
            // numeric values such as bare years
            if col.name() == PERIOD_COLUMN {
                continue;
            }

            // Entirely empty columns are dropped before processing
            if col.null_count() == col.len() {
                continue;
            }

            // Remaining non-numeric columns are skipped
            let values = match column_to_f64(col) {
                Some(values) => values,
                None => continue,
            };

            let rate = match mean_growth(&values) {
                Some(rate) => rate,
                None => continue,
            };

            if col.name() == NATIONAL_COLUMN {
                national_rate = Some(rate);
            } else {
                city_rates.insert(col.name().to_string(), rate);
            }
        }

        log::info!(
            "Growth index processed: {} cities, national rate {:?}",
            city_rates.len(),
            national_rate
        );

        Ok(Self {
            city_rates,
            national_rate,
        })
    }

    /// Resolve the growth rate for a city. Total: falls back to the
    /// national rate, then to the fixed default.
    pub fn rate_for(&self, city: &str) -> f64 {
        self.rate_with_source(city).0
    }

    /// Resolve the growth rate for a city together with its provenance
    pub fn rate_with_source(&self, city: &str) -> (f64, RateSource) {
        match self.city_rates.get(city) {
            Some(&rate) => (rate, RateSource::CitySpecific),
            None => (
                self.national_rate.unwrap_or(DEFAULT_QUARTERLY_RATE),
                RateSource::National,
            ),
        }
    }

    /// Whether the table has a city-specific series for this city
    pub fn has_city(&self, city: &str) -> bool {
        self.city_rates.contains_key(city)
    }

    /// The per-city rate map
    pub fn city_rates(&self) -> &BTreeMap<String, f64> {
        &self.city_rates
    }

    /// The national aggregate rate, if the index carried one
    pub fn national_rate(&self) -> Option<f64> {
        self.national_rate
    }
}

/// Mean of consecutive fractional changes over an ordered series.
/// Returns None for series too short to have a change, or when the
/// mean is not finite (e.g. a zero somewhere in the series).
fn mean_growth(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let changes: Vec<f64> = values
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();

    let mean = changes.iter().sum::<f64>() / changes.len() as f64;
    mean.is_finite().then_some(mean)
}
