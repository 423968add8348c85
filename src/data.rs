//! Transaction data handling for price forecasting

use crate::error::{ForecastError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Property type denoting an unsegmented land parcel
pub const LAND_PARCEL_TYPE: &str = "Residential Plot";

/// Column names of the transaction dataset
pub const SIZE_COLUMN: &str = "Size";
pub const BHK_COLUMN: &str = "No_of_BHK";
pub const CITY_COLUMN: &str = "City_name";
pub const PROPERTY_TYPE_COLUMN: &str = "Property_type";
pub const PRICE_COLUMN: &str = "Price";

const FEATURE_COLUMNS: [&str; 4] = [SIZE_COLUMN, BHK_COLUMN, CITY_COLUMN, PROPERTY_TYPE_COLUMN];

/// A single property described by the four model features
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    /// Area in square feet
    pub size: f64,
    /// Number of bedrooms (BHK)
    pub bedroom_count: u32,
    /// City the property is located in
    pub city: String,
    /// Property type category, e.g. "Apartment" or "Residential Plot"
    pub property_type: String,
}

impl PropertyRecord {
    /// Create a new property record
    pub fn new(
        property_type: impl Into<String>,
        size: f64,
        city: impl Into<String>,
        bedroom_count: u32,
    ) -> Result<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(ForecastError::Validation(format!(
                "Size must be a positive number, got {}",
                size
            )));
        }

        Ok(Self {
            size,
            bedroom_count,
            city: city.into(),
            property_type: property_type.into(),
        })
    }

    /// Apply the land-parcel rule: a residential plot has no bedrooms,
    /// whatever the request claimed. Idempotent.
    pub fn normalized(mut self) -> Self {
        if self.property_type == LAND_PARCEL_TYPE {
            self.bedroom_count = 0;
        }
        self
    }
}

/// Labeled transaction table backing a training run
#[derive(Debug, Clone)]
pub struct TransactionData {
    /// Data frame with the transaction rows
    df: DataFrame,
}

/// Data loader for transaction data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load transaction data from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TransactionData> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::DataUnavailable(format!(
                "Cannot open transaction data at {}: {}",
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
                    "Cannot read transaction data at {}: {}",
                    path.display(),
                    e
                ))
            })?;

        TransactionData::from_dataframe(df)
    }
}

impl TransactionData {
    /// Create transaction data from an existing DataFrame,
    /// validating the required columns and applying the land-parcel rule
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        let names = df.get_column_names();
        let mut missing = Vec::new();
        for required in FEATURE_COLUMNS.iter().chain([PRICE_COLUMN].iter()) {
            if !names.contains(required) {
                missing.push(*required);
            }
        }
        if !missing.is_empty() {
            return Err(ForecastError::DataUnavailable(format!(
                "Transaction data is missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut data = Self { df };
        data.normalize_land_parcels()?;
        Ok(data)
    }

    /// Force No_of_BHK to 0 wherever Property_type is a residential plot
    fn normalize_land_parcels(&mut self) -> Result<()> {
        let types = self.column_as_str(PROPERTY_TYPE_COLUMN)?;
        let bhk = self.column_as_f64(BHK_COLUMN)?;

        if types.len() != bhk.len() {
            return Err(ForecastError::DataUnavailable(format!(
                "Column lengths differ: {} has {}, {} has {}",
                PROPERTY_TYPE_COLUMN,
                types.len(),
                BHK_COLUMN,
                bhk.len()
            )));
        }

        let fixed: Vec<f64> = types
            .iter()
            .zip(bhk.iter())
            .map(|(t, &b)| if t == LAND_PARCEL_TYPE { 0.0 } else { b })
            .collect();

        self.df.replace(BHK_COLUMN, Series::new(BHK_COLUMN, fixed))?;
        Ok(())
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of transaction rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Extract the feature side of every row
    pub fn records(&self) -> Result<Vec<PropertyRecord>> {
        let sizes = self.column_as_f64(SIZE_COLUMN)?;
        let bhks = self.column_as_f64(BHK_COLUMN)?;
        let cities = self.column_as_str(CITY_COLUMN)?;
        let types = self.column_as_str(PROPERTY_TYPE_COLUMN)?;

        let n = sizes.len();
        if bhks.len() != n || cities.len() != n || types.len() != n {
            return Err(ForecastError::DataUnavailable(
                "Transaction columns have inconsistent lengths".to_string(),
            ));
        }

        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            records.push(PropertyRecord {
                size: sizes[i],
                bedroom_count: bhks[i].max(0.0) as u32,
                city: cities[i].clone(),
                property_type: types[i].clone(),
            });
        }
        Ok(records)
    }

    /// Observed prices, in the same row order as `records()`
    pub fn prices(&self) -> Result<Vec<f64>> {
        self.column_as_f64(PRICE_COLUMN)
    }

    /// Write the table as a flat CSV file
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut df = self.df.clone();
        CsvWriter::new(file).has_header(true).finish(&mut df)?;
        Ok(())
    }

    /// Helper method to get a column as f64 values
    pub fn column_as_f64(&self, column_name: &str) -> Result<Vec<f64>> {
        let col = self.df.column(column_name).map_err(|e| {
            ForecastError::DataUnavailable(format!("Column '{}' not found: {}", column_name, e))
        })?;

        column_to_f64(col).ok_or_else(|| {
            ForecastError::DataUnavailable(format!(
                "Column '{}' cannot be converted to f64",
                column_name
            ))
        })
    }

    /// Helper method to get a column as owned strings
    pub fn column_as_str(&self, column_name: &str) -> Result<Vec<String>> {
        let col = self.df.column(column_name).map_err(|e| {
            ForecastError::DataUnavailable(format!("Column '{}' not found: {}", column_name, e))
        })?;

        match col.dtype() {
            DataType::Utf8 => Ok(col
                .utf8()
                .map_err(ForecastError::from)?
                .into_iter()
                .flatten()
                .map(|s| s.to_string())
                .collect()),
            _ => Err(ForecastError::DataUnavailable(format!(
                "Column '{}' is not a string column",
                column_name
            ))),
        }
    }
}

/// Convert a numeric series of any supported dtype into f64 values,
/// skipping nulls. Returns None for non-numeric dtypes.
pub(crate) fn column_to_f64(col: &Series) -> Option<Vec<f64>> {
    match col.dtype() {
        DataType::Float64 => Some(col.f64().ok()?.into_iter().flatten().collect()),
        DataType::Float32 => Some(
            col.f32()
                .ok()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect(),
        ),
        DataType::Int64 => Some(
            col.i64()
                .ok()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect(),
        ),
        DataType::Int32 => Some(
            col.i32()
                .ok()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect(),
        ),
        DataType::UInt64 => Some(
            col.u64()
                .ok()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect(),
        ),
        DataType::UInt32 => Some(
            col.u32()
                .ok()?
                .into_iter()
                .flatten()
                .map(|v| v as f64)
                .collect(),
        ),
        _ => None,
    }
}
