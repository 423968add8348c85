//! One-hot feature encoding and schema alignment

use crate::data::{
    PropertyRecord, TransactionData, BHK_COLUMN, CITY_COLUMN, PROPERTY_TYPE_COLUMN, SIZE_COLUMN,
};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fitted one-hot column layout: the numeric pass-through columns first,
/// then one indicator column per category value seen at fit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Derive a schema from a set of records: `Size` and `No_of_BHK`
    /// pass through, `City_name` and `Property_type` are one-hot encoded
    /// over the distinct values present (sorted for a stable layout)
    pub fn fit(records: &[PropertyRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(ForecastError::TrainingFailed(
                "Cannot fit a feature schema on zero records".to_string(),
            ));
        }

        let cities: BTreeSet<&str> = records.iter().map(|r| r.city.as_str()).collect();
        let types: BTreeSet<&str> = records.iter().map(|r| r.property_type.as_str()).collect();

        let mut columns = vec![SIZE_COLUMN.to_string(), BHK_COLUMN.to_string()];
        columns.extend(cities.iter().map(|c| indicator_column(CITY_COLUMN, c)));
        columns.extend(types.iter().map(|t| indicator_column(PROPERTY_TYPE_COLUMN, t)));

        Ok(Self { columns })
    }

    /// The fitted column layout
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns in the layout
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Encode one record against this schema. Category values never seen
    /// at fit time contribute nothing (all their indicators stay 0).
    pub fn encode(&self, record: &PropertyRecord) -> Vec<f64> {
        let query = [
            (SIZE_COLUMN.to_string(), record.size),
            (BHK_COLUMN.to_string(), record.bedroom_count as f64),
            (indicator_column(CITY_COLUMN, &record.city), 1.0),
            (
                indicator_column(PROPERTY_TYPE_COLUMN, &record.property_type),
                1.0,
            ),
        ];
        align_features(&self.columns, &query)
    }

    /// Encode a whole record slice into a row-major matrix
    pub fn encode_matrix(&self, records: &[PropertyRecord]) -> Vec<Vec<f64>> {
        records.iter().map(|r| self.encode(r)).collect()
    }
}

/// Align a query's (column, value) pairs to a trained column list,
/// producing a fixed-width vector. Columns the query does not mention
/// are filled with 0; columns the query mentions but the training never
/// saw are dropped. Order is forced to the trained layout.
pub fn align_features(trained: &[String], query: &[(String, f64)]) -> Vec<f64> {
    trained
        .iter()
        .map(|column| {
            query
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| *value)
                .unwrap_or(0.0)
        })
        .collect()
}

fn indicator_column(field: &str, value: &str) -> String {
    format!("{}_{}", field, value)
}

/// The similarity feature table: the fitted schema plus every training
/// row encoded against it, in training-data row order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Bundle layout version this table was written with
    pub schema_version: u32,
    schema: FeatureSchema,
    rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// Encode the full transaction table with an independently fitted schema
    pub fn fit(data: &TransactionData) -> Result<Self> {
        let records = data.records()?;
        let schema = FeatureSchema::fit(&records)?;
        let rows = schema.encode_matrix(&records);
        Ok(Self {
            schema_version: crate::store::BUNDLE_SCHEMA_VERSION,
            schema,
            rows,
        })
    }

    /// The fitted schema
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// The encoded rows
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of encoded rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
