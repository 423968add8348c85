//! Forecast orchestration: train-or-load, blended estimate, projection

use crate::data::{DataLoader, PropertyRecord};
use crate::error::{ForecastError, Result};
use crate::growth::{GrowthRateTable, RateSource};
use crate::store::{ModelBundle, ModelStore};
use crate::training;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Weight of the regression estimate in the blended price
pub const REGRESSION_WEIGHT: f64 = 0.7;

/// Weight of the similarity estimate in the blended price
pub const SIMILARITY_WEIGHT: f64 = 0.3;

/// Number of quarters projected forward
pub const PROJECTION_QUARTERS: usize = 4;

/// Well-known file name of the growth index dataset, resolved next to
/// the transaction dataset
pub const GROWTH_INDEX_FILE: &str = "EC-20240829-IN-01.csv";

/// Fixed 70/30 combination of the two estimates
pub fn blend(regression_estimate: f64, similarity_estimate: f64) -> f64 {
    REGRESSION_WEIGHT * regression_estimate + SIMILARITY_WEIGHT * similarity_estimate
}

/// ROI summary derived from the resolved growth rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiSummary {
    /// Percent growth from the current price to the 4-quarter projection
    pub total_growth: f64,
    /// 4-quarter compounded rate as a percentage; intentionally a
    /// rate-only figure, independent of the current price
    #[serde(rename = "annualizedROI")]
    pub annualized_roi: f64,
    /// Resolved quarterly rate as a percentage
    pub quarterly_growth: f64,
}

/// The four projections labeled by quarter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyProjections {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q4: f64,
}

/// Full forecast payload returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyForecast {
    /// Blended present-day price estimate
    pub current_price: f64,
    /// Compounded projections for quarters 1 through 4
    pub future_projections: [f64; PROJECTION_QUARTERS],
    /// Resolved quarterly growth rate, percent
    pub quarterly_growth_rate: f64,
    /// Whether the rate came from the city's own series or the
    /// national fallback
    pub growth_rate_source: RateSource,
    pub roi: RoiSummary,
    pub projections: QuarterlyProjections,
}

/// Parsed and validated invocation payload
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub property_type: String,
    pub size: f64,
    pub city: String,
    pub bedroom_count: u32,
    pub data_path: PathBuf,
}

const REQUIRED_FIELDS: [&str; 5] = ["propertyType", "sqft", "city", "bhk", "dataPath"];

impl ForecastRequest {
    /// Parse the single-JSON-argument payload
    /// `{propertyType, sqft, city, bhk, dataPath}`. All five fields are
    /// required; missing ones are reported by name in one error.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ForecastError::Validation(format!("Invalid JSON payload: {}", e)))?;

        let object = value.as_object().ok_or_else(|| {
            ForecastError::Validation("Payload must be a JSON object".to_string())
        })?;

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .filter(|field| !object.contains_key(**field))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let property_type = string_field(&object["propertyType"], "propertyType")?;
        let size = number_field(&object["sqft"], "sqft")?;
        if !size.is_finite() || size <= 0.0 {
            return Err(ForecastError::Validation(format!(
                "sqft must be a positive number, got {}",
                size
            )));
        }

        let bhk = number_field(&object["bhk"], "bhk")?;
        if bhk < 0.0 || bhk.fract() != 0.0 {
            return Err(ForecastError::Validation(format!(
                "bhk must be a non-negative integer, got {}",
                bhk
            )));
        }

        let city = city_field(&object["city"])?;
        let data_path = PathBuf::from(string_field(&object["dataPath"], "dataPath")?);

        Ok(Self {
            property_type,
            size,
            city,
            bedroom_count: bhk as u32,
            data_path,
        })
    }

    /// The property described by the request
    pub fn record(&self) -> Result<PropertyRecord> {
        PropertyRecord::new(
            self.property_type.clone(),
            self.size,
            self.city.clone(),
            self.bedroom_count,
        )
    }
}

fn string_field(value: &Value, name: &str) -> Result<String> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ForecastError::Validation(format!("{} must be a string", name)))
}

fn number_field(value: &Value, name: &str) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ForecastError::Validation(format!("{} is not a valid number", name))),
        Value::String(s) => s.trim().parse().map_err(|_| {
            ForecastError::Validation(format!("{} must be numeric, got '{}'", name, s))
        }),
        _ => Err(ForecastError::Validation(format!(
            "{} must be a number",
            name
        ))),
    }
}

/// A purely numeric city value is coerced to a placeholder label
fn city_field(value: &Value) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            log::info!("Coercing numeric city '{}' to a placeholder label", s);
            Ok("Unknown City".to_string())
        }
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => {
            log::info!("Coercing numeric city '{}' to a placeholder label", n);
            Ok("Unknown City".to_string())
        }
        _ => Err(ForecastError::Validation(
            "city must be a string".to_string(),
        )),
    }
}

/// Orchestrates train-or-load, the blended estimate, and the projection
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    store: ModelStore,
    data_path: PathBuf,
    growth_index_path: PathBuf,
}

impl ForecastEngine {
    /// Create an engine over a transaction dataset, a growth index
    /// dataset, and a bundle storage directory
    pub fn new(
        data_path: impl Into<PathBuf>,
        growth_index_path: impl Into<PathBuf>,
        model_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store: ModelStore::new(model_dir),
            data_path: data_path.into(),
            growth_index_path: growth_index_path.into(),
        }
    }

    /// The bundle store this engine reads from and writes to
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Produce a blended price estimate for the property and project it
    /// forward four quarters
    pub fn forecast(&self, record: PropertyRecord) -> Result<PropertyForecast> {
        let record = record.normalized();

        if !self.store.exists() {
            log::info!("Model bundle not found, training");
            self.train_and_save()?;
        }

        let mut bundle = match self.store.load() {
            Ok(bundle) => bundle,
            Err(e) => {
                log::warn!("Bundle load failed ({}), retraining once", e);
                self.train_and_save()?;
                // A second load failure is fatal
                self.store.load()?
            }
        };

        // Regression estimate; at most one retrain cycle per call
        let mut retrained = false;
        let regression_estimate = loop {
            match bundle.pipeline.predict(&record) {
                Ok(estimate) => break estimate,
                Err(ForecastError::Prediction(msg)) if !retrained => {
                    retrained = true;
                    log::warn!("Prediction failed ({}), retraining once", msg);
                    self.train_and_save()?;
                    bundle = self.store.load()?;
                }
                Err(e) => return Err(e),
            }
        };

        // Similarity estimate is best-effort
        let similarity_estimate = match similarity_estimate(&bundle, &record) {
            Ok(estimate) => estimate,
            Err(e) => {
                log::warn!("{}; falling back to the regression estimate", e);
                regression_estimate
            }
        };

        let current_price = blend(regression_estimate, similarity_estimate);
        let (rate, source) = bundle.growth.rate_with_source(&record.city);

        Ok(project(current_price, rate, source))
    }

    /// Load the datasets and run the training pipeline. A missing growth
    /// index is not fatal; the table falls back to the default rate.
    fn train_and_save(&self) -> Result<ModelBundle> {
        let data = DataLoader::from_csv(&self.data_path)?;
        let growth = match GrowthRateTable::from_csv(&self.growth_index_path) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Growth index unavailable ({}), using the default rate", e);
                GrowthRateTable::empty()
            }
        };
        training::train_and_save(&self.store, &data, &growth)
    }
}

/// Average price of the nearest historical neighbors to the query,
/// encoded against the stored feature-table schema
fn similarity_estimate(bundle: &ModelBundle, record: &PropertyRecord) -> Result<f64> {
    let query = bundle.knn_features.schema().encode(record);
    let neighbors = bundle.knn.kneighbors(&query)?;

    let prices = bundle
        .training_data
        .prices()
        .map_err(|e| ForecastError::SimilarityLookup(e.to_string()))?;

    let mut sum = 0.0;
    for &index in &neighbors {
        let price = prices.get(index).ok_or_else(|| {
            ForecastError::SimilarityLookup(format!(
                "Neighbor row {} is outside the training table ({} rows)",
                index,
                prices.len()
            ))
        })?;
        sum += price;
    }
    Ok(sum / neighbors.len() as f64)
}

/// Compound the current price forward and derive the growth metrics
fn project(current_price: f64, rate: f64, source: RateSource) -> PropertyForecast {
    let mut future_projections = [0.0; PROJECTION_QUARTERS];
    for (i, slot) in future_projections.iter_mut().enumerate() {
        *slot = current_price * (1.0 + rate).powi(i as i32 + 1);
    }

    let final_price = future_projections[PROJECTION_QUARTERS - 1];
    let total_growth = (final_price - current_price) / current_price * 100.0;
    let annualized_roi = ((1.0 + rate).powi(PROJECTION_QUARTERS as i32) - 1.0) * 100.0;
    let quarterly_growth = rate * 100.0;

    PropertyForecast {
        current_price,
        future_projections,
        quarterly_growth_rate: quarterly_growth,
        growth_rate_source: source,
        roi: RoiSummary {
            total_growth,
            annualized_roi,
            quarterly_growth,
        },
        projections: QuarterlyProjections {
            q1: future_projections[0],
            q2: future_projections[1],
            q3: future_projections[2],
            q4: future_projections[3],
        },
    }
}
