//! Price models: the one-hot regression pipeline and the neighbor index

use crate::data::PropertyRecord;
use crate::error::{ForecastError, Result};
use crate::features::FeatureSchema;
use serde::{Deserialize, Serialize};

pub mod neighbors;
pub mod random_forest;

pub use neighbors::{NearestNeighbors, NEIGHBOR_COUNT};
pub use random_forest::{ForestParams, RandomForest};

/// Fitted regression artifact: a one-hot encoding of the four property
/// features feeding a tree-ensemble regressor. Replaced wholesale on
/// retrain, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePipeline {
    /// Bundle layout version this pipeline was written with
    pub schema_version: u32,
    schema: FeatureSchema,
    forest: RandomForest,
}

impl PricePipeline {
    /// Fit the encoding and the regressor on labeled records
    pub fn fit(records: &[PropertyRecord], prices: &[f64], params: &ForestParams) -> Result<Self> {
        if records.len() != prices.len() {
            return Err(ForecastError::TrainingFailed(format!(
                "{} records but {} prices",
                records.len(),
                prices.len()
            )));
        }

        let schema = FeatureSchema::fit(records)?;
        let x = schema.encode_matrix(records);
        let forest = RandomForest::fit(&x, prices, params)?;

        Ok(Self {
            schema_version: crate::store::BUNDLE_SCHEMA_VERSION,
            schema,
            forest,
        })
    }

    /// Predict the price of a single property
    pub fn predict(&self, record: &PropertyRecord) -> Result<f64> {
        if self.schema.width() != self.forest.n_features() {
            return Err(ForecastError::Prediction(format!(
                "Encoder emits {} columns but the forest expects {}",
                self.schema.width(),
                self.forest.n_features()
            )));
        }

        let features = self.schema.encode(record);
        self.forest.predict(&features)
    }

    /// The fitted encoding schema
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }
}
