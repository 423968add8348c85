//! Training pipeline: fit the regression pipeline and the neighbor
//! index from a transaction table and persist them as one bundle

use crate::data::TransactionData;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::growth::GrowthRateTable;
use crate::models::{ForestParams, NearestNeighbors, PricePipeline, NEIGHBOR_COUNT};
use crate::store::{ModelBundle, ModelStore};
use crate::utils::{rmse, train_test_split_indices};

/// Holdout share for the RMSE diagnostic
pub const TEST_RATIO: f64 = 0.2;

/// Seed for the train/test shuffle and the forest bootstrap
pub const TRAINING_SEED: u64 = 42;

/// Fit all artifacts from a transaction table. The table is expected to
/// be land-parcel-normalized already (the loader does this).
pub fn train(data: &TransactionData, growth: &GrowthRateTable) -> Result<ModelBundle> {
    let records = data.records()?;
    let prices = data.prices()?;
    if records.is_empty() {
        return Err(ForecastError::TrainingFailed(
            "Transaction table has no rows".to_string(),
        ));
    }
    if records.len() != prices.len() {
        return Err(ForecastError::TrainingFailed(format!(
            "{} feature rows but {} prices",
            records.len(),
            prices.len()
        )));
    }

    // 80/20 split; the holdout feeds the RMSE diagnostic only
    let (train_idx, test_idx) = train_test_split_indices(records.len(), TEST_RATIO, TRAINING_SEED);
    let train_records: Vec<_> = train_idx.iter().map(|&i| records[i].clone()).collect();
    let train_prices: Vec<f64> = train_idx.iter().map(|&i| prices[i]).collect();

    let params = ForestParams {
        seed: TRAINING_SEED,
        ..ForestParams::default()
    };
    let pipeline = PricePipeline::fit(&train_records, &train_prices, &params)?;

    // Diagnostic, not a gate: training proceeds whatever the score
    if !test_idx.is_empty() {
        let predictions: Result<Vec<f64>> = test_idx
            .iter()
            .map(|&i| pipeline.predict(&records[i]))
            .collect();
        let actual: Vec<f64> = test_idx.iter().map(|&i| prices[i]).collect();
        match predictions.and_then(|p| rmse(&p, &actual)) {
            Ok(score) => log::info!("Model trained. RMSE: {:.2}", score),
            Err(e) => log::warn!("RMSE diagnostic skipped: {}", e),
        }
    }

    // The similarity side uses its own encoding of the full table;
    // it does not reuse the regression pipeline's encoder
    let knn_features = FeatureTable::fit(data)?;
    let knn = NearestNeighbors::fit(knn_features.rows().to_vec(), NEIGHBOR_COUNT)?;

    Ok(ModelBundle {
        pipeline,
        knn,
        knn_features,
        growth: growth.clone(),
        training_data: data.clone(),
    })
}

/// Train and persist in one step. Any failure aborts the whole run as
/// `TrainingFailed`; no partial bundle becomes visible.
pub fn train_and_save(
    store: &ModelStore,
    data: &TransactionData,
    growth: &GrowthRateTable,
) -> Result<ModelBundle> {
    let bundle = train(data, growth).map_err(into_training_failed)?;
    store.save(&bundle).map_err(into_training_failed)?;
    Ok(bundle)
}

fn into_training_failed(err: ForecastError) -> ForecastError {
    match err {
        ForecastError::TrainingFailed(_) => err,
        other => ForecastError::TrainingFailed(other.to_string()),
    }
}
