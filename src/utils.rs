//! Split and accuracy helpers for the training pipeline

use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffle row indices and split them into train and test sets
pub fn train_test_split_indices(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    if n == 0 || test_ratio <= 0.0 || test_ratio >= 1.0 {
        return (indices, Vec::new());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = (n as f64 * test_ratio).round() as usize;
    let train_size = n - test_size;

    let test = indices.split_off(train_size);
    (indices, test)
}

/// Root mean squared error between forecast and actual values
pub fn rmse(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::Validation(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let mse = forecast
        .iter()
        .zip(actual.iter())
        .map(|(f, a)| (f - a).powi(2))
        .sum::<f64>()
        / forecast.len() as f64;

    Ok(mse.sqrt())
}
