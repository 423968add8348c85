//! Brute-force nearest-neighbor index over encoded feature vectors

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fixed neighbor count for similarity estimates
pub const NEIGHBOR_COUNT: usize = 5;

/// Euclidean nearest-neighbor index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighbors {
    k: usize,
    points: Vec<Vec<f64>>,
}

impl NearestNeighbors {
    /// Fit the index over a row-major point matrix
    pub fn fit(points: Vec<Vec<f64>>, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(ForecastError::TrainingFailed(
                "Neighbor count must be positive".to_string(),
            ));
        }
        if points.is_empty() {
            return Err(ForecastError::TrainingFailed(
                "Cannot fit a neighbor index on zero points".to_string(),
            ));
        }

        let width = points[0].len();
        if points.iter().any(|p| p.len() != width) {
            return Err(ForecastError::TrainingFailed(
                "Neighbor index rows have inconsistent widths".to_string(),
            ));
        }

        Ok(Self { k, points })
    }

    /// Indices of the k nearest points to the query, closest first
    pub fn kneighbors(&self, query: &[f64]) -> Result<Vec<usize>> {
        if self.points.is_empty() {
            return Err(ForecastError::SimilarityLookup(
                "Neighbor index is empty".to_string(),
            ));
        }
        if query.len() != self.points[0].len() {
            return Err(ForecastError::SimilarityLookup(format!(
                "Query has {} features but the index has {}",
                query.len(),
                self.points[0].len()
            )));
        }
        if self.points.len() < self.k {
            return Err(ForecastError::SimilarityLookup(format!(
                "Index holds {} points, fewer than the {} neighbors requested",
                self.points.len(),
                self.k
            )));
        }

        let mut distances: Vec<(usize, f64)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| (i, squared_distance(query, point)))
            .collect();
        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        Ok(distances.into_iter().take(self.k).map(|(i, _)| i).collect())
    }

    /// The configured neighbor count
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
