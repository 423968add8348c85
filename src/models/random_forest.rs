//! Tree-ensemble regression over encoded feature vectors

use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Tuning knobs for the forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of bootstrap-sampled trees
    pub n_trees: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum number of samples in a leaf
    pub min_samples_leaf: usize,
    /// RNG seed for the bootstrap samples
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single variance-reduction regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn fit(x: &[Vec<f64>], y: &[f64], sample: Vec<usize>, params: &ForestParams) -> Self {
        let mut builder = TreeBuilder {
            x,
            y,
            params,
            nodes: Vec::new(),
        };
        builder.grow(sample, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Grow a subtree over `sample` and return its root node index
    fn grow(&mut self, sample: Vec<usize>, depth: usize) -> usize {
        let value = sample.iter().map(|&i| self.y[i]).sum::<f64>() / sample.len() as f64;

        if depth >= self.params.max_depth || sample.len() < 2 * self.params.min_samples_leaf {
            self.nodes.push(Node::Leaf { value });
            return self.nodes.len() - 1;
        }

        let (feature, threshold) = match self.best_split(&sample) {
            Some(split) => split,
            None => {
                self.nodes.push(Node::Leaf { value });
                return self.nodes.len() - 1;
            }
        };

        let (left_sample, right_sample): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| self.x[i][feature] <= threshold);

        // Reserve the split slot before growing children so the
        // child indices are known when it is filled in
        self.nodes.push(Node::Leaf { value });
        let index = self.nodes.len() - 1;

        let left = self.grow(left_sample, depth + 1);
        let right = self.grow(right_sample, depth + 1);
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    /// Pick the (feature, threshold) pair minimizing the summed squared
    /// error of the two sides, honoring the leaf-size floor
    fn best_split(&self, sample: &[usize]) -> Option<(usize, f64)> {
        let n_features = self.x[sample[0]].len();
        let n = sample.len();
        let min_leaf = self.params.min_samples_leaf;

        let mut best: Option<(usize, f64, f64)> = None;

        for feature in 0..n_features {
            let mut pairs: Vec<(f64, f64)> = sample
                .iter()
                .map(|&i| (self.x[i][feature], self.y[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

            let total_sum: f64 = pairs.iter().map(|(_, y)| y).sum();
            let total_sq: f64 = pairs.iter().map(|(_, y)| y * y).sum();

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for split in 1..n {
                let (x_prev, y_prev) = pairs[split - 1];
                left_sum += y_prev;
                left_sq += y_prev * y_prev;

                // No threshold exists between equal values
                if x_prev == pairs[split].0 {
                    continue;
                }
                if split < min_leaf || n - split < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / split as f64)
                    + (right_sq - right_sum * right_sum / (n - split) as f64);

                if best.map_or(true, |(_, _, best_sse)| sse < best_sse) {
                    let threshold = (x_prev + pairs[split].0) / 2.0;
                    best = Some((feature, threshold, sse));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

/// Bootstrap-aggregated regression forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit the forest on a row-major feature matrix and its targets
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ForecastError::TrainingFailed(format!(
                "Feature matrix has {} rows but target has {}",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(ForecastError::TrainingFailed(
                "Feature matrix rows have inconsistent widths".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.len();
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(DecisionTree::fit(x, y, sample, params));
        }

        Ok(Self { trees, n_features })
    }

    /// Mean prediction over all trees
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(ForecastError::Prediction(
                "Forest has no fitted trees".to_string(),
            ));
        }
        if features.len() != self.n_features {
            return Err(ForecastError::Prediction(format!(
                "Expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }

        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Feature-vector width the forest was fitted on
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
