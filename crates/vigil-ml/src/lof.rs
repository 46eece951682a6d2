//! Local Outlier Factor
//!
//! Density-based outlier scoring: a point's local reachability density
//! is compared against that of its k nearest neighbors. Training
//! min-max normalizes the feature columns, precomputes the pairwise
//! distance matrix, per-point k-distances, and the reachability cache.
//! Prediction normalizes with the *training* scaler so scores stay
//! comparable across calls, then scores each point against the input
//! batch itself.
//!
//! State machine: `untrained -> trained`, one-way per process lifetime
//! unless explicitly retrained. Retraining replaces the model wholesale;
//! `k` and `contamination` are fixed at construction.

use parking_lot::RwLock;
use vigil_common::MlError;

use crate::MIN_TRAINING_SAMPLES;

const EPS: f64 = 1e-10;

/// Detector hyperparameters, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct LofConfig {
    /// Neighborhood size.
    pub k: usize,
    /// Expected outlier fraction, clamped to 0.001..=0.5.
    pub contamination: f64,
}

impl Default for LofConfig {
    fn default() -> Self {
        Self {
            k: 30,
            contamination: 0.05,
        }
    }
}

/// Trained model state. Built once by `train`, read-only afterwards.
struct LofModel {
    scaler_min: Vec<f64>,
    scaler_max: Vec<f64>,
    pairwise_distances: Vec<Vec<f64>>,
    k_distances: Vec<f64>,
    reachability_cache: Vec<Vec<f64>>,
    trained_at: chrono::DateTime<chrono::Utc>,
    training_samples: usize,
}

/// Summary of the trained model, for status reporting.
#[derive(Debug, Clone)]
pub struct LofModelInfo {
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub k: usize,
    pub contamination: f64,
    /// Mean distance to the k-th neighbor over the training set; a
    /// coarse density measure of the baseline.
    pub mean_k_distance: f64,
}

/// Scores and labels for one prediction batch.
#[derive(Debug, Clone)]
pub struct LofPrediction {
    pub scores: Vec<f64>,
    /// 1 where the score exceeds the contamination threshold.
    pub labels: Vec<u8>,
    pub anomaly_rate: f64,
}

impl LofPrediction {
    fn empty() -> Self {
        Self {
            scores: Vec::new(),
            labels: Vec::new(),
            anomaly_rate: 0.0,
        }
    }
}

/// Local Outlier Factor detector with a train/predict lifecycle.
///
/// Safe for concurrent readers: the model sits behind an `RwLock` and
/// `predict` takes only a read guard.
pub struct LocalOutlierFactor {
    k: usize,
    contamination: f64,
    model: RwLock<Option<LofModel>>,
}

impl LocalOutlierFactor {
    pub fn new(config: LofConfig) -> Self {
        Self {
            k: config.k.max(1),
            contamination: config.contamination.clamp(0.001, 0.5),
            model: RwLock::new(None),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn model_info(&self) -> Option<LofModelInfo> {
        self.model.read().as_ref().map(|m| LofModelInfo {
            trained_at: m.trained_at,
            training_samples: m.training_samples,
            k: self.k,
            contamination: self.contamination,
            mean_k_distance: m.k_distances.iter().sum::<f64>()
                / m.k_distances.len().max(1) as f64,
        })
    }

    /// Train on baseline feature vectors. Requires at least
    /// [`MIN_TRAINING_SAMPLES`] rows.
    pub fn train(&self, samples: &[Vec<f64>]) -> Result<(), MlError> {
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(MlError::InsufficientData {
                got: samples.len(),
                need: MIN_TRAINING_SAMPLES,
            });
        }

        let dim = samples[0].len();
        for row in samples {
            if row.len() != dim {
                return Err(MlError::DimensionMismatch {
                    expected: dim,
                    got: row.len(),
                });
            }
        }

        let (scaler_min, scaler_max) = column_bounds(samples);
        let scaled = scale(samples, &scaler_min, &scaler_max);
        let n = scaled.len();

        let mut distances = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = euclidean(&scaled[i], &scaled[j]);
                distances[i][j] = d;
                distances[j][i] = d;
            }
        }

        let k = self.k.min(n - 1);
        let k_distances: Vec<f64> = distances
            .iter()
            .map(|row| {
                let mut sorted = row.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
                sorted[k]
            })
            .collect();

        // k nearest neighbor distances, each floored at the point's own
        // k-distance.
        let reachability_cache: Vec<Vec<f64>> = distances
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut neighbors: Vec<f64> = row
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, d)| *d)
                    .collect();
                neighbors.sort_by(|a, b| a.partial_cmp(b).unwrap());
                neighbors
                    .into_iter()
                    .take(self.k)
                    .map(|d| d.max(k_distances[i]))
                    .collect()
            })
            .collect();

        tracing::info!(samples = n, k = self.k, "LOF model trained");

        *self.model.write() = Some(LofModel {
            scaler_min,
            scaler_max,
            pairwise_distances: distances,
            k_distances,
            reachability_cache,
            trained_at: chrono::Utc::now(),
            training_samples: n,
        });

        Ok(())
    }

    /// Score a batch of feature vectors. Neighbors are drawn from the
    /// batch itself; normalization uses the training scaler.
    pub fn predict(&self, points: &[Vec<f64>]) -> Result<LofPrediction, MlError> {
        let guard = self.model.read();
        let model = guard.as_ref().ok_or(MlError::Untrained)?;

        if points.is_empty() {
            return Ok(LofPrediction::empty());
        }

        let dim = model.scaler_min.len();
        for row in points {
            if row.len() != dim {
                return Err(MlError::DimensionMismatch {
                    expected: dim,
                    got: row.len(),
                });
            }
        }

        let scaled = scale(points, &model.scaler_min, &model.scaler_max);
        let n = scaled.len();
        let mut scores = vec![1.0; n];

        for i in 0..n {
            let neighbors = nearest_neighbors(&scaled, i, self.k);
            if neighbors.is_empty() {
                continue;
            }

            let lrd_p = local_reachability_density(&neighbors);
            let mut sum_lrd = 0.0;
            for &(idx, _) in &neighbors {
                let neigh_o = nearest_neighbors(&scaled, idx, self.k);
                sum_lrd += local_reachability_density(&neigh_o);
            }

            scores[i] = sum_lrd / (neighbors.len() as f64 * lrd_p.max(EPS));
        }

        let threshold = percentile(&scores, 100.0 - self.contamination * 100.0);
        let labels: Vec<u8> = scores
            .iter()
            .map(|&s| if s > threshold { 1 } else { 0 })
            .collect();
        let anomaly_rate = labels.iter().filter(|&&l| l == 1).count() as f64 / n as f64;

        Ok(LofPrediction {
            scores,
            labels,
            anomaly_rate,
        })
    }

    /// LOF scores of the training set itself, computed from the cached
    /// distance matrix and reachability cache. Useful as a reference
    /// distribution when tuning contamination.
    pub fn training_scores(&self) -> Result<Vec<f64>, MlError> {
        let guard = self.model.read();
        let model = guard.as_ref().ok_or(MlError::Untrained)?;
        let n = model.training_samples;
        let k = self.k.min(n - 1);

        let neighbor_indices: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                let mut order: Vec<usize> = (0..n).filter(|&j| j != i).collect();
                order.sort_by(|&a, &b| {
                    model.pairwise_distances[i][a]
                        .partial_cmp(&model.pairwise_distances[i][b])
                        .unwrap()
                });
                order.truncate(k);
                order
            })
            .collect();

        let lrds: Vec<f64> = (0..n)
            .map(|i| {
                let sum: f64 = model.reachability_cache[i].iter().sum();
                model.reachability_cache[i].len() as f64 / sum.max(EPS)
            })
            .collect();

        Ok((0..n)
            .map(|i| {
                let sum_lrd: f64 = neighbor_indices[i].iter().map(|&j| lrds[j]).sum();
                sum_lrd / (neighbor_indices[i].len() as f64 * lrds[i].max(EPS))
            })
            .collect())
    }
}

/// Z-score outlier heuristic used when the detector is untrained:
/// flags rows whose value in `column` deviates more than three standard
/// deviations from the batch mean.
pub fn zscore_outliers(points: &[Vec<f64>], column: usize) -> Vec<u8> {
    let values: Vec<f64> = points
        .iter()
        .map(|row| row.get(column).copied().unwrap_or(0.0))
        .collect();
    if values.len() < 2 {
        return vec![0; values.len()];
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev < EPS {
        return vec![0; values.len()];
    }

    values
        .iter()
        .map(|v| if ((v - mean) / std_dev).abs() > 3.0 { 1 } else { 0 })
        .collect()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn column_bounds(data: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let dim = data[0].len();
    let mut min = vec![f64::INFINITY; dim];
    let mut max = vec![f64::NEG_INFINITY; dim];
    for row in data {
        for (i, &v) in row.iter().enumerate() {
            min[i] = min[i].min(v);
            max[i] = max[i].max(v);
        }
    }
    (min, max)
}

fn scale(data: &[Vec<f64>], min: &[f64], max: &[f64]) -> Vec<Vec<f64>> {
    data.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, &v)| {
                    let range = max[i] - min[i];
                    if range.abs() < EPS {
                        0.0
                    } else {
                        (v - min[i]) / range
                    }
                })
                .collect()
        })
        .collect()
}

/// k nearest neighbors of `scaled[i]` within the batch, as
/// `(index, distance)` pairs sorted ascending by distance.
fn nearest_neighbors(scaled: &[Vec<f64>], i: usize, k: usize) -> Vec<(usize, f64)> {
    let mut dists: Vec<(usize, f64)> = scaled
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(j, q)| (j, euclidean(&scaled[i], q)))
        .collect();
    dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    dists.truncate(k);
    dists
}

/// lrd = k / sum(reach_dist), with reachability distances floored at the
/// point's own k-distance.
fn local_reachability_density(neighbors: &[(usize, f64)]) -> f64 {
    let k_dist = neighbors.last().map(|&(_, d)| d).unwrap_or(EPS);
    let sum_reach: f64 = neighbors.iter().map(|&(_, d)| d.max(k_dist)).sum();
    neighbors.len() as f64 / sum_reach.max(EPS)
}

/// Percentile with linear interpolation between order statistics.
fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (idx - lo as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_samples(n: usize) -> Vec<Vec<f64>> {
        // Tight deterministic cluster around (0.5, 0.5, 0.5).
        (0..n)
            .map(|i| {
                let jitter = (i % 10) as f64 * 0.001;
                vec![0.5 + jitter, 0.5 - jitter, 0.5]
            })
            .collect()
    }

    #[test]
    fn test_train_requires_minimum_samples() {
        let lof = LocalOutlierFactor::new(LofConfig::default());
        let err = lof.train(&clustered_samples(50)).unwrap_err();
        assert_eq!(
            err,
            MlError::InsufficientData { got: 50, need: 100 }
        );
        assert!(!lof.is_trained());
    }

    #[test]
    fn test_predict_before_train() {
        let lof = LocalOutlierFactor::new(LofConfig::default());
        let err = lof.predict(&clustered_samples(10)).unwrap_err();
        assert_eq!(err, MlError::Untrained);
    }

    #[test]
    fn test_dimension_mismatch() {
        let lof = LocalOutlierFactor::new(LofConfig::default());
        lof.train(&clustered_samples(120)).unwrap();
        let err = lof.predict(&[vec![0.5, 0.5]]).unwrap_err();
        assert_eq!(
            err,
            MlError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_determinism() {
        let lof = LocalOutlierFactor::new(LofConfig { k: 10, contamination: 0.1 });
        lof.train(&clustered_samples(150)).unwrap();

        let mut batch = clustered_samples(40);
        batch.push(vec![5.0, 5.0, 5.0]);

        let a = lof.predict(&batch).unwrap();
        let b = lof.predict(&batch).unwrap();
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_outlier_scores_above_inliers() {
        let lof = LocalOutlierFactor::new(LofConfig { k: 10, contamination: 0.05 });
        lof.train(&clustered_samples(150)).unwrap();

        let mut batch = clustered_samples(60);
        batch.push(vec![10.0, -10.0, 10.0]);
        let prediction = lof.predict(&batch).unwrap();

        let outlier_score = *prediction.scores.last().unwrap();
        let max_inlier = prediction.scores[..60]
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert!(
            outlier_score > max_inlier,
            "outlier {} not above inliers {}",
            outlier_score,
            max_inlier
        );
        assert_eq!(*prediction.labels.last().unwrap(), 1);
    }

    #[test]
    fn test_inliers_score_near_one() {
        let lof = LocalOutlierFactor::new(LofConfig { k: 10, contamination: 0.05 });
        lof.train(&clustered_samples(150)).unwrap();

        let prediction = lof.predict(&clustered_samples(50)).unwrap();
        for score in &prediction.scores {
            assert!((score - 1.0).abs() < 0.5, "inlier score {} far from 1", score);
        }
    }

    #[test]
    fn test_empty_batch() {
        let lof = LocalOutlierFactor::new(LofConfig::default());
        lof.train(&clustered_samples(120)).unwrap();
        let prediction = lof.predict(&[]).unwrap();
        assert!(prediction.scores.is_empty());
        assert_eq!(prediction.anomaly_rate, 0.0);
    }

    #[test]
    fn test_retrain_replaces_model() {
        let lof = LocalOutlierFactor::new(LofConfig::default());
        lof.train(&clustered_samples(120)).unwrap();
        let first = lof.model_info().unwrap();
        lof.train(&clustered_samples(200)).unwrap();
        let second = lof.model_info().unwrap();
        assert_eq!(second.training_samples, 200);
        assert!(second.trained_at >= first.trained_at);
    }

    #[test]
    fn test_training_scores_cluster_near_one() {
        let lof = LocalOutlierFactor::new(LofConfig { k: 10, contamination: 0.05 });
        lof.train(&clustered_samples(120)).unwrap();
        let scores = lof.training_scores().unwrap();
        assert_eq!(scores.len(), 120);
        for score in scores {
            assert!((score - 1.0).abs() < 0.5);
        }
    }

    #[test]
    fn test_zscore_fallback() {
        let mut points: Vec<Vec<f64>> = (0..50).map(|_| vec![0.0, 1.0]).collect();
        points.push(vec![0.0, 100.0]);
        let labels = zscore_outliers(&points, 1);
        assert_eq!(labels[50], 1);
        assert!(labels[..50].iter().all(|&l| l == 0));
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < EPS);
    }
}
