//! Vigil Anomaly Detection
//!
//! Unsupervised outlier detection over engineered log features using a
//! Local Outlier Factor (LOF) variant. The detector is trained once per
//! process lifetime on baseline feature vectors and scores incoming
//! batches for outlierness; a score near 1.0 is an inlier, a score well
//! above 1.0 is an outlier.
//!
//! The detector is architecturally independent of the log analyzer that
//! consumes it: anything that can produce fixed-width feature vectors
//! can be scored.

pub mod features;
pub mod lof;
pub mod registry;

pub use lof::{LocalOutlierFactor, LofConfig, LofModelInfo, LofPrediction};
pub use registry::LofRegistry;

/// Minimum training samples before a model is considered meaningful.
pub const MIN_TRAINING_SAMPLES: usize = 100;
