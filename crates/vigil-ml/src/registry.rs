//! Detector registry
//!
//! Two detectors share the process lifetime: `baseline` scores incoming
//! batches against normal traffic, `adaptive` is retrained after
//! high/critical verdicts. The registry is an explicit component passed
//! by shared reference into the orchestrator; no ambient global state.

use crate::features;
use crate::lof::{LocalOutlierFactor, LofConfig};
use vigil_common::MlError;

/// Baseline + adaptive detector pair.
pub struct LofRegistry {
    pub baseline: LocalOutlierFactor,
    pub adaptive: LocalOutlierFactor,
}

impl LofRegistry {
    pub fn new(baseline: LofConfig, adaptive: LofConfig) -> Self {
        Self {
            baseline: LocalOutlierFactor::new(baseline),
            adaptive: LocalOutlierFactor::new(adaptive),
        }
    }

    /// Train the baseline on synthetic normal traffic if it has never
    /// been trained. Idempotent; returns whether training ran.
    pub fn ensure_baseline(&self, samples: usize) -> Result<bool, MlError> {
        if self.baseline.is_trained() {
            return Ok(false);
        }
        self.baseline.train(&features::synthetic_baseline(samples))?;
        Ok(true)
    }

    /// One-shot adaptation after a high/critical verdict: retrain the
    /// adaptive detector on a baseline biased toward the observed
    /// critical findings.
    pub fn adapt(&self, samples: usize, critical_count: usize) -> Result<(), MlError> {
        self.adaptive
            .train(&features::adaptive_set(samples, critical_count))
    }
}

impl Default for LofRegistry {
    fn default() -> Self {
        Self::new(
            LofConfig {
                k: 30,
                contamination: 0.05,
            },
            LofConfig {
                k: 25,
                contamination: 0.1,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_baseline_idempotent() {
        let registry = LofRegistry::default();
        assert!(registry.ensure_baseline(150).unwrap());
        assert!(!registry.ensure_baseline(150).unwrap());
        assert!(registry.baseline.is_trained());
    }

    #[test]
    fn test_adapt_trains_adaptive_only() {
        let registry = LofRegistry::default();
        registry.adapt(150, 3).unwrap();
        assert!(registry.adaptive.is_trained());
        assert!(!registry.baseline.is_trained());
    }

    #[test]
    fn test_ensure_baseline_rejects_tiny_sample_request() {
        let registry = LofRegistry::default();
        let err = registry.ensure_baseline(10).unwrap_err();
        assert!(matches!(err, MlError::InsufficientData { .. }));
    }
}
