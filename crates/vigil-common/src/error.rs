//! Error taxonomy for the Vigil engine
//!
//! Every recoverable condition surfaces as a `Finding` attributed to the
//! sub-agent that produced it; only `EngineError` escapes to the
//! orchestrator's top-level catch, where it is converted into a
//! fail-open result.

use thiserror::Error;

/// Reputation provider errors.
///
/// `Unconfigured` is a configuration condition, not a runtime failure:
/// the adapter short-circuits before any network activity and the
/// calling analyzer records an informational finding.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Missing credential; the sub-agent is skipped.
    #[error("provider not configured (missing API key)")]
    Unconfigured,

    /// Timeout, connection failure, or retriable status; retried with
    /// backoff before being surfaced.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Non-retriable HTTP status (4xx other than 429).
    #[error("provider returned HTTP {0}")]
    Http(u16),

    /// Per-call deadline exceeded after all retries.
    #[error("provider call timed out")]
    Timeout,

    /// Response could not be parsed into the expected payload; treated
    /// as "no signal".
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether another attempt may succeed (timeout, 5xx, 429).
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transient(_) | ProviderError::Timeout | ProviderError::Http(429)
        ) || matches!(self, ProviderError::Http(code) if *code >= 500)
    }
}

/// Anomaly detector errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MlError {
    /// Training set below the minimum sample count.
    #[error("insufficient training data: got {got}, need {need}")]
    InsufficientData { got: usize, need: usize },

    /// `predict` called before `train`; callers fall back to the
    /// z-score heuristic.
    #[error("model must be trained before prediction")]
    Untrained,

    /// Input width does not match the trained feature space.
    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Orchestrator-fatal errors. Caught at the top level and converted into
/// a `status: failed` result with zero risk.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input that cannot even be handed to an analyzer.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Analyzer dispatch failure.
    #[error("analyzer dispatch failed: {0}")]
    Dispatch(String),
}

/// Result alias for provider lookups.
pub type ProviderResult<T> = Result<T, ProviderError>;
