//! Vigil Threat Analysis Engine
//!
//! The orchestration layer on top of the shared data model
//! (`vigil-common`), the reputation adapters (`vigil-intel`), and the
//! anomaly detector (`vigil-ml`).
//!
//! ```text
//! Indicator ──▶ Orchestrator ──▶ Type Analyzer (one per kind)
//!                   │                  │
//!                   │            sub-agent fan-out (tokio::join!)
//!                   ▼                  ▼
//!            Risk Aggregator ◀── AnalysisOutcome
//!                   │
//!                   ▼
//!             DefenseResult
//! ```
//!
//! The engine fails open: any fatal dispatch condition yields a
//! well-formed `Failed` result with zero risk rather than an error.

pub mod aggregate;
pub mod analyzers;
pub mod orchestrator;
pub mod remediation;
pub mod telemetry;

pub use aggregate::{aggregate, Aggregate};
pub use orchestrator::Orchestrator;
pub use telemetry::{Telemetry, TelemetrySnapshot};
