//! Vigil Core Data Model
//!
//! Shared types for the threat analysis engine: the submitted indicator,
//! the evidence model (findings, agent statuses, timeline), and the
//! aggregate `DefenseResult` returned to callers.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   THREAT ANALYSIS ENGINE                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Indicator ──▶ Orchestrator ──▶ Type Analyzer (per kind)     │
//! │                     │                │                        │
//! │                     │          sub-agents (fan-out)           │
//! │                     │                │                        │
//! │                     ▼                ▼                        │
//! │              Risk Aggregator ◀── AnalysisOutcome[]            │
//! │                     │                                         │
//! │                     ▼                                         │
//! │               DefenseResult (risk, severity, findings,        │
//! │               categories, timeline, remediation)              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod log;

pub use config::EngineConfig;
pub use error::{EngineError, MlError, ProviderError};
pub use log::{LogEntry, LogEventType};

/// How much of the raw payload is echoed back in the result.
pub const INPUT_ECHO_LIMIT: usize = 120;

// =============================================================================
// Indicator
// =============================================================================

/// The kind of threat data being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Url,
    Ip,
    Hash,
    Email,
    Log,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Url => "url",
            IndicatorKind::Ip => "ip",
            IndicatorKind::Hash => "hash",
            IndicatorKind::Email => "email",
            IndicatorKind::Log => "log",
        }
    }
}

/// A submitted indicator. Immutable once created at request entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub data: String,
}

impl Indicator {
    pub fn new(kind: IndicatorKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Payload echo for the result, truncated for oversized inputs
    /// (log batches, raw emails).
    pub fn display_data(&self) -> String {
        if self.data.chars().count() > INPUT_ECHO_LIMIT {
            let prefix: String = self.data.chars().take(INPUT_ECHO_LIMIT).collect();
            format!("{}...", prefix)
        } else {
            self.data.clone()
        }
    }
}

// =============================================================================
// Evidence model
// =============================================================================

/// Lifecycle state of an analyzer sub-agent or orchestrator stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Processing,
    Complete,
    Error,
}

/// Status row for one sub-agent or orchestrator stage. Mutated only by
/// its owning analyzer; lifecycle ends with the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "status")]
    pub state: AgentState,
    pub progress: u8,
    #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
}

impl AgentStatus {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            state: AgentState::Idle,
            progress: 0,
            result_summary: None,
        }
    }

    pub fn complete(&mut self, summary: impl Into<String>) {
        self.state = AgentState::Complete;
        self.progress = 100;
        self.result_summary = Some(summary.into());
    }

    pub fn fail(&mut self, summary: impl Into<String>) {
        self.state = AgentState::Error;
        self.progress = 100;
        self.result_summary = Some(summary.into());
    }
}

/// Severity tag on a single piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Info,
    Warning,
    Critical,
    Error,
}

/// One piece of evidence produced by an analyzer or sub-agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "agent")]
    pub source: String,
    #[serde(rename = "type")]
    pub severity: FindingSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Finding {
    pub fn info(source: &str, message: impl Into<String>) -> Self {
        Self::tagged(source, FindingSeverity::Info, message, None)
    }

    pub fn warning(source: &str, message: impl Into<String>) -> Self {
        Self::tagged(source, FindingSeverity::Warning, message, None)
    }

    pub fn critical(source: &str, message: impl Into<String>) -> Self {
        Self::tagged(source, FindingSeverity::Critical, message, None)
    }

    pub fn tagged(
        source: &str,
        severity: FindingSeverity,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            source: source.to_string(),
            severity,
            message: message.into(),
            details,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// One row of the per-category threat breakdown. Rebuilt once by the
/// aggregator from the final risk score, never mutated piecemeal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatCategoryScore {
    pub category: String,
    pub risk: f64,
    #[serde(rename = "threats")]
    pub threat_count: u32,
}

/// Append-only audit event. Ordering is emission order; never used for
/// control decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub time: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "agent")]
    pub source: String,
    pub event: String,
}

impl TimelineEvent {
    pub fn now(source: &str, event: impl Into<String>) -> Self {
        Self {
            time: chrono::Utc::now(),
            source: source.to_string(),
            event: event.into(),
        }
    }
}

// =============================================================================
// Severity tier
// =============================================================================

/// Severity tier: a pure step function of the overall risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fixed inclusive lower bounds: 80 critical, 60 high, 30 medium.
    pub fn from_risk(risk: u8) -> Self {
        match risk {
            80.. => Severity::Critical,
            60..=79 => Severity::High,
            30..=59 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

// =============================================================================
// Analysis outcome and aggregate result
// =============================================================================

/// Immutable value returned by each analyzer: a summed (uncapped) risk
/// delta plus the evidence that produced it. The orchestrator performs
/// the single merge; clamping happens once, in the aggregator.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    pub risk_delta: f64,
    pub findings: Vec<Finding>,
    pub agent_statuses: Vec<AgentStatus>,
}

impl AnalysisOutcome {
    pub fn merge(mut self, other: AnalysisOutcome) -> Self {
        self.risk_delta += other.risk_delta;
        self.findings.extend(other.findings);
        self.agent_statuses.extend(other.agent_statuses);
        self
    }

    pub fn critical_count(&self) -> u32 {
        self.findings
            .iter()
            .filter(|f| f.severity == FindingSeverity::Critical)
            .count() as u32
    }
}

/// Request status. Transitions `Processing -> Complete | Failed`, never
/// backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Processing,
    Complete,
    Failed,
}

/// The aggregate root returned per analyzed indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefenseResult {
    pub input: Indicator,
    #[serde(rename = "overallRisk")]
    pub overall_risk: u8,
    pub severity: Severity,
    pub agents: Vec<AgentStatus>,
    pub findings: Vec<Finding>,
    #[serde(rename = "remediationSteps")]
    pub remediation_steps: Vec<String>,
    #[serde(rename = "threatMap")]
    pub categories: Vec<ThreatCategoryScore>,
    pub timeline: Vec<TimelineEvent>,
    pub status: AnalysisStatus,
}

impl DefenseResult {
    /// Empty in-flight result for an indicator.
    pub fn processing(indicator: &Indicator) -> Self {
        Self {
            input: Indicator {
                kind: indicator.kind,
                data: indicator.display_data(),
            },
            overall_risk: 0,
            severity: Severity::Low,
            agents: Vec::new(),
            findings: Vec::new(),
            remediation_steps: Vec::new(),
            categories: Vec::new(),
            timeline: Vec::new(),
            status: AnalysisStatus::Processing,
        }
    }

    pub fn push_timeline(&mut self, source: &str, event: impl Into<String>) {
        self.timeline.push(TimelineEvent::now(source, event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_severity_breakpoints() {
        assert_eq!(Severity::from_risk(0), Severity::Low);
        assert_eq!(Severity::from_risk(29), Severity::Low);
        assert_eq!(Severity::from_risk(30), Severity::Medium);
        assert_eq!(Severity::from_risk(59), Severity::Medium);
        assert_eq!(Severity::from_risk(60), Severity::High);
        assert_eq!(Severity::from_risk(79), Severity::High);
        assert_eq!(Severity::from_risk(80), Severity::Critical);
        assert_eq!(Severity::from_risk(100), Severity::Critical);
    }

    #[test]
    fn test_input_echo_truncation() {
        let long = "x".repeat(500);
        let indicator = Indicator::new(IndicatorKind::Log, long);
        let echoed = indicator.display_data();
        assert_eq!(echoed.len(), INPUT_ECHO_LIMIT + 3);
        assert!(echoed.ends_with("..."));

        let short = Indicator::new(IndicatorKind::Ip, "8.8.8.8");
        assert_eq!(short.display_data(), "8.8.8.8");
    }

    #[test]
    fn test_outcome_merge() {
        let a = AnalysisOutcome {
            risk_delta: 20.0,
            findings: vec![Finding::critical("x", "one")],
            agent_statuses: vec![],
        };
        let b = AnalysisOutcome {
            risk_delta: 35.0,
            findings: vec![Finding::info("y", "two")],
            agent_statuses: vec![],
        };
        let merged = a.merge(b);
        assert_eq!(merged.risk_delta, 55.0);
        assert_eq!(merged.findings.len(), 2);
        assert_eq!(merged.critical_count(), 1);
    }

    #[test]
    fn test_result_serialization_shape() {
        let indicator = Indicator::new(IndicatorKind::Ip, "192.168.1.10");
        let result = DefenseResult::processing(&indicator);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["input"]["type"], "ip");
        assert_eq!(json["overallRisk"], 0);
        assert_eq!(json["severity"], "low");
        assert_eq!(json["status"], "processing");
        assert!(json["threatMap"].is_array());
    }

    proptest! {
        #[test]
        fn severity_is_monotonic(a in 0u8..=100, b in 0u8..=100) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(Severity::from_risk(lo) <= Severity::from_risk(hi));
        }
    }
}
