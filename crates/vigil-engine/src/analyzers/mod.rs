//! Type analyzers
//!
//! One analyzer per indicator kind. Each owns a fixed ordered list of
//! sub-agents; sub-agents with no data dependency run concurrently via
//! `tokio::join!` and their outcomes are merged in declaration order
//! once all have settled. A sub-agent failure (missing credential,
//! network error, malformed response) is non-fatal: it surfaces as a
//! finding with zero risk contribution and the analyzer continues.
//!
//! Risk deltas are bounded per sub-agent and summed without a cap;
//! the single clamp to 0..100 happens in the aggregator.

mod email;
mod hash;
mod ip;
mod log;
mod url;

pub use email::EmailAnalyzer;
pub use hash::HashAnalyzer;
pub use ip::IpAnalyzer;
pub use log::LogAnalyzer;
pub use url::UrlAnalyzer;

use vigil_common::{AgentStatus, AnalysisOutcome, Finding, ProviderError};

/// Builder for one sub-agent's slice of an analysis: its status row plus
/// the findings and risk delta it produced.
pub(crate) struct SubAgent {
    status: AgentStatus,
    outcome: AnalysisOutcome,
}

impl SubAgent {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        let mut status = AgentStatus::new(id, name, description);
        status.state = vigil_common::AgentState::Processing;
        Self {
            status,
            outcome: AnalysisOutcome::default(),
        }
    }

    pub fn name(&self) -> String {
        self.status.name.clone()
    }

    /// Record a bounded risk contribution with its supporting evidence.
    pub fn raise(&mut self, delta: f64, finding: Finding) {
        self.outcome.risk_delta += delta;
        self.outcome.findings.push(finding);
    }

    /// Record evidence with no risk contribution.
    pub fn note(&mut self, finding: Finding) {
        self.outcome.findings.push(finding);
    }

    pub fn complete(mut self, summary: impl Into<String>) -> AnalysisOutcome {
        self.status.complete(summary);
        self.outcome.agent_statuses.push(self.status);
        self.outcome
    }

    /// Missing credential: informational skip, zero risk.
    pub fn skip_unconfigured(mut self) -> AnalysisOutcome {
        let name = self.name();
        self.status.fail("no API key configured");
        self.outcome
            .findings
            .push(Finding::info(&name, format!("{} skipped - no API key", name)));
        self.outcome.agent_statuses.push(self.status);
        self.outcome
    }

    /// Provider failure after retries: warning, zero risk, analyzer
    /// continues.
    pub fn fail_provider(mut self, err: &ProviderError) -> AnalysisOutcome {
        let name = self.name();
        self.status.fail(format!("error: {}", err));
        self.outcome.findings.push(
            Finding::warning(&name, format!("{} lookup failed", name))
                .with_details(err.to_string()),
        );
        self.outcome.agent_statuses.push(self.status);
        self.outcome
    }
}
