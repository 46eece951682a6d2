//! IP analyzer
//!
//! Local triage runs first and gates provider spend: private and
//! reserved addresses never reach the paid reputation services. Public
//! addresses fan out to AbuseIPDB, VirusTotal, and the sandbox corpus
//! concurrently.

use super::SubAgent;
use std::net::Ipv4Addr;
use std::sync::Arc;
use vigil_common::{AnalysisOutcome, EngineError, Finding, ProviderError};
use vigil_intel::IntelHub;

const HIGH_RISK_COUNTRIES: &[&str] = &["RU", "CN", "KP"];

pub struct IpAnalyzer {
    intel: Arc<IntelHub>,
}

impl IpAnalyzer {
    pub fn new(intel: Arc<IntelHub>) -> Self {
        Self { intel }
    }

    pub async fn analyze(&self, input: &str) -> Result<AnalysisOutcome, EngineError> {
        let (triage, is_public) = triage(input);
        if !is_public {
            return Ok(triage);
        }

        let (abuse, virustotal, sandbox) = tokio::join!(
            self.abuseipdb(input),
            self.virustotal(input),
            self.sandbox(input)
        );

        Ok(triage.merge(abuse).merge(virustotal).merge(sandbox))
    }

    async fn abuseipdb(&self, input: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "abuseipdb",
            "AbuseIPDB Reputation",
            "Live abuse reports and confidence score",
        );
        let name = agent.name();

        match self.intel.abuseipdb.check(input).await {
            Ok(report) => {
                let data = report.data;
                let confidence = data.abuse_confidence_score;
                let details = format!(
                    "Confidence: {}%, Reports: {}, Country: {}",
                    confidence,
                    data.total_reports,
                    data.country_code.as_deref().unwrap_or("Unknown")
                );

                if confidence > 0 {
                    let finding = if confidence >= 50 {
                        Finding::critical
                    } else {
                        Finding::warning
                    };
                    let categories = data.category_names();
                    agent.raise(
                        data.risk_delta(),
                        finding(
                            &name,
                            format!("IP has abuse history (confidence {}%)", confidence),
                        )
                        .with_details(format!(
                            "{}. Categories: {}",
                            details,
                            if categories.is_empty() {
                                "None".to_string()
                            } else {
                                categories.join(", ")
                            }
                        )),
                    );
                } else {
                    agent.note(
                        Finding::info(&name, "IP clean (no abuse reports)").with_details(details),
                    );
                }

                if let Some(country) = data.country_code.as_deref() {
                    if HIGH_RISK_COUNTRIES.contains(&country) {
                        agent.raise(
                            20.0,
                            Finding::warning(&name, "IP registered in high-risk country")
                                .with_details(format!("Country code: {}", country)),
                        );
                    }
                }

                agent.complete(format!("confidence {}%", confidence))
            }
            Err(ProviderError::Unconfigured) => agent.skip_unconfigured(),
            Err(err) => agent.fail_provider(&err),
        }
    }

    async fn virustotal(&self, input: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "virustotal",
            "VirusTotal IP Report",
            "Multi-engine IP reputation scan",
        );
        let name = agent.name();

        match self.intel.virustotal.ip_report(input).await {
            Ok(report) => {
                let attrs = report.data.attributes;
                let stats = &attrs.last_analysis_stats;
                let positives = stats.malicious;
                if positives > 0 {
                    let finding = if positives > 5 {
                        Finding::critical
                    } else {
                        Finding::warning
                    };
                    agent.raise(
                        stats.risk_delta(10.0, 60.0),
                        finding(
                            &name,
                            format!("{}/{} engines flagged this IP", positives, stats.total()),
                        )
                        .with_details(format!(
                            "AS owner: {}",
                            attrs.as_owner.as_deref().unwrap_or("Unknown")
                        )),
                    );
                } else {
                    agent.note(Finding::info(
                        &name,
                        format!("Clean by all {} engines", stats.total()),
                    ));
                }
                agent.complete(format!("{} positives", positives))
            }
            Err(ProviderError::Unconfigured) => agent.skip_unconfigured(),
            Err(err) => agent.fail_provider(&err),
        }
    }

    async fn sandbox(&self, input: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "sandbox",
            "Sandbox Correlation",
            "Detonation reports that contacted this host",
        );
        let name = agent.name();

        match self.intel.sandbox.search_host(input).await {
            Ok(report) if !report.reports.is_empty() => {
                let threat = report.max_threat_score().unwrap_or(0);
                agent.raise(
                    (threat as f64).min(30.0),
                    Finding::warning(
                        &name,
                        format!(
                            "{} sandbox report(s) communicated with this host",
                            report.reports.len()
                        ),
                    )
                    .with_details(format!(
                        "Max threat score: {}, verdict: {}",
                        threat,
                        report.worst_verdict().unwrap_or("unknown")
                    )),
                );
                agent.complete(format!("{} report(s)", report.reports.len()))
            }
            Ok(_) => {
                agent.note(Finding::info(&name, "No sandbox correlation"));
                agent.complete("no reports")
            }
            Err(ProviderError::Unconfigured) => agent.skip_unconfigured(),
            Err(err) => agent.fail_provider(&err),
        }
    }
}

/// Local triage: address family and scope. Returns the triage outcome
/// plus whether reputation lookups should run at all.
fn triage(input: &str) -> (AnalysisOutcome, bool) {
    let mut agent = SubAgent::new(
        "ip-triage",
        "Address Triage",
        "Address family and scope classification",
    );
    let name = agent.name();

    let addr: Ipv4Addr = match input.trim().parse() {
        Ok(addr) => addr,
        Err(_) => {
            agent.raise(
                10.0,
                Finding::warning(&name, "Not a valid IPv4 address")
                    .with_details(input.to_string()),
            );
            return (agent.complete("invalid address"), false);
        }
    };

    if addr.is_private() || addr.is_loopback() || addr.is_link_local() {
        agent.note(Finding::info(
            &name,
            "Private/reserved address - reputation lookups skipped",
        ));
        return (agent.complete("private scope"), false);
    }

    agent.note(Finding::info(&name, "Public address, dispatching lookups"));
    (agent.complete("public scope"), true)
}
