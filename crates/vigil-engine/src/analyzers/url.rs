//! URL analyzer
//!
//! Local heuristics run first (no suspension), then the two cloud
//! reputation sub-agents run concurrently.

use super::SubAgent;
use ::url::Url;
use std::sync::Arc;
use vigil_common::{AnalysisOutcome, EngineError, Finding, ProviderError};
use vigil_intel::IntelHub;

const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "login", "verify", "account", "secure", "update", "banking", "signin", "password",
];

const HIGH_RISK_TLDS: &[&str] = &["zip", "xyz", "top", "tk", "gq"];

pub struct UrlAnalyzer {
    intel: Arc<IntelHub>,
}

impl UrlAnalyzer {
    pub fn new(intel: Arc<IntelHub>) -> Self {
        Self { intel }
    }

    pub async fn analyze(&self, input: &str) -> Result<AnalysisOutcome, EngineError> {
        let local = heuristics(input);

        let (safebrowsing, virustotal) =
            tokio::join!(self.safebrowsing(input), self.virustotal(input));

        Ok(local.merge(safebrowsing).merge(virustotal))
    }

    async fn safebrowsing(&self, input: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "safebrowsing",
            "Google Safe Browsing",
            "Direct Safe Browsing threat-list lookup",
        );
        let name = agent.name();

        match self.intel.safebrowsing.find_matches(input).await {
            Ok(matches) if matches.is_malicious() => {
                agent.raise(
                    40.0,
                    Finding::critical(&name, "Malicious URL detected by Safe Browsing")
                        .with_details(format!("Threat types: {}", matches.threat_types().join(", "))),
                );
                agent.complete(format!("{} threat match(es)", matches.matches.len()))
            }
            Ok(_) => {
                agent.note(Finding::info(&name, "URL clean (Safe Browsing)"));
                agent.complete("no matches")
            }
            Err(ProviderError::Unconfigured) => agent.skip_unconfigured(),
            Err(err) => agent.fail_provider(&err),
        }
    }

    async fn virustotal(&self, input: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "virustotal",
            "VirusTotal Cloud",
            "Multi-engine URL scan report",
        );
        let name = agent.name();

        match self.intel.virustotal.url_report(input).await {
            Ok(report) => {
                let stats = &report.data.attributes.last_analysis_stats;
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
                            format!("{}/{} engines flagged as malicious", positives, stats.total()),
                        )
                        .with_details(format!("Detection rate: {:.1}%", stats.detection_rate())),
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
}

/// Pure URL heuristics: scheme, raw-IP host, suspicious keywords,
/// excessive subdomains and length.
fn heuristics(input: &str) -> AnalysisOutcome {
    let mut agent = SubAgent::new(
        "url-heuristics",
        "URL Heuristics",
        "Local structural and lexical checks",
    );
    let name = agent.name();

    let parsed = match Url::parse(input) {
        Ok(parsed) => parsed,
        Err(err) => {
            agent.raise(
                20.0,
                Finding::warning(&name, "URL could not be parsed").with_details(err.to_string()),
            );
            return agent.complete("unparseable");
        }
    };

    let mut flags = 0u32;

    if parsed.scheme() != "https" {
        flags += 1;
        agent.raise(
            10.0,
            Finding::warning(&name, format!("Insecure scheme: {}", parsed.scheme())),
        );
    }

    let host = parsed.host_str().unwrap_or("");
    if host.parse::<std::net::Ipv4Addr>().is_ok() {
        flags += 1;
        agent.raise(
            25.0,
            Finding::warning(&name, "Raw IP address used as host")
                .with_details(host.to_string()),
        );
    }

    let lower = input.to_lowercase();
    let keywords: Vec<&str> = SUSPICIOUS_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(**kw))
        .copied()
        .collect();
    if !keywords.is_empty() {
        flags += 1;
        agent.raise(
            15.0,
            Finding::warning(&name, "Suspicious keywords in URL")
                .with_details(keywords.join(", ")),
        );
    }

    if host.matches('.').count() > 3 {
        flags += 1;
        agent.raise(10.0, Finding::warning(&name, "Excessive subdomain nesting"));
    }

    if let Some(tld) = host.rsplit('.').next() {
        if HIGH_RISK_TLDS.contains(&tld) {
            flags += 1;
            agent.raise(
                10.0,
                Finding::warning(&name, format!("High-risk top-level domain: .{}", tld)),
            );
        }
    }

    if input.len() > 100 {
        flags += 1;
        agent.raise(10.0, Finding::warning(&name, "Unusually long URL"));
    }

    if flags == 0 {
        agent.note(Finding::info(&name, "No structural red flags"));
    }
    agent.complete(format!("{} heuristic flag(s)", flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_common::FindingSeverity;

    #[test]
    fn test_clean_url_has_no_heuristic_risk() {
        let outcome = heuristics("https://example.com/docs");
        assert_eq!(outcome.risk_delta, 0.0);
        assert!(outcome
            .findings
            .iter()
            .all(|f| f.severity == FindingSeverity::Info));
    }

    #[test]
    fn test_raw_ip_host_flagged() {
        let outcome = heuristics("http://203.0.113.9/secure-login");
        // insecure scheme + raw IP + keywords
        assert!(outcome.risk_delta >= 45.0);
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.message.contains("Raw IP address")));
    }

    #[test]
    fn test_unparseable_url_penalized_not_fatal() {
        let outcome = heuristics("not a url at all");
        assert_eq!(outcome.risk_delta, 20.0);
        assert_eq!(outcome.agent_statuses.len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_providers_degrade_to_skips() {
        let intel = Arc::new(IntelHub::new(&vigil_common::EngineConfig::default()));
        let analyzer = UrlAnalyzer::new(intel);

        let outcome = analyzer.analyze("https://example.com").await.unwrap();
        assert_eq!(outcome.risk_delta, 0.0);
        // heuristics + 2 skipped providers
        assert_eq!(outcome.agent_statuses.len(), 3);
        assert_eq!(
            outcome
                .findings
                .iter()
                .filter(|f| f.message.contains("no API key"))
                .count(),
            2
        );
    }
}
