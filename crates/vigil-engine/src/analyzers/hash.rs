//! Hash analyzer
//!
//! Format classification and entropy run locally, then the three
//! reputation sub-agents (VirusTotal, sandbox, MalwareBazaar) run
//! concurrently against the normalized hash.

use super::SubAgent;
use regex::Regex;
use std::sync::Arc;
use vigil_common::{AnalysisOutcome, EngineError, Finding, ProviderError};
use vigil_intel::{IntelHub, VtAnalysisStats};
use vigil_ml::features::shannon_entropy;

/// Entropy floor below which a hex identifier looks degenerate
/// (repeated characters, padding) rather than digest-like.
const WEAK_ENTROPY_BITS: f64 = 3.5;

pub struct HashAnalyzer {
    intel: Arc<IntelHub>,
}

impl HashAnalyzer {
    pub fn new(intel: Arc<IntelHub>) -> Self {
        Self { intel }
    }

    pub async fn analyze(&self, input: &str) -> Result<AnalysisOutcome, EngineError> {
        let hash = input.trim().to_lowercase();
        let local = classify(&hash);

        let (virustotal, sandbox, bazaar) = tokio::join!(
            self.virustotal(&hash),
            self.sandbox(&hash),
            self.malwarebazaar(&hash)
        );

        Ok(local.merge(virustotal).merge(sandbox).merge(bazaar))
    }

    async fn virustotal(&self, hash: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "virustotal",
            "VirusTotal Hash Scan",
            "Multi-engine file hash verification",
        );
        let name = agent.name();

        match self.intel.virustotal.file_report(hash).await {
            Ok(report) => {
                let attrs = report.data.attributes;
                let (delta, finding) = score_vt_stats(&attrs.last_analysis_stats, &name);
                let positives = attrs.last_analysis_stats.malicious;
                if let Some(finding) = finding {
                    let names = attrs.names.unwrap_or_default();
                    agent.raise(
                        delta,
                        finding.with_details(format!(
                            "Detection rate: {:.1}% | Names: {}",
                            attrs.last_analysis_stats.detection_rate(),
                            if names.is_empty() {
                                "None".to_string()
                            } else {
                                names.join(", ")
                            }
                        )),
                    );
                } else {
                    agent.note(Finding::info(&name, "File clean by all engines"));
                }
                agent.complete(format!("{} positives", positives))
            }
            Err(ProviderError::Unconfigured) => agent.skip_unconfigured(),
            Err(err) => agent.fail_provider(&err),
        }
    }

    async fn sandbox(&self, hash: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "sandbox",
            "Sandbox Detonation",
            "Behavioral report lookup by hash",
        );
        let name = agent.name();

        match self.intel.sandbox.search_hash(hash).await {
            Ok(report) if !report.reports.is_empty() => {
                let threat = report.max_threat_score().unwrap_or(0);
                let verdict = report.worst_verdict().unwrap_or("unknown").to_string();
                let finding = if verdict.eq_ignore_ascii_case("malicious") {
                    Finding::critical
                } else {
                    Finding::warning
                };
                agent.raise(
                    report.risk_delta(),
                    finding(&name, format!("Sandbox verdict: {}", verdict))
                        .with_details(format!("Threat score: {}/100", threat)),
                );
                agent.complete(format!("threat score {}", threat))
            }
            Ok(_) => {
                agent.note(Finding::info(&name, "No detonation reports on file"));
                agent.complete("no reports")
            }
            Err(ProviderError::Unconfigured) => agent.skip_unconfigured(),
            Err(err) => agent.fail_provider(&err),
        }
    }

    async fn malwarebazaar(&self, hash: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "malwarebazaar",
            "MalwareBazaar Corpus",
            "Known-sample existence check",
        );
        let name = agent.name();

        match self.intel.malwarebazaar.lookup(hash).await {
            Ok(Some(sample)) => {
                agent.raise(
                    60.0,
                    Finding::critical(&name, "Hash matches a catalogued malware sample")
                        .with_details(format!(
                            "Family: {} | First seen: {}",
                            sample.label(),
                            sample.first_seen.as_deref().unwrap_or("unknown")
                        )),
                );
                agent.complete(format!("known sample ({})", sample.label()))
            }
            Ok(None) => {
                agent.note(Finding::info(&name, "Not present in the sample corpus"));
                agent.complete("no match")
            }
            Err(err) => agent.fail_provider(&err),
        }
    }
}

/// Score a multi-engine verdict: `min(positives * 10, 80)`, critical
/// above 5 positives.
fn score_vt_stats(stats: &VtAnalysisStats, source: &str) -> (f64, Option<Finding>) {
    let positives = stats.malicious;
    if positives == 0 {
        return (0.0, None);
    }
    let finding = if positives > 5 {
        Finding::critical
    } else {
        Finding::warning
    };
    (
        stats.risk_delta(10.0, 80.0),
        Some(finding(
            source,
            format!("File flagged by {}/{} engines", positives, stats.total()),
        )),
    )
}

/// Local format classification of the identifier string.
fn classify(hash: &str) -> AnalysisOutcome {
    let mut agent = SubAgent::new(
        "hash-format",
        "Format Classifier",
        "Digest-length and entropy classification",
    );
    let name = agent.name();

    let hex = Regex::new(r"^[0-9a-f]+$").unwrap();
    let format = if hex.is_match(hash) {
        match hash.len() {
            32 => Some("MD5"),
            40 => Some("SHA-1"),
            64 => Some("SHA-256"),
            128 => Some("SHA-512"),
            _ => None,
        }
    } else {
        None
    };

    match format {
        Some(kind) => {
            agent.note(Finding::info(&name, format!("Recognized {} digest", kind)));

            let entropy = shannon_entropy(hash);
            if entropy < WEAK_ENTROPY_BITS {
                agent.raise(
                    5.0,
                    Finding::warning(&name, "Low-entropy identifier (weak signal)")
                        .with_details(format!("{:.2} bits/char", entropy)),
                );
            }
            agent.complete(kind)
        }
        None => {
            agent.raise(
                10.0,
                Finding::warning(&name, "Unrecognized hash format")
                    .with_details(format!("{} characters", hash.len())),
            );
            agent.complete("unknown format")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_common::FindingSeverity;

    #[test]
    fn test_sha256_recognized() {
        let hash = "a".repeat(32) + &"b".repeat(32);
        let outcome = classify(&hash);
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.message.contains("SHA-256")));
    }

    #[test]
    fn test_unknown_format_penalized() {
        let outcome = classify("zz-not-a-digest");
        assert_eq!(outcome.risk_delta, 10.0);
    }

    #[test]
    fn test_degenerate_digest_is_weak_signal() {
        // 64 identical chars: valid length, near-zero entropy
        let outcome = classify(&"0".repeat(64));
        assert_eq!(outcome.risk_delta, 5.0);
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.message.contains("Low-entropy")));
    }

    #[test]
    fn test_vt_scoring_caps_and_escalates() {
        let stats = VtAnalysisStats {
            malicious: 40,
            suspicious: 0,
            harmless: 30,
            undetected: 0,
        };
        let (delta, finding) = score_vt_stats(&stats, "test");
        assert_eq!(delta, 80.0);
        assert_eq!(finding.unwrap().severity, FindingSeverity::Critical);

        let mild = VtAnalysisStats {
            malicious: 3,
            suspicious: 0,
            harmless: 67,
            undetected: 0,
        };
        let (delta, finding) = score_vt_stats(&mild, "test");
        assert_eq!(delta, 30.0);
        assert_eq!(finding.unwrap().severity, FindingSeverity::Warning);
    }
}
