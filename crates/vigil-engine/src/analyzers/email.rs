//! Email analyzer
//!
//! The parse stage is the only analyzer-fatal step: an unparseable
//! message cannot be classified at all and surfaces as a fail-open
//! result at the orchestrator. Everything downstream of the parse is
//! non-fatal. Link reputation is a dependent sub-agent: it needs the
//! parsed body, so it runs after the local stages resolve.

use super::SubAgent;
use mail_parser::{MessageParser, MimeHeaders};
use regex::Regex;
use std::sync::Arc;
use vigil_common::{AnalysisOutcome, EngineError, Finding, ProviderError};
use vigil_intel::IntelHub;

const SUBJECT_KEYWORDS: &[&str] = &[
    "urgent",
    "suspended",
    "verify",
    "password",
    "invoice",
    "action required",
];

const SUSPECT_EXTENSIONS: &[&str] = &[
    ".exe", ".scr", ".js", ".vbs", ".bat", ".cmd", ".ps1", ".jar", ".iso", ".lnk",
];

/// Domains that legitimate mail reaches us through dedicated gateways;
/// a raw submission claiming them is a spoof until proven otherwise.
const SPOOF_TARGET_DOMAINS: &[&str] =
    &["google.com", "microsoft.com", "paypal.com", "amazon.com"];

/// URLs extracted from one body that get reputation lookups.
const MAX_BODY_LINKS: usize = 5;

pub struct EmailAnalyzer {
    intel: Arc<IntelHub>,
}

impl EmailAnalyzer {
    pub fn new(intel: Arc<IntelHub>) -> Self {
        Self { intel }
    }

    pub async fn analyze(&self, input: &str) -> Result<AnalysisOutcome, EngineError> {
        let message = MessageParser::default()
            .parse(input.as_bytes())
            .ok_or_else(|| EngineError::InvalidInput("email could not be parsed".to_string()))?;

        let mut structure = SubAgent::new(
            "mail-parser",
            "Email Parser",
            "Header, body, and attachment extraction",
        );
        let structure_name = structure.name();

        if let Some(subject) = message.subject() {
            let lower = subject.to_lowercase();
            if SUBJECT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                structure.raise(
                    10.0,
                    Finding::warning(&structure_name, "Suspicious subject line")
                        .with_details(format!("Subject: {}", subject)),
                );
            }
        }

        let attachment_count = message.attachment_count();
        if attachment_count > 0 {
            let names: Vec<String> = (0..attachment_count)
                .filter_map(|i| message.attachment(i))
                .filter_map(|part| part.attachment_name().map(str::to_string))
                .collect();
            structure.raise(
                15.0,
                Finding::warning(
                    &structure_name,
                    format!("{} attachment(s) detected", attachment_count),
                )
                .with_details(names.join(", ")),
            );

            let suspect = names
                .iter()
                .filter(|n| {
                    let lower = n.to_lowercase();
                    SUSPECT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
                })
                .count();
            if suspect > 0 {
                structure.raise(
                    (suspect as f64 * 5.0).min(15.0),
                    Finding::critical(
                        &structure_name,
                        format!("{} executable-type attachment(s)", suspect),
                    ),
                );
            }
        }
        let structure =
            structure.complete(format!("{} attachment(s)", attachment_count));

        // Sender validation
        let mut sender = SubAgent::new(
            "sender-validator",
            "Sender Validator",
            "From-address plausibility checks",
        );
        let sender_name = sender.name();

        let from_address = message
            .from()
            .and_then(|a| a.first())
            .and_then(|addr| addr.address.as_deref())
            .map(str::to_string);

        match from_address {
            Some(address) if address.contains('@') => {
                let domain = address.rsplit('@').next().unwrap_or("").to_lowercase();
                if SPOOF_TARGET_DOMAINS.contains(&domain.as_str()) {
                    sender.raise(
                        25.0,
                        Finding::critical(&sender_name, "Sender claims a spoof-target domain")
                            .with_details(address.clone()),
                    );
                } else if domain == "example.com" || domain.is_empty() {
                    sender.raise(
                        20.0,
                        Finding::warning(&sender_name, "Implausible sender domain")
                            .with_details(address.clone()),
                    );
                } else {
                    sender.note(Finding::info(&sender_name, "Sender address plausible"));
                }
            }
            _ => {
                sender.raise(
                    20.0,
                    Finding::warning(&sender_name, "Missing or malformed sender address"),
                );
            }
        }
        let sender = sender.complete("sender checked");

        // Dependent sub-agent: body links need the parsed message.
        let mut body = String::new();
        if let Some(text) = message.body_text(0) {
            body.push_str(&text);
        }
        if let Some(html) = message.body_html(0) {
            body.push(' ');
            body.push_str(&html);
        }
        let links = self.check_links(&body).await;

        Ok(structure.merge(sender).merge(links))
    }

    async fn check_links(&self, body: &str) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "link-reputation",
            "Link Reputation",
            "Safe Browsing lookups for body URLs",
        );
        let name = agent.name();

        let urls = extract_urls(body);
        if urls.is_empty() {
            agent.note(Finding::info(&name, "No links in message body"));
            return agent.complete("no links");
        }

        let mut matched = Vec::new();
        for url in &urls {
            match self.intel.safebrowsing.find_matches(url).await {
                Ok(matches) if matches.is_malicious() => matched.push(url.clone()),
                Ok(_) => {}
                Err(ProviderError::Unconfigured) => return agent.skip_unconfigured(),
                Err(err) => return agent.fail_provider(&err),
            }
        }

        if matched.is_empty() {
            agent.note(Finding::info(
                &name,
                format!("{} link(s) clean (Safe Browsing)", urls.len()),
            ));
        } else {
            agent.raise(
                40.0,
                Finding::critical(
                    &name,
                    format!("{} malicious link(s) in message body", matched.len()),
                )
                .with_details(matched.join(", ")),
            );
        }
        agent.complete(format!("{} link(s) checked", urls.len()))
    }
}

/// First few distinct http(s) URLs in the body text.
fn extract_urls(body: &str) -> Vec<String> {
    let pattern = Regex::new(r#"https?://[^\s"'<>)]+"#).unwrap();
    let mut urls = Vec::new();
    for m in pattern.find_iter(body) {
        let url = m.as_str().trim_end_matches(&['.', ','][..]).to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
        if urls.len() == MAX_BODY_LINKS {
            break;
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_common::{EngineConfig, FindingSeverity};

    fn analyzer() -> EmailAnalyzer {
        EmailAnalyzer::new(Arc::new(IntelHub::new(&EngineConfig::default())))
    }

    #[tokio::test]
    async fn test_empty_input_is_analyzer_fatal() {
        let err = analyzer().analyze("").await;
        assert!(matches!(err, Err(EngineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_phishing_shape_scores_subject_and_sender() {
        let raw = "From: security@paypal.com\r\n\
                   To: victim@corp.example\r\n\
                   Subject: URGENT: account suspended\r\n\
                   \r\n\
                   Please verify your details at http://203.0.113.9/login\r\n";
        let outcome = analyzer().analyze(raw).await.unwrap();

        // subject keywords +10, spoof-target sender +25
        assert!(outcome.risk_delta >= 35.0);
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Critical
                && f.message.contains("spoof-target")));
        // link sub-agent degraded to an informational skip (no key)
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.message.contains("no API key")));
    }

    #[tokio::test]
    async fn test_benign_email_yields_zero_risk() {
        let raw = "From: alice@corp-internal.example\r\n\
                   To: bob@corp-internal.example\r\n\
                   Subject: Lunch on Friday?\r\n\
                   \r\n\
                   Sushi or tacos?\r\n";
        let outcome = analyzer().analyze(raw).await.unwrap();
        assert_eq!(outcome.risk_delta, 0.0);
    }

    #[test]
    fn test_url_extraction_dedupes_and_bounds() {
        let body = "see http://a.example/x and http://a.example/x plus \
                    https://b.example, done";
        let urls = extract_urls(body);
        assert_eq!(urls, vec!["http://a.example/x", "https://b.example"]);
    }
}
