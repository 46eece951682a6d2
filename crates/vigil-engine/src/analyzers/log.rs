//! Log batch analyzer
//!
//! Input is a JSON array of structured entries. Entries that fail
//! validation are counted and penalized but never abort the batch; only
//! a body that is not a JSON array at all is analyzer-fatal. The ML
//! sub-agent scores the batch against the shared baseline detector and
//! falls back to a z-score heuristic while the baseline is untrained.

use super::SubAgent;
use chrono::Timelike;
use std::collections::HashMap;
use std::sync::Arc;
use vigil_common::{AnalysisOutcome, EngineError, Finding, LogEntry, LogEventType};
use vigil_ml::features::{self, is_private_ip, FAILED_LOGIN_COLUMN};
use vigil_ml::registry::LofRegistry;

/// Failed logins from one source inside this window trip the burst
/// detector.
const BURST_THRESHOLD: usize = 5;
const BURST_WINDOW_SECS: i64 = 15 * 60;

pub struct LogAnalyzer {
    registry: Arc<LofRegistry>,
}

impl LogAnalyzer {
    pub fn new(registry: Arc<LofRegistry>) -> Self {
        Self { registry }
    }

    pub async fn analyze(&self, input: &str) -> Result<AnalysisOutcome, EngineError> {
        let raw: Vec<serde_json::Value> = serde_json::from_str(input).map_err(|err| {
            EngineError::InvalidInput(format!("log batch is not a JSON array: {}", err))
        })?;

        let (schema, entries) = validate(&raw);
        let heuristics = sweep(&entries);
        let ml = self.anomaly_scan(&entries);

        Ok(schema.merge(heuristics).merge(ml))
    }

    fn anomaly_scan(&self, entries: &[LogEntry]) -> AnalysisOutcome {
        let mut agent = SubAgent::new(
            "ml-anomaly",
            "ML Anomaly Detection",
            "Local Outlier Factor scoring against the traffic baseline",
        );
        let name = agent.name();

        if entries.is_empty() {
            agent.note(Finding::info(&name, "Empty batch, nothing to score"));
            return agent.complete("0 entries");
        }

        let points: Vec<Vec<f64>> = entries.iter().map(features::extract).collect();

        let (anomaly_rate, fallback) = match self.registry.baseline.predict(&points) {
            Ok(prediction) => (prediction.anomaly_rate, false),
            Err(_) => {
                // Untrained baseline: z-score on the failed-login column.
                let labels = vigil_ml::lof::zscore_outliers(&points, FAILED_LOGIN_COLUMN);
                let flagged = labels.iter().filter(|&&l| l == 1).count();
                (flagged as f64 / points.len() as f64, true)
            }
        };

        if anomaly_rate > 0.1 {
            let boost = (anomaly_rate * 400.0).min(50.0);
            let finding = if fallback {
                Finding::warning
            } else {
                Finding::critical
            };
            agent.raise(
                boost,
                finding(&name, "Anomalous activity pattern detected").with_details(format!(
                    "{:.1}% outlier rate{}",
                    anomaly_rate * 100.0,
                    if fallback { " (statistical fallback)" } else { "" }
                )),
            );
        } else {
            agent.note(Finding::info(&name, "No anomalies detected"));
        }
        agent.complete(format!("{:.1}% outlier rate", anomaly_rate * 100.0))
    }
}

/// Structural validation. Returns the schema outcome plus the entries
/// that passed.
fn validate(raw: &[serde_json::Value]) -> (AnalysisOutcome, Vec<LogEntry>) {
    let mut agent = SubAgent::new(
        "schema-validation",
        "Schema Validation",
        "Log structure and data type checks",
    );
    let name = agent.name();

    let mut entries = Vec::with_capacity(raw.len());
    let mut invalid = 0usize;
    for value in raw {
        match serde_json::from_value::<LogEntry>(value.clone()) {
            Ok(entry) if entry.is_structurally_valid() => entries.push(entry),
            _ => invalid += 1,
        }
    }

    if invalid > 0 {
        agent.raise(
            (invalid as f64 * 5.0).min(30.0),
            Finding::warning(&name, format!("{} invalid log entries", invalid))
                .with_details(format!("Processed {}, {} valid", raw.len(), entries.len())),
        );
    } else {
        agent.note(Finding::info(&name, "All log entries valid"));
    }

    let outcome = agent.complete(format!("{}/{} valid", entries.len(), raw.len()));
    (outcome, entries)
}

/// Heuristic sweep: failed-login bursts per source IP plus off-hours
/// public-IP activity.
fn sweep(entries: &[LogEntry]) -> AnalysisOutcome {
    let mut agent = SubAgent::new(
        "rate-detector",
        "Rate Detector",
        "Failed-login bursts and off-hours access",
    );
    let name = agent.name();

    let mut failed_by_ip: HashMap<&str, Vec<i64>> = HashMap::new();
    for entry in entries {
        if entry.event_type == LogEventType::FailedLogin {
            failed_by_ip
                .entry(entry.ip.as_str())
                .or_default()
                .push(entry.timestamp.timestamp());
        }
    }

    let mut burst_ip = None;
    for (ip, mut stamps) in failed_by_ip {
        stamps.sort_unstable();
        for window in stamps.windows(BURST_THRESHOLD) {
            if window[BURST_THRESHOLD - 1] - window[0] <= BURST_WINDOW_SECS {
                burst_ip = Some((ip.to_string(), stamps.len()));
                break;
            }
        }
        if burst_ip.is_some() {
            break;
        }
    }

    if let Some((ip, count)) = burst_ip {
        agent.raise(
            60.0,
            Finding::critical(&name, "Failed-login burst from a single source")
                .with_details(format!("{} failed logins from {}", count, ip)),
        );
    }

    let off_hours = entries
        .iter()
        .filter(|e| {
            let hour = e.timestamp.hour();
            !is_private_ip(&e.ip) && !(8..=18).contains(&hour)
        })
        .count();
    if off_hours > 0 {
        agent.raise(
            (off_hours as f64 * 2.0).min(20.0),
            Finding::warning(
                &name,
                format!("{} off-hours event(s) from public addresses", off_hours),
            ),
        );
    }

    if agent.outcome.findings.is_empty() {
        agent.note(Finding::info(&name, "No rate or access anomalies"));
    }
    agent.complete("sweep done")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use vigil_common::FindingSeverity;

    fn entry(minute_offset: i64, ip: &str, event: LogEventType) -> LogEntry {
        // Monday, 14:00 UTC: inside business hours
        let base = Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap();
        LogEntry {
            timestamp: base + Duration::minutes(minute_offset),
            ip: ip.to_string(),
            user_id: Some("u1".to_string()),
            event_type: event,
            endpoint: Some("/api/v1/data".to_string()),
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64)".to_string()),
            status_code: Some(200),
            bytes: Some(1024),
        }
    }

    fn to_json(entries: &[LogEntry]) -> String {
        serde_json::to_string(entries).unwrap()
    }

    #[tokio::test]
    async fn test_failed_login_burst_is_critical() {
        let mut entries: Vec<LogEntry> = (0..95)
            .map(|i| entry(i % 60, "10.0.0.5", LogEventType::Access))
            .collect();
        for i in 0..5 {
            entries.push(entry(i * 2, "203.0.113.50", LogEventType::FailedLogin));
        }

        let analyzer = LogAnalyzer::new(Arc::new(LofRegistry::default()));
        let outcome = analyzer.analyze(&to_json(&entries)).await.unwrap();

        assert!(outcome.risk_delta >= 60.0);
        assert!(outcome
            .findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Critical
                && f.message.contains("Failed-login burst")));
    }

    #[tokio::test]
    async fn test_spread_out_failures_do_not_trip_burst() {
        let entries: Vec<LogEntry> = (0..5)
            .map(|i| entry(i * 20, "203.0.113.50", LogEventType::FailedLogin))
            .collect();

        let analyzer = LogAnalyzer::new(Arc::new(LofRegistry::default()));
        let outcome = analyzer.analyze(&to_json(&entries)).await.unwrap();
        assert!(!outcome
            .findings
            .iter()
            .any(|f| f.message.contains("Failed-login burst")));
    }

    #[tokio::test]
    async fn test_invalid_entries_penalized_not_fatal() {
        let mut values: Vec<serde_json::Value> = vec![
            serde_json::json!({"bogus": true}),
            serde_json::json!({"timestamp": "2025-03-10T14:00:00Z", "ip": "not-an-ip", "eventType": "access"}),
        ];
        values.push(serde_json::to_value(entry(0, "10.0.0.5", LogEventType::Login)).unwrap());

        let analyzer = LogAnalyzer::new(Arc::new(LofRegistry::default()));
        let outcome = analyzer
            .analyze(&serde_json::to_string(&values).unwrap())
            .await
            .unwrap();

        assert!(outcome
            .findings
            .iter()
            .any(|f| f.message.contains("2 invalid log entries")));
        assert!(outcome.risk_delta >= 10.0);
    }

    #[tokio::test]
    async fn test_non_array_body_is_analyzer_fatal() {
        let analyzer = LogAnalyzer::new(Arc::new(LofRegistry::default()));
        let err = analyzer.analyze("auth.log line noise").await;
        assert!(matches!(err, Err(EngineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_uniform_traffic_scores_clean_with_trained_baseline() {
        let registry = Arc::new(LofRegistry::default());
        registry.ensure_baseline(200).unwrap();

        let entries: Vec<LogEntry> = (0..50)
            .map(|i| entry(i, "192.168.1.20", LogEventType::Login))
            .collect();
        let analyzer = LogAnalyzer::new(registry);
        let outcome = analyzer.analyze(&to_json(&entries)).await.unwrap();

        assert!(!outcome
            .findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Critical));
    }
}
