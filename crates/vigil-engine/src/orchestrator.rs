//! Request orchestration
//!
//! One request flows `received -> dispatching -> aggregating ->
//! complete | failed`. Exactly one type analyzer is dispatched per
//! indicator kind; its outcome is merged into the running result before
//! the severity and remediation stages. Anything analyzer-fatal is
//! caught at the top level and converted into a well-formed fail-open
//! result: blocking an analyst's workflow is worse than under-reporting
//! risk.

use crate::aggregate;
use crate::analyzers::{EmailAnalyzer, HashAnalyzer, IpAnalyzer, LogAnalyzer, UrlAnalyzer};
use crate::remediation;
use crate::telemetry::{Telemetry, TelemetrySnapshot};
use std::sync::Arc;
use std::time::Instant;
use vigil_common::{
    AgentState, AgentStatus, AnalysisOutcome, AnalysisStatus, DefenseResult, EngineConfig,
    EngineError, Finding, FindingSeverity, Indicator, IndicatorKind, Severity,
};
use vigil_intel::IntelHub;
use vigil_ml::lof::LofConfig;
use vigil_ml::registry::LofRegistry;

/// Caller-visible pipeline stages, in execution order.
const STAGES: &[(&str, &str, &str)] = &[
    ("scout", "Scout", "Initial reconnaissance and indicator classification"),
    ("sentinel", "Sentinel", "Reputation intel lookup via the type analyzer"),
    ("analyst", "Analyst", "Behavioral anomaly scan"),
    ("isolator", "Isolator", "Containment decision: risk and severity"),
    ("remediator", "Remediator", "Response playbook generation"),
    ("learner", "Learner", "Detector adaptation from confirmed threats"),
    ("alerter", "Alerter", "Escalation and notification"),
    ("orchestrator", "Orchestrator", "Coordinates all stages"),
];

pub struct Orchestrator {
    config: EngineConfig,
    registry: Arc<LofRegistry>,
    url: UrlAnalyzer,
    ip: IpAnalyzer,
    hash: HashAnalyzer,
    email: EmailAnalyzer,
    log: LogAnalyzer,
    telemetry: Telemetry,
    webhook_client: reqwest::Client,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        let intel = Arc::new(IntelHub::new(&config));
        let registry = Arc::new(LofRegistry::new(
            LofConfig {
                k: config.lof_k,
                contamination: config.lof_contamination,
            },
            LofConfig {
                k: config.lof_k.saturating_sub(5).max(1),
                contamination: (config.lof_contamination * 2.0).min(0.5),
            },
        ));

        Self {
            url: UrlAnalyzer::new(intel.clone()),
            ip: IpAnalyzer::new(intel.clone()),
            hash: HashAnalyzer::new(intel.clone()),
            email: EmailAnalyzer::new(intel),
            log: LogAnalyzer::new(registry.clone()),
            registry,
            telemetry: Telemetry::default(),
            webhook_client: reqwest::Client::new(),
            config,
        }
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Analyze one indicator to a final verdict. Never errors: fatal
    /// conditions produce a `Failed` result with zero risk.
    pub async fn analyze(&self, indicator: &Indicator) -> DefenseResult {
        let start = Instant::now();
        let request_id = uuid::Uuid::new_v4();
        tracing::info!(%request_id, kind = indicator.kind.as_str(), "analysis started");

        let mut result = DefenseResult::processing(indicator);
        for (id, name, description) in STAGES {
            let mut stage = AgentStatus::new(id, name, description);
            stage.state = AgentState::Processing;
            result.agents.push(stage);
        }
        result.push_timeline("Orchestrator", "Analysis engine started");

        match self.run(&mut result, indicator).await {
            Ok(()) => {
                result.status = AnalysisStatus::Complete;
                complete_stage(&mut result, "orchestrator", "all stages complete");
                result.push_timeline(
                    "Orchestrator",
                    format!("Complete in {}ms", start.elapsed().as_millis()),
                );
            }
            Err(err) => {
                tracing::warn!(%request_id, error = %err, "analysis failed open");
                result.status = AnalysisStatus::Failed;
                result.overall_risk = 0;
                result.severity = Severity::Low;
                result.findings.push(Finding::tagged(
                    "Orchestrator",
                    FindingSeverity::Error,
                    "Analysis failed - indicator treated as safe by default",
                    Some(err.to_string()),
                ));
                for agent in &mut result.agents {
                    if agent.state == AgentState::Processing {
                        agent.fail("aborted");
                    }
                }
                result.push_timeline("Orchestrator", "Analysis failed");
            }
        }

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.telemetry
            .record(indicator.kind, result.severity, latency_ms);
        tracing::info!(
            %request_id,
            risk = result.overall_risk,
            severity = result.severity.as_str(),
            "analysis finished"
        );
        result
    }

    async fn run(
        &self,
        result: &mut DefenseResult,
        indicator: &Indicator,
    ) -> Result<(), EngineError> {
        // Reconnaissance: the indicator arrives pre-typed.
        complete_stage(result, "scout", format!("type: {}", indicator.kind.as_str()));
        result.push_timeline("Scout", format!("Classified as {}", indicator.kind.as_str()));

        // Intel lookup: dispatch the one analyzer for this kind. The
        // log analyzer scores against the baseline detector, so the
        // baseline is trained lazily first.
        if indicator.kind == IndicatorKind::Log {
            match self.registry.ensure_baseline(self.config.baseline_samples) {
                Ok(true) => result.push_timeline("Analyst", "Baseline detector trained"),
                Ok(false) => {}
                Err(err) => result.findings.push(
                    Finding::warning("Analyst", "Baseline training failed")
                        .with_details(err.to_string()),
                ),
            }
        }
        result.push_timeline("Sentinel", "Intel lookup started");
        let outcome = self.dispatch(indicator).await?;
        complete_stage(
            result,
            "sentinel",
            format!("{} finding(s)", outcome.findings.len()),
        );
        result.push_timeline("Sentinel", "Intel lookup complete");

        // Anomaly scan: surfaced by the log analyzer's ML sub-agent.
        let ml_summary = outcome
            .agent_statuses
            .iter()
            .find(|a| a.id == "ml-anomaly")
            .and_then(|a| a.result_summary.clone());
        match ml_summary {
            Some(summary) => complete_stage(result, "analyst", summary),
            None => {
                result
                    .findings
                    .push(Finding::info("Analyst", "ML scan skipped (non-log indicator)"));
                complete_stage(result, "analyst", "skipped");
            }
        }

        // Containment decision: the single clamp and classification.
        let aggregate = aggregate::aggregate(indicator.kind, &outcome);
        result.overall_risk = aggregate.overall_risk;
        result.severity = aggregate.severity;
        result.categories = aggregate.categories;
        result.findings.extend(outcome.findings);
        result.agents.extend(outcome.agent_statuses);
        complete_stage(
            result,
            "isolator",
            format!("risk {}%", result.overall_risk),
        );
        result.push_timeline(
            "Isolator",
            format!(
                "Risk: {}% -> {}",
                result.overall_risk,
                result.severity.as_str()
            ),
        );

        // Remediation playbook.
        result.remediation_steps = remediation::playbook(result.severity, indicator.kind);
        complete_stage(
            result,
            "remediator",
            format!("{} step(s)", result.remediation_steps.len()),
        );
        result.push_timeline("Remediator", "Playbook generated");

        // Learning and alerting are best-effort one-shots on
        // high/critical verdicts.
        self.learn(result);
        self.alert(result).await;

        Ok(())
    }

    async fn dispatch(&self, indicator: &Indicator) -> Result<AnalysisOutcome, EngineError> {
        match indicator.kind {
            IndicatorKind::Url => self.url.analyze(&indicator.data).await,
            IndicatorKind::Ip => self.ip.analyze(&indicator.data).await,
            IndicatorKind::Hash => self.hash.analyze(&indicator.data).await,
            IndicatorKind::Email => self.email.analyze(&indicator.data).await,
            IndicatorKind::Log => self.log.analyze(&indicator.data).await,
        }
    }

    /// Retrain the adaptive detector on a baseline biased toward the
    /// observed critical findings.
    fn learn(&self, result: &mut DefenseResult) {
        if result.severity < Severity::High {
            complete_stage(result, "learner", "no update");
            return;
        }

        let criticals = result
            .findings
            .iter()
            .filter(|f| f.severity == FindingSeverity::Critical)
            .count();
        match self.registry.adapt(500, criticals) {
            Ok(()) => {
                complete_stage(result, "learner", "model updated");
                result.push_timeline("Learner", "Adaptive detector retrained");
            }
            Err(err) => {
                result.findings.push(
                    Finding::warning("Learner", "Model adaptation failed")
                        .with_details(err.to_string()),
                );
                fail_stage(result, "learner", "update failed");
            }
        }
    }

    /// One-shot webhook notification for high/critical verdicts.
    async fn alert(&self, result: &mut DefenseResult) {
        if result.severity < Severity::High {
            complete_stage(result, "alerter", "below threshold");
            return;
        }
        let Some(webhook) = self.config.alert_webhook.clone() else {
            complete_stage(result, "alerter", "no webhook configured");
            return;
        };

        let payload = serde_json::json!({
            "event": "CRITICAL_THREAT",
            "risk": result.overall_risk,
            "type": result.input.kind.as_str(),
            "findings": result
                .findings
                .iter()
                .filter(|f| f.severity == FindingSeverity::Critical)
                .map(|f| f.message.clone())
                .collect::<Vec<_>>(),
        });

        let send = self.webhook_client.post(&webhook).json(&payload).send();
        match tokio::time::timeout(self.config.provider_timeout, send).await {
            Ok(Ok(response)) if response.status().is_success() => {
                complete_stage(result, "alerter", "alert sent");
                result.push_timeline("Alerter", "Alert sent");
            }
            other => {
                let detail = match other {
                    Ok(Ok(response)) => format!("webhook returned HTTP {}", response.status()),
                    Ok(Err(err)) => err.to_string(),
                    Err(_) => "webhook call timed out".to_string(),
                };
                result.findings.push(
                    Finding::warning("Alerter", "Alert delivery failed").with_details(detail),
                );
                fail_stage(result, "alerter", "delivery failed");
            }
        }
    }
}

fn complete_stage(result: &mut DefenseResult, id: &str, summary: impl Into<String>) {
    if let Some(stage) = result.agents.iter_mut().find(|a| a.id == id) {
        stage.complete(summary);
    }
}

fn fail_stage(result: &mut DefenseResult, id: &str, summary: impl Into<String>) {
    if let Some(stage) = result.agents.iter_mut().find(|a| a.id == id) {
        stage.fail(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use vigil_common::{LogEntry, LogEventType};

    fn orchestrator() -> Orchestrator {
        let config = EngineConfig {
            baseline_samples: 200,
            ..EngineConfig::default()
        };
        Orchestrator::new(config)
    }

    fn log_entry(minute_offset: i64, ip: &str, event: LogEventType) -> LogEntry {
        let base = Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap();
        LogEntry {
            timestamp: base + Duration::minutes(minute_offset),
            ip: ip.to_string(),
            user_id: None,
            event_type: event,
            endpoint: Some("/api/v1/data".to_string()),
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64)".to_string()),
            status_code: Some(200),
            bytes: Some(2048),
        }
    }

    #[tokio::test]
    async fn test_fail_open_on_unparseable_log_batch() {
        let engine = orchestrator();
        let indicator = Indicator::new(IndicatorKind::Log, "auth.log line noise");

        let result = engine.analyze(&indicator).await;

        assert_eq!(result.status, AnalysisStatus::Failed);
        assert_eq!(result.overall_risk, 0);
        assert_eq!(result.severity, Severity::Low);
        assert!(result
            .findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Error
                && f.message.contains("treated as safe")));
        // No stage may be left in flight.
        assert!(result
            .agents
            .iter()
            .all(|a| a.state != AgentState::Processing));
    }

    #[tokio::test]
    async fn test_private_ip_completes_with_zero_risk() {
        let engine = orchestrator();
        let indicator = Indicator::new(IndicatorKind::Ip, "192.168.1.10");

        let result = engine.analyze(&indicator).await;

        assert_eq!(result.status, AnalysisStatus::Complete);
        assert_eq!(result.overall_risk, 0);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.categories.len(), 3);
        assert!(!result.remediation_steps.is_empty());
        assert!(result.agents.iter().any(|a| a.id == "ip-triage"));
        assert!(result
            .findings
            .iter()
            .all(|f| f.severity == FindingSeverity::Info));
    }

    #[tokio::test]
    async fn test_unconfigured_providers_leave_url_verdict_complete() {
        let engine = orchestrator();
        let indicator = Indicator::new(IndicatorKind::Url, "https://example.com/docs");

        let result = engine.analyze(&indicator).await;

        assert_eq!(result.status, AnalysisStatus::Complete);
        assert_eq!(result.overall_risk, 0);
        assert_eq!(
            result
                .findings
                .iter()
                .filter(|f| f.message.contains("no API key"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_failed_login_burst_escalates_and_adapts() {
        let engine = orchestrator();
        let mut entries: Vec<LogEntry> = (0..95)
            .map(|i| log_entry(i % 60, "10.0.0.5", LogEventType::Access))
            .collect();
        for i in 0..5 {
            entries.push(log_entry(
                i * 2,
                "203.0.113.50",
                LogEventType::FailedLogin,
            ));
        }
        let indicator =
            Indicator::new(IndicatorKind::Log, serde_json::to_string(&entries).unwrap());

        let result = engine.analyze(&indicator).await;

        assert_eq!(result.status, AnalysisStatus::Complete);
        assert!(result.overall_risk >= 60);
        assert!(result.severity >= Severity::High);
        assert!(result
            .findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Critical));
        // High verdict retrains the adaptive detector.
        let learner = result.agents.iter().find(|a| a.id == "learner").unwrap();
        assert_eq!(learner.result_summary.as_deref(), Some("model updated"));
    }

    #[tokio::test]
    async fn test_telemetry_counts_analyses() {
        let engine = orchestrator();
        engine
            .analyze(&Indicator::new(IndicatorKind::Ip, "10.0.0.1"))
            .await;
        engine
            .analyze(&Indicator::new(IndicatorKind::Ip, "10.0.0.2"))
            .await;

        let snapshot = engine.telemetry();
        assert_eq!(snapshot.analyses, 2);
        assert_eq!(snapshot.criticals, 0);
        assert!(snapshot.avg_latency_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_long_input_echo_is_truncated() {
        let engine = orchestrator();
        let indicator = Indicator::new(IndicatorKind::Log, "x".repeat(5000));

        let result = engine.analyze(&indicator).await;
        assert!(result.input.data.len() <= vigil_common::INPUT_ECHO_LIMIT + 3);
    }
}
