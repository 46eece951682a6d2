//! Remediation playbooks
//!
//! Pure lookup from (severity, kind) to an ordered step list. Critical
//! verdicts append the escalation steps for that kind.

use vigil_common::{IndicatorKind, Severity};

pub fn playbook(severity: Severity, kind: IndicatorKind) -> Vec<String> {
    let (base, escalation): (&[&str], &[&str]) = match kind {
        IndicatorKind::Url => (
            &[
                "Block access to flagged URLs",
                "Update security signatures",
                "Run full system scan",
            ],
            &["Immediate quarantine", "Notify security team"],
        ),
        IndicatorKind::Ip => (
            &[
                "Block IP at firewall level",
                "Monitor network traffic from this IP",
                "Investigate related logs",
            ],
            &["Immediate quarantine and alert team", "Report to upstream ISP"],
        ),
        IndicatorKind::Hash => (
            &[
                "Quarantine the file immediately",
                "Delete from all systems",
                "Scan entire environment",
            ],
            &[
                "Notify security incident response team",
                "Submit sample for research",
            ],
        ),
        IndicatorKind::Email => (
            &["Quarantine the email", "Block sender domain"],
            &["Alert security team"],
        ),
        IndicatorKind::Log => (
            &[
                "Review flagged log entries",
                "Block high-risk IP addresses",
                "Investigate anomalous patterns",
            ],
            &["Immediate incident response", "Alert security team"],
        ),
    };

    let mut steps: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    if severity == Severity::Critical {
        steps.extend(escalation.iter().map(|s| s.to_string()));
    }
    steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_appends_escalation() {
        let low = playbook(Severity::Low, IndicatorKind::Ip);
        let critical = playbook(Severity::Critical, IndicatorKind::Ip);
        assert_eq!(low.len(), 3);
        assert_eq!(critical.len(), 5);
        assert!(critical[0].starts_with("1. "));
        assert!(critical[4].contains("upstream ISP"));
    }

    #[test]
    fn test_high_severity_uses_base_playbook() {
        let high = playbook(Severity::High, IndicatorKind::Hash);
        assert_eq!(high.len(), 3);
    }

    #[test]
    fn test_every_kind_has_a_playbook() {
        for kind in [
            IndicatorKind::Url,
            IndicatorKind::Ip,
            IndicatorKind::Hash,
            IndicatorKind::Email,
            IndicatorKind::Log,
        ] {
            assert!(!playbook(Severity::Medium, kind).is_empty());
        }
    }
}
