//! Risk aggregation and severity classification
//!
//! The single place where risk is clamped. Analyzers sum bounded
//! sub-agent deltas without a cap; the aggregator clamps the total to
//! 0..100, derives the severity tier, and rebuilds the per-category
//! breakdown from a fixed per-kind weight table. Aggregation is a pure
//! function of its inputs.

use vigil_common::{AnalysisOutcome, IndicatorKind, Severity, ThreatCategoryScore};

/// Final verdict numbers for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub overall_risk: u8,
    pub severity: Severity,
    pub categories: Vec<ThreatCategoryScore>,
}

/// Category weight table per indicator kind. Weights sum to 1.0; each
/// row's risk is capped at its own share of 100.
fn weights(kind: IndicatorKind) -> &'static [(&'static str, f64)] {
    match kind {
        IndicatorKind::Url => &[("Local Detection", 0.4), ("Cloud Engines", 0.6)],
        IndicatorKind::Ip => &[
            ("Geolocation", 0.2),
            ("Reputation", 0.5),
            ("Malware Intel", 0.3),
        ],
        IndicatorKind::Hash => &[
            ("Format Analysis", 0.1),
            ("Reputation", 0.6),
            ("Sandbox", 0.3),
        ],
        IndicatorKind::Email => &[
            ("Email Structure", 0.2),
            ("Sender Validation", 0.3),
            ("Threat Heuristics", 0.5),
        ],
        IndicatorKind::Log => &[
            ("Schema Validation", 0.2),
            ("Heuristics", 0.3),
            ("ML Anomalies", 0.5),
        ],
    }
}

pub fn aggregate(kind: IndicatorKind, outcome: &AnalysisOutcome) -> Aggregate {
    let overall_risk = outcome.risk_delta.round().clamp(0.0, 100.0) as u8;
    let severity = Severity::from_risk(overall_risk);

    // Every category row carries the global critical count, not a
    // per-category one.
    let critical_count = outcome.critical_count();
    let categories = weights(kind)
        .iter()
        .map(|(category, weight)| ThreatCategoryScore {
            category: category.to_string(),
            risk: (overall_risk as f64 * weight).min(weight * 100.0),
            threat_count: critical_count,
        })
        .collect();

    Aggregate {
        overall_risk,
        severity,
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vigil_common::Finding;

    fn outcome(delta: f64) -> AnalysisOutcome {
        AnalysisOutcome {
            risk_delta: delta,
            findings: Vec::new(),
            agent_statuses: Vec::new(),
        }
    }

    #[test]
    fn test_overflowing_deltas_clamp_to_100() {
        let agg = aggregate(IndicatorKind::Hash, &outcome(80.0 + 60.0 + 10.0));
        assert_eq!(agg.overall_risk, 100);
        assert_eq!(agg.severity, Severity::Critical);
    }

    #[test]
    fn test_category_rows_broadcast_critical_count() {
        let mut o = outcome(90.0);
        o.findings.push(Finding::critical("a", "one"));
        o.findings.push(Finding::critical("b", "two"));
        o.findings.push(Finding::warning("c", "three"));

        let agg = aggregate(IndicatorKind::Ip, &o);
        assert_eq!(agg.categories.len(), 3);
        assert!(agg.categories.iter().all(|c| c.threat_count == 2));
    }

    #[test]
    fn test_category_risk_capped_at_weight_share() {
        let agg = aggregate(IndicatorKind::Url, &outcome(100.0));
        let cloud = &agg.categories[1];
        assert_eq!(cloud.category, "Cloud Engines");
        assert_eq!(cloud.risk, 60.0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let o = outcome(42.5);
        assert_eq!(
            aggregate(IndicatorKind::Log, &o),
            aggregate(IndicatorKind::Log, &o)
        );
    }

    proptest! {
        #[test]
        fn risk_always_in_bounds(delta in -500.0f64..500.0) {
            let agg = aggregate(IndicatorKind::Url, &outcome(delta));
            prop_assert!(agg.overall_risk <= 100);
            prop_assert_eq!(agg.severity, Severity::from_risk(agg.overall_risk));
        }
    }
}
