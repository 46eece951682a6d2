//! Process-lifetime telemetry
//!
//! Cheap counters read by operators, never by the risk computation.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use vigil_common::{IndicatorKind, Severity};

#[derive(Default)]
pub struct Telemetry {
    analyses: AtomicU64,
    criticals: AtomicU64,
    avg_latency_ms: Mutex<f64>,
    by_kind: DashMap<IndicatorKind, u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub analyses: u64,
    pub criticals: u64,
    pub avg_latency_ms: f64,
    pub by_kind: Vec<(IndicatorKind, u64)>,
}

impl Telemetry {
    pub fn record(&self, kind: IndicatorKind, severity: Severity, latency_ms: f64) {
        let analyses = self.analyses.fetch_add(1, Ordering::SeqCst) + 1;
        if severity == Severity::Critical {
            self.criticals.fetch_add(1, Ordering::SeqCst);
        }
        *self.by_kind.entry(kind).or_insert(0) += 1;

        // Running mean over all analyses.
        let mut avg = self.avg_latency_ms.lock();
        *avg = (*avg * (analyses - 1) as f64 + latency_ms) / analyses as f64;
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            analyses: self.analyses.load(Ordering::SeqCst),
            criticals: self.criticals.load(Ordering::SeqCst),
            avg_latency_ms: *self.avg_latency_ms.lock(),
            by_kind: self
                .by_kind
                .iter()
                .map(|e| (*e.key(), *e.value()))
                .collect(),
        }
    }
}
