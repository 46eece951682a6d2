//! Feature engineering for log entries
//!
//! All engineered features; no raw strings enter the distance
//! computation. Hour-of-day is circularly encoded (sin/cos) so 23:00
//! and 01:00 sit close together in feature space.

use chrono::{Datelike, Timelike};
use rand::Rng;
use std::net::Ipv4Addr;
use vigil_common::{LogEntry, LogEventType};

/// Width of the log feature vector.
pub const FEATURE_DIM: usize = 12;

/// Column index of the failed-login one-hot, used by the z-score
/// fallback when the detector is untrained.
pub const FAILED_LOGIN_COLUMN: usize = 6;

/// Extract the fixed-width feature vector for one log entry.
pub fn extract(entry: &LogEntry) -> Vec<f64> {
    let hour = entry.timestamp.hour() as f64;
    let day = entry.timestamp.weekday().num_days_from_sunday() as f64;
    let status = entry.status_code.unwrap_or(200);
    let ua_entropy = entry
        .user_agent
        .as_deref()
        .map(shannon_entropy)
        .unwrap_or(0.0);

    vec![
        (hour / 12.0 * std::f64::consts::PI).sin(),
        (hour / 12.0 * std::f64::consts::PI).cos(),
        day / 7.0,
        if !(8.0..=18.0).contains(&hour) { 1.0 } else { 0.0 },
        if day == 0.0 || day == 6.0 { 1.0 } else { 0.0 },
        if is_private_ip(&entry.ip) { 1.0 } else { 0.0 },
        if entry.event_type == LogEventType::FailedLogin { 1.0 } else { 0.0 },
        if entry.event_type == LogEventType::Login { 1.0 } else { 0.0 },
        if (400..600).contains(&status) { 1.0 } else { 0.0 },
        if entry.bytes.unwrap_or(0) > 1_000_000 { 1.0 } else { 0.0 },
        ua_entropy,
        path_depth(entry.endpoint.as_deref().unwrap_or("")) as f64,
    ]
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut freq = std::collections::HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0u32) += 1;
    }
    let len = s.chars().count() as f64;
    -freq
        .values()
        .map(|&f| {
            let p = f as f64 / len;
            p * p.log2()
        })
        .sum::<f64>()
}

/// RFC 1918 private, loopback, or link-local.
pub fn is_private_ip(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>()
        .map(|addr| addr.is_private() || addr.is_loopback() || addr.is_link_local())
        .unwrap_or(false)
}

fn path_depth(endpoint: &str) -> usize {
    // Depth of the path component; scheme/host are ignored.
    let path = endpoint
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, p)| p).unwrap_or(""))
        .unwrap_or(endpoint);
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Synthetic "normal traffic" baseline: business hours, weekdays,
/// private source IPs, successful logins, browser-like user agents.
/// Used when no real history exists so the detector has a meaningful
/// reference distribution on first use.
pub fn synthetic_baseline(n: usize) -> Vec<Vec<f64>> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| {
            let hour = 8.0 + rng.gen::<f64>() * 10.0;
            let day = 1.0 + rng.gen_range(0..5) as f64;
            vec![
                (hour / 12.0 * std::f64::consts::PI).sin(),
                (hour / 12.0 * std::f64::consts::PI).cos(),
                day / 7.0,
                0.0,
                0.0,
                1.0,
                0.0,
                1.0,
                0.0,
                0.0,
                3.5 + rng.gen::<f64>(),
                rng.gen_range(0..3) as f64,
            ]
        })
        .collect()
}

/// Baseline jittered toward observed critical findings, used for the
/// one-shot model adaptation after a high/critical verdict.
pub fn adaptive_set(n: usize, critical_count: usize) -> Vec<Vec<f64>> {
    let mut rng = rand::thread_rng();
    let boost = critical_count as f64 * 0.2;
    synthetic_baseline(n)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|v| v + rng.gen::<f64>() * boost - boost / 2.0)
                .collect()
        })
        .collect()
}
