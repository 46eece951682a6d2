//! AbuseIPDB API v2 client
//!
//! IP abuse-report lookups: confidence score 0-100, report count,
//! country, usage type.

use crate::cache::IntelCache;
use crate::client::{parse_payload, HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use vigil_common::{error::ProviderResult, ProviderError};

const BASE_URL: &str = "https://api.abuseipdb.com/api/v2";

/// Report categories AbuseIPDB attaches to abuse reports.
const CATEGORY_NAMES: &[(u32, &str)] = &[
    (10, "Abuse service"),
    (11, "Email spam"),
    (12, "Attack services"),
    (14, "Web spam"),
    (18, "Internet scanner"),
    (19, "Phishing"),
    (20, "Port scan"),
    (21, "Exploit"),
    (22, "Brute-force"),
    (23, "DDoS attack"),
    (24, "Malware"),
];

pub struct AbuseIpClient {
    api_key: Option<String>,
    http: HttpClient,
    cache: Arc<IntelCache>,
}

impl AbuseIpClient {
    pub fn new(api_key: Option<String>, http: HttpClient, cache: Arc<IntelCache>) -> Self {
        Self {
            api_key,
            http,
            cache,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Check an IP's abuse history over the last 90 days.
    pub async fn check(&self, ip: &str) -> ProviderResult<AbuseIpReport> {
        let key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url = format!("{}/check?ipAddress={}&maxAgeInDays=90", BASE_URL, ip);
        let body = self
            .cache
            .get_or_fetch(&format!("abuse:ip:{}", ip), || {
                self.http.execute_json(
                    self.http
                        .get(&url)
                        .header("Key", key)
                        .header("Accept", "application/json"),
                )
            })
            .await?;
        parse_payload((*body).clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbuseIpReport {
    pub data: AbuseIpData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbuseIpData {
    pub ip_address: String,
    pub is_public: bool,
    pub abuse_confidence_score: u32,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub usage_type: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    pub total_reports: u32,
    #[serde(default)]
    pub last_reported_at: Option<String>,
    #[serde(default)]
    pub reports: Vec<AbuseIpReportEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbuseIpReportEntry {
    #[serde(default)]
    pub categories: Vec<u32>,
}

impl AbuseIpData {
    /// Bounded risk contribution: `min(confidence, 80)`.
    pub fn risk_delta(&self) -> f64 {
        (self.abuse_confidence_score as f64).min(80.0)
    }

    /// Distinct human-readable category names across all reports.
    pub fn category_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for report in &self.reports {
            for code in &report.categories {
                if let Some((_, name)) = CATEGORY_NAMES.iter().find(|(c, _)| c == code) {
                    if !names.contains(name) {
                        names.push(*name);
                    }
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(confidence: u32, categories: Vec<Vec<u32>>) -> AbuseIpData {
        AbuseIpData {
            ip_address: "203.0.113.9".to_string(),
            is_public: true,
            abuse_confidence_score: confidence,
            country_code: Some("US".to_string()),
            usage_type: None,
            isp: None,
            total_reports: categories.len() as u32,
            last_reported_at: None,
            reports: categories
                .into_iter()
                .map(|c| AbuseIpReportEntry { categories: c })
                .collect(),
        }
    }

    #[test]
    fn test_risk_delta_capped_at_80() {
        assert_eq!(report(100, vec![]).risk_delta(), 80.0);
        assert_eq!(report(55, vec![]).risk_delta(), 55.0);
        assert_eq!(report(0, vec![]).risk_delta(), 0.0);
    }

    #[test]
    fn test_category_names_deduped() {
        let data = report(90, vec![vec![22, 18], vec![22, 99]]);
        assert_eq!(data.category_names(), vec!["Brute-force", "Internet scanner"]);
    }

    #[test]
    fn test_payload_parsing() {
        let raw = serde_json::json!({
            "data": {
                "ipAddress": "198.51.100.7",
                "isPublic": true,
                "abuseConfidenceScore": 73,
                "countryCode": "RU",
                "totalReports": 12,
                "reports": [{"categories": [22]}],
                "futureField": 1
            }
        });
        let report: AbuseIpReport = serde_json::from_value(raw).unwrap();
        assert_eq!(report.data.abuse_confidence_score, 73);
        assert_eq!(report.data.country_code.as_deref(), Some("RU"));
    }
}
