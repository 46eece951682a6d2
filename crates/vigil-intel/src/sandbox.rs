//! Sandbox detonation-report client (Hybrid Analysis style)
//!
//! Searches existing detonation reports by hash or related host;
//! reports carry a 0-100 threat score and a verdict string.

use crate::cache::IntelCache;
use crate::client::{parse_payload, HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use vigil_common::{error::ProviderResult, ProviderError};

const BASE_URL: &str = "https://www.hybrid-analysis.com/api/v2";

pub struct SandboxClient {
    api_key: Option<String>,
    http: HttpClient,
    cache: Arc<IntelCache>,
}

impl SandboxClient {
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

    /// Search detonation reports for a file hash.
    pub async fn search_hash(&self, hash: &str) -> ProviderResult<SandboxReport> {
        let key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url = format!("{}/search/hash", BASE_URL);
        let body = self
            .cache
            .get_or_fetch(&format!("sandbox:hash:{}", hash.to_lowercase()), || {
                self.http.execute_json(
                    self.http
                        .post(&url)
                        .header("api-key", key)
                        .header("accept", "application/json")
                        .form(&[("hash", hash)]),
                )
            })
            .await?;

        // The search endpoint returns a list of report summaries; the
        // highest threat score wins.
        let reports: Vec<SandboxReportEntry> = parse_payload((*body).clone())?;
        Ok(SandboxReport { reports })
    }

    /// Search detonation reports that communicated with a host.
    pub async fn search_host(&self, host: &str) -> ProviderResult<SandboxReport> {
        let key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url = format!("{}/search/terms", BASE_URL);
        let body = self
            .cache
            .get_or_fetch(&format!("sandbox:host:{}", host), || {
                self.http.execute_json(
                    self.http
                        .post(&url)
                        .header("api-key", key)
                        .header("accept", "application/json")
                        .form(&[("host", host)]),
                )
            })
            .await?;

        let listing: SandboxSearchListing = parse_payload((*body).clone())?;
        Ok(SandboxReport {
            reports: listing.result,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SandboxReport {
    pub reports: Vec<SandboxReportEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxReportEntry {
    #[serde(default)]
    pub verdict: Option<String>,
    #[serde(default)]
    pub threat_score: Option<u32>,
    #[serde(default)]
    pub vx_family: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SandboxSearchListing {
    #[serde(default)]
    result: Vec<SandboxReportEntry>,
}

impl SandboxReport {
    /// Highest threat score across matching reports.
    pub fn max_threat_score(&self) -> Option<u32> {
        self.reports.iter().filter_map(|r| r.threat_score).max()
    }

    /// Worst verdict string across matching reports, preferring
    /// "malicious" over "suspicious" over anything else.
    pub fn worst_verdict(&self) -> Option<&str> {
        let verdicts: Vec<&str> = self
            .reports
            .iter()
            .filter_map(|r| r.verdict.as_deref())
            .collect();
        verdicts
            .iter()
            .find(|v| v.eq_ignore_ascii_case("malicious"))
            .or_else(|| {
                verdicts
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case("suspicious"))
            })
            .or_else(|| verdicts.first())
            .copied()
    }

    /// Bounded risk contribution: threat score capped at 80.
    pub fn risk_delta(&self) -> f64 {
        (self.max_threat_score().unwrap_or(0) as f64).min(80.0)
    }
}
