//! VirusTotal API v3 client
//!
//! Scan-report lookups by file hash, URL, and IP. Payload structs carry
//! only the fields the analyzers consume.

use crate::cache::IntelCache;
use crate::client::{parse_payload, HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use vigil_common::{error::ProviderResult, ProviderError};

const BASE_URL: &str = "https://www.virustotal.com/api/v3";

pub struct VirusTotalClient {
    api_key: Option<String>,
    http: HttpClient,
    cache: Arc<IntelCache>,
}

impl VirusTotalClient {
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

    /// Per-engine scan report for a file hash.
    pub async fn file_report(&self, hash: &str) -> ProviderResult<VtFileReport> {
        let key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url = format!("{}/files/{}", BASE_URL, hash);
        let body = self
            .cache
            .get_or_fetch(&format!("vt:file:{}", hash.to_lowercase()), || {
                self.http
                    .execute_json(self.http.get(&url).header("x-apikey", key))
            })
            .await?;
        parse_payload((*body).clone())
    }

    /// Scan report for a URL. VirusTotal addresses URLs by the
    /// unpadded URL-safe base64 of the URL itself.
    pub async fn url_report(&self, target: &str) -> ProviderResult<VtUrlReport> {
        let key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url_id = base64_url_nopad(target.as_bytes());
        let url = format!("{}/urls/{}", BASE_URL, url_id);
        let body = self
            .cache
            .get_or_fetch(&format!("vt:url:{}", url_id), || {
                self.http
                    .execute_json(self.http.get(&url).header("x-apikey", key))
            })
            .await?;
        parse_payload((*body).clone())
    }

    /// Scan report for an IP address.
    pub async fn ip_report(&self, ip: &str) -> ProviderResult<VtIpReport> {
        let key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url = format!("{}/ip_addresses/{}", BASE_URL, ip);
        let body = self
            .cache
            .get_or_fetch(&format!("vt:ip:{}", ip), || {
                self.http
                    .execute_json(self.http.get(&url).header("x-apikey", key))
            })
            .await?;
        parse_payload((*body).clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtFileReport {
    pub data: VtFileData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtFileData {
    pub attributes: VtFileAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtFileAttributes {
    pub last_analysis_stats: VtAnalysisStats,
    #[serde(default)]
    pub meaningful_name: Option<String>,
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub type_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtUrlReport {
    pub data: VtUrlData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtUrlData {
    pub attributes: VtUrlAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtUrlAttributes {
    pub last_analysis_stats: VtAnalysisStats,
    #[serde(default)]
    pub last_final_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtIpReport {
    pub data: VtIpData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtIpData {
    pub attributes: VtIpAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtIpAttributes {
    pub last_analysis_stats: VtAnalysisStats,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub as_owner: Option<String>,
}

/// Per-engine verdict counts shared by all VT report types.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VtAnalysisStats {
    pub malicious: u32,
    pub suspicious: u32,
    pub harmless: u32,
    pub undetected: u32,
}

impl VtAnalysisStats {
    pub fn total(&self) -> u32 {
        self.malicious + self.suspicious + self.harmless + self.undetected
    }

    /// Bounded risk contribution: `min(malicious * per_positive, cap)`.
    pub fn risk_delta(&self, per_positive: f64, cap: f64) -> f64 {
        (self.malicious as f64 * per_positive).min(cap)
    }

    pub fn detection_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.malicious as f64 / total as f64 * 100.0
        }
    }
}

/// URL-safe base64 without padding, as VT's URL identifiers require.
fn base64_url_nopad(input: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(input)
}
