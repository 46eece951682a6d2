//! Google Safe Browsing v4 client
//!
//! `threatMatches:find` lookups: an empty response means no known
//! threat, otherwise a list of matched threat types.

use crate::cache::IntelCache;
use crate::client::{parse_payload, HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use vigil_common::{error::ProviderResult, ProviderError};

const BASE_URL: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";

pub struct SafeBrowsingClient {
    api_key: Option<String>,
    http: HttpClient,
    cache: Arc<IntelCache>,
}

impl SafeBrowsingClient {
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

    /// Look up a URL against the malware and social-engineering lists.
    pub async fn find_matches(&self, target: &str) -> ProviderResult<ThreatMatches> {
        let key = self.api_key.as_ref().ok_or(ProviderError::Unconfigured)?;
        let url = format!("{}?key={}", BASE_URL, key);
        let request_body = serde_json::json!({
            "client": {"clientId": "vigil", "clientVersion": "1.0"},
            "threatInfo": {
                "threatTypes": ["MALWARE", "SOCIAL_ENGINEERING"],
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{"url": target}]
            }
        });

        let body = self
            .cache
            .get_or_fetch(&format!("gsb:url:{}", target), || {
                self.http
                    .execute_json(self.http.post(&url).json(&request_body))
            })
            .await?;
        parse_payload((*body).clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreatMatches {
    #[serde(default)]
    pub matches: Vec<ThreatMatch>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatMatch {
    pub threat_type: String,
}

impl ThreatMatches {
    pub fn is_malicious(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn threat_types(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.threat_type.as_str()).collect()
    }
}
