//! MalwareBazaar known-sample lookup
//!
//! Keyless abuse.ch API: `query=get_info` by hash. A hit means the hash
//! is a catalogued malware sample; anything else is treated as unknown.

use crate::cache::IntelCache;
use crate::client::{parse_payload, HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use vigil_common::error::ProviderResult;

const API_URL: &str = "https://mb-api.abuse.ch/api/v1/";

pub struct MalwareBazaarClient {
    http: HttpClient,
    cache: Arc<IntelCache>,
}

impl MalwareBazaarClient {
    pub fn new(http: HttpClient, cache: Arc<IntelCache>) -> Self {
        Self { http, cache }
    }

    /// Look up a hash in the sample corpus. Returns `None` when the
    /// hash is not catalogued.
    pub async fn lookup(&self, hash: &str) -> ProviderResult<Option<SampleInfo>> {
        let body = self
            .cache
            .get_or_fetch(&format!("mb:hash:{}", hash.to_lowercase()), || {
                self.http.execute_json(
                    self.http
                        .post(API_URL)
                        .form(&[("query", "get_info"), ("hash", hash)]),
                )
            })
            .await?;

        let response: BazaarResponse = parse_payload((*body).clone())?;
        if response.query_status != "ok" {
            // "hash_not_found" and friends: not an error, just no hit.
            return Ok(None);
        }
        Ok(response.data.into_iter().next())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BazaarResponse {
    query_status: String,
    #[serde(default)]
    data: Vec<SampleInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleInfo {
    pub sha256_hash: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub first_seen: Option<String>,
}

impl SampleInfo {
    /// Display label: malware family signature when known, otherwise
    /// the file type.
    pub fn label(&self) -> &str {
        self.signature
            .as_deref()
            .or(self.file_type.as_deref())
            .unwrap_or("unknown")
    }
}
