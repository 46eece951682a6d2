//! Vigil Reputation Intelligence
//!
//! Typed request/response adapters around the external reputation
//! services the analyzers consume:
//!
//! - VirusTotal: file/URL/IP scan reports (per-engine verdict counts)
//! - AbuseIPDB: IP abuse confidence and report history
//! - Google Safe Browsing: URL threat matches
//! - Hybrid Analysis: sandbox detonation reports by hash
//! - MalwareBazaar: known-sample existence by hash
//!
//! Every adapter goes through the same plumbing: a hard per-call
//! deadline, exponential-backoff retries on transient failures, and a
//! read-through TTL cache with single-flight misses. Missing
//! credentials short-circuit to `ProviderError::Unconfigured` before
//! any network activity; the calling analyzer degrades the sub-agent
//! to an informational skip.

pub mod abuseipdb;
pub mod cache;
pub mod client;
pub mod malwarebazaar;
pub mod safebrowsing;
pub mod sandbox;
pub mod virustotal;

pub use abuseipdb::{AbuseIpClient, AbuseIpReport};
pub use cache::IntelCache;
pub use client::HttpClient;
pub use malwarebazaar::{MalwareBazaarClient, SampleInfo};
pub use safebrowsing::{SafeBrowsingClient, ThreatMatches};
pub use sandbox::{SandboxClient, SandboxReport};
pub use virustotal::{VirusTotalClient, VtAnalysisStats, VtFileReport, VtIpReport, VtUrlReport};

use std::sync::Arc;
use vigil_common::EngineConfig;

/// All reputation adapters plus the shared cache, constructed once and
/// shared across requests.
pub struct IntelHub {
    pub virustotal: VirusTotalClient,
    pub abuseipdb: AbuseIpClient,
    pub safebrowsing: SafeBrowsingClient,
    pub sandbox: SandboxClient,
    pub malwarebazaar: MalwareBazaarClient,
}

impl IntelHub {
    pub fn new(config: &EngineConfig) -> Self {
        let http = HttpClient::new(config.provider_timeout, config.provider_retries);
        let cache = Arc::new(IntelCache::new(config.cache_capacity, config.cache_ttl));

        Self {
            virustotal: VirusTotalClient::new(
                config.virustotal_api_key.clone(),
                http.clone(),
                cache.clone(),
            ),
            abuseipdb: AbuseIpClient::new(
                config.abuseipdb_api_key.clone(),
                http.clone(),
                cache.clone(),
            ),
            safebrowsing: SafeBrowsingClient::new(
                config.safebrowsing_api_key.clone(),
                http.clone(),
                cache.clone(),
            ),
            sandbox: SandboxClient::new(
                config.sandbox_api_key.clone(),
                http.clone(),
                cache.clone(),
            ),
            // MalwareBazaar is keyless; it shares the plumbing anyway.
            malwarebazaar: MalwareBazaarClient::new(http, cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_common::ProviderError;

    #[tokio::test]
    async fn test_unconfigured_hub_short_circuits() {
        let hub = IntelHub::new(&EngineConfig::default());

        let err = hub.virustotal.file_report("a".repeat(64).as_str()).await;
        assert!(matches!(err, Err(ProviderError::Unconfigured)));

        let err = hub.abuseipdb.check("198.51.100.7").await;
        assert!(matches!(err, Err(ProviderError::Unconfigured)));

        let err = hub.safebrowsing.find_matches("https://example.com").await;
        assert!(matches!(err, Err(ProviderError::Unconfigured)));

        let err = hub.sandbox.search_hash("a".repeat(64).as_str()).await;
        assert!(matches!(err, Err(ProviderError::Unconfigured)));
    }
}
