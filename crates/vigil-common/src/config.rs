//! Engine configuration
//!
//! Provider credentials are optional at runtime: a missing key degrades
//! the corresponding sub-agent to a skipped/informational state rather
//! than aborting analysis.

use std::time::Duration;

/// Configuration for the analysis engine and its provider adapters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// VirusTotal API key (file/URL/IP reputation).
    pub virustotal_api_key: Option<String>,
    /// AbuseIPDB API key (IP abuse reports).
    pub abuseipdb_api_key: Option<String>,
    /// Google Safe Browsing API key (URL threat matches).
    pub safebrowsing_api_key: Option<String>,
    /// Sandbox/detonation report API key.
    pub sandbox_api_key: Option<String>,
    /// Webhook URL for critical-severity alerts.
    pub alert_webhook: Option<String>,
    /// Hard deadline per provider call.
    pub provider_timeout: Duration,
    /// Retry attempts for transient provider failures.
    pub provider_retries: u32,
    /// TTL of the read-through reputation cache.
    pub cache_ttl: Duration,
    /// Maximum cached reputation entries.
    pub cache_capacity: u64,
    /// Neighbors for the baseline anomaly detector.
    pub lof_k: usize,
    /// Expected outlier fraction for the baseline detector.
    pub lof_contamination: f64,
    /// Synthetic samples generated when no baseline history exists.
    pub baseline_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            virustotal_api_key: None,
            abuseipdb_api_key: None,
            safebrowsing_api_key: None,
            sandbox_api_key: None,
            alert_webhook: None,
            provider_timeout: Duration::from_secs(12),
            provider_retries: 3,
            cache_ttl: Duration::from_secs(600),
            cache_capacity: 10_000,
            lof_k: 30,
            lof_contamination: 0.05,
            baseline_samples: 2_500,
        }
    }
}

impl EngineConfig {
    /// Read credentials from the process environment. Unset variables
    /// leave the corresponding provider unconfigured.
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        Self {
            virustotal_api_key: var("VIRUSTOTAL_API_KEY"),
            abuseipdb_api_key: var("ABUSEIPDB_API_KEY"),
            safebrowsing_api_key: var("GOOGLE_SAFE_BROWSING_API_KEY"),
            sandbox_api_key: var("HYBRID_ANALYSIS_API_KEY"),
            alert_webhook: var("ALERT_WEBHOOK"),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.virustotal_api_key.is_none());
        assert_eq!(config.provider_retries, 3);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.lof_k, 30);
        assert!(config.lof_contamination > 0.0 && config.lof_contamination < 0.5);
    }
}
