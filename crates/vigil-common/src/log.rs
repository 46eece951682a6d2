//! Structured log batch model
//!
//! Log indicators arrive as a JSON array of entries. Entries that fail
//! structural validation are counted and penalized but never abort the
//! batch.

use serde::{Deserialize, Serialize};

/// Recognized log event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    Login,
    FailedLogin,
    Access,
    Download,
    Upload,
}

/// One structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub ip: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub event_type: LogEventType,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

impl LogEntry {
    /// Basic structural validation beyond what serde enforces.
    pub fn is_structurally_valid(&self) -> bool {
        // Dotted-quad shape; full range checking happens in the IP
        // heuristics where it matters.
        let octets: Vec<&str> = self.ip.split('.').collect();
        octets.len() == 4 && octets.iter().all(|o| o.parse::<u8>().is_ok())
    }
}
