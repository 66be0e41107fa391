use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend-owned run status. Unknown labels pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Other(raw) => raw,
        }
    }

    /// Human copy for a history row; unknown statuses show their raw label.
    pub fn copy(&self) -> &str {
        match self {
            RunStatus::Completed => "Draft ready",
            RunStatus::Running => "Processing",
            RunStatus::Failed => "Needs attention",
            RunStatus::Queued => "Queued",
            RunStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for RunStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => RunStatus::Queued,
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Other(raw),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

impl RunRecord {
    /// Creation time, if present and parseable.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parse a backend ISO-8601 timestamp, with or without an offset.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive timestamps are UTC on the backend
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub topics: Vec<String>,
    pub title: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preheader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss_feeds: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerResponse {
    pub run_id: String,
    pub status: RunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_passes_through() {
        let run: RunRecord =
            serde_json::from_str(r#"{"id":"r1","status":"retrying"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Other("retrying".to_string()));
        assert_eq!(run.status.copy(), "retrying");
        assert!(run.message.is_none());
        assert!(run.created_at.is_none());

        let back = serde_json::to_value(&run.status).unwrap();
        assert_eq!(back, serde_json::json!("retrying"));
    }

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let with_offset = parse_timestamp("2026-01-11T12:34:56+00:00").unwrap();
        let naive = parse_timestamp("2026-01-11T12:34:56.250000").unwrap();
        assert_eq!(with_offset.timestamp(), naive.timestamp());
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn known_statuses_map_to_copy() {
        let cases = [
            ("completed", "Draft ready"),
            ("running", "Processing"),
            ("failed", "Needs attention"),
            ("queued", "Queued"),
        ];
        for (raw, copy) in cases {
            let status = RunStatus::from(raw.to_string());
            assert_eq!(status.copy(), copy);
            assert_eq!(status.as_str(), raw);
        }
    }

    #[test]
    fn trigger_request_omits_empty_optionals() {
        let request = TriggerRequest {
            topics: vec!["AI".to_string()],
            title: "Weekly Brief".to_string(),
            subject: "Fresh".to_string(),
            preheader: None,
            hero_query: None,
            rss_feeds: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("preheader").is_none());
        assert!(json.get("rss_feeds").is_none());
        assert_eq!(json["topics"], serde_json::json!(["AI"]));
    }
}
